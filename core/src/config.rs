//! Client configuration read from environment variables.
//!
//! # Design
//! Environment access goes through the `Environment` trait so tests pass a
//! plain map instead of mutating the process environment.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::auth::BearerToken;
use crate::transport::TrustConfig;

/// Bearer token attached to every request when set.
pub const JWT_ENV: &str = "FLYTE_JWT";
/// PEM file holding the CA certificate(s) that server certificates must chain to.
pub const CA_CERT_FILE_ENV: &str = "FLYTE_CA_CERT_FILE";

/// Read-only view of environment variables.
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// The current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Authentication and trust settings for one client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub jwt: Option<BearerToken>,
    pub ca_cert_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Empty values count as unset.
    pub fn from_env(env: &dyn Environment) -> Self {
        let non_empty = |name: &str| env.var(name).filter(|v| !v.trim().is_empty());
        Self {
            jwt: non_empty(JWT_ENV).map(BearerToken::new),
            ca_cert_file: non_empty(CA_CERT_FILE_ENV).map(PathBuf::from),
        }
    }

    /// Custom CA when a file is configured, system roots otherwise.
    pub fn trust(&self) -> TrustConfig {
        match &self.ca_cert_file {
            Some(path) => TrustConfig::CustomCa(path.clone()),
            None => TrustConfig::SystemRoots,
        }
    }
}
