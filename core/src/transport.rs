//! Blocking HTTP transport backed by `ureq`, with TLS trust configuration.
//!
//! # Design
//! Construction does no network I/O. Trust comes from exactly one of three
//! places: the platform verifier, the certificates in a caller-supplied CA
//! file (and nothing else), or nothing at all in insecure mode. Insecure mode
//! is only reachable by asking for it; a CA file that fails to load is an
//! error, never a reason to relax verification.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rustls::pki_types::CertificateDer;
use ureq::tls::{Certificate, PemItem, RootCerts, TlsConfig};

use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Where server certificates are verified against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustConfig {
    /// The operating system's trust store.
    SystemRoots,
    /// Only the certificates found in this PEM file.
    CustomCa(PathBuf),
    /// No server certificate verification at all.
    Insecure,
}

/// Reads whole files. Injected so tests can supply CA material in memory.
pub trait FileReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// `Transport` over a configured `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Build an agent with a per-request `timeout` and the given trust roots.
    pub fn new(
        timeout: Duration,
        trust: &TrustConfig,
        files: &dyn FileReader,
    ) -> Result<Self, ClientError> {
        let tls = match trust {
            TrustConfig::SystemRoots => TlsConfig::builder()
                .root_certs(RootCerts::PlatformVerifier)
                .build(),
            TrustConfig::CustomCa(path) => {
                let certs = load_ca_certificates(path, files).inspect_err(|e| {
                    tracing::error!(path = %path.display(), error = %e, "cannot load CA certificate");
                })?;
                TlsConfig::builder()
                    .root_certs(RootCerts::new_with_certs(&certs))
                    .build()
            }
            TrustConfig::Insecure => {
                tracing::warn!("server certificate verification is disabled");
                TlsConfig::builder().disable_verification(true).build()
            }
        };

        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .tls_config(tls)
            .build()
            .new_agent();

        Ok(Self { agent })
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let transport_error = |e: ureq::Error| ClientError::Transport {
            method: request.method.to_string(),
            url: request.url.clone(),
            message: e.to_string(),
        };

        let result = match (request.method, &request.body) {
            (HttpMethod::Get, _) => {
                with_headers(self.agent.get(&request.url), &request.headers).call()
            }
            (HttpMethod::Post, Some(body)) => {
                with_headers(self.agent.post(&request.url), &request.headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => {
                with_headers(self.agent.post(&request.url), &request.headers).send_empty()
            }
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Every certificate in the PEM file at `path`; at least one is required.
///
/// Each one must parse as a trust anchor. A PEM block with garbage inside is
/// rejected here, not at the first handshake.
fn load_ca_certificates(
    path: &Path,
    files: &dyn FileReader,
) -> Result<Vec<Certificate<'static>>, ClientError> {
    let ca_error = |message: String| ClientError::CaCertificate {
        path: path.display().to_string(),
        message,
    };

    let pem = files.read(path).map_err(|e| ca_error(e.to_string()))?;

    let mut certs = Vec::new();
    for item in ureq::tls::parse_pem(&pem) {
        match item.map_err(|e| ca_error(e.to_string()))? {
            PemItem::Certificate(cert) => certs.push(cert.to_owned()),
            _ => continue,
        }
    }

    if certs.is_empty() {
        return Err(ca_error("no PEM certificate found".to_string()));
    }

    let mut anchors = rustls::RootCertStore::empty();
    for (index, cert) in certs.iter().enumerate() {
        anchors
            .add(CertificateDer::from(cert.der()))
            .map_err(|e| ca_error(format!("certificate #{index} is invalid: {e}")))?;
    }
    Ok(certs)
}
