//! The pack-side session against a hypermedia flyte API.
//!
//! # Design
//! `FlyteClient` is ready as soon as it exists: construction runs the
//! bootstrap loop and blocks until the API root links are loaded. Every later
//! call resolves its target through those links (or through the links cached
//! by `register_pack`) and performs exactly one HTTP exchange with no retry.
//!
//! Calls that only read session state take `&self` and may run concurrently.
//! `register_pack` and `reload_links` take `&mut self`, so re-registration
//! cannot race with in-flight calls.

use std::time::Duration;

use url::Url;

use crate::auth::{authorize, BearerToken};
use crate::bootstrap::{self, CancellationToken, RetryPolicy};
use crate::config::{ClientConfig, Environment, ProcessEnv};
use crate::error::ClientError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::links::{rel, LinkTable};
use crate::protocol;
use crate::transport::{FileReader, FsReader, TrustConfig, UreqTransport};
use crate::types::{Action, Event, Pack};

/// Per-request timeout used when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A bootstrapped session for one pack.
#[derive(Debug)]
pub struct FlyteClient<T = UreqTransport> {
    base_url: Url,
    transport: T,
    token: Option<BearerToken>,
    links: LinkTable,
    take_action_url: Option<Url>,
    events_url: Option<Url>,
}

impl FlyteClient<UreqTransport> {
    /// Connect with settings from the process environment.
    ///
    /// Verifies the server against `FLYTE_CA_CERT_FILE` when set, the system
    /// trust store otherwise, and sends `FLYTE_JWT` as bearer token when set.
    /// Blocks until the API links are available.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ClientError> {
        Self::builder(base_url)
            .timeout(timeout)
            .config(ClientConfig::from_env(&ProcessEnv))
            .connect()
    }

    /// Like [`new`](Self::new) but without any server certificate verification.
    pub fn new_insecure(base_url: Url, timeout: Duration) -> Result<Self, ClientError> {
        Self::builder(base_url)
            .timeout(timeout)
            .config(ClientConfig::from_env(&ProcessEnv))
            .insecure()
            .connect()
    }

    pub fn builder(base_url: Url) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }
}

impl<T: Transport> FlyteClient<T> {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    /// Resolve a relation from the API root links.
    pub fn resolve(&self, relation: &str) -> Result<&Url, ClientError> {
        self.links.resolve(relation)
    }

    pub fn health_check_url(&self) -> Result<&Url, ClientError> {
        self.resolve(rel::HEALTH)
    }

    /// Set by the last successful `register_pack`.
    pub fn take_action_url(&self) -> Option<&Url> {
        self.take_action_url.as_ref()
    }

    /// Set by the last successful `register_pack`.
    pub fn events_url(&self) -> Option<&Url> {
        self.events_url.as_ref()
    }

    /// Register `pack` and cache its take-action and event links.
    ///
    /// The cached links only change when the whole registration succeeds; a
    /// failed call leaves links from an earlier registration in place.
    pub fn register_pack(&mut self, pack: &Pack) -> Result<Pack, ClientError> {
        let url = self.resolve(rel::PACK_REGISTRATION)?.clone();
        let request = protocol::build_register_pack(&url, pack)?;
        let accepted = protocol::parse_register_pack(self.send(request)?)?;

        tracing::debug!(
            pack = %accepted.pack.name,
            take_action = %accepted.take_action_url,
            events = %accepted.events_url,
            "pack registered"
        );
        self.take_action_url = Some(accepted.take_action_url);
        self.events_url = Some(accepted.events_url);
        Ok(accepted.pack)
    }

    pub fn publish_event(&self, event: &Event) -> Result<(), ClientError> {
        let url = registered(self.events_url.as_ref(), rel::EVENT)?;
        let request = protocol::build_publish_event(url, event)?;
        protocol::parse_publish_event(url, self.send(request)?)
    }

    /// Take the next action for the registered pack.
    ///
    /// `Err(ClientError::NotFound)` when the server answers 404 and `Ok(None)`
    /// for an empty success body: both mean there is nothing to do right now.
    pub fn take_action(&self) -> Result<Option<Action>, ClientError> {
        let url = registered(self.take_action_url.as_ref(), rel::TAKE_ACTION)?;
        let request = protocol::build_take_action(url);
        protocol::parse_take_action(url, self.send(request)?)
    }

    /// Post `event` as the result of `action`, via the action's own links.
    pub fn complete_action(&self, action: &Action, event: &Event) -> Result<(), ClientError> {
        let url = protocol::action_result_url(action)?;
        let request = protocol::build_complete_action(action, event)?;
        protocol::parse_complete_action(url, self.send(request)?)
    }

    /// Fetch the links document once and swap it in on success.
    ///
    /// On failure the current table stays in use.
    pub fn reload_links(&mut self) -> Result<(), ClientError> {
        let links = bootstrap::fetch_links_once(&self.transport, &self.base_url, self.token.as_ref())?;
        self.links = links;
        Ok(())
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        self.transport
            .execute(authorize(request, self.token.as_ref()))
    }
}

fn registered<'a>(url: Option<&'a Url>, relation: &str) -> Result<&'a Url, ClientError> {
    url.ok_or_else(|| ClientError::NotRegistered {
        relation: relation.to_string(),
    })
}

/// Configures and connects a [`FlyteClient`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: Url,
    timeout: Duration,
    trust: TrustConfig,
    token: Option<BearerToken>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl ClientBuilder {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            trust: TrustConfig::SystemRoots,
            token: None,
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply token and CA settings, e.g. from [`ClientConfig::from_env`].
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.trust = config.trust();
        self.token = config.jwt;
        self
    }

    /// Apply settings read from `env`.
    pub fn env(self, env: &dyn Environment) -> Self {
        self.config(ClientConfig::from_env(env))
    }

    pub fn bearer_token(mut self, token: BearerToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn trust(mut self, trust: TrustConfig) -> Self {
        self.trust = trust;
        self
    }

    /// Disable server certificate verification.
    pub fn insecure(self) -> Self {
        self.trust(TrustConfig::Insecure)
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Token the caller can use to abandon bootstrap.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build the `ureq` transport and bootstrap.
    pub fn connect(self) -> Result<FlyteClient<UreqTransport>, ClientError> {
        self.connect_with_reader(&FsReader)
    }

    /// Like [`connect`](Self::connect), reading CA material through `files`.
    pub fn connect_with_reader(
        self,
        files: &dyn FileReader,
    ) -> Result<FlyteClient<UreqTransport>, ClientError> {
        let transport = UreqTransport::new(self.timeout, &self.trust, files)?;
        self.connect_with(transport)
    }

    /// Bootstrap over a caller-supplied transport.
    ///
    /// The builder's timeout and trust settings are not applied to it.
    pub fn connect_with<T: Transport>(self, transport: T) -> Result<FlyteClient<T>, ClientError> {
        let links = bootstrap::fetch_links(
            &transport,
            &self.base_url,
            self.token.as_ref(),
            &self.policy,
            &self.cancel,
        )?;
        Ok(FlyteClient {
            base_url: self.base_url,
            transport,
            token: self.token,
            links,
            take_action_url: None,
            events_url: None,
        })
    }
}
