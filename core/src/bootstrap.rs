//! Retry-until-ready fetch of the API root links document.
//!
//! # Design
//! Client construction blocks until the API has answered with a usable links
//! document. With the default `RetryPolicy` there is no attempt limit and no
//! backoff growth: the client waits out a slow service start instead of
//! failing. Failed attempts are logged and never returned. Callers that need
//! a deadline cancel through a `CancellationToken`, which also cuts short the
//! wait between attempts.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use url::Url;

use crate::auth::{authorize, BearerToken};
use crate::error::ClientError;
use crate::http::Transport;
use crate::links::LinkTable;
use crate::protocol;

/// How often, and how many times, the links document is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Unbounded retries every `interval`.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_INTERVAL)
    }
}

/// Cloneable flag that stops a running bootstrap.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, wakeup) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wakeup.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`; returns true if cancelled meanwhile.
    fn wait(&self, timeout: Duration) -> bool {
        let (flag, wakeup) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wakeup
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// One authorized GET of the links document.
pub fn fetch_links_once<T: Transport>(
    transport: &T,
    base_url: &Url,
    token: Option<&BearerToken>,
) -> Result<LinkTable, ClientError> {
    let request = authorize(protocol::build_fetch_links(base_url), token);
    let response = transport.execute(request)?;
    protocol::parse_fetch_links(base_url, response)
}

/// Fetch the links document until it succeeds.
///
/// Only returns an error if `cancel` fires (`Cancelled`) or a bounded
/// `policy` runs out of attempts (`AttemptsExhausted`).
pub fn fetch_links<T: Transport>(
    transport: &T,
    base_url: &Url,
    token: Option<&BearerToken>,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<LinkTable, ClientError> {
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        attempt = attempt.saturating_add(1);

        let err = match fetch_links_once(transport, base_url, token) {
            Ok(links) => {
                tracing::info!(url = %base_url, attempt, links = links.len(), "api links loaded");
                return Ok(links);
            }
            Err(err) => err,
        };
        tracing::error!(url = %base_url, attempt, "cannot get api links: {err}");

        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(ClientError::AttemptsExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }
        if cancel.wait(policy.interval) {
            return Err(ClientError::Cancelled);
        }
    }
}
