//! Error types for the flyte client.
//!
//! # Design
//! `NotFound` and `LinkNotFound` get dedicated variants because callers
//! branch on them: the first means "no work available", the second means the
//! server never advertised the relation. Every other non-success response
//! carries the raw status and body for debugging.

use std::fmt;

use crate::links::Link;

/// Errors returned by every fallible operation in the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No link with the requested relation exists in the searched link set.
    #[error("could not find link with rel {relation:?} in {}", LinkList(.available))]
    LinkNotFound {
        relation: String,
        available: Vec<Link>,
    },

    /// The server returned 404 for a resolved URL.
    #[error("resource not found at {url}")]
    NotFound { url: String },

    /// Pack registration answered with something other than 201.
    #[error("pack not created, response was: {status} {body}")]
    PackNotCreated { status: u16, body: String },

    /// The server returned a non-2xx status not covered by a dedicated variant.
    #[error("unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("could not deserialise response: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("could not serialise request: {0}")]
    Encode(String),

    /// The request never produced a response (connect, TLS, timeout, I/O).
    #[error("error calling {method} {url}: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
    },

    /// The configured CA certificate could not be read or parsed.
    #[error("failed to load CA certificate {path}: {message}")]
    CaCertificate { path: String, message: String },

    /// The links document decoded but advertised no links.
    #[error("api links document at {url} contains no links")]
    EmptyLinks { url: String },

    /// An operation needing a registration link ran before `register_pack`.
    #[error("pack is not registered, no {relation:?} link cached")]
    NotRegistered { relation: String },

    /// Bootstrap was cancelled through its `CancellationToken`.
    #[error("fetching api links was cancelled")]
    Cancelled,

    /// Bootstrap hit the attempt limit of a bounded `RetryPolicy`.
    #[error("cannot get api links after {attempts} attempts: {last}")]
    AttemptsExhausted {
        attempts: u32,
        last: Box<ClientError>,
    },
}

impl ClientError {
    /// True when the server answered 404, i.e. there is nothing to take.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

struct LinkList<'a>(&'a [Link]);

impl fmt::Display for LinkList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, link) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{link}")?;
        }
        f.write_str("]")
    }
}
