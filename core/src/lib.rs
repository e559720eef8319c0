//! Blocking client for packs talking to a hypermedia flyte API.
//!
//! # Overview
//! A pack is a worker process that registers itself, polls for actions,
//! reports their results and publishes standalone events. The API is driven
//! entirely by links: the client only knows the base URL, and every other
//! target is discovered from relation-named links in server responses.
//!
//! # Design
//! - `FlyteClient::new` blocks until the API root links load, retrying every
//!   second for as long as it takes (`bootstrap`).
//! - Request construction and response interpretation are pure functions
//!   (`protocol`); a `Transport` runs the exchange. `UreqTransport` is the
//!   production transport, with system, custom-CA or disabled verification.
//! - A 404 from take-action is `ClientError::NotFound`, a missing relation is
//!   `ClientError::LinkNotFound`; callers match on variants, not messages.
//! - `FLYTE_JWT` and `FLYTE_CA_CERT_FILE` are read through the `Environment`
//!   trait, so tests never touch the process environment.
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use flyte_client::{ClientError, Event, FlyteClient, Pack};
//! use url::Url;
//!
//! # fn run() -> Result<(), ClientError> {
//! let base = Url::parse("https://flyte.example.com/v1").unwrap();
//! let mut client = FlyteClient::new(base, Duration::from_secs(10))?;
//! client.register_pack(&Pack::new("Slack"))?;
//!
//! match client.take_action() {
//!     Ok(Some(action)) => {
//!         let result = Event::new("MessageSent", serde_json::json!({"ok": true}));
//!         client.complete_action(&action, &result)?;
//!     }
//!     Ok(None) => {}
//!     Err(e) if e.is_not_found() => {}
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod links;
pub mod protocol;
pub mod transport;
pub mod types;

pub use auth::BearerToken;
pub use bootstrap::{CancellationToken, RetryPolicy};
pub use client::{ClientBuilder, FlyteClient};
pub use config::{ClientConfig, Environment, ProcessEnv};
pub use error::ClientError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use links::{rel, DocumentLink, Link, LinkTable, LinksDocument};
pub use transport::{FileReader, FsReader, TrustConfig, UreqTransport};
pub use types::{Action, Command, Event, EventDef, Pack};
