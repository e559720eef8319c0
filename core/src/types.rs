//! Wire DTOs for packs, actions and events.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! integration tests catch drift between the two. Fields the client never
//! reads are optional or defaulted so partial server responses still decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::links::Link;

/// The registered identity of a worker process.
///
/// Sent as the registration payload; the server echoes it back with the
/// links the pack uses afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_defs: Vec<EventDef>,
    #[serde(default, rename = "helpURL", skip_serializing_if = "Option::is_none")]
    pub help_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl Pack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A command the pack can execute, with the events it may emit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub events: Vec<String>,
}

/// Declaration of an event the pack can emit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
}

/// One unit of work. Self-describing: completing it goes through its own
/// `actionResult` link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, rename = "command")]
    pub command_name: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// A fact posted either on its own or as the result of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub name: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}
