//! Stateless request builders and response parsers for the pack protocol.
//!
//! # Design
//! Each exchange is split into a `build_*` function that produces an
//! `HttpRequest` and a `parse_*` function that consumes the `HttpResponse`.
//! Nothing here touches the network or holds state, so every status mapping
//! is testable with hand-written responses. Authorization is applied later,
//! at the single point where requests are handed to the transport.

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ClientError;
use crate::http::{HttpRequest, HttpResponse};
use crate::links::{find_link, rel, LinkTable, LinksDocument};
use crate::types::{Action, Event, Pack};

/// A registration accepted by the server, with the links the pack needs next.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredPack {
    pub pack: Pack,
    pub take_action_url: Url,
    pub events_url: Url,
}

pub fn build_fetch_links(base_url: &Url) -> HttpRequest {
    HttpRequest::get(base_url.as_str())
}

/// Any 2xx with a decodable, non-empty links document. Relative hrefs are
/// resolved against `base_url`.
pub fn parse_fetch_links(base_url: &Url, response: HttpResponse) -> Result<LinkTable, ClientError> {
    expect_success(base_url, &response)?;
    let document: LinksDocument = decode(&response.body)?;
    if document.links.is_empty() {
        return Err(ClientError::EmptyLinks {
            url: base_url.to_string(),
        });
    }
    document.resolve(base_url)
}

pub fn build_register_pack(url: &Url, pack: &Pack) -> Result<HttpRequest, ClientError> {
    Ok(HttpRequest::post_json(url.as_str(), encode(pack)?))
}

/// Exactly 201, and the echoed pack must carry both take-action and event links.
pub fn parse_register_pack(response: HttpResponse) -> Result<RegisteredPack, ClientError> {
    if response.status != 201 {
        return Err(ClientError::PackNotCreated {
            status: response.status,
            body: response.body,
        });
    }
    let pack: Pack = decode(&response.body)?;
    let take_action_url = find_link(&pack.links, rel::TAKE_ACTION)?.clone();
    let events_url = find_link(&pack.links, rel::EVENT)?.clone();
    Ok(RegisteredPack {
        pack,
        take_action_url,
        events_url,
    })
}

pub fn build_publish_event(events_url: &Url, event: &Event) -> Result<HttpRequest, ClientError> {
    Ok(HttpRequest::post_json(events_url.as_str(), encode(event)?))
}

pub fn parse_publish_event(events_url: &Url, response: HttpResponse) -> Result<(), ClientError> {
    expect_success(events_url, &response)
}

pub fn build_take_action(take_action_url: &Url) -> HttpRequest {
    HttpRequest::get(take_action_url.as_str())
}

/// `Ok(None)` for an empty 2xx body; 404 is `NotFound` carrying the URL.
pub fn parse_take_action(
    take_action_url: &Url,
    response: HttpResponse,
) -> Result<Option<Action>, ClientError> {
    if response.status == 404 {
        return Err(ClientError::NotFound {
            url: take_action_url.to_string(),
        });
    }
    expect_success(take_action_url, &response)?;
    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(None);
    }
    decode(&response.body).map(Some)
}

/// Target of the action's own `actionResult` link; the global table is not consulted.
pub fn action_result_url(action: &Action) -> Result<&Url, ClientError> {
    find_link(&action.links, rel::ACTION_RESULT)
}

pub fn build_complete_action(action: &Action, event: &Event) -> Result<HttpRequest, ClientError> {
    let url = action_result_url(action)?;
    Ok(HttpRequest::post_json(url.as_str(), encode(event)?))
}

pub fn parse_complete_action(result_url: &Url, response: HttpResponse) -> Result<(), ClientError> {
    expect_success(result_url, &response)
}

/// Map non-2xx status codes to `UnexpectedStatus`.
fn expect_success(url: &Url, response: &HttpResponse) -> Result<(), ClientError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ClientError::UnexpectedStatus {
        url: url.to_string(),
        status: response.status,
        body: response.body.clone(),
    })
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::Decode(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, ClientError> {
    serde_json::to_string(value).map_err(|e| ClientError::Encode(e.to_string()))
}
