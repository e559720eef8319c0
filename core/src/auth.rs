//! Bearer-token authorization for outbound requests.

use std::fmt;

use crate::http::HttpRequest;

/// A JWT sent as `Authorization: Bearer <token>`.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Attach `Authorization: Bearer <token>` when a token is configured.
///
/// Without a token the request goes out unauthenticated and untouched. Any
/// authorization header already present is replaced so exactly one is sent.
pub fn authorize(mut request: HttpRequest, token: Option<&BearerToken>) -> HttpRequest {
    let Some(token) = token else {
        return request;
    };
    request
        .headers
        .retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
    request
        .headers
        .push(("authorization".to_string(), format!("Bearer {}", token.as_str())));
    request
}
