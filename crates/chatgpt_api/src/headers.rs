use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use chat_transport::{cookie_header, Cookie};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::sentinel::Requirements;

pub const HEADER_COOKIE: &str = "cookie";
pub const HEADER_USER_AGENT: &str = "user-agent";
pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_ACCEPT_LANGUAGE: &str = "accept-language";
pub const HEADER_ORIGIN: &str = "origin";
pub const HEADER_REFERER: &str = "referer";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_SENTINEL_REQUIREMENTS: &str = "openai-sentinel-chat-requirements-token";
pub const HEADER_SENTINEL_PROOF: &str = "openai-sentinel-proof-token";

/// Headers common to every backend-api request: serialized cookies plus a
/// browser-shaped identity.
#[must_use]
pub fn base_headers(config: &ApiConfig, cookies: &[Cookie]) -> BTreeMap<String, String> {
    let origin = config.base_url.trim_end_matches('/').to_string();
    let mut headers = BTreeMap::new();
    headers.insert(HEADER_COOKIE.to_owned(), cookie_header(cookies));
    headers.insert(HEADER_USER_AGENT.to_owned(), config.user_agent.clone());
    headers.insert(HEADER_ACCEPT.to_owned(), "*/*".to_owned());
    headers.insert(
        HEADER_ACCEPT_LANGUAGE.to_owned(),
        "en-US,en;q=0.9".to_owned(),
    );
    headers.insert(HEADER_REFERER.to_owned(), format!("{origin}/"));
    headers.insert(HEADER_ORIGIN.to_owned(), origin);
    headers
}

/// Base headers plus bearer authorization and JSON content type, for the
/// sentinel and conversation POSTs.
#[must_use]
pub fn authorized_headers(
    config: &ApiConfig,
    cookies: &[Cookie],
    access_token: &str,
) -> BTreeMap<String, String> {
    let mut headers = base_headers(config, cookies);
    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {}", access_token.trim()),
    );
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );
    headers
}

/// Conversation-call headers: authorized headers, an event-stream accept,
/// and the sentinel tokens when present.
#[must_use]
pub fn conversation_headers(
    config: &ApiConfig,
    cookies: &[Cookie],
    access_token: &str,
    requirements: Option<&Requirements>,
) -> BTreeMap<String, String> {
    let mut headers = authorized_headers(config, cookies, access_token);
    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    if let Some(requirements) = requirements {
        headers.insert(
            HEADER_SENTINEL_REQUIREMENTS.to_owned(),
            requirements.token.clone(),
        );
        if let Some(proof) = &requirements.proof_token {
            headers.insert(HEADER_SENTINEL_PROOF.to_owned(), proof.clone());
        }
    }
    headers
}

/// Convert the deterministic map into reqwest's header type.
pub fn into_header_map(headers: BTreeMap<String, String>) -> Result<HeaderMap, ApiError> {
    let mut out = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ApiError::Connection(format!("invalid header key: {key}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|_| ApiError::Connection(format!("invalid header value for {key}")))?;
        out.insert(name, value);
    }
    Ok(out)
}
