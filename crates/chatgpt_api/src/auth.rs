use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// Bearer credential and account metadata from the session exchange.
///
/// Sessions have no independent renewal: when the token expires the
/// backend answers 401 and the caller must re-derive cookies externally.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub expires_at: Option<String>,
    pub account_info: Value,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    expires: Option<String>,
    #[serde(default)]
    user: Value,
}

/// Parse a 200 session-info body. A missing or empty access token means
/// the cookies are stale, not that the server failed.
pub fn session_from_body(body: &str) -> Result<Session, ApiError> {
    let parsed = serde_json::from_str::<SessionBody>(body)?;
    let access_token = parsed
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or(ApiError::MissingAccessToken)?;

    Ok(Session {
        access_token,
        expires_at: parsed.expires,
        account_info: parsed.user,
    })
}
