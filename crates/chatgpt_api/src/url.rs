/// Default origin for ChatGPT backend requests.
pub const DEFAULT_BASE_URL: &str = "https://chatgpt.com";

fn normalized_base(input: &str) -> &str {
    let base = input.trim();
    let base = if base.is_empty() { DEFAULT_BASE_URL } else { base };
    base.trim_end_matches('/')
}

/// Session-info endpoint (GET): exchanges cookies for a bearer token.
#[must_use]
pub fn auth_session_url(base: &str) -> String {
    format!("{}/api/auth/session", normalized_base(base))
}

/// Sentinel endpoint (POST, empty body): per-request permission slip.
#[must_use]
pub fn requirements_url(base: &str) -> String {
    format!(
        "{}/backend-api/sentinel/chat-requirements",
        normalized_base(base)
    )
}

/// Conversation endpoint (streaming POST).
#[must_use]
pub fn conversation_url(base: &str) -> String {
    format!("{}/backend-api/conversation", normalized_base(base))
}
