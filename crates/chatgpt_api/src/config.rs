use std::time::Duration;

use crate::url::DEFAULT_BASE_URL;

/// User-Agent matching a real Chrome build. The backend fingerprints
/// clients; a non-browser agent string gets blocked before auth.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/131.0.0.0 Safari/537.36";

/// Upper bound on the proof-of-work candidate search.
pub const DEFAULT_POW_MAX_ITERATIONS: u32 = 500_000;

/// Transport configuration for backend-api requests.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Origin for all endpoints.
    pub base_url: String,
    /// Browser-identifying `User-Agent`, also folded into the
    /// proof-of-work fingerprint.
    pub user_agent: String,
    /// Timeout for the non-streaming calls (auth, sentinel) and for
    /// connection establishment on the streaming call.
    pub request_timeout: Duration,
    /// Proof-of-work iteration ceiling.
    pub pow_max_iterations: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            pow_max_iterations: DEFAULT_POW_MAX_ITERATIONS,
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_pow_max_iterations(mut self, ceiling: u32) -> Self {
        self.pow_max_iterations = ceiling;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ApiConfig;

    #[test]
    fn builders_override_defaults() {
        let config = ApiConfig::new()
            .with_base_url("https://example.test")
            .with_request_timeout(Duration::from_secs(5))
            .with_pow_max_iterations(1_000);

        assert_eq!(config.base_url, "https://example.test");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.pow_max_iterations, 1_000);
        assert!(config.user_agent.contains("Chrome"));
    }
}
