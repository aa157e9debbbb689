//! Injected relay configuration.
//!
//! One immutable object carries every tunable both transports need: the
//! endpoint base, the browser identity, the model tables, and the polling
//! knobs. Model keys are the user-facing names ("auto", "thinking", ...);
//! the backend slug table translates them for the API transport, and
//! unknown keys pass through unchanged so new models work without a
//! release.

use std::collections::BTreeMap;
use std::time::Duration;

use chatgpt_api::config::{BROWSER_USER_AGENT, DEFAULT_POW_MAX_ITERATIONS};
use chatgpt_api::url::DEFAULT_BASE_URL;
use chatgpt_api::ApiConfig;
use chatgpt_ui::UiFlowConfig;

pub const DEFAULT_MODEL: &str = "auto";

/// Fallback response deadline when a model has no preset.
const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 300;

fn default_model_slugs() -> BTreeMap<String, String> {
    [
        ("auto", "auto"),
        ("instant", "gpt-5.2-instant"),
        ("thinking", "gpt-5.2"),
        ("pro", "gpt-5.2-pro"),
        ("o3", "o3"),
        ("gpt-4.5", "gpt-4.5"),
        ("gpt-5.1-instant", "gpt-5.1-instant"),
        ("gpt-5.1-thinking", "gpt-5.1"),
        ("gpt-5.1-pro", "gpt-5.1-pro"),
        ("gpt-5-mini", "gpt-5-t-mini"),
        ("gpt-5-pro", "gpt-5-pro"),
    ]
    .into_iter()
    .map(|(key, slug)| (key.to_string(), slug.to_string()))
    .collect()
}

fn default_model_timeouts() -> BTreeMap<String, u64> {
    [
        ("auto", 120),
        ("instant", 60),
        ("thinking", 300),
        ("pro", 1800),
        ("o3", 600),
        ("gpt-4.5", 120),
        ("gpt-5.1-instant", 60),
        ("gpt-5.1-thinking", 300),
        ("gpt-5.1-pro", 1800),
        ("gpt-5-mini", 300),
        ("gpt-5-pro", 1800),
    ]
    .into_iter()
    .map(|(key, seconds)| (key.to_string(), seconds))
    .collect()
}

fn default_cookie_domains() -> Vec<String> {
    [
        "chatgpt.com",
        ".chatgpt.com",
        "auth0.openai.com",
        ".auth0.openai.com",
        "openai.com",
        ".openai.com",
    ]
    .into_iter()
    .map(ToString::to_string)
    .collect()
}

/// Relay-wide configuration, immutable after construction.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Per-HTTP-call timeout on the fast path.
    pub request_timeout: Duration,
    /// Response deadline for models without a preset.
    pub default_timeout: Duration,
    pub poll_interval: Duration,
    pub stability_threshold: u32,
    pub pow_max_iterations: u32,
    /// Domains whose cookies authenticate the session.
    pub cookie_domains: Vec<String>,
    model_slugs: BTreeMap<String, String>,
    model_timeouts: BTreeMap<String, u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            default_timeout: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(1),
            stability_threshold: 3,
            pow_max_iterations: DEFAULT_POW_MAX_ITERATIONS,
            cookie_domains: default_cookie_domains(),
            model_slugs: default_model_slugs(),
            model_timeouts: default_model_timeouts(),
        }
    }
}

impl RelayConfig {
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
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_stability_threshold(mut self, threshold: u32) -> Self {
        self.stability_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_pow_max_iterations(mut self, ceiling: u32) -> Self {
        self.pow_max_iterations = ceiling;
        self
    }

    #[must_use]
    pub fn with_cookie_domains(mut self, domains: Vec<String>) -> Self {
        self.cookie_domains = domains;
        self
    }

    #[must_use]
    pub fn with_model_slug(mut self, key: impl Into<String>, slug: impl Into<String>) -> Self {
        self.model_slugs.insert(key.into(), slug.into());
        self
    }

    #[must_use]
    pub fn with_model_timeout(mut self, key: impl Into<String>, timeout: Duration) -> Self {
        self.model_timeouts.insert(key.into(), timeout.as_secs());
        self
    }

    /// Backend slug for a model key; unknown keys pass through as-is.
    #[must_use]
    pub fn resolve_slug<'a>(&'a self, key: &'a str) -> &'a str {
        self.model_slugs.get(key).map_or(key, String::as_str)
    }

    /// Response deadline for a model key.
    #[must_use]
    pub fn timeout_for(&self, key: &str) -> Duration {
        self.model_timeouts
            .get(key)
            .map_or(self.default_timeout, |seconds| {
                Duration::from_secs(*seconds)
            })
    }

    #[must_use]
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::default()
            .with_base_url(self.base_url.clone())
            .with_user_agent(self.user_agent.clone())
            .with_request_timeout(self.request_timeout)
            .with_pow_max_iterations(self.pow_max_iterations)
    }

    #[must_use]
    pub fn ui_config(&self) -> UiFlowConfig {
        UiFlowConfig::default()
            .with_base_url(self.base_url.clone())
            .with_poll_interval(self.poll_interval)
            .with_stability_threshold(self.stability_threshold)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{RelayConfig, DEFAULT_MODEL};

    #[test]
    fn defaults_cover_the_documented_surface() {
        let config = RelayConfig::default();
        assert_eq!(config.base_url, "https://chatgpt.com");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.stability_threshold, 3);
        assert_eq!(config.pow_max_iterations, 500_000);
        assert!(config
            .cookie_domains
            .iter()
            .any(|domain| domain == ".chatgpt.com"));
    }

    #[test]
    fn known_model_keys_resolve_to_backend_slugs() {
        let config = RelayConfig::default();
        assert_eq!(config.resolve_slug(DEFAULT_MODEL), "auto");
        assert_eq!(config.resolve_slug("thinking"), "gpt-5.2");
        assert_eq!(config.resolve_slug("gpt-5-mini"), "gpt-5-t-mini");
    }

    #[test]
    fn unknown_model_keys_pass_through() {
        let config = RelayConfig::default();
        assert_eq!(config.resolve_slug("gpt-7-preview"), "gpt-7-preview");
        assert_eq!(config.timeout_for("gpt-7-preview"), config.default_timeout);
    }

    #[test]
    fn timeout_presets_scale_with_the_model() {
        let config = RelayConfig::default();
        assert_eq!(config.timeout_for("instant"), Duration::from_secs(60));
        assert_eq!(config.timeout_for("pro"), Duration::from_secs(1800));
    }

    #[test]
    fn builders_override_defaults_and_tables() {
        let config = RelayConfig::default()
            .with_base_url("https://staging.chatgpt.com")
            .with_stability_threshold(5)
            .with_model_slug("next", "gpt-next")
            .with_model_timeout("next", Duration::from_secs(42));

        assert_eq!(config.resolve_slug("next"), "gpt-next");
        assert_eq!(config.timeout_for("next"), Duration::from_secs(42));
        assert_eq!(config.ui_config().stability_threshold, 5);
        assert_eq!(config.api_config().base_url, "https://staging.chatgpt.com");
    }
}
