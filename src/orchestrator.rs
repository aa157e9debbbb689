//! Transport selection and fallback policy.
//!
//! The orchestrator owns the only retry-shaped decision in the relay: in
//! auto mode an eligible request tries the fast API transport first, and
//! any fast-path failure falls back to the browser exactly once. Forced
//! modes never fall back; a forced-API request that needs browser-only
//! capabilities is rejected before any network activity.

use std::time::Duration;

use chat_transport::{
    ConversationReply, ConversationRequest, Cookie, CookieSource, ErrorKind, Mode, RelayError,
    UiDriver,
};
use chatgpt_api::ApiClient;
use chatgpt_ui::UiFlow;

use crate::config::RelayConfig;

/// Seam over the fast-path chain so the policy is testable without HTTP.
pub trait FastTransport {
    fn send(
        &self,
        cookies: &[Cookie],
        request: &ConversationRequest,
        model_slug: &str,
        timeout: Duration,
    ) -> Result<ConversationReply, RelayError>;
}

/// Production fast transport: the full authenticate / negotiate / solve /
/// converse chain, run to completion on a private current-thread runtime
/// so the orchestrator surface stays synchronous.
#[derive(Debug)]
pub struct ApiFastTransport {
    client: ApiClient,
}

impl ApiFastTransport {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = ApiClient::new(config.api_config()).map_err(RelayError::from)?;
        Ok(Self { client })
    }
}

impl FastTransport for ApiFastTransport {
    fn send(
        &self,
        cookies: &[Cookie],
        request: &ConversationRequest,
        model_slug: &str,
        timeout: Duration,
    ) -> Result<ConversationReply, RelayError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                RelayError::new(
                    ErrorKind::Config,
                    format!("failed to initialize async runtime: {error}"),
                )
            })?;

        runtime
            .block_on(self.client.send_prompt(cookies, request, model_slug, timeout))
            .map_err(RelayError::from)
    }
}

/// One relay instance: configuration plus the seamed fast transport.
pub struct Orchestrator<F: FastTransport = ApiFastTransport> {
    config: RelayConfig,
    fast: F,
}

impl Orchestrator<ApiFastTransport> {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let fast = ApiFastTransport::new(&config)?;
        Ok(Self { config, fast })
    }
}

impl<F: FastTransport> Orchestrator<F> {
    /// Construct with an explicit fast transport (test seam).
    #[must_use]
    pub fn with_fast_transport(config: RelayConfig, fast: F) -> Self {
        Self { config, fast }
    }

    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    #[must_use]
    pub fn fast_transport(&self) -> &F {
        &self.fast
    }

    /// Pull session cookies for the configured domains. An empty result
    /// is a credential failure: nothing downstream can authenticate.
    pub fn extract_cookies(&self, source: &dyn CookieSource) -> Result<Vec<Cookie>, RelayError> {
        let cookies = source
            .extract_cookies(&self.config.cookie_domains)
            .map_err(|error| {
                RelayError::new(
                    ErrorKind::AuthExpired,
                    format!("cookie extraction failed: {error}"),
                )
            })?;
        if cookies.is_empty() {
            return Err(RelayError::new(
                ErrorKind::AuthExpired,
                "no session cookies found for the configured domains",
            ));
        }
        log::debug!("orchestrator: extracted {} cookies", cookies.len());
        Ok(cookies)
    }

    /// Route one exchange per the mode policy. The driver is only touched
    /// when the browser transport actually runs.
    pub fn run(
        &self,
        driver: &mut dyn UiDriver,
        cookies: &[Cookie],
        request: &ConversationRequest,
        mode: Mode,
    ) -> Result<ConversationReply, RelayError> {
        let timeout = self.config.timeout_for(&request.model);

        match mode {
            Mode::Api => {
                if request.requires_ui() {
                    return Err(RelayError::config(
                        "request needs browser-only capabilities but transport is forced to api",
                    ));
                }
                self.fast_attempt(cookies, request, timeout)
            }
            Mode::Ui => self.ui_attempt(driver, cookies, request, timeout),
            Mode::Auto => {
                if !request.requires_ui() {
                    match self.fast_attempt(cookies, request, timeout) {
                        Ok(reply) => return Ok(reply),
                        Err(error) => {
                            log::warn!(
                                "api transport failed ({error}); falling back to browser"
                            );
                        }
                    }
                }
                self.ui_attempt(driver, cookies, request, timeout)
            }
        }
    }

    fn fast_attempt(
        &self,
        cookies: &[Cookie],
        request: &ConversationRequest,
        timeout: Duration,
    ) -> Result<ConversationReply, RelayError> {
        let slug = self.config.resolve_slug(&request.model);
        log::debug!("orchestrator: api transport, model slug '{slug}'");
        self.fast.send(cookies, request, slug, timeout)
    }

    fn ui_attempt(
        &self,
        driver: &mut dyn UiDriver,
        cookies: &[Cookie],
        request: &ConversationRequest,
        timeout: Duration,
    ) -> Result<ConversationReply, RelayError> {
        log::debug!("orchestrator: browser transport, model '{}'", request.model);
        UiFlow::new(self.config.ui_config()).run(driver, cookies, request, timeout)
    }
}
