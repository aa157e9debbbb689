//! End-to-end browser conversation flow.
//!
//! Drives a [`UiDriver`] through the whole exchange: cookie injection,
//! navigation, per-request page setup (model, temporary chat, web search,
//! attachments), prompt input, send, and the convergence poll loop. Page
//! setup steps degrade gracefully when their controls cannot be found;
//! only auth, input, and send failures abort the flow.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::Value;

use chat_transport::{
    ConversationReply, ConversationRequest, Cookie, ErrorKind, RelayError, TokenUsage,
    TransportKind, UiDriver,
};

use crate::convergence::{strip_chrome, ConvergenceDetector, Tick, DEFAULT_STABILITY_THRESHOLD};
use crate::probe::{self, point_from, run_probes, Probe};

/// Timing and threshold knobs for the flow. The per-request deadline is
/// passed to [`UiFlow::run`] instead, since it varies by model.
#[derive(Debug, Clone)]
pub struct UiFlowConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub stability_threshold: u32,
    /// Hard ceiling on poll iterations, independent of the deadline.
    pub max_ticks: u32,
}

impl Default for UiFlowConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chatgpt.com".to_string(),
            poll_interval: Duration::from_secs(1),
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
            max_ticks: 10_000,
        }
    }
}

impl UiFlowConfig {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_stability_threshold(mut self, threshold: u32) -> Self {
        self.stability_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }
}

/// Dropdown target for a model key. Legacy models sit behind a submenu.
struct ModelTarget {
    testid: &'static str,
    legacy: bool,
}

fn model_target(key: &str) -> Option<ModelTarget> {
    let (testid, legacy) = match key {
        "auto" => ("model-switcher-gpt-5-2", false),
        "instant" => ("model-switcher-gpt-5-2-instant", false),
        "thinking" => ("model-switcher-gpt-5-2-thinking", false),
        "pro" => ("model-switcher-gpt-5-2-pro", false),
        "o3" => ("model-switcher-o3", true),
        "gpt-4.5" => ("model-switcher-gpt-4-5", true),
        "gpt-5.1-instant" => ("model-switcher-gpt-5-1-instant", true),
        "gpt-5.1-thinking" => ("model-switcher-gpt-5-1-thinking", true),
        "gpt-5.1-pro" => ("model-switcher-gpt-5-1-pro", true),
        "gpt-5-mini" => ("model-switcher-gpt-5-t-mini", true),
        "gpt-5-pro" => ("model-switcher-gpt-5-pro", true),
        _ => return None,
    };
    Some(ModelTarget { testid, legacy })
}

const LEGACY_SUBMENU_TESTID: &str = "Legacy models-submenu";

fn chat_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9-]{20,}$").unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

fn chat_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/c/([a-zA-Z0-9-]+)").unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

/// One browser conversation exchange over an injected driver.
#[derive(Debug, Default)]
pub struct UiFlow {
    config: UiFlowConfig,
}

impl UiFlow {
    #[must_use]
    pub fn new(config: UiFlowConfig) -> Self {
        Self { config }
    }

    /// Run the full exchange. `timeout` bounds the response wait only;
    /// setup steps are bounded by the driver's own call behavior.
    pub fn run(
        &self,
        driver: &mut dyn UiDriver,
        cookies: &[Cookie],
        request: &ConversationRequest,
        timeout: Duration,
    ) -> Result<ConversationReply, RelayError> {
        let outcome = self.drive(driver, cookies, request, timeout);
        if let Some(path) = &request.screenshot {
            if let Err(error) = driver.screenshot(path) {
                log::warn!("screenshot: {error}");
            }
        }
        outcome
    }

    fn drive(
        &self,
        driver: &mut dyn UiDriver,
        cookies: &[Cookie],
        request: &ConversationRequest,
        timeout: Duration,
    ) -> Result<ConversationReply, RelayError> {
        let started = Instant::now();

        // First navigation sets the cookie domain; second applies them.
        driver
            .navigate(&self.config.base_url)
            .map_err(driver_error)?;
        driver.sleep(Duration::from_secs(1));
        let injected = inject_cookies(driver, cookies);
        log::debug!("flow: injected {injected}/{} cookies", cookies.len());
        driver
            .navigate(&self.config.base_url)
            .map_err(driver_error)?;
        driver.sleep(Duration::from_secs(3));

        check_auth(driver)?;
        dismiss_modals(driver);

        if let Some(reference) = &request.continue_chat {
            let chat_id = resolve_chat_reference(driver, reference)?;
            log::debug!("flow: continuing chat {chat_id}");
            self.navigate_to(driver, &format!("{}/c/{chat_id}", self.config.base_url), 4)?;
        } else if let Some(chat_id) = &request.conversation_id {
            self.navigate_to(driver, &format!("{}/c/{chat_id}", self.config.base_url), 4)?;
        } else if let Some(project) = &request.project {
            let url = resolve_project(driver, project, &self.config.base_url)?;
            log::debug!("flow: entering project at {url}");
            self.navigate_to(driver, &url, 4)?;
        } else if request.new_chat {
            self.navigate_to(driver, &self.config.base_url, 3)?;
        }

        // Model switching only applies to fresh threads.
        let fresh_thread = request.continue_chat.is_none()
            && request.conversation_id.is_none()
            && request.project.is_none();
        if fresh_thread && request.model != "auto" {
            if !select_model(driver, &request.model) {
                log::warn!("flow: model selection failed, continuing with default");
            }
        }

        if request.temp_chat {
            toggle_temp_chat(driver);
        }
        if let Some(enable) = request.web_search {
            set_web_search(driver, enable);
        }

        if !request.attachments.is_empty() {
            for path in &request.attachments {
                if !path.exists() {
                    return Err(RelayError::config(format!(
                        "attachment not found: {}",
                        path.display()
                    )));
                }
            }
            let paths: Vec<&std::path::Path> =
                request.attachments.iter().map(|path| path.as_path()).collect();
            driver.attach_files(&paths).map_err(driver_error)?;
            log::debug!("flow: attached {} file(s)", paths.len());
        }

        self.input_prompt(driver, &request.prompt)?;
        self.send(driver)?;

        let (text, thinking_seconds, truncated) = self.poll(driver, timeout)?;

        let conversation_id = current_chat_id(driver).or_else(|| request.conversation_id.clone());
        let tokens = TokenUsage::estimate(&request.prompt, &text);
        Ok(ConversationReply {
            text,
            conversation_id,
            thinking_time_seconds: thinking_seconds.filter(|seconds| *seconds > 0),
            total_time_seconds: started.elapsed().as_secs(),
            tokens,
            transport: TransportKind::Ui,
            truncated,
        })
    }

    fn navigate_to(
        &self,
        driver: &mut dyn UiDriver,
        url: &str,
        settle_seconds: u64,
    ) -> Result<(), RelayError> {
        driver.navigate(url).map_err(driver_error)?;
        driver.sleep(Duration::from_secs(settle_seconds));
        Ok(())
    }

    fn input_prompt(&self, driver: &mut dyn UiDriver, prompt: &str) -> Result<(), RelayError> {
        let hit = run_probes(driver, &probe::input_probes()).ok_or_else(|| {
            RelayError::new(ErrorKind::UpstreamError, "could not find composer input field")
        })?;
        let (x, y) = point_from(&hit).ok_or_else(|| {
            RelayError::new(ErrorKind::UpstreamError, "input probe returned no coordinates")
        })?;
        driver.click(x, y).map_err(driver_error)?;
        driver.sleep(Duration::from_millis(300));
        driver.type_text(prompt).map_err(driver_error)?;
        driver.sleep(Duration::from_millis(500));
        Ok(())
    }

    fn send(&self, driver: &mut dyn UiDriver) -> Result<(), RelayError> {
        if let Some(hit) = run_probes(driver, &probe::send_probes()) {
            if let Some((x, y)) = point_from(&hit) {
                driver.click(x, y).map_err(driver_error)?;
                return Ok(());
            }
        }
        // Enter in the focused composer submits as well.
        driver.type_text("\n").map_err(driver_error)
    }

    /// Convergence poll loop: bounded by the deadline and a hard tick
    /// ceiling. A deadline hit with partial text is a truncated success.
    fn poll(
        &self,
        driver: &mut dyn UiDriver,
        timeout: Duration,
    ) -> Result<(String, Option<u64>, bool), RelayError> {
        let started = Instant::now();
        let mut detector = ConvergenceDetector::new(self.config.stability_threshold);
        let mut ticks = 0u32;

        while started.elapsed() < timeout && ticks < self.config.max_ticks {
            ticks += 1;

            let page_text = string_result(driver, &probe::page_text_probe());
            let generating = bool_result(driver, &probe::generating_probe());
            let response = run_probes(driver, &probe::response_text_probes())
                .and_then(|value| value.as_str().map(ToString::to_string))
                .map(|text| strip_chrome(&text))
                .unwrap_or_default();

            match detector.tick(&page_text, &response, generating) {
                Tick::Done {
                    text,
                    thinking_seconds,
                } => return Ok((text, thinking_seconds, false)),
                Tick::RateLimited => {
                    return Err(RelayError::new(
                        ErrorKind::RateLimited,
                        "rate limit reached, wait before trying again",
                    ))
                }
                Tick::UpstreamError => {
                    return Err(RelayError::new(
                        ErrorKind::UpstreamError,
                        "page reported an error, try again",
                    ))
                }
                Tick::Continue => driver.sleep(self.config.poll_interval),
            }
        }

        let best = detector.best_text();
        if best.is_empty() {
            return Err(RelayError::new(
                ErrorKind::Timeout,
                format!("no response within {}s", timeout.as_secs()),
            ));
        }
        log::warn!("flow: deadline hit with partial text; returning truncated reply");
        Ok((best.to_string(), detector.thinking_seconds(), true))
    }
}

fn driver_error(error: chat_transport::DriverError) -> RelayError {
    RelayError::new(ErrorKind::ConnectionFailure, error.to_string())
}

fn string_result(driver: &mut dyn UiDriver, probe: &Probe) -> String {
    driver
        .evaluate(&probe.script)
        .ok()
        .and_then(|value| value.as_str().map(ToString::to_string))
        .unwrap_or_default()
}

fn bool_result(driver: &mut dyn UiDriver, probe: &Probe) -> bool {
    driver
        .evaluate(&probe.script)
        .ok()
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

/// Set each cookie through the page, returning the injected count.
/// Malformed entries are skipped, never fatal.
fn inject_cookies(driver: &mut dyn UiDriver, cookies: &[Cookie]) -> usize {
    let mut injected = 0;
    for cookie in cookies {
        if cookie.name.is_empty() || cookie.value.is_empty() {
            continue;
        }
        if driver.evaluate(&cookie_script(cookie)).is_ok() {
            injected += 1;
        }
    }
    injected
}

fn cookie_script(cookie: &Cookie) -> String {
    let mut parts = vec![format!("{}={}", cookie.name, cookie.value)];
    // __Host- cookies must not carry a domain attribute.
    if cookie.name.starts_with("__Host-") {
        parts.push("path=/".to_string());
        parts.push("secure".to_string());
    } else {
        let path = if cookie.path.is_empty() {
            "/"
        } else {
            &cookie.path
        };
        parts.push(format!("path={path}"));
        if !cookie.domain.is_empty() {
            parts.push(format!("domain={}", cookie.domain));
        }
        if cookie.secure {
            parts.push("secure".to_string());
        }
    }
    let literal = Value::String(parts.join("; ")).to_string();
    format!("(() => {{ document.cookie = {literal}; return true; }})()")
}

fn login_button_probe() -> Probe {
    Probe::raw(
        "login-button",
        r#"(() => {
    const buttons = document.querySelectorAll('button, a');
    for (const btn of buttons) {
        const text = (btn.innerText || btn.textContent || '').trim().toLowerCase();
        if (text === 'log in' || text === 'sign up' || text === 'login'
            || text.includes('continue with google')
            || text.includes('continue with apple')
            || text.includes('continue with microsoft')) {
            const rect = btn.getBoundingClientRect();
            if (rect.width > 50 && rect.height > 30) return true;
        }
    }
    return false;
})()"#,
    )
}

fn check_auth(driver: &mut dyn UiDriver) -> Result<(), RelayError> {
    let url = string_result(driver, &probe::location_probe());
    if url.contains("/auth/login") {
        return Err(RelayError::new(
            ErrorKind::AuthExpired,
            "redirected to login page",
        ));
    }

    let page_text = string_result(driver, &probe::page_text_probe()).to_lowercase();
    if page_text.contains("verify you are human") || page_text.contains("cloudflare") {
        return Err(RelayError::new(
            ErrorKind::AuthExpired,
            "challenge page detected, a visible browser session may be required",
        ));
    }
    if page_text.contains("welcome back") {
        return Err(RelayError::new(
            ErrorKind::AuthExpired,
            "login modal detected, cookie injection may have failed",
        ));
    }
    if bool_result(driver, &login_button_probe()) {
        return Err(RelayError::new(
            ErrorKind::AuthExpired,
            "not logged in, no valid session cookies",
        ));
    }
    Ok(())
}

/// Escape closes onboarding and changelog dialogs.
fn dismiss_modals(driver: &mut dyn UiDriver) {
    let script = r#"(() => {
    document.dispatchEvent(new KeyboardEvent('keydown', {
        key: 'Escape', code: 'Escape', keyCode: 27, bubbles: true
    }));
    return true;
})()"#;
    if let Err(error) = driver.evaluate(script) {
        log::debug!("flow: modal dismissal failed: {error}");
    }
    driver.sleep(Duration::from_millis(500));
}

/// Resolve a continue-chat reference (raw id, `idx-N`, or title
/// substring) to a conversation id via the sidebar.
fn resolve_chat_reference(
    driver: &mut dyn UiDriver,
    reference: &str,
) -> Result<String, RelayError> {
    if chat_id_pattern().is_match(reference) {
        return Ok(reference.to_string());
    }

    driver.sleep(Duration::from_secs(2));
    let links = driver
        .evaluate(&probe::sidebar_chats_probe().script)
        .unwrap_or(Value::Null);
    let links = links.as_array().cloned().unwrap_or_default();

    if let Some(index) = reference
        .strip_prefix("idx-")
        .and_then(|raw| raw.parse::<usize>().ok())
    {
        return links
            .get(index)
            .and_then(|link| link.get("id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| {
                RelayError::config(format!(
                    "chat index {index} out of range ({} chats found)",
                    links.len()
                ))
            });
    }

    let wanted = reference.to_lowercase();
    links
        .iter()
        .find(|link| {
            link.get("title")
                .and_then(Value::as_str)
                .is_some_and(|title| title.to_lowercase().contains(&wanted))
        })
        .and_then(|link| link.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| RelayError::config(format!("chat '{reference}' not found in sidebar")))
}

/// Resolve a project name or id to its full URL via the sidebar.
fn resolve_project(
    driver: &mut dyn UiDriver,
    project: &str,
    base_url: &str,
) -> Result<String, RelayError> {
    driver.sleep(Duration::from_secs(2));
    let links = driver
        .evaluate(&probe::project_links_probe().script)
        .unwrap_or(Value::Null);
    let links = links.as_array().cloned().unwrap_or_default();
    if links.is_empty() {
        return Err(RelayError::config("no projects found in sidebar"));
    }

    let wanted = project.to_lowercase();
    links
        .iter()
        .find(|link| {
            let name_match = link
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.to_lowercase().contains(&wanted));
            let id_match = link
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| id == project);
            name_match || id_match
        })
        .and_then(|link| link.get("url"))
        .and_then(Value::as_str)
        .map(|url| format!("{base_url}{url}"))
        .ok_or_else(|| RelayError::config(format!("project '{project}' not found")))
}

/// Switch the model through the dropdown. Failures leave the default
/// selected and are reported to the caller as `false`.
fn select_model(driver: &mut dyn UiDriver, model: &str) -> bool {
    let Some(target) = model_target(model) else {
        log::warn!("flow: unknown model key '{model}'");
        return false;
    };

    let dropdown = Probe::center(
        "model-dropdown",
        r#"[data-testid="model-switcher-dropdown-button"]"#,
    );
    let Some((x, y)) = run_probes(driver, &[dropdown]).as_ref().and_then(point_from) else {
        return false;
    };
    if driver.click(x, y).is_err() {
        return false;
    }
    driver.sleep(Duration::from_millis(1500));

    if target.legacy {
        let submenu = Probe::center(
            "legacy-submenu",
            &format!(r#"[data-testid="{LEGACY_SUBMENU_TESTID}"]"#),
        );
        let Some((x, y)) = run_probes(driver, &[submenu]).as_ref().and_then(point_from) else {
            return false;
        };
        if driver.click(x, y).is_err() {
            return false;
        }
        driver.sleep(Duration::from_secs(1));
    }

    let item = Probe::center(
        "model-item",
        &format!(r#"[data-testid="{}"]"#, target.testid),
    );
    let Some((x, y)) = run_probes(driver, &[item]).as_ref().and_then(point_from) else {
        return false;
    };
    if driver.click(x, y).is_err() {
        return false;
    }
    driver.sleep(Duration::from_secs(1));
    log::debug!("flow: selected model '{model}'");
    true
}

fn toggle_temp_chat(driver: &mut dyn UiDriver) {
    match run_probes(driver, &probe::temp_chat_probes())
        .as_ref()
        .and_then(point_from)
    {
        Some((x, y)) => {
            if driver.click(x, y).is_ok() {
                driver.sleep(Duration::from_millis(500));
                log::debug!("flow: temporary chat enabled");
            }
        }
        None => log::warn!("flow: temporary chat toggle not found, skipping"),
    }
}

fn set_web_search(driver: &mut dyn UiDriver, enable: bool) {
    let Some(hit) = run_probes(driver, &probe::web_search_probes()) else {
        log::warn!("flow: web search toggle not found, skipping");
        return;
    };
    let currently_enabled = hit
        .get("enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if currently_enabled == enable {
        return;
    }
    if let Some((x, y)) = point_from(&hit) {
        if driver.click(x, y).is_ok() {
            driver.sleep(Duration::from_millis(500));
            log::debug!("flow: web search set to {enable}");
        }
    }
}

/// Conversation id from the current URL, once the thread exists.
fn current_chat_id(driver: &mut dyn UiDriver) -> Option<String> {
    let url = string_result(driver, &probe::location_probe());
    chat_url_pattern()
        .captures(&url)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}
