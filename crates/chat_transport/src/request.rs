use std::path::PathBuf;

/// Transport selection policy for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Prefer the direct API transport, fall back to the browser once on
    /// failure or ineligibility.
    #[default]
    Auto,
    /// Direct API transport only; failures are surfaced verbatim.
    Api,
    /// Browser automation transport only.
    Ui,
}

impl Mode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Api => "api",
            Self::Ui => "ui",
        }
    }
}

/// One conversation exchange: the prompt plus every per-request option
/// either transport may need.
///
/// `conversation_id` continues a thread by raw identifier and stays
/// eligible for the API transport. `continue_chat` continues by sidebar
/// title or index, which only the browser can resolve.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationRequest {
    pub prompt: String,
    /// Model key as presented to users (e.g. "auto", "thinking", "pro").
    pub model: String,
    pub conversation_id: Option<String>,
    pub parent_message_id: Option<String>,
    pub attachments: Vec<PathBuf>,
    pub continue_chat: Option<String>,
    pub project: Option<String>,
    pub temp_chat: bool,
    pub web_search: Option<bool>,
    pub show_browser: bool,
    pub screenshot: Option<PathBuf>,
    pub new_chat: bool,
}

impl ConversationRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<PathBuf>) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn with_continue_chat(mut self, reference: impl Into<String>) -> Self {
        self.continue_chat = Some(reference.into());
        self
    }

    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    #[must_use]
    pub fn with_temp_chat(mut self) -> Self {
        self.temp_chat = true;
        self
    }

    #[must_use]
    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_show_browser(mut self) -> Self {
        self.show_browser = true;
        self
    }

    #[must_use]
    pub fn with_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot = Some(path.into());
        self
    }

    /// Returns true when the request needs a capability only the browser
    /// automation transport provides.
    #[must_use]
    pub fn requires_ui(&self) -> bool {
        !self.attachments.is_empty()
            || self.continue_chat.is_some()
            || self.project.is_some()
            || self.temp_chat
            || self.web_search.is_some()
            || self.show_browser
            || self.screenshot.is_some()
    }
}
