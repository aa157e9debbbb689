use serde::{Deserialize, Serialize};

/// Which transport produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Api,
    Ui,
}

impl TransportKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Ui => "ui",
        }
    }
}

/// Coarse token counts for one exchange.
///
/// Length-based heuristic, not a tokenizer: roughly four characters per
/// token, floored at one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub response: u64,
    pub total: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn estimate(prompt: &str, response: &str) -> Self {
        let prompt = (prompt.len() as u64 / 4).max(1);
        let response = (response.len() as u64 / 4).max(1);
        Self {
            prompt,
            response,
            total: prompt + response,
        }
    }
}

/// Terminal, normalized result of one successful exchange. Never mutated
/// after construction; failures travel as [`crate::RelayError`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReply {
    pub text: String,
    pub conversation_id: Option<String>,
    pub thinking_time_seconds: Option<u64>,
    pub total_time_seconds: u64,
    pub tokens: TokenUsage,
    pub transport: TransportKind,
    /// True when the stream or poll loop was cut short and `text` is the
    /// best partial answer observed. Partial answers are still successes.
    pub truncated: bool,
}
