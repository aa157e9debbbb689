//! Direct ChatGPT backend-api transport primitives.
//!
//! This crate owns the fast request path only: session exchange,
//! sentinel requirements negotiation, the SHA3-512 proof-of-work solver,
//! and the streaming conversation client with its SSE snapshot parser.
//! It contains no browser automation and no orchestration policy.
//!
//! The wire contract mirrors what the ChatGPT web app sends from a real
//! browser: the same endpoints, headers, sentinel tokens, and
//! full-snapshot event stream.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod pow;
pub mod sentinel;
pub mod sse;
pub mod url;

pub use auth::Session;
pub use client::ApiClient;
pub use config::ApiConfig;
pub use error::ApiError;
pub use payload::ConversationPayload;
pub use sentinel::{ChallengeSpec, Requirements};
pub use sse::{MessageSnapshot, SnapshotAccumulator, SseStreamParser, StreamEvent};
