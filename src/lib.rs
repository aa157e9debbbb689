//! Dual-transport ChatGPT relay.
//!
//! One conversation exchange goes out over whichever transport can carry
//! it: the direct backend-api path (session cookie exchange, sentinel
//! requirements, optional proof-of-work, streamed SSE response) when the
//! request is plain, or a driven browser session when it needs page-only
//! capabilities or the fast path fails. Both normalize into the same
//! [`ConversationReply`].
//!
//! ```no_run
//! use chatgpt_relay::{ConversationRequest, Mode, Orchestrator, RelayConfig};
//! # fn demo(driver: &mut dyn chatgpt_relay::UiDriver,
//! #         cookies: &[chatgpt_relay::Cookie]) -> Result<(), chatgpt_relay::RelayError> {
//! let orchestrator = Orchestrator::new(RelayConfig::default())?;
//! let request = ConversationRequest::new("2+2", "auto");
//! let reply = orchestrator.run(driver, cookies, &request, Mode::Auto)?;
//! println!("{} (via {:?})", reply.text, reply.transport);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod orchestrator;

pub use chat_transport::{
    cookie_header, ConversationReply, ConversationRequest, Cookie, CookieSource, DriverError,
    ErrorKind, Mode, RelayError, TokenUsage, TransportKind, UiDriver,
};
pub use config::RelayConfig;
pub use orchestrator::{ApiFastTransport, FastTransport, Orchestrator};
