//! Transport-agnostic contract for one ChatGPT conversation exchange.
//!
//! This crate intentionally defines only the shared data model (cookies,
//! request options, normalized replies, the error taxonomy) and the
//! black-box collaborator traits implemented outside the core (browser
//! automation primitives, cookie extraction). It excludes transport
//! details: no HTTP, no DOM scripts, no challenge solving.

pub mod cookie;
pub mod driver;
pub mod error;
pub mod request;
pub mod result;

pub use cookie::{cookie_header, Cookie};
pub use driver::{CookieSource, DriverError, UiDriver};
pub use error::{ErrorKind, RelayError};
pub use request::{ConversationRequest, Mode};
pub use result::{ConversationReply, TokenUsage, TransportKind};
