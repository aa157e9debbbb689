//! Browser-automation transport for the relay.
//!
//! This crate never touches a browser directly: it drives the
//! [`chat_transport::UiDriver`] collaborator with small page scripts and
//! decides, from the observed page text, when a response has converged.
//! Every driver call may legitimately return null or empty data; the flow
//! tolerates that and keeps polling.

pub mod convergence;
pub mod flow;
pub mod probe;

pub use convergence::{ConvergenceDetector, Tick};
pub use flow::{UiFlow, UiFlowConfig};
pub use probe::Probe;
