use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use thiserror::Error;

use crate::cookie::Cookie;

/// Failure reported by an automation collaborator call.
///
/// The core treats collaborators as black boxes: a driver error aborts the
/// current step, but a successful call returning `null`/empty data must be
/// tolerated without crashing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("driver error: {message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Browser automation primitives supplied by an external collaborator.
///
/// Implementations own the underlying browser/profile; no two concurrent
/// sessions may share one profile directory. The core never assumes DOM
/// structure beyond what `evaluate` returns.
pub trait UiDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Evaluate a script in the page and return its JSON result. A missing
    /// result is `Value::Null`, not an error.
    fn evaluate(&mut self, script: &str) -> Result<Value, DriverError>;

    fn click(&mut self, x: f64, y: f64) -> Result<(), DriverError>;

    /// Type text into the currently focused element.
    fn type_text(&mut self, text: &str) -> Result<(), DriverError>;

    /// Attach files through the page's file chooser.
    fn attach_files(&mut self, paths: &[&Path]) -> Result<(), DriverError>;

    fn sleep(&mut self, duration: Duration);

    fn screenshot(&mut self, path: &Path) -> Result<(), DriverError>;
}

/// Credential collaborator: extracts cookies for the given domains from a
/// local browser profile.
pub trait CookieSource {
    fn extract_cookies(&self, domains: &[String]) -> Result<Vec<Cookie>, DriverError>;
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::{DriverError, UiDriver};

    struct NullDriver;

    impl UiDriver for NullDriver {
        fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
            Ok(())
        }

        fn evaluate(&mut self, _script: &str) -> Result<Value, DriverError> {
            Ok(Value::Null)
        }

        fn click(&mut self, _x: f64, _y: f64) -> Result<(), DriverError> {
            Ok(())
        }

        fn type_text(&mut self, _text: &str) -> Result<(), DriverError> {
            Ok(())
        }

        fn attach_files(&mut self, _paths: &[&Path]) -> Result<(), DriverError> {
            Ok(())
        }

        fn sleep(&mut self, _duration: Duration) {}

        fn screenshot(&mut self, _path: &Path) -> Result<(), DriverError> {
            Err(DriverError::new("no display"))
        }
    }

    #[test]
    fn null_results_are_not_errors() {
        let mut driver = NullDriver;
        let value = driver
            .evaluate("document.title")
            .expect("null evaluation should succeed");
        assert_eq!(value, Value::Null);
        assert_ne!(value, json!(""));
    }

    #[test]
    fn driver_error_preserves_message() {
        let mut driver = NullDriver;
        let error = driver
            .screenshot(Path::new("out.png"))
            .expect_err("screenshot should fail");
        assert_eq!(error.to_string(), "driver error: no display");
    }
}
