//! Prioritized DOM probe strategies.
//!
//! The page's structure shifts between releases, so every lookup is a
//! ranked list of small scripts tried in order; the first non-null result
//! wins. A probe that errors or returns null simply yields to the next
//! one.

use chat_transport::UiDriver;
use serde_json::Value;

/// One named page script. Scripts must be self-contained IIFEs returning a
/// JSON-serializable value, `null` meaning "not found".
#[derive(Debug, Clone)]
pub struct Probe {
    pub name: &'static str,
    pub script: String,
}

impl Probe {
    #[must_use]
    pub fn raw(name: &'static str, script: impl Into<String>) -> Self {
        Self {
            name,
            script: script.into(),
        }
    }

    /// Probe returning the viewport center of the first visible element
    /// matching `selector`, or null.
    #[must_use]
    pub fn center(name: &'static str, selector: &str) -> Self {
        Self::raw(
            name,
            format!(
                r#"(() => {{
    const el = document.querySelector('{selector}');
    if (!el) return null;
    const r = el.getBoundingClientRect();
    if (r.width < 5 || r.height < 5) return null;
    return {{x: r.x + r.width / 2, y: r.y + r.height / 2}};
}})()"#
            ),
        )
    }
}

/// Try each probe in order; first non-null result wins. Driver errors on
/// an individual probe are logged and skipped.
pub fn run_probes(driver: &mut dyn UiDriver, probes: &[Probe]) -> Option<Value> {
    for probe in probes {
        match driver.evaluate(&probe.script) {
            Ok(Value::Null) => continue,
            Ok(value) => {
                log::debug!("probe: '{}' matched", probe.name);
                return Some(value);
            }
            Err(error) => {
                log::debug!("probe: '{}' errored: {error}", probe.name);
            }
        }
    }
    None
}

/// Read an `{x, y}` coordinate pair out of a probe result.
#[must_use]
pub fn point_from(value: &Value) -> Option<(f64, f64)> {
    Some((value.get("x")?.as_f64()?, value.get("y")?.as_f64()?))
}

/// Composer input field, ProseMirror editor first, then fallbacks.
#[must_use]
pub fn input_probes() -> Vec<Probe> {
    vec![
        Probe::center("prosemirror-id", r#"div#prompt-textarea[contenteditable="true"]"#),
        Probe::center("prompt-testid", r#"div[data-testid="prompt-textarea"]"#),
        Probe::center("prosemirror-class", r#"div.ProseMirror[contenteditable="true"]"#),
        Probe::center("textarea-message", r#"textarea[placeholder*="Message"]"#),
        Probe::center("textarea-chatgpt", r#"textarea[placeholder*="ChatGPT"]"#),
        Probe::center(
            "editable-placeholder",
            r#"div[contenteditable="true"][data-placeholder*="Message"]"#,
        ),
        Probe::center(
            "editable-label",
            r#"div[contenteditable="true"][aria-label*="Message"]"#,
        ),
        Probe::center("any-editable", r#"div[contenteditable="true"]"#),
    ]
}

/// Send button, testid first, then label and submit fallbacks.
#[must_use]
pub fn send_probes() -> Vec<Probe> {
    vec![
        Probe::center("send-testid", r#"button[data-testid="send-button"]"#),
        Probe::center("send-label", r#"button[aria-label="Send prompt"]"#),
        Probe::center("send-label-short", r#"button[aria-label="Send"]"#),
        Probe::center("send-class", "button.send-button"),
        Probe::center("form-submit", r#"form button[type="submit"]"#),
        Probe::raw(
            "send-scan",
            r#"(() => {
    const buttons = document.querySelectorAll('button');
    for (const btn of buttons) {
        const label = (btn.getAttribute('aria-label') || '').toLowerCase();
        const testId = btn.getAttribute('data-testid') || '';
        if (label.includes('send') || testId.includes('send')) {
            const r = btn.getBoundingClientRect();
            if (r.width < 5 || r.height < 5) continue;
            return {x: r.x + r.width / 2, y: r.y + r.height / 2};
        }
    }
    return null;
})()"#,
        ),
    ]
}

/// Whole visible page text.
#[must_use]
pub fn page_text_probe() -> Probe {
    Probe::raw("body-text", "(() => document.body.innerText)()")
}

/// Whether a response is being generated (stop button visible).
#[must_use]
pub fn generating_probe() -> Probe {
    Probe::raw(
        "stop-button",
        r#"(() => {
    const stopBtn = document.querySelector('[data-testid="stop-button"]') ||
                    document.querySelector('[aria-label="Stop generating"]') ||
                    document.querySelector('button.stop-button');
    return stopBtn !== null;
})()"#,
    )
}

/// Latest assistant response text, role-tagged turns first, then markdown
/// prose areas.
#[must_use]
pub fn response_text_probes() -> Vec<Probe> {
    vec![
        Probe::raw(
            "assistant-turn",
            r#"(() => {
    const turns = document.querySelectorAll('div[data-message-author-role="assistant"]');
    if (turns.length === 0) return null;
    const last = turns[turns.length - 1];
    const md = last.querySelector('.markdown, [class*="markdown"], .prose');
    const text = (md || last).innerText.trim();
    return text.length > 0 ? text : null;
})()"#,
        ),
        Probe::raw(
            "markdown-area",
            r#"(() => {
    const els = document.querySelectorAll('.markdown, .prose, [class*="markdown"]');
    if (els.length === 0) return null;
    const text = els[els.length - 1].innerText.trim();
    return text.length > 0 ? text : null;
})()"#,
        ),
    ]
}

/// Current page URL, for recovering the conversation id after a send.
#[must_use]
pub fn location_probe() -> Probe {
    Probe::raw("location", "(() => window.location.href)()")
}

/// Sidebar conversation links as `[{id, title}]`.
#[must_use]
pub fn sidebar_chats_probe() -> Probe {
    Probe::raw(
        "sidebar-chats",
        r#"(() => {
    const results = [];
    const links = document.querySelectorAll('a[href*="/c/"]');
    for (const a of links) {
        const href = a.getAttribute('href') || '';
        const text = (a.innerText || '').trim().substring(0, 200);
        if (!text || text.length < 2) continue;
        const match = href.match(/\/c\/([a-zA-Z0-9-]+)/);
        results.push({id: match ? match[1] : '', title: text});
    }
    return results.length > 0 ? results : null;
})()"#,
    )
}

/// Sidebar project links as `[{id, name, url}]`.
#[must_use]
pub fn project_links_probe() -> Probe {
    Probe::raw(
        "project-links",
        r#"(() => {
    const results = [];
    const links = document.querySelectorAll('a[href*="/g/g-p-"]');
    for (const a of links) {
        const href = a.getAttribute('href') || '';
        const text = (a.innerText || '').trim().substring(0, 200);
        if (!text || text.length < 2) continue;
        const match = href.match(/\/g\/(g-p-[a-zA-Z0-9-]+)\/project/);
        results.push({id: match ? match[1] : '', name: text, url: href});
    }
    return results.length > 0 ? results : null;
})()"#,
    )
}

/// Temporary-chat toggle near the composer.
#[must_use]
pub fn temp_chat_probes() -> Vec<Probe> {
    vec![
        Probe::center("temp-testid", r#"[data-testid*="temp"]"#),
        Probe::center("temp-label", r#"button[aria-label*="emporary"]"#),
        Probe::raw(
            "temp-text-scan",
            r#"(() => {
    const elems = document.querySelectorAll('button, label, div[role="switch"]');
    for (const el of elems) {
        const text = (el.innerText || '').trim().toLowerCase();
        if (text.includes('temporary') || text.includes('temp chat')) {
            const r = el.getBoundingClientRect();
            if (r.width < 5 || r.height < 5) continue;
            return {x: r.x + r.width / 2, y: r.y + r.height / 2};
        }
    }
    return null;
})()"#,
        ),
    ]
}

/// Web-search toggle with its current state, `{x, y, enabled}`.
#[must_use]
pub fn web_search_probes() -> Vec<Probe> {
    vec![Probe::raw(
        "search-toggle",
        r#"(() => {
    const toggles = document.querySelectorAll(
        '[data-testid*="search"], button[aria-label*="earch"], [role="switch"][aria-label*="earch"]'
    );
    for (const t of toggles) {
        const r = t.getBoundingClientRect();
        if (r.width < 5 || r.height < 5) continue;
        const enabled = t.getAttribute('aria-checked') === 'true' ||
                        t.getAttribute('aria-pressed') === 'true' ||
                        t.getAttribute('data-state') === 'checked';
        return {x: r.x + r.width / 2, y: r.y + r.height / 2, enabled: enabled};
    }
    return null;
})()"#,
    )]
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use chat_transport::{DriverError, UiDriver};
    use serde_json::{json, Value};

    use super::{input_probes, point_from, run_probes, Probe};

    /// Driver whose `evaluate` answers from a script-substring playbook.
    struct ScriptedDriver {
        answers: Vec<(&'static str, Value)>,
        evaluated: Vec<String>,
    }

    impl ScriptedDriver {
        fn new(answers: Vec<(&'static str, Value)>) -> Self {
            Self {
                answers,
                evaluated: Vec::new(),
            }
        }
    }

    impl UiDriver for ScriptedDriver {
        fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
            Ok(())
        }

        fn evaluate(&mut self, script: &str) -> Result<Value, DriverError> {
            self.evaluated.push(script.to_string());
            for (needle, value) in &self.answers {
                if script.contains(needle) {
                    return Ok(value.clone());
                }
            }
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
            Ok(())
        }
    }

    #[test]
    fn first_non_null_result_wins() {
        let mut driver = ScriptedDriver::new(vec![(
            "textarea[placeholder*=\"Message\"]",
            json!({"x": 10.0, "y": 20.0}),
        )]);
        let hit = run_probes(&mut driver, &input_probes()).expect("fallback probe should match");
        assert_eq!(point_from(&hit), Some((10.0, 20.0)));
        // Higher-priority probes ran first and returned null.
        assert!(driver.evaluated[0].contains("prompt-textarea"));
    }

    #[test]
    fn all_null_results_mean_no_match() {
        let mut driver = ScriptedDriver::new(vec![]);
        assert!(run_probes(&mut driver, &input_probes()).is_none());
        assert_eq!(driver.evaluated.len(), input_probes().len());
    }

    #[test]
    fn probe_errors_fall_through_to_the_next() {
        struct FirstErrors {
            calls: usize,
        }
        impl UiDriver for FirstErrors {
            fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
                Ok(())
            }
            fn evaluate(&mut self, _script: &str) -> Result<Value, DriverError> {
                self.calls += 1;
                if self.calls == 1 {
                    Err(DriverError::new("context destroyed"))
                } else {
                    Ok(json!(true))
                }
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
                Ok(())
            }
        }

        let mut driver = FirstErrors { calls: 0 };
        let probes = vec![Probe::raw("a", "x"), Probe::raw("b", "y")];
        assert_eq!(run_probes(&mut driver, &probes), Some(json!(true)));
    }

    #[test]
    fn point_from_rejects_malformed_values() {
        assert_eq!(point_from(&json!({"x": 1.0})), None);
        assert_eq!(point_from(&json!("not a point")), None);
        assert_eq!(point_from(&json!({"x": 1.0, "y": 2.0})), Some((1.0, 2.0)));
    }
}
