//! Decides when to escalate from static HTTP to a headless fetch (§4.3).

use crate::types::EscalationReason;

/// Minimum body length below which the page is suspected to be a JS shell
/// rather than rendered content.
const JS_SHELL_BYTE_THRESHOLD: usize = 600;

#[derive(Debug, Clone)]
pub struct FallbackPolicy;

impl FallbackPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Examine a static-HTTP response and decide whether headless escalation
    /// is warranted. `timed_out` covers both connect and read timeouts.
    pub fn should_escalate(
        &self,
        http_status: Option<u16>,
        content_type: Option<&str>,
        body: Option<&str>,
        timed_out: bool,
    ) -> Option<EscalationReason> {
        if timed_out {
            return Some(EscalationReason::Timeout);
        }

        if http_status == Some(403) {
            return Some(EscalationReason::Forbidden);
        }

        if let Some(ct) = content_type {
            if !ct.contains("html") && !ct.contains("json") && !ct.contains("text") {
                return Some(EscalationReason::ContentTypeMismatch);
            }
        }

        if let Some(body) = body {
            if body.len() < JS_SHELL_BYTE_THRESHOLD && looks_js_rendered(body) {
                return Some(EscalationReason::JsRequiredHeuristic);
            }
        }

        None
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheap heuristic: a short document whose body is dominated by `<script>`
/// tags and app-root placeholders is almost certainly unrendered.
fn looks_js_rendered(body: &str) -> bool {
    let lower = body.to_lowercase();
    let has_app_root = lower.contains("id=\"root\"") || lower.contains("id=\"app\"") || lower.contains("__next");
    let script_heavy = lower.matches("<script").count() >= 2;
    has_app_root || script_heavy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_status_escalates() {
        let policy = FallbackPolicy::new();
        assert_eq!(
            policy.should_escalate(Some(403), Some("text/html"), None, false),
            Some(EscalationReason::Forbidden)
        );
    }

    #[test]
    fn timeout_escalates_regardless_of_other_signals() {
        let policy = FallbackPolicy::new();
        assert_eq!(
            policy.should_escalate(Some(200), Some("text/html"), None, true),
            Some(EscalationReason::Timeout)
        );
    }

    #[test]
    fn content_type_mismatch_escalates() {
        let policy = FallbackPolicy::new();
        assert_eq!(
            policy.should_escalate(Some(200), Some("application/octet-stream"), None, false),
            Some(EscalationReason::ContentTypeMismatch)
        );
    }

    #[test]
    fn short_js_shell_body_escalates() {
        let policy = FallbackPolicy::new();
        let body = r#"<html><body><div id="root"></div><script src="a"></script><script src="b"></script></body></html>"#;
        assert_eq!(
            policy.should_escalate(Some(200), Some("text/html"), Some(body), false),
            Some(EscalationReason::JsRequiredHeuristic)
        );
    }

    #[test]
    fn ordinary_rendered_page_does_not_escalate() {
        let policy = FallbackPolicy::new();
        let body = "<html><body><h1>Product</h1><p>".to_string() + &"x".repeat(1000) + "</p></body></html>";
        assert_eq!(
            policy.should_escalate(Some(200), Some("text/html; charset=utf-8"), Some(&body), false),
            None
        );
    }
}
