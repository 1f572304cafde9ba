//! Diagnostic message assembly.
//!
//! A report's message is self-contained: the original error message followed
//! by the recent log window, the host context and the stack trace, each in
//! its own blank-line separated section. Empty sections are left out.

use crate::hooks::HostSurface;

/// Host context attached to a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportContext {
    pub url: Option<String>,
    pub user_agent: Option<String>,
}

impl ReportContext {
    /// Context published by a host surface.
    #[must_use]
    pub fn from_surface(surface: &HostSurface) -> Self {
        Self {
            url: surface.url().map(str::to_string),
            user_agent: surface.user_agent().map(str::to_string),
        }
    }

    fn render(&self) -> Option<String> {
        let lines: Vec<String> = [
            self.url.as_ref().map(|url| format!("URL: {url}")),
            self.user_agent.as_ref().map(|ua| format!("User Agent: {ua}")),
        ]
        .into_iter()
        .flatten()
        .collect();

        (!lines.is_empty()).then(|| format!("Context:\n{}", lines.join("\n")))
    }
}

/// Builds the enriched report message.
///
/// # Arguments
///
/// * `message` - The original error message
/// * `recent_logs` - Formatted log window, possibly empty
/// * `context` - Host URL and user agent
/// * `stack` - Stack trace, if any
#[must_use]
pub fn enrich_message(
    message: &str,
    recent_logs: &str,
    context: &ReportContext,
    stack: Option<&str>,
) -> String {
    let mut sections = vec![message.to_string()];

    if !recent_logs.is_empty() {
        sections.push(format!("Recent logs:\n{recent_logs}"));
    }
    if let Some(context) = context.render() {
        sections.push(context);
    }
    if let Some(stack) = stack.filter(|s| !s.trim().is_empty()) {
        sections.push(format!("Stack trace:\n{stack}"));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_message_is_unchanged() {
        assert_eq!(
            enrich_message("boom", "", &ReportContext::default(), None),
            "boom"
        );
    }

    #[test]
    fn sections_are_appended_in_order() {
        let context = ReportContext {
            url: Some("https://shop.example.com/cart".to_string()),
            user_agent: Some("shop-desktop/2.1".to_string()),
        };
        let message = enrich_message(
            "boom",
            "[1970-01-01T00:00:01.000Z] LOG: loading cart",
            &context,
            Some("at src/cart.rs:10:5"),
        );

        assert_eq!(
            message,
            "boom\n\n\
             Recent logs:\n[1970-01-01T00:00:01.000Z] LOG: loading cart\n\n\
             Context:\nURL: https://shop.example.com/cart\nUser Agent: shop-desktop/2.1\n\n\
             Stack trace:\nat src/cart.rs:10:5"
        );
    }

    #[test]
    fn partial_context_and_blank_stack() {
        let context = ReportContext {
            url: None,
            user_agent: Some("cli/1.0".to_string()),
        };
        assert_eq!(
            enrich_message("boom", "", &context, Some("  ")),
            "boom\n\nContext:\nUser Agent: cli/1.0"
        );
    }

    #[test]
    fn context_from_surface() {
        let surface = HostSurface::new().with_url("app://main");
        let context = ReportContext::from_surface(&surface);
        assert_eq!(context.url.as_deref(), Some("app://main"));
        assert_eq!(context.user_agent, None);
    }
}
