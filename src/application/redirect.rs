//! Static page forwarding visitors to the latest published document.

use askama::Template;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to render redirect page: {0}")]
pub struct RedirectPageError(#[from] askama::Error);

#[derive(Template)]
#[template(path = "redirect.html")]
struct RedirectTemplate<'a> {
    target: &'a str,
}

/// Render a page that refreshes to `target` immediately and offers a fallback link.
///
/// Output depends only on `target`. Attribute values are HTML-escaped.
pub fn render_redirect_page(target: &str) -> Result<String, RedirectPageError> {
    Ok(RedirectTemplate { target }.render()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "https://octo.github.io/pdfs/bulletin.pdf?t=1700000000000";

    fn between<'a>(haystack: &'a str, start: &str, end: &str) -> &'a str {
        let from = haystack.find(start).expect("start marker") + start.len();
        let len = haystack[from..].find(end).expect("end marker");
        &haystack[from..from + len]
    }

    #[test]
    fn rendering_is_deterministic() {
        let first = render_redirect_page(TARGET).expect("render");
        let second = render_redirect_page(TARGET).expect("render");
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn refresh_and_fallback_link_share_target() {
        let page = render_redirect_page(TARGET).expect("render");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert_eq!(between(&page, "content=\"0; url=", "\""), TARGET);
        assert_eq!(between(&page, "<a href=\"", "\""), TARGET);
    }

    #[test]
    fn markup_in_target_is_escaped() {
        let page = render_redirect_page("https://x.test/a.pdf?t=1&v=\"2\"").expect("render");
        let target = between(&page, "<a href=\"", "\"");
        assert_eq!(target, "https://x.test/a.pdf?t=1&#38;v=&#34;2&#34;");
        assert!(!page.contains("v=\"2\""));
    }

    #[test]
    fn different_targets_render_differently() {
        let a = render_redirect_page("https://x.test/a.pdf?t=1").expect("render");
        let b = render_redirect_page("https://x.test/a.pdf?t=2").expect("render");
        assert_ne!(a, b);
    }
}
