//! The Parser external collaborator contract (§6.1): a pure function from
//! raw bytes + base URL to extracted text and discovered links. Generalized
//! from the teacher's `parser::parse_html`, which only collected links;
//! this also pulls a best-effort text extraction and `<title>` out of
//! separate streaming passes so Parser Consumers have something to hand
//! to Storage.

use lol_html::{element, text, HtmlRewriter, Settings};
use url::Url;

/// Output of parsing one fetched document (§6.1's Parser contract).
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub extracted_text: Option<String>,
    pub discovered_links: Vec<String>,
    pub title: Option<String>,
}

/// Pure function: no I/O, no shared state. `lol_html` is a streaming
/// rewriter that tolerates broken markup; a hard parser failure is this
/// module's only failure mode, and is treated as "nothing extracted" per
/// §7's data-shape error handling.
pub fn parse(input: &[u8], base_url: &str) -> ParsedDocument {
    let Ok(base) = Url::parse(base_url) else {
        return ParsedDocument::default();
    };

    ParsedDocument {
        extracted_text: extract_plain_text(input),
        discovered_links: extract_links(input, &base),
        title: extract_title(input),
    }
}

fn extract_links(input: &[u8], base: &Url) -> Vec<String> {
    let mut links = Vec::new();
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("a[href]", |el| {
                if let Some(href) = el.get_attribute("href") {
                    if let Some(resolved) = resolve_link(base, &href) {
                        links.push(resolved);
                    }
                }
                Ok(())
            })],
            ..Settings::new()
        },
        |_: &[u8]| {},
    );

    if rewriter.write(input).is_err() || rewriter.end().is_err() {
        return Vec::new();
    }
    dedup_preserve_order(links)
}

fn extract_title(input: &[u8]) -> Option<String> {
    let mut title = String::new();
    let mut rewriter = HtmlRewriter::new(
        Settings {
            document_content_handlers: vec![text!("title", |chunk| {
                title.push_str(chunk.as_str());
                Ok(())
            })],
            ..Settings::new()
        },
        |_: &[u8]| {},
    );

    if rewriter.write(input).is_err() || rewriter.end().is_err() {
        return None;
    }
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Strips script/style content and collapses whitespace from whatever text
/// remains. Used to populate the Storage contract's saved body (§6.1).
fn extract_plain_text(input: &[u8]) -> Option<String> {
    let mut out = String::new();
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("script, style, noscript", |el| {
                el.remove();
                Ok(())
            })],
            document_content_handlers: vec![text!("*", |chunk| {
                out.push_str(chunk.as_str());
                out.push(' ');
                Ok(())
            })],
            ..Settings::new()
        },
        |_: &[u8]| {},
    );

    if rewriter.write(input).is_err() || rewriter.end().is_err() {
        return None;
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn resolve_link(base: &Url, href: &str) -> Option<String> {
    if let Ok(absolute) = Url::parse(href) {
        if absolute.scheme() == "http" || absolute.scheme() == "https" {
            return Some(absolute.to_string());
        }
        return None;
    }
    base.join(href)
        .ok()
        .filter(|u| u.scheme() == "http" || u.scheme() == "https")
        .map(|u| u.to_string())
}

fn dedup_preserve_order(links: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(links.len());
    links.into_iter().filter(|l| seen.insert(l.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_absolute_and_relative_links() {
        let html = br#"<html><body>
            <a href="/a">rel</a>
            <a href="https://other.example/x">abs</a>
            <a href="mailto:a@b.com">skip</a>
        </body></html>"#;
        let doc = parse(html, "https://example.com/page");
        assert!(doc
            .discovered_links
            .contains(&"https://example.com/a".to_string()));
        assert!(doc
            .discovered_links
            .contains(&"https://other.example/x".to_string()));
        assert_eq!(doc.discovered_links.len(), 2);
    }

    #[test]
    fn extracts_title() {
        let html = b"<html><head><title>Hello World</title></head><body></body></html>";
        let doc = parse(html, "https://example.com/");
        assert_eq!(doc.title.as_deref(), Some("Hello World"));
    }

    #[test]
    fn invalid_base_url_yields_empty_document() {
        let doc = parse(b"<a href=\"/a\">x</a>", "not a url");
        assert!(doc.discovered_links.is_empty());
        assert!(doc.extracted_text.is_none());
    }

    #[test]
    fn strips_script_and_style_from_text() {
        let html = b"<html><body><script>var x=1;</script><p>Hello</p></body></html>";
        let doc = parse(html, "https://example.com/");
        let text = doc.extracted_text.unwrap_or_default();
        assert!(text.contains("Hello"));
        assert!(!text.contains("var x"));
    }
}
