use std::borrow::Cow;
use std::sync::Arc;

use gleaner_core::error::AppError;
use gleaner_core::traits::Cleaner;
use htmd::HtmlToMarkdown;
use scraper::Html;

/// Turns posting descriptions into tidy Markdown.
///
/// Descriptions from JSON-LD are HTML fragments, sometimes entity-escaped
/// a second time. Non-content elements are dropped, and the Markdown is
/// normalized so every record reads the same regardless of how the site
/// formatted it.
#[derive(Clone)]
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl HtmdCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "noscript", "iframe", "svg", "button", "form",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner for HtmdCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let html = unescape_markup(html)
            .replace("&nbsp;", " ")
            .replace("&#160;", " ");
        let markdown = self
            .converter
            .convert(&html)
            .map_err(|e| AppError::Generic(format!("Description conversion failed: {e}")))?;
        Ok(tidy(&markdown))
    }
}

/// `&lt;p&gt;…` with no real tags is markup escaped once too often; decode
/// one level so it converts as HTML.
fn unescape_markup(raw: &str) -> Cow<'_, str> {
    if raw.contains('<') || !raw.contains("&lt;") {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(Html::parse_fragment(raw).root_element().text().collect())
}

/// Non-breaking spaces become spaces, trailing whitespace and bare list
/// markers go, and runs of blank lines collapse to one.
fn tidy(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut gap = false;

    for line in markdown.lines() {
        let line = line.replace('\u{a0}', " ");
        let line = line.trim_end();
        match line.trim_start() {
            "" => {
                gap = !out.is_empty();
                continue;
            }
            "*" | "-" | "+" => continue,
            _ => {}
        }
        if !out.is_empty() {
            out.push_str(if gap { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        gap = false;
    }
    out
}
