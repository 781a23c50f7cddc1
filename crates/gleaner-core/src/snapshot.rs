//! Static HTML documents exposed through the [`Page`] trait.
//!
//! [`HtmlPage`] answers DOM queries from a saved document using CSS
//! selectors (via `scraper`). It backs offline extraction of pages saved to
//! disk and serves as the DOM harness for unit tests. It has no layout
//! engine: scripts cannot run and elements have no geometry.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::error::AppError;
use crate::traits::{BoundingBox, Page, WaitUntil};

/// Parses a CSS selector, reporting bad locators as unclassified errors.
pub fn parse_selector(locator: &str) -> Result<Selector, AppError> {
    Selector::parse(locator)
        .map_err(|e| AppError::Generic(format!("Invalid selector '{locator}': {e}")))
}

/// Rendered-text approximation: text nodes joined, whitespace collapsed.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn count(html: &str, locator: &str) -> Result<usize, AppError> {
    let selector = parse_selector(locator)?;
    let doc = Html::parse_document(html);
    Ok(doc.select(&selector).count())
}

pub fn first_text(html: &str, locator: &str) -> Result<Option<String>, AppError> {
    let selector = parse_selector(locator)?;
    let doc = Html::parse_document(html);
    Ok(doc.select(&selector).next().map(|el| element_text(&el)))
}

pub fn all_raw_text(html: &str, locator: &str) -> Result<Vec<String>, AppError> {
    let selector = parse_selector(locator)?;
    let doc = Html::parse_document(html);
    Ok(doc
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect())
}

pub fn first_attribute(html: &str, locator: &str, name: &str) -> Result<Option<String>, AppError> {
    let selector = parse_selector(locator)?;
    let doc = Html::parse_document(html);
    Ok(doc
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(name).map(str::to_string)))
}

pub fn all_outer_html(html: &str, locator: &str) -> Result<Vec<String>, AppError> {
    let selector = parse_selector(locator)?;
    let doc = Html::parse_document(html);
    Ok(doc.select(&selector).map(|el| el.html()).collect())
}

fn require(html: &str, locator: &str) -> Result<(), AppError> {
    if count(html, locator)? == 0 {
        return Err(AppError::ElementNotFound(locator.to_string()));
    }
    Ok(())
}

/// A saved document served as a page.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    url: String,
    html: String,
}

impl HtmlPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

impl Page for HtmlPage {
    async fn goto(&self, url: &str, _wait: WaitUntil, _timeout: Duration) -> Result<(), AppError> {
        if url == self.url {
            Ok(())
        } else {
            Err(AppError::NavigationError(format!(
                "static page for {} cannot navigate to {url}",
                self.url
            )))
        }
    }

    async fn url(&self) -> Result<String, AppError> {
        Ok(self.url.clone())
    }

    async fn content(&self) -> Result<String, AppError> {
        Ok(self.html.clone())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AppError> {
        Err(AppError::Generic(format!(
            "static page cannot evaluate scripts ({} bytes)",
            script.len()
        )))
    }

    async fn count(&self, locator: &str) -> Result<usize, AppError> {
        count(&self.html, locator)
    }

    async fn text(&self, locator: &str) -> Result<Option<String>, AppError> {
        first_text(&self.html, locator)
    }

    async fn texts(&self, locator: &str) -> Result<Vec<String>, AppError> {
        all_raw_text(&self.html, locator)
    }

    async fn attribute(&self, locator: &str, name: &str) -> Result<Option<String>, AppError> {
        first_attribute(&self.html, locator, name)
    }

    async fn outer_html_all(&self, locator: &str) -> Result<Vec<String>, AppError> {
        all_outer_html(&self.html, locator)
    }

    async fn bounding_box(&self, _locator: &str) -> Result<Option<BoundingBox>, AppError> {
        Ok(None)
    }

    async fn viewport(&self) -> Result<(f64, f64), AppError> {
        Ok((1366.0, 768.0))
    }

    async fn mouse_move(&self, _x: f64, _y: f64) -> Result<(), AppError> {
        Ok(())
    }

    async fn mouse_click(&self, _x: f64, _y: f64) -> Result<(), AppError> {
        Ok(())
    }

    async fn focus(&self, locator: &str) -> Result<(), AppError> {
        require(&self.html, locator)
    }

    async fn type_text(&self, locator: &str, _text: &str) -> Result<(), AppError> {
        require(&self.html, locator)
    }

    async fn press_key(&self, locator: &str, _key: &str) -> Result<(), AppError> {
        require(&self.html, locator)
    }

    async fn wait_for_selector(
        &self,
        locator: &str,
        timeout: Duration,
        _visible: bool,
    ) -> Result<(), AppError> {
        if count(&self.html, locator)? > 0 {
            Ok(())
        } else {
            Err(AppError::Timeout(timeout.as_millis() as u64))
        }
    }

    async fn close(self) -> Result<(), AppError> {
        Ok(())
    }
}
