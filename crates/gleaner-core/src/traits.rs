use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::frontier::DiscoveryOutcome;
use crate::models::{CandidateRef, ItemRecord, SearchRequest};
use crate::session::Session;

/// How long `goto` waits before considering a navigation complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// DOM parsed; subresources may still be loading.
    #[default]
    DomContentLoaded,
    /// Full `load` event.
    Load,
}

/// Element geometry in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Launches pages on a shared automation driver instance.
///
/// One driver is created per session by the caller and torn down explicitly
/// with [`Browser::shutdown`]. Pages are the unit of isolation between
/// concurrent operations.
pub trait Browser: Send + Sync + Clone {
    type Page: Page;

    /// Opens a fresh blank page.
    fn new_page(&self) -> impl Future<Output = Result<Self::Page, AppError>> + Send;

    /// Closes every page and terminates the driver.
    fn shutdown(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A single open page (tab) driven through the automation driver.
///
/// Locators are CSS selectors. Query methods operate on the first match
/// unless stated otherwise.
pub trait Page: Send + Sync {
    /// Navigates to `url`, failing with [`AppError::Timeout`] after `timeout`.
    fn goto(
        &self,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Current address of the page.
    fn url(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Serialized document source.
    fn content(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Evaluates a script expression and returns its JSON value.
    fn evaluate(
        &self,
        script: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;

    /// Number of elements matching `locator`.
    fn count(&self, locator: &str) -> impl Future<Output = Result<usize, AppError>> + Send;

    /// Rendered text of the first match, `None` when nothing matches.
    fn text(&self, locator: &str)
    -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    /// Raw text content of every match, in document order.
    fn texts(&self, locator: &str) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Attribute of the first match.
    fn attribute(
        &self,
        locator: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    /// Serialized markup of every match, in document order.
    fn outer_html_all(
        &self,
        locator: &str,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Geometry of the first match, `None` when missing or not rendered.
    fn bounding_box(
        &self,
        locator: &str,
    ) -> impl Future<Output = Result<Option<BoundingBox>, AppError>> + Send;

    /// Viewport size as `(width, height)`.
    fn viewport(&self) -> impl Future<Output = Result<(f64, f64), AppError>> + Send;

    fn mouse_move(&self, x: f64, y: f64) -> impl Future<Output = Result<(), AppError>> + Send;

    fn mouse_click(&self, x: f64, y: f64) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Gives keyboard focus to the first match.
    fn focus(&self, locator: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Types `text` into the first match as keyboard input.
    fn type_text(
        &self,
        locator: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Presses a named key (e.g. `"Backspace"`) on the first match.
    fn press_key(
        &self,
        locator: &str,
        key: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Waits until `locator` matches (and is visible, if requested).
    fn wait_for_selector(
        &self,
        locator: &str,
        timeout: Duration,
        visible: bool,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Closes the page. Consumes it so it cannot be closed twice.
    fn close(self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Converts raw HTML fragments into clean text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Keeps text as-is apart from trimming.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCleaner;

impl Cleaner for PlainCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        Ok(html.trim().to_string())
    }
}

/// A listing source: discovers candidates and extracts one loaded detail page.
///
/// Each source is its own implementation; adding one never touches others.
pub trait ListingSource: Send + Sync {
    /// Tag stamped on every emitted record.
    fn tag(&self) -> &str;

    /// Classifier used on detail pages before extraction.
    fn detail_detector(&self) -> &crate::challenge::ChallengeDetector;

    /// Runs one discovery session and returns the deduplicated candidates.
    fn discover<B: Browser>(
        &self,
        session: &Session<B>,
        request: &SearchRequest,
    ) -> impl Future<Output = DiscoveryOutcome> + Send;

    /// Extracts a record from a detail page that is already loaded.
    ///
    /// Fails with [`AppError::ValidationError`] if the record would carry a
    /// placeholder id or title.
    fn extract_one<P: Page>(
        &self,
        page: &P,
        target: &CandidateRef,
    ) -> impl Future<Output = Result<ItemRecord, AppError>> + Send;
}
