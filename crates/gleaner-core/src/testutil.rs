//! Test utilities: a scripted page, a recording mock browser and fixtures.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability so tests can assert on recorded
//! calls after the code under test has consumed its handles.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

use crate::cards::CardLocators;
use crate::challenge::ChallengeDetector;
use crate::error::AppError;
use crate::payload::ListingPayloadSpec;
use crate::profile::{ListingLocators, QueryBuilder, SiteProfile};
use crate::resolver::DetailLocators;
use crate::scroll::{BOTTOM_SCRIPT, HEIGHT_SCRIPT};
use crate::snapshot;
use crate::traits::{BoundingBox, Browser, Page, WaitUntil};

const BLANK: &str = "<html><head></head><body></body></html>";

const DEFAULT_BOX: BoundingBox = BoundingBox {
    x: 100.0,
    y: 100.0,
    width: 120.0,
    height: 30.0,
};

// ---------------------------------------------------------------------------
// ScriptedPage
// ---------------------------------------------------------------------------

/// Interaction recorded by a [`ScriptedPage`].
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Goto(String),
    MouseMove(f64, f64),
    Click(f64, f64),
    Focus(String),
    Type(String, String),
    Key(String, String),
}

struct PageState {
    url: String,
    html: String,
    boxes: HashMap<String, BoundingBox>,
    failure: Option<String>,
    events: Vec<PageEvent>,
    scripts: Vec<String>,
    heights: Vec<f64>,
    height_reads: usize,
    scroll_y: f64,
    viewport: (f64, f64),
    last_box: Option<String>,
}

/// Page over an in-memory document with scripted geometry and scrolling.
///
/// Standalone pages keep their document; pages opened by [`MockBrowser`]
/// load documents from the browser's site map on `goto` and on clicks.
#[derive(Clone)]
pub struct ScriptedPage {
    state: Arc<Mutex<PageState>>,
    site: Option<Arc<Mutex<Site>>>,
    /// Open order within the owning [`MockBrowser`].
    number: usize,
}

impl ScriptedPage {
    pub fn new(url: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState {
                url: url.to_string(),
                html: BLANK.to_string(),
                boxes: HashMap::new(),
                failure: None,
                events: Vec::new(),
                scripts: Vec::new(),
                heights: Vec::new(),
                height_reads: 0,
                scroll_y: 0.0,
                viewport: (1366.0, 768.0),
                last_box: None,
            })),
            site: None,
            number: 0,
        }
    }

    /// A page whose every operation fails with an automation error.
    pub fn failing(error: AppError) -> Self {
        let page = Self::new("about:blank");
        page.state.lock().unwrap().failure = Some(error.to_string());
        page
    }

    /// A page reporting `heights` on successive document height reads (the
    /// last value repeats) with a viewport `viewport_height` tall.
    pub fn scrollable(heights: Vec<f64>, viewport_height: f64) -> Self {
        let page = Self::new("https://example.com");
        {
            let mut state = page.state.lock().unwrap();
            state.heights = heights;
            state.viewport.1 = viewport_height;
        }
        page
    }

    pub fn with_html(self, html: &str) -> Self {
        self.state.lock().unwrap().html = html.to_string();
        self
    }

    pub fn with_box(self, locator: &str, bbox: BoundingBox) -> Self {
        self.state
            .lock()
            .unwrap()
            .boxes
            .insert(locator.to_string(), bbox);
        self
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    fn check(&self) -> Result<(), AppError> {
        match &self.state.lock().unwrap().failure {
            Some(message) => Err(AppError::AutomationError(message.clone())),
            None => Ok(()),
        }
    }

    fn html(&self) -> Result<String, AppError> {
        self.check()?;
        Ok(self.state.lock().unwrap().html.clone())
    }

    fn record(&self, event: PageEvent) -> Result<(), AppError> {
        self.check()?;
        self.state.lock().unwrap().events.push(event);
        Ok(())
    }

    /// Loads `url` from the site map, honoring injected failures.
    fn load(&self, site: &Mutex<Site>, url: &str) -> Result<(), AppError> {
        let html = {
            let mut site = site.lock().unwrap();
            site.visits.push(url.to_string());
            if let Some(remaining) = site.nav_failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AppError::NavigationError(format!(
                        "net::ERR_CONNECTION_RESET at {url}"
                    )));
                }
            }
            site.pages.get(url).cloned().ok_or_else(|| {
                AppError::NavigationError(format!("net::ERR_NAME_NOT_RESOLVED at {url}"))
            })?
        };
        let mut state = self.state.lock().unwrap();
        state.url = url.to_string();
        state.html = html;
        state.scroll_y = 0.0;
        Ok(())
    }
}

impl Page for ScriptedPage {
    async fn goto(&self, url: &str, _wait: WaitUntil, _timeout: Duration) -> Result<(), AppError> {
        self.record(PageEvent::Goto(url.to_string()))?;
        match &self.site {
            Some(site) => {
                site.lock()
                    .unwrap()
                    .log
                    .push(SiteEvent::Goto(self.number, url.to_string()));
                // Lets concurrent sessions interleave at navigation.
                tokio::task::yield_now().await;
                self.load(site, url)
            }
            None => {
                self.state.lock().unwrap().url = url.to_string();
                Ok(())
            }
        }
    }

    async fn url(&self) -> Result<String, AppError> {
        self.check()?;
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn content(&self) -> Result<String, AppError> {
        self.html()
    }

    async fn evaluate(&self, script: &str) -> Result<Value, AppError> {
        self.check()?;
        if let Some(site) = &self.site {
            site.lock().unwrap().evaluations += 1;
        }
        let mut state = self.state.lock().unwrap();
        state.scripts.push(script.to_string());

        if script == HEIGHT_SCRIPT {
            let Some(&last) = state.heights.last() else {
                return Ok(Value::Null);
            };
            let height = state.heights.get(state.height_reads).copied().unwrap_or(last);
            state.height_reads += 1;
            return Ok(Value::from(height));
        }
        if script == BOTTOM_SCRIPT {
            return Ok(Value::from(state.scroll_y + state.viewport.1));
        }
        if let Some(rest) = script.strip_prefix("window.scrollBy(0, ") {
            let step: f64 = rest.trim_end_matches(')').parse().unwrap_or(0.0);
            state.scroll_y += step;
            return Ok(Value::Null);
        }
        if script == "window.scrollTo(0, 0)" {
            state.scroll_y = 0.0;
        }
        Ok(Value::Null)
    }

    async fn count(&self, locator: &str) -> Result<usize, AppError> {
        snapshot::count(&self.html()?, locator)
    }

    async fn text(&self, locator: &str) -> Result<Option<String>, AppError> {
        snapshot::first_text(&self.html()?, locator)
    }

    async fn texts(&self, locator: &str) -> Result<Vec<String>, AppError> {
        snapshot::all_raw_text(&self.html()?, locator)
    }

    async fn attribute(&self, locator: &str, name: &str) -> Result<Option<String>, AppError> {
        snapshot::first_attribute(&self.html()?, locator, name)
    }

    async fn outer_html_all(&self, locator: &str) -> Result<Vec<String>, AppError> {
        snapshot::all_outer_html(&self.html()?, locator)
    }

    async fn bounding_box(&self, locator: &str) -> Result<Option<BoundingBox>, AppError> {
        let html = self.html()?;
        let present = snapshot::count(&html, locator)? > 0;
        let mut state = self.state.lock().unwrap();
        state.last_box = Some(locator.to_string());
        if let Some(bbox) = state.boxes.get(locator) {
            return Ok(Some(*bbox));
        }
        Ok(present.then_some(DEFAULT_BOX))
    }

    async fn viewport(&self) -> Result<(f64, f64), AppError> {
        self.check()?;
        Ok(self.state.lock().unwrap().viewport)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), AppError> {
        self.record(PageEvent::MouseMove(x, y))
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<(), AppError> {
        self.record(PageEvent::Click(x, y))?;
        let Some(site) = &self.site else {
            return Ok(());
        };
        let key = {
            let state = self.state.lock().unwrap();
            state
                .last_box
                .clone()
                .map(|locator| (state.url.clone(), locator))
        };
        let destination = key.and_then(|key| site.lock().unwrap().clicks.get(&key).cloned());
        match destination {
            Some(url) => self.load(site, &url),
            None => Ok(()),
        }
    }

    async fn focus(&self, locator: &str) -> Result<(), AppError> {
        self.record(PageEvent::Focus(locator.to_string()))
    }

    async fn type_text(&self, locator: &str, text: &str) -> Result<(), AppError> {
        self.record(PageEvent::Type(locator.to_string(), text.to_string()))
    }

    async fn press_key(&self, locator: &str, key: &str) -> Result<(), AppError> {
        self.record(PageEvent::Key(locator.to_string(), key.to_string()))
    }

    async fn wait_for_selector(
        &self,
        locator: &str,
        timeout: Duration,
        _visible: bool,
    ) -> Result<(), AppError> {
        if snapshot::count(&self.html()?, locator)? > 0 {
            Ok(())
        } else {
            Err(AppError::Timeout(timeout.as_millis() as u64))
        }
    }

    async fn close(self) -> Result<(), AppError> {
        if let Some(site) = &self.site {
            let mut site = site.lock().unwrap();
            site.closed += 1;
            site.log.push(SiteEvent::Closed(self.number));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockBrowser
// ---------------------------------------------------------------------------

/// Browser-wide page lifecycle event; pages are numbered from 1 in open order.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteEvent {
    Opened(usize),
    Goto(usize, String),
    Closed(usize),
}

#[derive(Default)]
struct Site {
    pages: HashMap<String, String>,
    /// Remaining injected navigation failures per URL.
    nav_failures: HashMap<String, u32>,
    /// (page URL, clicked locator) -> destination URL.
    clicks: HashMap<(String, String), String>,
    visits: Vec<String>,
    log: Vec<SiteEvent>,
    evaluations: usize,
    open_failures: u32,
    opened: usize,
    closed: usize,
    peak: usize,
    shut_down: bool,
}

/// Mock browser serving documents from an in-memory site map.
#[derive(Clone, Default)]
pub struct MockBrowser {
    site: Arc<Mutex<Site>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `html` at `url`, replacing any earlier document.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.site
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), html.to_string());
        self
    }

    /// Fails the next `times` navigations to `url` with a transport error.
    pub fn fail_navigation(self, url: &str, times: u32) -> Self {
        self.site
            .lock()
            .unwrap()
            .nav_failures
            .insert(url.to_string(), times);
        self
    }

    /// Fails the next `times` page opens.
    pub fn fail_open(self, times: u32) -> Self {
        self.site.lock().unwrap().open_failures = times;
        self
    }

    /// Clicking `locator` on the page at `from` navigates to `to`.
    pub fn on_click(self, from: &str, locator: &str, to: &str) -> Self {
        self.site
            .lock()
            .unwrap()
            .clicks
            .insert((from.to_string(), locator.to_string()), to.to_string());
        self
    }

    /// Navigation attempts to `url`, including failed ones.
    pub fn visits(&self, url: &str) -> usize {
        self.site
            .lock()
            .unwrap()
            .visits
            .iter()
            .filter(|v| *v == url)
            .count()
    }

    pub fn opened(&self) -> usize {
        self.site.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.site.lock().unwrap().closed
    }

    pub fn open_pages(&self) -> usize {
        let site = self.site.lock().unwrap();
        site.opened - site.closed
    }

    pub fn peak_open_pages(&self) -> usize {
        self.site.lock().unwrap().peak
    }

    /// Opens, navigations and closes across all pages, in order.
    pub fn log(&self) -> Vec<SiteEvent> {
        self.site.lock().unwrap().log.clone()
    }

    /// Scripts evaluated across all pages.
    pub fn evaluations(&self) -> usize {
        self.site.lock().unwrap().evaluations
    }

    pub fn is_shut_down(&self) -> bool {
        self.site.lock().unwrap().shut_down
    }
}

impl Browser for MockBrowser {
    type Page = ScriptedPage;

    async fn new_page(&self) -> Result<ScriptedPage, AppError> {
        let number = {
            let mut site = self.site.lock().unwrap();
            if site.open_failures > 0 {
                site.open_failures -= 1;
                return Err(AppError::BrowserError("target crashed".into()));
            }
            site.opened += 1;
            site.peak = site.peak.max(site.opened - site.closed);
            let number = site.opened;
            site.log.push(SiteEvent::Opened(number));
            number
        };
        let mut page = ScriptedPage::new("about:blank");
        page.site = Some(Arc::clone(&self.site));
        page.number = number;
        Ok(page)
    }

    async fn shutdown(&self) -> Result<(), AppError> {
        self.site.lock().unwrap().shut_down = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` under a thread-local subscriber and returns everything it logged.
pub fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Profile for a fictional listing site at `jobs.example.com`.
pub fn test_profile() -> SiteProfile {
    let widgets = ["#px-captcha", "iframe[src*=\"hcaptcha\"]"];
    let phrases = ["security check", "verify you're human"];
    SiteProfile {
        tag: "example".into(),
        base_url: Url::parse("https://jobs.example.com").unwrap(),
        home_url: "https://jobs.example.com/".into(),
        query: QueryBuilder {
            path: "/jobs".into(),
            query_param: "q".into(),
            locality_param: "l".into(),
            offset_param: "start".into(),
            fixed: vec![("sort".into(), "date".into())],
        },
        detail_path: "/viewjob".into(),
        id_param: "jk".into(),
        listing: ListingLocators {
            cards: vec!["#results ul li".into()],
            card: CardLocators {
                link: "a[data-jk]".into(),
                id_attribute: "data-jk".into(),
                title: "span[title]".into(),
                organization: "[data-testid=\"company-name\"]".into(),
                locality: "[data-testid=\"text-location\"]".into(),
            },
            next_page: "#next".into(),
            query_input: "#what".into(),
            locality_input: "#where".into(),
            search_button: "#go".into(),
        },
        listing_payload: Some(
            ListingPayloadSpec::new(
                r#"(?s)window\.mosaic\.providerData\["mosaic-provider-jobcards"\]\s*=\s*(\{.*?\});"#,
                "/metaData/mosaicProviderJobCardsModel/results",
                "jobkey",
            )
            .unwrap(),
        ),
        listing_detector: ChallengeDetector::new(widgets, "#results", phrases),
        detail_detector: ChallengeDetector::new(widgets, "#desc", phrases),
        detail: DetailLocators {
            title: vec!["h1.title".into()],
            organization: vec![".company".into()],
            locality: vec![".location".into()],
            description: vec!["#desc".into()],
            compensation: vec![],
            posted_at: vec![],
            json_ld: "script[type=\"application/ld+json\"]".into(),
        },
        compensation_patterns: vec![
            r"[$₹€£¥]\s*[\d,]+(?:\.\d{2})?\s*-\s*[$₹€£¥]\s*[\d,]+(?:\.\d{2})?".into(),
        ],
    }
}

/// Listing cards for `ids`, in order.
pub fn card_list(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| {
            format!(
                r#"<li><a data-jk="{id}" href="/viewjob?jk={id}"><span title="Job {id}">Job {id}</span></a><span data-testid="company-name">Acme</span><div data-testid="text-location">Remote</div></li>"#
            )
        })
        .collect()
}

/// Listing page wrapping `cards` in the results container.
pub fn listing_page(cards: &str) -> String {
    format!(r#"<html><body><div id="results"><ul>{cards}</ul></div></body></html>"#)
}

/// Listing page with an embedded payload for `ids` plus DOM `cards`.
pub fn mosaic_page(ids: &[&str], cards: &str) -> String {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| serde_json::json!({"jobkey": id, "title": format!("Payload {id}")}))
        .collect();
    let data = serde_json::json!({
        "metaData": {"mosaicProviderJobCardsModel": {"results": results}}
    });
    format!(
        r#"<html><head><script>window.mosaic.providerData["mosaic-provider-jobcards"]={data};</script></head><body><div id="results"><ul>{cards}</ul></div></body></html>"#
    )
}

/// Detail page with a DOM title and description.
pub fn detail_page(title: &str) -> String {
    format!(
        r#"<html><body><h1 class="title">{title}</h1><div class="company">Acme</div><div class="location">Remote</div><div id="desc">Build reliable systems.</div></body></html>"#
    )
}
