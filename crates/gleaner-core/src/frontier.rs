//! Listing traversal.
//!
//! A [`DiscoveryFrontier`] walks the listing pages of one search, collecting
//! candidates deduplicated by natural id, and stops when a page brings
//! nothing new, the page ceiling is reached, a challenge is served, or the
//! listing cannot be fetched. Every stop returns what was collected so far.
//!
//! ```text
//! NotStarted -> FetchingPage(0)
//! FetchingPage(n) --challenge--> Stopped(Blocked)
//! FetchingPage(n) --fault------> Stopped(Faulted)
//! FetchingPage(n) -------------> Extracting(n)
//! Extracting(n) --0 new ids----> Stopped(Converged)
//! Extracting(n) --ceiling------> Stopped(Exhausted)
//! Extracting(n) ---------------> Paginating -> FetchingPage(n + 1)
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::config::DiscoveryMode;
use crate::error::AppError;
use crate::human::{human_type, move_and_click};
use crate::models::{CandidateRef, SearchRequest};
use crate::profile::SiteProfile;
use crate::scroll::trigger_lazy_load;
use crate::session::Session;
use crate::traits::{Browser, Page};

/// Why a discovery session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A bot challenge was served instead of listings.
    Blocked,
    /// A page yielded no ids that were not already seen.
    Converged,
    /// The page ceiling was reached or there is no next page.
    Exhausted,
    /// A listing page could not be fetched.
    Faulted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Blocked => "blocked",
            StopReason::Converged => "converged",
            StopReason::Exhausted => "exhausted",
            StopReason::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontierState {
    NotStarted,
    FetchingPage(u32),
    Extracting(u32),
    Paginating,
    Stopped(StopReason),
}

/// Result of one discovery session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryOutcome {
    /// Unique candidates in first-seen order.
    pub candidates: Vec<CandidateRef>,
    pub stop_reason: StopReason,
    pub pages_fetched: u32,
}

/// Session state for one discovery call.
pub struct DiscoveryFrontier<'a, B: Browser> {
    session: &'a Session<B>,
    profile: &'a SiteProfile,
    state: FrontierState,
    seen: HashSet<String>,
    candidates: Vec<CandidateRef>,
    pages_fetched: u32,
}

impl<'a, B: Browser> DiscoveryFrontier<'a, B> {
    pub fn new(session: &'a Session<B>, profile: &'a SiteProfile) -> Self {
        Self {
            session,
            profile,
            state: FrontierState::NotStarted,
            seen: HashSet::new(),
            candidates: Vec::new(),
            pages_fetched: 0,
        }
    }

    pub fn state(&self) -> FrontierState {
        self.state
    }

    /// Runs the traversal to a terminal state while holding a listing slot.
    pub async fn run(mut self, request: &SearchRequest) -> DiscoveryOutcome {
        let mode = self.session.config().discovery_mode;
        tracing::info!(
            source = %self.profile.tag,
            query = %request.query,
            locality = %request.locality,
            %mode,
            "Starting discovery"
        );

        let _permit = match self.session.listing_limiter().acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!(error = %e, "Could not acquire listing slot");
                return self.finish(StopReason::Faulted);
            }
        };

        let page = match self.session.browser().new_page().await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(error = %e, "Could not open listing page");
                return self.finish(StopReason::Faulted);
            }
        };

        let reason = self.traverse(&page, request, mode).await;
        if let Err(e) = page.close().await {
            tracing::warn!(error = %e, "Failed to close listing page");
        }
        self.finish(reason)
    }

    async fn traverse(
        &mut self,
        page: &B::Page,
        request: &SearchRequest,
        mode: DiscoveryMode,
    ) -> StopReason {
        let session = self.session;
        let config = session.config();
        let mut n = 0u32;
        self.transition(FrontierState::FetchingPage(0));

        loop {
            match self.fetch(page, request, mode, n).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(page = n, "No next-page control");
                    return StopReason::Exhausted;
                }
                Err(e) => {
                    tracing::error!(page = n, error = %e, "Listing page could not be fetched");
                    return StopReason::Faulted;
                }
            }
            self.pages_fetched += 1;

            if self.profile.listing_detector.is_blocked(page).await {
                tracing::warn!(page = n, "Bot challenge on listing page");
                return StopReason::Blocked;
            }

            self.transition(FrontierState::Extracting(n));
            trigger_lazy_load(page, &config.scroll).await;
            let found = match self.extract(page).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::error!(page = n, error = %e, "Listing page could not be read");
                    return StopReason::Faulted;
                }
            };
            let total = found.len();
            let new_ids = self.absorb(found);
            tracing::info!(
                page = n,
                found = total,
                new_ids,
                collected = self.candidates.len(),
                "Listing page processed"
            );

            if new_ids == 0 {
                return StopReason::Converged;
            }
            if n + 1 >= config.max_pages {
                return StopReason::Exhausted;
            }

            self.transition(FrontierState::Paginating);
            n += 1;
            self.transition(FrontierState::FetchingPage(n));
        }
    }

    /// Loads listing page `n`. `Ok(false)` means there is no such page.
    async fn fetch(
        &self,
        page: &B::Page,
        request: &SearchRequest,
        mode: DiscoveryMode,
        n: u32,
    ) -> Result<bool, AppError> {
        match mode {
            DiscoveryMode::AddressRewrite => {
                let url = self
                    .profile
                    .listing_url(request, n, self.session.config().page_size);
                self.session.goto(page, &url).await?;
                Ok(true)
            }
            DiscoveryMode::ClickDriven if n == 0 => {
                let listing = &self.profile.listing;
                self.session.goto(page, &self.profile.home_url).await?;
                human_type(page, &listing.query_input, &request.query).await?;
                human_type(page, &listing.locality_input, &request.locality).await?;
                move_and_click(page, &listing.search_button).await?;
                self.await_results(page).await;
                Ok(true)
            }
            DiscoveryMode::ClickDriven => {
                let next = &self.profile.listing.next_page;
                if page.count(next).await? == 0 {
                    return Ok(false);
                }
                move_and_click(page, next).await?;
                self.await_results(page).await;
                Ok(true)
            }
        }
    }

    // A missing container is left to the challenge detector and extraction.
    async fn await_results(&self, page: &B::Page) {
        let container = self.profile.listing_detector.results_container();
        let timeout = self.session.config().selector_timeout;
        if let Err(e) = page.wait_for_selector(container, timeout, true).await {
            tracing::warn!(container, error = %e, "Results container did not appear");
        }
    }

    /// Reads candidates from the loaded page: the listing payload if it has
    /// entries, otherwise the first card locator with matches.
    async fn extract(&self, page: &B::Page) -> Result<Vec<CandidateRef>, AppError> {
        let profile = self.profile;
        let detail_url = |id: &str| profile.detail_url(id);

        if let Some(spec) = &profile.listing_payload {
            let source = page.content().await?;
            let from_payload = spec.candidates(&source, detail_url);
            if !from_payload.is_empty() {
                tracing::debug!(count = from_payload.len(), "Using listing payload");
                return Ok(from_payload);
            }
        }

        for locator in &profile.listing.cards {
            let cards = page.outer_html_all(locator).await?;
            if cards.is_empty() {
                continue;
            }
            tracing::debug!(locator = %locator, count = cards.len(), "Using card locator");
            let mut found = Vec::with_capacity(cards.len());
            for html in &cards {
                match profile.listing.card.candidate(html, &profile.base_url, detail_url) {
                    Ok(Some(candidate)) => found.push(candidate),
                    Ok(None) => {}
                    Err(e) => tracing::debug!(error = %e, "Skipping unreadable card"),
                }
            }
            return Ok(found);
        }

        tracing::warn!("No listing cards found");
        Ok(Vec::new())
    }

    /// Adds unseen candidates; returns how many were new.
    fn absorb(&mut self, found: Vec<CandidateRef>) -> usize {
        let before = self.candidates.len();
        for candidate in found {
            if self.seen.insert(candidate.id.clone()) {
                self.candidates.push(candidate);
            }
        }
        self.candidates.len() - before
    }

    fn transition(&mut self, next: FrontierState) {
        tracing::trace!(from = ?self.state, to = ?next, "Frontier transition");
        self.state = next;
    }

    fn finish(mut self, reason: StopReason) -> DiscoveryOutcome {
        self.transition(FrontierState::Stopped(reason));
        tracing::info!(
            reason = %reason,
            pages = self.pages_fetched,
            candidates = self.candidates.len(),
            "Discovery stopped"
        );
        DiscoveryOutcome {
            candidates: self.candidates,
            stop_reason: reason,
            pages_fetched: self.pages_fetched,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::ScraperConfig;
    use crate::connection::ConnectionPath;
    use crate::retry::RetryPolicy;
    use crate::scroll::ScrollConfig;
    use crate::testutil::{
        MockBrowser, SiteEvent, card_list, listing_page, mosaic_page, test_profile,
    };

    fn config(mode: DiscoveryMode, max_pages: u32) -> ScraperConfig {
        ScraperConfig {
            max_pages,
            discovery_mode: mode,
            retry: RetryPolicy::new(1, Duration::from_millis(10), Duration::from_millis(10)),
            scroll: ScrollConfig::disabled(),
            ..ScraperConfig::default()
        }
    }

    fn request() -> SearchRequest {
        SearchRequest::new("rust", "Remote")
    }

    fn page_url(n: u32) -> String {
        test_profile().listing_url(&request(), n, 10)
    }

    async fn discover(browser: &MockBrowser, config: ScraperConfig) -> DiscoveryOutcome {
        let session = Session::new(browser.clone(), config, ConnectionPath::Direct);
        let profile = test_profile();
        DiscoveryFrontier::new(&session, &profile).run(&request()).await
    }

    fn ids(outcome: &DiscoveryOutcome) -> Vec<&str> {
        outcome.candidates.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn dedups_across_pages_in_first_seen_order() {
        let browser = MockBrowser::new()
            .with_page(&page_url(0), &listing_page(&card_list(&["a", "b", "a"])))
            .with_page(&page_url(1), &listing_page(&card_list(&["b", "c"])))
            .with_page(&page_url(2), &listing_page(&card_list(&["d"])));

        let outcome = discover(&browser, config(DiscoveryMode::AddressRewrite, 3)).await;
        assert_eq!(ids(&outcome), vec!["a", "b", "c", "d"]);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.pages_fetched, 3);

        // Same listings, same result.
        let again = discover(&browser, config(DiscoveryMode::AddressRewrite, 3)).await;
        assert_eq!(again, outcome);
    }

    #[tokio::test]
    async fn converges_when_page_repeats() {
        let cards = listing_page(&card_list(&["a", "b"]));
        let browser = MockBrowser::new()
            .with_page(&page_url(0), &cards)
            .with_page(&page_url(1), &cards)
            .with_page(&page_url(2), &listing_page(&card_list(&["z"])));

        let outcome = discover(&browser, config(DiscoveryMode::AddressRewrite, 5)).await;
        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert_eq!(ids(&outcome), vec!["a", "b"]);
        assert_eq!(browser.visits(&page_url(2)), 0);
    }

    #[tokio::test]
    async fn payload_is_preferred_over_cards() {
        let html = mosaic_page(&["p1", "p2"], &card_list(&["dom1"]));
        let browser = MockBrowser::new().with_page(&page_url(0), &html);

        let outcome = discover(&browser, config(DiscoveryMode::AddressRewrite, 1)).await;
        assert_eq!(ids(&outcome), vec!["p1", "p2"]);
        assert_eq!(outcome.candidates[0].url, "https://jobs.example.com/viewjob?jk=p1");
    }

    #[tokio::test]
    async fn challenge_stops_with_partial_results() {
        let browser = MockBrowser::new()
            .with_page(&page_url(0), &listing_page(&card_list(&["a"])))
            .with_page(&page_url(1), "<html><body><div id=\"px-captcha\"></div></body></html>");

        let outcome = discover(&browser, config(DiscoveryMode::AddressRewrite, 5)).await;
        assert_eq!(outcome.stop_reason, StopReason::Blocked);
        assert_eq!(ids(&outcome), vec!["a"]);
        assert_eq!(outcome.pages_fetched, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_fault_keeps_partial_results() {
        let browser = MockBrowser::new()
            .with_page(&page_url(0), &listing_page(&card_list(&["a", "b"])))
            .with_page(&page_url(1), &listing_page(&card_list(&["c"])))
            .fail_navigation(&page_url(1), u32::MAX);

        let outcome = discover(&browser, config(DiscoveryMode::AddressRewrite, 5)).await;
        assert_eq!(outcome.stop_reason, StopReason::Faulted);
        assert_eq!(ids(&outcome), vec!["a", "b"]);
        // Initial attempt plus one retry.
        assert_eq!(browser.visits(&page_url(1)), 2);
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test]
    async fn listing_page_is_closed() {
        let browser = MockBrowser::new().with_page(&page_url(0), &listing_page(&card_list(&["a"])));
        discover(&browser, config(DiscoveryMode::AddressRewrite, 1)).await;
        assert_eq!(browser.opened(), 1);
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn click_driven_traversal() {
        let profile = test_profile();
        let home = profile.home_url.clone();
        let results_1 = "https://jobs.example.com/jobs?click=1";
        let results_2 = "https://jobs.example.com/jobs?click=2";
        let next = r##"<a id="next" href="#">Next</a>"##;

        let browser = MockBrowser::new()
            .with_page(
                &home,
                r#"<html><body><input id="what"><input id="where"><button id="go">Find</button></body></html>"#,
            )
            .with_page(results_1, &listing_page(&format!("{}{next}", card_list(&["a", "b"]))))
            .with_page(results_2, &listing_page(&card_list(&["c"])))
            .on_click(&home, "#go", results_1)
            .on_click(results_1, "#next", results_2);

        let outcome = discover(&browser, config(DiscoveryMode::ClickDriven, 5)).await;
        assert_eq!(ids(&outcome), vec!["a", "b", "c"]);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(browser.visits(&page_url(0)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn click_driven_missing_search_form_faults() {
        let profile = test_profile();
        let browser = MockBrowser::new().with_page(&profile.home_url, "<html><body></body></html>");
        let outcome = discover(&browser, config(DiscoveryMode::ClickDriven, 5)).await;
        assert_eq!(outcome.stop_reason, StopReason::Faulted);
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.pages_fetched, 0);
    }

    #[tokio::test]
    async fn concurrent_discoveries_share_one_listing_slot() {
        let profile = test_profile();
        let rust = SearchRequest::new("rust", "Remote");
        let go = SearchRequest::new("go", "Remote");
        let rust_url = profile.listing_url(&rust, 0, 10);
        let go_url = profile.listing_url(&go, 0, 10);
        let browser = MockBrowser::new()
            .with_page(&rust_url, &listing_page(&card_list(&["r1", "r2"])))
            .with_page(&go_url, &listing_page(&card_list(&["g1"])));
        let session = Session::new(
            browser.clone(),
            config(DiscoveryMode::AddressRewrite, 1),
            ConnectionPath::Direct,
        );

        let (first, second) = tokio::join!(
            DiscoveryFrontier::new(&session, &profile).run(&rust),
            DiscoveryFrontier::new(&session, &profile).run(&go),
        );

        assert_eq!(ids(&first), vec!["r1", "r2"]);
        assert_eq!(ids(&second), vec!["g1"]);
        assert_eq!(browser.peak_open_pages(), 1);

        let log = browser.log();
        let first_closed = log
            .iter()
            .position(|e| *e == SiteEvent::Closed(1))
            .unwrap();
        let second_goto = log
            .iter()
            .position(|e| *e == SiteEvent::Goto(2, go_url.clone()))
            .unwrap();
        assert!(first_closed < second_goto, "listing traversals overlapped: {log:?}");
        assert_eq!(
            log,
            vec![
                SiteEvent::Opened(1),
                SiteEvent::Goto(1, rust_url.clone()),
                SiteEvent::Closed(1),
                SiteEvent::Opened(2),
                SiteEvent::Goto(2, go_url.clone()),
                SiteEvent::Closed(2),
            ]
        );
    }
}
