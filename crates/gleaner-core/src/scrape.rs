use std::collections::BTreeMap;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::batch::{BatchExecutor, BatchStats, extract_loaded};
use crate::error::AppError;
use crate::frontier::StopReason;
use crate::models::{CandidateRef, ItemRecord, SearchRequest};
use crate::session::Session;
use crate::traits::{Browser, ListingSource, Page};

/// Summary of one search run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub request: SearchRequest,
    pub source: String,
    pub stop_reason: StopReason,
    pub pages_fetched: u32,
    pub candidates: usize,
    pub batches: Vec<BatchStats>,
    pub failures: BTreeMap<&'static str, usize>,
    pub records: Vec<ItemRecord>,
}

/// Orchestrates a search: discover → batch extract → validated records.
///
/// Generic over the automation driver and the listing source so the whole
/// pipeline runs against mocks in tests.
pub struct ScrapeService<B: Browser, S: ListingSource> {
    session: Session<B>,
    source: S,
}

impl<B: Browser, S: ListingSource> ScrapeService<B, S> {
    pub fn new(session: Session<B>, source: S) -> Self {
        Self { session, source }
    }

    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs discovery then detail extraction for `request`.
    ///
    /// Partial discovery is not an error: whatever was found before a stop
    /// is extracted.
    pub async fn run(&self, request: &SearchRequest) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, source = %self.source.tag());
        self.run_inner(run_id, request).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, request: &SearchRequest) -> RunReport {
        let discovery = self.source.discover(&self.session, request).await;
        tracing::info!(
            candidates = discovery.candidates.len(),
            stop_reason = %discovery.stop_reason,
            pages = discovery.pages_fetched,
            "Discovery complete"
        );

        let batch = BatchExecutor::new(&self.session, &self.source)
            .run(&discovery.candidates)
            .await;

        RunReport {
            run_id,
            request: request.clone(),
            source: self.source.tag().to_string(),
            stop_reason: discovery.stop_reason,
            pages_fetched: discovery.pages_fetched,
            candidates: discovery.candidates.len(),
            batches: batch.batches,
            failures: batch.failures,
            records: batch.records,
        }
    }

    /// Extracts a single detail page outside of a search. The page is loaded
    /// and checked exactly as a batch item would be.
    pub async fn extract_one(&self, target: &CandidateRef) -> Result<ItemRecord, AppError> {
        let _permit = self.session.detail_limiter().acquire().await?;
        let page = self.session.browser().new_page().await?;

        let result = async {
            self.session.load_detail(&page, &target.url).await?;
            extract_loaded(&self.source, &page, target).await
        }
        .await;

        if let Err(e) = page.close().await {
            tracing::warn!(url = %target.url, error = %e, "Failed to close detail page");
        }
        result
    }

    /// Tears down the browser.
    pub async fn shutdown(self) -> Result<(), AppError> {
        self.session.shutdown().await
    }
}
