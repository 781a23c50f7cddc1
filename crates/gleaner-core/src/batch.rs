//! Bounded fan-out over detail pages.
//!
//! Targets are processed in sequential batches of size `C`. Within a batch
//! every page is opened, then all are navigated concurrently, then all are
//! extracted, then all are closed. Per-item failures are logged, counted
//! by category and skipped; they never affect other items.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{CandidateRef, ItemRecord};
use crate::rate_limit::RateLimitPermit;
use crate::session::Session;
use crate::traits::{Browser, ListingSource, Page};

/// Outcome counts for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub index: usize,
    pub size: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub records: Vec<ItemRecord>,
    pub batches: Vec<BatchStats>,
    /// Failure counts keyed by [`AppError::category`].
    pub failures: BTreeMap<&'static str, usize>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    fn record_failure(&mut self, target: &CandidateRef, error: &AppError) {
        match error {
            AppError::ValidationError(_) => {
                tracing::warn!(id = %target.id, error = %error, "Discarding record");
            }
            _ => {
                tracing::error!(
                    id = %target.id,
                    url = %target.url,
                    category = error.category(),
                    error = %error,
                    "Detail extraction failed"
                );
            }
        }
        *self.failures.entry(error.category()).or_default() += 1;
    }
}

struct OpenPage<'t, P> {
    target: &'t CandidateRef,
    page: P,
    _permit: RateLimitPermit,
}

/// Challenge check, then extraction, on a loaded detail page.
pub(crate) async fn extract_loaded<S: ListingSource, P: Page>(
    source: &S,
    page: &P,
    target: &CandidateRef,
) -> Result<ItemRecord, AppError> {
    if source.detail_detector().is_blocked(page).await {
        return Err(AppError::BotChallenge(target.url.clone()));
    }
    source.extract_one(page, target).await
}

/// Runs detail extraction for a list of targets.
pub struct BatchExecutor<'a, B: Browser, S: ListingSource> {
    session: &'a Session<B>,
    source: &'a S,
    concurrency: usize,
}

impl<'a, B: Browser, S: ListingSource> BatchExecutor<'a, B, S> {
    pub fn new(session: &'a Session<B>, source: &'a S) -> Self {
        let mut c = session.config().max_concurrent_pages;
        if session.connection().is_rate_limited_relay() {
            tracing::warn!(
                connection = %session.connection(),
                "Metered relay in use, forcing detail concurrency to 1"
            );
            c = 1;
        }
        Self {
            session,
            source,
            concurrency: c.min(session.detail_limiter().capacity()).max(1),
        }
    }

    /// Effective batch size: configured concurrency, forced to one on a
    /// metered relay, never above the detail gate and never below one.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run(&self, targets: &[CandidateRef]) -> BatchReport {
        let c = self.concurrency();
        let mut report = BatchReport::default();
        tracing::info!(
            targets = targets.len(),
            concurrency = c,
            "Starting detail extraction"
        );

        for (index, batch) in targets.chunks(c).enumerate() {
            let stats = self.run_batch(index, batch, &mut report).await;
            tracing::info!(
                batch = index,
                size = stats.size,
                succeeded = stats.succeeded,
                failed = stats.failed,
                "Batch complete"
            );
            report.batches.push(stats);
        }

        tracing::info!(
            records = report.records.len(),
            failed = report.failed(),
            "Detail extraction finished"
        );
        report
    }

    async fn run_batch(
        &self,
        index: usize,
        batch: &[CandidateRef],
        report: &mut BatchReport,
    ) -> BatchStats {
        let mut stats = BatchStats {
            index,
            size: batch.len(),
            succeeded: 0,
            failed: 0,
        };

        // Open.
        let opened = join_all(batch.iter().map(|target| self.open(target))).await;
        let mut pages = Vec::with_capacity(opened.len());
        for (target, result) in batch.iter().zip(opened) {
            match result {
                Ok(open) => pages.push(open),
                Err(e) => {
                    report.record_failure(target, &e);
                    stats.failed += 1;
                }
            }
        }

        // Navigate.
        let navigated = join_all(pages.iter().map(|open| self.navigate(open))).await;

        // Extract.
        let extracted = join_all(pages.iter().zip(navigated).map(|(open, nav)| async move {
            nav?;
            self.extract(open).await
        }))
        .await;

        for (open, result) in pages.iter().zip(extracted) {
            match result {
                Ok(record) => {
                    tracing::debug!(id = %record.id, title = %record.title, "Extracted record");
                    report.records.push(record);
                    stats.succeeded += 1;
                }
                Err(e) => {
                    report.record_failure(open.target, &e);
                    stats.failed += 1;
                }
            }
        }

        // Close.
        for open in pages {
            let OpenPage { target, page, _permit } = open;
            if let Err(e) = page.close().await {
                tracing::warn!(id = %target.id, error = %e, "Failed to close detail page");
            }
        }

        stats
    }

    async fn open<'t>(
        &self,
        target: &'t CandidateRef,
    ) -> Result<OpenPage<'t, B::Page>, AppError> {
        let permit = self.session.detail_limiter().acquire().await?;
        let page = self.session.browser().new_page().await?;
        Ok(OpenPage {
            target,
            page,
            _permit: permit,
        })
    }

    async fn navigate(&self, open: &OpenPage<'_, B::Page>) -> Result<(), AppError> {
        self.session.load_detail(&open.page, &open.target.url).await
    }

    async fn extract(&self, open: &OpenPage<'_, B::Page>) -> Result<ItemRecord, AppError> {
        extract_loaded(self.source, &open.page, open.target).await
    }
}
