//! Field resolution for detail pages.
//!
//! Every field is resolved through a fixed fallback chain:
//!
//! 1. the JSON-LD `JobPosting` field, when present (wins outright);
//! 2. ordered DOM locators, first non-empty trimmed text;
//! 3. compensation only: currency-aware patterns over the page text.
//!
//! String fields nothing could fill become `unknown-<field>`. Description
//! may stay empty; compensation and posting time are `None` when unresolved.

use chrono::Utc;
use regex::Regex;
use url::Url;

use crate::error::AppError;
use crate::models::{CandidateRef, Field, ItemRecord};
use crate::payload::JobPosting;
use crate::traits::{Cleaner, Page};

/// Ordered DOM locators per field.
#[derive(Debug, Clone, Default)]
pub struct DetailLocators {
    pub title: Vec<String>,
    pub organization: Vec<String>,
    pub locality: Vec<String>,
    pub description: Vec<String>,
    pub compensation: Vec<String>,
    pub posted_at: Vec<String>,
    /// JSON-LD script blocks.
    pub json_ld: String,
}

impl DetailLocators {
    fn for_field(&self, field: Field) -> &[String] {
        match field {
            Field::Title => &self.title,
            Field::Organization => &self.organization,
            Field::Locality => &self.locality,
            Field::Description => &self.description,
            Field::Compensation => &self.compensation,
            Field::PostedAt => &self.posted_at,
            Field::Id => &[],
        }
    }
}

/// Fields resolved from one detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub title: String,
    pub organization: String,
    pub locality: String,
    pub description: String,
    pub compensation: Option<String>,
    pub posted_at: Option<String>,
}

/// Resolves detail pages into [`ItemRecord`]s.
#[derive(Debug, Clone)]
pub struct Resolver<C: Cleaner> {
    locators: DetailLocators,
    compensation_patterns: Vec<Regex>,
    /// Query parameter carrying the natural id in detail URLs.
    id_param: String,
    cleaner: C,
}

impl<C: Cleaner> Resolver<C> {
    pub fn new(
        locators: DetailLocators,
        compensation_patterns: &[&str],
        id_param: impl Into<String>,
        cleaner: C,
    ) -> Result<Self, AppError> {
        let compensation_patterns = compensation_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    AppError::ConfigError(format!("Invalid compensation pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            locators,
            compensation_patterns,
            id_param: id_param.into(),
            cleaner,
        })
    }

    pub fn locators(&self) -> &DetailLocators {
        &self.locators
    }

    /// Resolves every field. Only page faults are errors.
    pub async fn resolve<P: Page>(&self, page: &P) -> Result<Resolved, AppError> {
        let blocks = page.texts(&self.locators.json_ld).await?;
        let posting = JobPosting::find(&blocks);
        if posting.is_none() {
            tracing::debug!(
                blocks = blocks.len(),
                "No JobPosting in JSON-LD, using DOM locators"
            );
        }
        let posting = posting.as_ref();

        let title = self
            .required(page, Field::Title, posting.and_then(JobPosting::title))
            .await?;
        let organization = self
            .required(page, Field::Organization, posting.and_then(JobPosting::organization))
            .await?;
        let locality = self
            .required(page, Field::Locality, posting.and_then(JobPosting::locality))
            .await?;

        let description = match posting.and_then(JobPosting::description_html) {
            Some(html) => match self.cleaner.clean(&html) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Description cleanup failed, keeping raw text");
                    html
                }
            },
            None => self
                .dom_text(page, Field::Description)
                .await?
                .unwrap_or_default(),
        };

        let compensation = match posting.and_then(JobPosting::compensation) {
            Some(c) => Some(c),
            None => match self.dom_text(page, Field::Compensation).await? {
                Some(c) => Some(c),
                None => self.scan_compensation(page).await?,
            },
        };

        let posted_at = match posting.and_then(JobPosting::posted_at) {
            Some(p) => Some(p),
            None => self.dom_text(page, Field::PostedAt).await?,
        };

        Ok(Resolved {
            title,
            organization,
            locality,
            description,
            compensation,
            posted_at,
        })
    }

    /// Resolves the page into a validated record for `target`.
    ///
    /// Fails with [`AppError::ValidationError`] when the id or title is a
    /// placeholder.
    pub async fn record<P: Page>(
        &self,
        page: &P,
        target: &CandidateRef,
        source: &str,
    ) -> Result<ItemRecord, AppError> {
        let resolved = self.resolve(page).await?;
        let id = id_from_url(&target.url, &self.id_param)
            .or_else(|| Some(target.id.trim().to_string()).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| Field::Id.sentinel());

        let record = ItemRecord {
            id,
            title: resolved.title,
            organization: resolved.organization,
            locality: resolved.locality,
            description: resolved.description,
            url: target.url.clone(),
            compensation: resolved.compensation,
            posted_at: resolved.posted_at,
            source: source.to_string(),
            scraped_at: Utc::now(),
        };
        record.validate()?;
        Ok(record)
    }

    async fn required<P: Page>(
        &self,
        page: &P,
        field: Field,
        structured: Option<String>,
    ) -> Result<String, AppError> {
        if let Some(value) = structured {
            return Ok(value);
        }
        Ok(self
            .dom_text(page, field)
            .await?
            .unwrap_or_else(|| field.sentinel()))
    }

    async fn dom_text<P: Page>(&self, page: &P, field: Field) -> Result<Option<String>, AppError> {
        first_text(page, self.locators.for_field(field)).await
    }

    async fn scan_compensation<P: Page>(&self, page: &P) -> Result<Option<String>, AppError> {
        if self.compensation_patterns.is_empty() {
            return Ok(None);
        }
        let body = page.text("body").await?.unwrap_or_default();
        Ok(self
            .compensation_patterns
            .iter()
            .find_map(|re| re.find(&body))
            .map(|m| m.as_str().trim().to_string()))
    }
}

/// First locator whose first match has non-empty trimmed text.
///
/// A locator that cannot be evaluated is skipped; only transport and
/// automation faults end the chain.
pub async fn first_text<P: Page>(
    page: &P,
    locators: &[String],
) -> Result<Option<String>, AppError> {
    for locator in locators {
        let text = match page.text(locator).await {
            Ok(text) => text,
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                tracing::debug!(locator = %locator, error = %e, "Skipping locator");
                continue;
            }
        };
        if let Some(text) = text {
            let text = text.trim();
            if !text.is_empty() {
                return Ok(Some(text.to_string()));
            }
        }
    }
    Ok(None)
}

/// Value of query parameter `param` in `url`, if present and non-empty.
pub fn id_from_url(url: &str, param: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == param)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
