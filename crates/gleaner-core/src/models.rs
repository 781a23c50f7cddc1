use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every placeholder value produced when no source fills a field.
pub const SENTINEL_PREFIX: &str = "unknown-";

/// Fields resolved by the extraction fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Title,
    Organization,
    Locality,
    Description,
    Compensation,
    PostedAt,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Title => "title",
            Field::Organization => "organization",
            Field::Locality => "locality",
            Field::Description => "description",
            Field::Compensation => "compensation",
            Field::PostedAt => "posted-at",
        }
    }

    /// Placeholder for this field, e.g. `unknown-title`.
    pub fn sentinel(&self) -> String {
        format!("{SENTINEL_PREFIX}{}", self.as_str())
    }

    /// Returns true if `value` is exactly this field's placeholder.
    pub fn is_sentinel(&self, value: &str) -> bool {
        value
            .strip_prefix(SENTINEL_PREFIX)
            .is_some_and(|rest| rest == self.as_str())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized listing extracted from a detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Source-assigned stable identifier.
    pub id: String,
    pub title: String,
    pub organization: String,
    pub locality: String,
    pub description: String,
    /// Canonical detail URL.
    pub url: String,
    /// Opaque compensation text, e.g. `"$50,000 - $80,000"`.
    pub compensation: Option<String>,
    /// Posting timestamp exactly as published by the source.
    pub posted_at: Option<String>,
    /// Adapter tag, e.g. `"indeed"`.
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

impl ItemRecord {
    /// Rejects records whose id or title are placeholders.
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.id.trim().is_empty() || Field::Id.is_sentinel(&self.id) {
            return Err(crate::error::AppError::ValidationError(format!(
                "missing natural id for {}",
                self.url
            )));
        }
        if self.title.trim().is_empty() || Field::Title.is_sentinel(&self.title) {
            return Err(crate::error::AppError::ValidationError(format!(
                "missing title for {}",
                self.url
            )));
        }
        Ok(())
    }
}

/// A listing discovered during traversal but not yet extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRef {
    pub id: String,
    pub url: String,
    /// Title seen on the listing card, if any. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
}

impl CandidateRef {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: None,
            organization: None,
            locality: None,
        }
    }
}

/// What to search for on the listing surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query, e.g. `"python developer"`.
    pub query: String,
    /// Free-text locality, e.g. `"Remote"`.
    pub locality: String,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, locality: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            locality: locality.into(),
        }
    }
}
