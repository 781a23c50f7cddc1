//! Structured payloads embedded in pages.
//!
//! Two kinds are understood:
//!
//! - the listing payload: a JSON object assigned to a script variable in the
//!   listing page source, located with a regex and walked with a JSON pointer;
//! - the detail payload: a schema.org `JobPosting` node in a JSON-LD block.
//!
//! Both are ephemeral views over one page and never persisted.

use regex::Regex;
use serde_json::Value;

use crate::error::AppError;
use crate::models::CandidateRef;

/// Where to find the listing payload and how to read its entries.
#[derive(Debug, Clone)]
pub struct ListingPayloadSpec {
    pattern: Regex,
    results_pointer: String,
    id_key: String,
    title_key: String,
    organization_key: String,
    locality_key: String,
}

impl ListingPayloadSpec {
    /// `pattern` must capture the JSON object in group 1.
    pub fn new(
        pattern: &str,
        results_pointer: impl Into<String>,
        id_key: impl Into<String>,
    ) -> Result<Self, AppError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| AppError::ConfigError(format!("Invalid listing payload pattern: {e}")))?;
        if pattern.captures_len() < 2 {
            return Err(AppError::ConfigError(
                "Listing payload pattern needs a capture group".into(),
            ));
        }
        Ok(Self {
            pattern,
            results_pointer: results_pointer.into(),
            id_key: id_key.into(),
            title_key: "title".into(),
            organization_key: "company".into(),
            locality_key: "formattedLocation".into(),
        })
    }

    /// Overrides the keys read as listing hints.
    pub fn with_hint_keys(
        mut self,
        title: impl Into<String>,
        organization: impl Into<String>,
        locality: impl Into<String>,
    ) -> Self {
        self.title_key = title.into();
        self.organization_key = organization.into();
        self.locality_key = locality.into();
        self
    }

    /// Reads candidates from the page source. Returns an empty list when the
    /// payload is absent or malformed; entries without an id are skipped.
    pub fn candidates<U>(&self, source: &str, detail_url: U) -> Vec<CandidateRef>
    where
        U: Fn(&str) -> String,
    {
        let Some(raw) = self
            .pattern
            .captures(source)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        else {
            return Vec::new();
        };

        let data: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Listing payload is not valid JSON");
                return Vec::new();
            }
        };

        let Some(results) = data.pointer(&self.results_pointer).and_then(Value::as_array) else {
            tracing::debug!(
                pointer = %self.results_pointer,
                "Listing payload has no results array"
            );
            return Vec::new();
        };

        results
            .iter()
            .filter_map(|entry| {
                let id = string_at(entry, &self.id_key)?;
                let mut candidate = CandidateRef::new(id.clone(), detail_url(&id));
                candidate.title = string_at(entry, &self.title_key);
                candidate.organization = string_at(entry, &self.organization_key);
                candidate.locality = string_at(entry, &self.locality_key);
                Some(candidate)
            })
            .collect()
    }
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A schema.org `JobPosting` node read from JSON-LD.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPosting(Value);

impl JobPosting {
    /// Scans JSON-LD blocks in order; the first `JobPosting` node wins.
    ///
    /// A block may hold one object, an array of objects or an `@graph`.
    /// Blocks that fail to parse are skipped.
    pub fn find<S: AsRef<str>>(blocks: &[S]) -> Option<Self> {
        blocks.iter().find_map(|block| {
            let value: Value = match serde_json::from_str(block.as_ref().trim()) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable JSON-LD block");
                    return None;
                }
            };
            find_posting(value).map(JobPosting)
        })
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn title(&self) -> Option<String> {
        non_empty(self.0.get("title"))
    }

    pub fn organization(&self) -> Option<String> {
        match self.0.get("hiringOrganization")? {
            Value::String(s) => non_empty_str(s),
            org => non_empty(org.get("name")),
        }
    }

    /// `addressLocality, addressRegion` of the first job location.
    pub fn locality(&self) -> Option<String> {
        let location = match self.0.get("jobLocation")? {
            Value::Array(items) => items.first()?,
            other => other,
        };
        let address = location.get("address")?;
        let parts: Vec<String> = ["addressLocality", "addressRegion"]
            .iter()
            .filter_map(|k| non_empty(address.get(*k)))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    /// Raw description, usually HTML.
    pub fn description_html(&self) -> Option<String> {
        non_empty(self.0.get("description"))
    }

    /// `"{cur}{min} - {cur}{max}"`, or `"{cur}{value}"` for a single figure.
    pub fn compensation(&self) -> Option<String> {
        let salary = self.0.get("baseSalary")?;
        let value = salary.get("value")?;
        let currency = value
            .get("currency")
            .or_else(|| salary.get("currency"))
            .and_then(Value::as_str)
            .unwrap_or("");

        let min = value.get("minValue").and_then(scalar);
        let max = value.get("maxValue").and_then(scalar);
        match (min, max) {
            (Some(min), Some(max)) => Some(format!("{currency}{min} - {currency}{max}")),
            _ => value
                .get("value")
                .and_then(scalar)
                .or_else(|| scalar(value))
                .map(|v| format!("{currency}{v}")),
        }
    }

    /// `datePosted` exactly as published.
    pub fn posted_at(&self) -> Option<String> {
        non_empty(self.0.get("datePosted"))
    }
}

fn find_posting(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.into_iter().find_map(find_posting),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                if let Some(found) = find_posting(graph) {
                    return Some(found);
                }
            }
            let value = Value::Object(map);
            is_job_posting(&value).then_some(value)
        }
        _ => None,
    }
}

fn is_job_posting(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).and_then(non_empty_str)
}

fn non_empty_str(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => non_empty_str(s),
        _ => None,
    }
}
