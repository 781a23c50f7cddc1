//! Declarative site profiles and the listing source driven by them.
//!
//! A [`SiteProfile`] bundles everything that varies between listing
//! sites: addresses, locators, payload patterns and challenge markers.
//! [`ProfileSource`] turns a profile into a [`ListingSource`].

use url::Url;

use crate::cards::CardLocators;
use crate::challenge::ChallengeDetector;
use crate::error::AppError;
use crate::frontier::{DiscoveryFrontier, DiscoveryOutcome};
use crate::models::{CandidateRef, ItemRecord, SearchRequest};
use crate::payload::ListingPayloadSpec;
use crate::resolver::{DetailLocators, Resolver};
use crate::session::Session;
use crate::traits::{Browser, Cleaner, ListingSource, Page};

/// Builds listing addresses from a search and a page index.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub path: String,
    pub query_param: String,
    pub locality_param: String,
    /// Receives `page * page_size`.
    pub offset_param: String,
    /// Fixed parameters placed between the locality and the offset.
    pub fixed: Vec<(String, String)>,
}

impl QueryBuilder {
    pub fn build(&self, base: &Url, request: &SearchRequest, page: u32, page_size: u32) -> String {
        let mut url = base.clone();
        url.set_path(&self.path);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            pairs.append_pair(&self.query_param, &request.query);
            pairs.append_pair(&self.locality_param, &request.locality);
            for (k, v) in &self.fixed {
                pairs.append_pair(k, v);
            }
            let offset = u64::from(page) * u64::from(page_size);
            pairs.append_pair(&self.offset_param, &offset.to_string());
        }
        url.to_string()
    }
}

/// Locators for listing pages.
#[derive(Debug, Clone)]
pub struct ListingLocators {
    /// Card containers, tried in order; the first with matches wins.
    pub cards: Vec<String>,
    pub card: CardLocators,
    pub next_page: String,
    pub query_input: String,
    pub locality_input: String,
    pub search_button: String,
}

/// Everything site-specific about one listing source.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Tag stamped on records, e.g. `"indeed"`.
    pub tag: String,
    pub base_url: Url,
    /// Entry point for click-driven discovery.
    pub home_url: String,
    pub query: QueryBuilder,
    /// Path of canonical detail pages, e.g. `/viewjob`.
    pub detail_path: String,
    /// Query parameter carrying the natural id on detail pages.
    pub id_param: String,
    pub listing: ListingLocators,
    pub listing_payload: Option<ListingPayloadSpec>,
    pub listing_detector: ChallengeDetector,
    pub detail_detector: ChallengeDetector,
    pub detail: DetailLocators,
    pub compensation_patterns: Vec<String>,
}

impl SiteProfile {
    pub fn listing_url(&self, request: &SearchRequest, page: u32, page_size: u32) -> String {
        self.query.build(&self.base_url, request, page, page_size)
    }

    /// Canonical detail address for a natural id.
    pub fn detail_url(&self, id: &str) -> String {
        let mut url = self.base_url.clone();
        url.set_path(&self.detail_path);
        url.query_pairs_mut().clear().append_pair(&self.id_param, id);
        url.to_string()
    }
}

/// [`ListingSource`] driven entirely by a [`SiteProfile`].
pub struct ProfileSource<C: Cleaner> {
    profile: SiteProfile,
    resolver: Resolver<C>,
}

impl<C: Cleaner> ProfileSource<C> {
    pub fn new(profile: SiteProfile, cleaner: C) -> Result<Self, AppError> {
        let patterns: Vec<&str> = profile
            .compensation_patterns
            .iter()
            .map(String::as_str)
            .collect();
        let resolver = Resolver::new(
            profile.detail.clone(),
            &patterns,
            profile.id_param.clone(),
            cleaner,
        )?;
        Ok(Self { profile, resolver })
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    pub fn resolver(&self) -> &Resolver<C> {
        &self.resolver
    }
}

impl<C: Cleaner> ListingSource for ProfileSource<C> {
    fn tag(&self) -> &str {
        &self.profile.tag
    }

    fn detail_detector(&self) -> &ChallengeDetector {
        &self.profile.detail_detector
    }

    async fn discover<B: Browser>(
        &self,
        session: &Session<B>,
        request: &SearchRequest,
    ) -> DiscoveryOutcome {
        DiscoveryFrontier::new(session, &self.profile).run(request).await
    }

    async fn extract_one<P: Page>(
        &self,
        page: &P,
        target: &CandidateRef,
    ) -> Result<ItemRecord, AppError> {
        self.resolver.record(page, target, &self.profile.tag).await
    }
}
