pub mod batch;
pub mod cards;
pub mod challenge;
pub mod config;
pub mod connection;
pub mod error;
pub mod frontier;
pub mod human;
pub mod models;
pub mod payload;
pub mod profile;
pub mod rate_limit;
pub mod resolver;
pub mod retry;
pub mod scrape;
pub mod scroll;
pub mod session;
pub mod snapshot;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{BatchExecutor, BatchReport, BatchStats};
pub use challenge::ChallengeDetector;
pub use config::{DiscoveryMode, ScraperConfig};
pub use connection::{ConnectionPath, RelayKind};
pub use error::AppError;
pub use frontier::{DiscoveryFrontier, DiscoveryOutcome, FrontierState, StopReason};
pub use models::{CandidateRef, Field, ItemRecord, SearchRequest};
pub use profile::{ProfileSource, SiteProfile};
pub use rate_limit::{LimiterClass, RateLimiter};
pub use retry::{RetryPolicy, with_retry};
pub use scrape::{RunReport, ScrapeService};
pub use session::Session;
pub use snapshot::HtmlPage;
pub use traits::{Browser, Cleaner, ListingSource, Page};
