use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::retry::RetryPolicy;
use crate::scroll::ScrollConfig;

/// How the discovery frontier moves from one listing page to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    /// Navigate to a rewritten listing address for each page index.
    #[default]
    AddressRewrite,
    /// Type the search into the home page and click through result pages.
    ClickDriven,
}

impl DiscoveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMode::AddressRewrite => "address",
            DiscoveryMode::ClickDriven => "click",
        }
    }
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DiscoveryMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "address" | "address-rewrite" | "paginated" => Ok(DiscoveryMode::AddressRewrite),
            "click" | "click-driven" => Ok(DiscoveryMode::ClickDriven),
            other => Err(AppError::ConfigError(format!(
                "Unknown discovery mode '{other}': expected 'address' or 'click'"
            ))),
        }
    }
}

/// Read-only settings consumed by the engine.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Concurrent detail pages (detail limiter capacity).
    pub max_concurrent_pages: usize,
    /// Concurrent listing sessions (listing limiter capacity).
    pub max_concurrent_listing: usize,
    pub retry: RetryPolicy,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    /// Page-count ceiling for one discovery session.
    pub max_pages: u32,
    /// Listing entries per page, used to compute page offsets.
    pub page_size: u32,
    pub discovery_mode: DiscoveryMode,
    /// Pause after each detail navigation before extraction.
    pub settle_delay: Duration,
    pub scroll: ScrollConfig,
    pub headless: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pages: 5,
            max_concurrent_listing: 1,
            retry: RetryPolicy::default(),
            navigation_timeout: Duration::from_millis(30_000),
            selector_timeout: Duration::from_millis(10_000),
            max_pages: 5,
            page_size: 10,
            discovery_mode: DiscoveryMode::default(),
            settle_delay: Duration::from_millis(1_000),
            scroll: ScrollConfig::default(),
            headless: false,
        }
    }
}

impl ScraperConfig {
    /// Read configuration from environment variables, falling back to defaults.
    ///
    /// - `GLEANER_MAX_CONCURRENT_PAGES` (5)
    /// - `GLEANER_MAX_CONCURRENT_LISTING` (1)
    /// - `GLEANER_MAX_RETRIES` (3)
    /// - `GLEANER_RETRY_BASE_DELAY_MS` (5000)
    /// - `GLEANER_RETRY_MAX_DELAY_MS` (10000)
    /// - `GLEANER_NAVIGATION_TIMEOUT_MS` (30000)
    /// - `GLEANER_SELECTOR_TIMEOUT_MS` (10000)
    /// - `GLEANER_MAX_PAGES` (5)
    /// - `GLEANER_PAGE_SIZE` (10)
    /// - `GLEANER_DISCOVERY_MODE` (`address`)
    /// - `GLEANER_HEADLESS` (false)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_concurrent_pages = positive(
            &lookup,
            "GLEANER_MAX_CONCURRENT_PAGES",
            defaults.max_concurrent_pages,
        )?;
        let max_concurrent_listing = positive(
            &lookup,
            "GLEANER_MAX_CONCURRENT_LISTING",
            defaults.max_concurrent_listing,
        )?;
        let max_retries = number(&lookup, "GLEANER_MAX_RETRIES", defaults.retry.max_retries)?;
        let base_delay = Duration::from_millis(number(
            &lookup,
            "GLEANER_RETRY_BASE_DELAY_MS",
            millis(defaults.retry.base_delay),
        )?);
        let max_delay = Duration::from_millis(number(
            &lookup,
            "GLEANER_RETRY_MAX_DELAY_MS",
            millis(defaults.retry.max_delay),
        )?);
        if max_delay < base_delay {
            return Err(AppError::ConfigError(
                "GLEANER_RETRY_MAX_DELAY_MS must not be smaller than GLEANER_RETRY_BASE_DELAY_MS"
                    .into(),
            ));
        }
        let navigation_timeout = Duration::from_millis(positive(
            &lookup,
            "GLEANER_NAVIGATION_TIMEOUT_MS",
            millis(defaults.navigation_timeout),
        )?);
        let selector_timeout = Duration::from_millis(positive(
            &lookup,
            "GLEANER_SELECTOR_TIMEOUT_MS",
            millis(defaults.selector_timeout),
        )?);
        let max_pages = positive(&lookup, "GLEANER_MAX_PAGES", defaults.max_pages)?;
        let page_size = positive(&lookup, "GLEANER_PAGE_SIZE", defaults.page_size)?;
        let discovery_mode = match lookup("GLEANER_DISCOVERY_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.discovery_mode,
        };
        let headless = match lookup("GLEANER_HEADLESS") {
            Some(raw) => parse_bool("GLEANER_HEADLESS", &raw)?,
            None => defaults.headless,
        };

        Ok(Self {
            max_concurrent_pages,
            max_concurrent_listing,
            retry: RetryPolicy::new(max_retries, base_delay, max_delay),
            navigation_timeout,
            selector_timeout,
            max_pages,
            page_size,
            discovery_mode,
            headless,
            ..defaults
        })
    }
}

/// Parses `key` straight into the target width, so out-of-range values are
/// rejected instead of truncated.
fn number<T, L>(lookup: &L, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {key} '{raw}': must be a non-negative integer in range"
            ))
        }),
    }
}

fn positive<T, L>(lookup: &L, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr + Default + PartialEq,
    L: Fn(&str) -> Option<String>,
{
    let value = number(lookup, key, default)?;
    if value == T::default() {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(value)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::ConfigError(format!(
            "Invalid {key} '{raw}': expected true or false"
        ))),
    }
}
