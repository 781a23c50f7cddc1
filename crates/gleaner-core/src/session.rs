use crate::config::ScraperConfig;
use crate::connection::ConnectionPath;
use crate::error::AppError;
use crate::rate_limit::{LimiterClass, RateLimiter};
use crate::retry::with_retry;
use crate::scroll::trigger_lazy_load;
use crate::traits::{Browser, Page, WaitUntil};

/// Everything one scraping session shares: the driver instance, settings,
/// the two concurrency gates and the resolved connection path.
///
/// Created by the caller around a launched browser and torn down with
/// [`Session::shutdown`].
pub struct Session<B: Browser> {
    browser: B,
    config: ScraperConfig,
    listing: RateLimiter,
    detail: RateLimiter,
    connection: ConnectionPath,
}

impl<B: Browser> Session<B> {
    pub fn new(browser: B, config: ScraperConfig, connection: ConnectionPath) -> Self {
        let listing = RateLimiter::new(LimiterClass::Listing, config.max_concurrent_listing);
        let detail = RateLimiter::new(LimiterClass::Detail, config.max_concurrent_pages);
        tracing::info!(
            listing = listing.capacity(),
            detail = detail.capacity(),
            connection = %connection,
            "Session created"
        );
        Self {
            browser,
            config,
            listing,
            detail,
            connection,
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn listing_limiter(&self) -> &RateLimiter {
        &self.listing
    }

    pub fn detail_limiter(&self) -> &RateLimiter {
        &self.detail
    }

    pub fn connection(&self) -> &ConnectionPath {
        &self.connection
    }

    /// Navigates `page` to `url` under the session's retry policy and
    /// navigation timeout.
    pub async fn goto<P: Page>(&self, page: &P, url: &str) -> Result<(), AppError> {
        let timeout = self.config.navigation_timeout;
        with_retry(&self.config.retry, url, || {
            page.goto(url, WaitUntil::DomContentLoaded, timeout)
        })
        .await
    }

    /// Loads a detail page: navigation, the settle delay, then lazy-load
    /// scrolling.
    pub async fn load_detail<P: Page>(&self, page: &P, url: &str) -> Result<(), AppError> {
        self.goto(page, url).await?;
        tokio::time::sleep(self.config.settle_delay).await;
        trigger_lazy_load(page, &self.config.scroll).await;
        Ok(())
    }

    /// Terminates the browser.
    pub async fn shutdown(self) -> Result<(), AppError> {
        tracing::info!("Shutting down browser");
        self.browser.shutdown().await
    }
}
