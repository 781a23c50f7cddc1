//! Progressive scrolling to make lazily rendered content load.

use std::time::Duration;

use crate::error::AppError;
use crate::traits::Page;

/// Tuning for [`trigger_lazy_load`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollConfig {
    pub step_px: u32,
    pub step_pause: Duration,
    /// Step ceiling; zero disables scrolling.
    pub max_steps: u32,
    /// Distance from the bottom at which the document height is re-checked.
    pub bottom_margin: f64,
    /// Wait before re-reading the height near the bottom.
    pub growth_wait: Duration,
    pub reset_pause: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step_px: 300,
            step_pause: Duration::from_millis(300),
            max_steps: 50,
            bottom_margin: 100.0,
            growth_wait: Duration::from_millis(1_000),
            reset_pause: Duration::from_millis(500),
        }
    }
}

impl ScrollConfig {
    pub fn disabled() -> Self {
        Self {
            max_steps: 0,
            ..Self::default()
        }
    }
}

pub(crate) const HEIGHT_SCRIPT: &str = "document.body.scrollHeight";
pub(crate) const BOTTOM_SCRIPT: &str = "window.scrollY + window.innerHeight";

/// Scrolls down in steps until the document stops growing or the step
/// ceiling is hit, then returns to the top. Failures are logged, never
/// propagated.
pub async fn trigger_lazy_load<P: Page>(page: &P, config: &ScrollConfig) {
    if config.max_steps == 0 {
        return;
    }
    match scroll(page, config).await {
        Ok(steps) => tracing::debug!(steps, "Lazy-load scroll complete"),
        Err(e) => tracing::warn!(error = %e, "Lazy-load scroll failed"),
    }
}

async fn scroll<P: Page>(page: &P, config: &ScrollConfig) -> Result<u32, AppError> {
    let mut height = read_number(page, HEIGHT_SCRIPT).await?;
    let mut steps = 0;

    while steps < config.max_steps {
        page.evaluate(&format!("window.scrollBy(0, {})", config.step_px))
            .await?;
        steps += 1;
        tokio::time::sleep(config.step_pause).await;

        let bottom = read_number(page, BOTTOM_SCRIPT).await?;
        if bottom >= height - config.bottom_margin {
            tokio::time::sleep(config.growth_wait).await;
            let grown = read_number(page, HEIGHT_SCRIPT).await?;
            if grown <= height {
                break;
            }
            height = grown;
        }
    }

    page.evaluate("window.scrollTo(0, 0)").await?;
    tokio::time::sleep(config.reset_pause).await;
    Ok(steps)
}

async fn read_number<P: Page>(page: &P, script: &str) -> Result<f64, AppError> {
    let value = page.evaluate(script).await?;
    value
        .as_f64()
        .ok_or_else(|| AppError::AutomationError(format!("'{script}' returned {value}")))
}
