use crate::error::AppError;
use crate::traits::Page;

/// Classifies a loaded page as a bot challenge or normal content.
///
/// A page is blocked when any challenge widget is present, or when the
/// expected results container is missing and the page text contains one of
/// the blocking phrases. Blocking phrases alone never trigger: sites print
/// "access denied" in footers and help text.
#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    widget_locators: Vec<String>,
    results_container: String,
    phrases: Vec<String>,
}

impl ChallengeDetector {
    pub fn new<W, P>(widget_locators: W, results_container: impl Into<String>, phrases: P) -> Self
    where
        W: IntoIterator,
        W::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            widget_locators: widget_locators.into_iter().map(Into::into).collect(),
            results_container: results_container.into(),
            phrases: phrases
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }

    pub fn results_container(&self) -> &str {
        &self.results_container
    }

    /// Returns true if the page is a challenge. Detector faults count as
    /// not blocked.
    pub async fn is_blocked<P: Page>(&self, page: &P) -> bool {
        match self.classify(page).await {
            Ok(blocked) => blocked,
            Err(e) => {
                tracing::debug!(error = %e, "Challenge detection failed, assuming page is normal");
                false
            }
        }
    }

    async fn classify<P: Page>(&self, page: &P) -> Result<bool, AppError> {
        for locator in &self.widget_locators {
            if page.count(locator).await? > 0 {
                tracing::warn!(widget = %locator, "Challenge widget present");
                return Ok(true);
            }
        }

        if page.count(&self.results_container).await? > 0 {
            return Ok(false);
        }

        let body = page.text("body").await?.unwrap_or_default().to_lowercase();
        if let Some(phrase) = self.phrases.iter().find(|p| body.contains(p.as_str())) {
            tracing::warn!(phrase = %phrase, "Blocking phrase on page without results");
            return Ok(true);
        }
        Ok(false)
    }
}
