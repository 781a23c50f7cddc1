use thiserror::Error;

/// Application-wide error types for Gleaner.
#[derive(Error, Debug)]
pub enum AppError {
    /// Navigation to a page failed (DNS, connection reset, bad status page).
    #[error("Navigation error: {0}")]
    NavigationError(String),

    /// The automation driver failed while talking to an open page.
    #[error("Automation error: {0}")]
    AutomationError(String),

    /// Operation timed out at the automation boundary.
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// The page served a bot challenge instead of content.
    #[error("Bot challenge detected at {0}")]
    BotChallenge(String),

    /// A required element was not present on the page.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Extracted data is missing a required field.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The browser could not be launched or shut down.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Only transport, automation and timeout failures qualify. Detected
    /// challenges, validation failures and everything unclassified
    /// propagate on first occurrence.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NavigationError(_) | AppError::AutomationError(_) | AppError::Timeout(_)
        )
    }

    /// Short category label used in logs and batch statistics.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::NavigationError(_) | AppError::AutomationError(_) | AppError::Timeout(_) => {
                "transport"
            }
            AppError::BotChallenge(_) => "blocked",
            AppError::ValidationError(_) => "validation",
            _ => "unclassified",
        }
    }
}
