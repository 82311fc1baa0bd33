use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Source unavailable ({source_id}): {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("Invalid locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
}

impl ExtractError {
    pub fn unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        ExtractError::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_locator(locator: impl Into<String>, reason: impl ToString) -> Self {
        ExtractError::InvalidLocator {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may reasonably retry the same call later.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::SourceUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
