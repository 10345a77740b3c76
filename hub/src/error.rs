use thiserror::Error;

use crate::events::SourceModule;

/// Engine error taxonomy. Nothing here terminates the process during normal
/// operation; only `Config` is treated as fatal, at startup.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("incident {id} not found")]
    NotFound { id: u64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{module} adapter failed: {message}")]
    Adapter {
        module: SourceModule,
        message: String,
    },

    #[error("rule '{rule}' could not match alert: {reason}")]
    RuleMatch { rule: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
