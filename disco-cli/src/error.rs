use thiserror::Error;

/// Result type of the CLI.
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Discovery error: {0}")]
    Discovery(#[from] service_discovery::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Some hosts could not be discovered; details were already printed.
    #[error("Discovery failed on {0} host(s)")]
    PartialFailure(usize),
}
