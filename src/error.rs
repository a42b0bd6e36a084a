use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoachError {
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Health sync failed: {0}")]
    HealthSync(String),

    #[error("Food not found: {0}")]
    FoodNotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoachError>;
