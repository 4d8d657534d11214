use thiserror::Error;

#[derive(Error, Debug)]
pub enum VenueError {
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("session invalid: {0}")]
    SessionInvalid(String),

    #[error("no account found")]
    NoAccount,

    #[error("market not found: {0}")]
    MarketNotFound(u32),

    #[error("receipt error: {0}")]
    ReceiptError(String),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, VenueError>;
