use thiserror::Error;

/// Errors surfaced by the market maker binary.
///
/// Everything on the hot path (feed reconnects, orderbook resync, atomic
/// submission failures) is caught and logged by the orchestrator rather than
/// propagated through this type — see [`crate::mm::bot`]. `MakerError`
/// exists for the startup path and the handful of helpers that need to
/// report a typed failure.
#[derive(Debug, Error)]
pub enum MakerError {
    #[error(transparent)]
    Venue(#[from] venue::VenueError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("float parse error: {0}")]
    FloatParse(#[from] std::num::ParseFloatError),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("pong timeout")]
    PongTimeout,

    #[error("stale connection: {0}ms since last message")]
    StaleConnection(u64),

    #[error("market not found: {0}")]
    MarketNotFound(String),

    #[error("account has no associated account id")]
    NoAccount,

    #[error("configuration error: {0}")]
    Config(String),
}
