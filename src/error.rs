use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Insufficient data: need {required} bars, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Empty series")]
    EmptySeries,

    #[error("Invalid period: {0}")]
    InvalidPeriod(usize),

    #[error("Invalid bar: {0}")]
    InvalidBar(String),

    #[error("Unordered series: timestamp {timestamp} at index {index} does not follow its predecessor")]
    UnorderedSeries { index: usize, timestamp: i64 },

    #[error("Invalid levels: need 2 support and 1 resistance, got {support} and {resistance}")]
    InvalidLevels { support: usize, resistance: usize },

    #[error("No data for {symbol} ({timeframe})")]
    NoData { symbol: String, timeframe: String },

    #[error("Unsupported timeframe: {0}")]
    UnsupportedTimeframe(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Tick hub is already running")]
    AlreadyRunning,

    #[error("No forecaster configured")]
    NoForecaster,

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl AppError {
    /// Shorthand for a lookback failure.
    pub fn insufficient(required: usize, available: usize) -> Self {
        AppError::InsufficientData {
            required,
            available,
        }
    }

    /// Whether the hub should treat this error as a lost connection.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_) | AppError::WebSocket(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
