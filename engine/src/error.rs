use shared::models::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP error: {source}")]
    HttpError {
        #[from]
        source: reqwest::Error,
    },

    #[error("Market data API returned {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Malformed kline: {0}")]
    MalformedKline(String),

    #[error("Fetch timed out after {0} s")]
    FetchTimeout(u64),

    #[error("Fetch task aborted: {0}")]
    FetchAborted(String),

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid market data: {source}")]
    ModelError {
        #[from]
        source: ModelError,
    },

    #[error("Series '{series}' is misaligned: {reason}")]
    AlignmentError { series: String, reason: String },
}

impl EngineError {
    /// Errors the pipeline recovers from by keeping the last published state.
    pub fn is_fetch_failure(&self) -> bool {
        match self {
            EngineError::HttpError { .. }
            | EngineError::ApiError { .. }
            | EngineError::MalformedKline(_)
            | EngineError::FetchTimeout(_)
            | EngineError::FetchAborted(_)
            | EngineError::CsvSystemError { .. }
            | EngineError::IoError { .. }
            | EngineError::JsonError { .. } => true,
            // A bad candle in a payload is a malformed response, except an
            // unknown timeframe which can only come from configuration.
            EngineError::ModelError { source } => {
                !matches!(source, ModelError::UnknownTimeframe(_))
            }
            EngineError::ConfigError(_) | EngineError::AlignmentError { .. } => false,
        }
    }
}
