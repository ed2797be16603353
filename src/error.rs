use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("exchange `{0}` is not configured")]
    UnknownExchange(String),
    #[error("unsupported granularity: {0}s")]
    UnsupportedGranularity(i64),
    #[error("invalid candle request: {0}")]
    InvalidRequest(String),
    #[error("{exchange} fetch failed: {message}")]
    Fetch { exchange: String, message: String },
    #[error("request deadline elapsed before all batches completed")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        AppError::Message(msg.into())
    }

    pub fn fetch<E: Into<String>, M: Into<String>>(exchange: E, message: M) -> Self {
        AppError::Fetch {
            exchange: exchange.into(),
            message: message.into(),
        }
    }

    /// True when the shared request deadline fired, as opposed to an upstream rejection.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }

    /// Configuration errors are rejected before any work begins and are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AppError::UnknownExchange(_)
                | AppError::UnsupportedGranularity(_)
                | AppError::InvalidRequest(_)
        )
    }
}
