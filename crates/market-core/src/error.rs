use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    /// Provider returned nothing (or only invalid rows) for the requested range.
    #[error("No data available: {0}")]
    DataUnavailable(String),

    /// Network, TLS, HTTP status or decode failure talking to a provider.
    #[error("Transport error (status {status:?}): {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Provider rows did not match the expected shape.
    #[error("Invalid data: {0}")]
    Validation(String),

    /// Not enough history to compute the requested indicators.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Database error: {0}")]
    Persistence(String),

    /// A configuration could not be parsed or fingerprinted. Fatal for a run.
    #[error("Config resolution error: {0}")]
    ConfigResolution(String),

    #[error("Cancelled")]
    Cancelled,
}

impl MarketError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        MarketError::Transport {
            status,
            message: message.into(),
        }
    }

    /// Transient transport failures are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            MarketError::Transport { status, .. } => {
                matches!(status, None | Some(403) | Some(429) | Some(503))
            }
            _ => false,
        }
    }
}
