//! Forecast-specific error types.

use cityweather_core::NetworkError;
use thiserror::Error;

/// Why a response body could not become a [`crate::Forecast`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("malformed-xml: {0}")]
    MalformedXml(String),

    #[error("insufficient-fields: got {got}, need at least {need}")]
    InsufficientFields { got: usize, need: usize },

    #[error("missing-forecast-day: {day} needs {need} fields, got {got}")]
    MissingForecastDay {
        day: &'static str,
        got: usize,
        need: usize,
    },

    #[error("empty-field: {0}")]
    EmptyField(&'static str),
}

impl ParseFailure {
    /// Stable machine-readable tag.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedXml(_) => "malformed-xml",
            Self::InsufficientFields { .. } => "insufficient-fields",
            Self::MissingForecastDay { .. } => "missing-forecast-day",
            Self::EmptyField(_) => "empty-field",
        }
    }
}

/// The only error type returned across the forecast boundary.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Place name is empty")]
    EmptyInput,

    #[error("Network failure: {0}")]
    Network(#[from] NetworkError),

    #[error("Parse failure: {0}")]
    Parse(#[from] ParseFailure),

    #[error("Request cancelled")]
    Cancelled,
}

impl ForecastError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyInput => "Please enter a city name.".to_string(),
            Self::Network(e) => e.user_message().to_string(),
            Self::Parse(ParseFailure::InsufficientFields { .. })
            | Self::Parse(ParseFailure::MissingForecastDay { .. }) => {
                "No forecast was returned for that place. Check the name and try again."
                    .to_string()
            }
            Self::Parse(e) => format!("The weather service sent an unreadable forecast ({})", e.reason()),
            Self::Cancelled => "The request was cancelled.".to_string(),
        }
    }

    /// Whether repeating the same query might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_transient(),
            Self::EmptyInput | Self::Parse(_) | Self::Cancelled => false,
        }
    }

    /// Short tag for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty-input",
            Self::Network(_) => "network-failure",
            Self::Parse(_) => "parse-failure",
            Self::Cancelled => "cancelled",
        }
    }
}
