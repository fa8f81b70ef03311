//! Weather forecast lookups for cityweather
//!
//! Fetches a city's forecast from the WebXml SOAP service and maps its
//! positional `<string>` payload onto a typed [`Forecast`].

pub mod error;
pub mod parser;
pub mod provider;
pub mod retry;
pub mod service;
pub mod types;

pub use error::{ForecastError, ParseFailure};
pub use parser::parse;
pub use provider::ForecastProvider;
pub use retry::RetryConfig;
pub use service::{request_fetch, ForecastServiceMessage};
pub use types::{FieldIndex, Forecast, RawResponse, FIELD_INDEX, NO_DATA};

// Re-exported so callers can cancel lookups without depending on tokio-util.
pub use tokio_util::sync::CancellationToken;
