pub mod config;
pub mod error;

pub use config::{Config, ForecastConfig, ValidationResult};
pub use error::{NetworkError, ReqwestErrorExt};

use anyhow::Result;

/// Initialize tracing for the process.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used. Output goes to
/// stderr so stdout stays free for rendered forecasts.
pub fn init(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!("cityweather core initialized");
    Ok(())
}
