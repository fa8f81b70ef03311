//! Forecast service client: fetch by place name, then parse.

use std::sync::Arc;
use std::time::Duration;

use cityweather_core::{ForecastConfig, NetworkError, ReqwestErrorExt};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::ForecastError;
use crate::parser;
use crate::retry::{self, RetryConfig};
use crate::types::{Forecast, RawResponse};

const CITY_QUERY_PARAM: &str = "theCityName";

#[derive(Debug, Clone)]
pub struct ForecastProvider {
    client: Arc<Client>,
    service_url: String,
    retry: RetryConfig,
}

impl ForecastProvider {
    pub fn new(config: &ForecastConfig) -> Result<Self, ForecastError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder.build().map_err(|e| e.into_network_error())?;

        Ok(Self {
            client: Arc::new(client),
            service_url: config.service_url.clone(),
            retry: RetryConfig::with_max_retries(config.max_retries),
        })
    }

    /// Replace the retry policy (e.g. to shorten backoff in tests).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn request_url(&self, place: &str) -> String {
        format!(
            "{}?{}={}",
            self.service_url,
            CITY_QUERY_PARAM,
            urlencoding::encode(place)
        )
    }

    /// Issue the upstream request and return the body text.
    ///
    /// Empty names are not special-cased here; use [`Self::get_forecast`] for
    /// validated lookups.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(&self, place: &str) -> Result<RawResponse, ForecastError> {
        let url = self.request_url(place);

        let response = retry::with_retry(&self.retry, || self.client.get(&url).send())
            .await
            .map_err(|e| {
                tracing::warn!("Forecast request failed: {}", e);
                e.into_network_error()
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string();
            tracing::warn!("Forecast service returned {}", status);
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let bytes = response.bytes().await.map_err(|e| e.into_network_error())?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|e| {
            NetworkError::InvalidResponse(format!("response body is not valid UTF-8: {}", e))
        })?;

        tracing::debug!(bytes = body.len(), "Received forecast response");
        Ok(RawResponse::new(body))
    }

    /// Look up the forecast for `place`: validate, fetch, parse.
    #[instrument(skip(self), level = "info")]
    pub async fn get_forecast(&self, place: &str) -> Result<Forecast, ForecastError> {
        if place.trim().is_empty() {
            return Err(ForecastError::EmptyInput);
        }

        let raw = self.fetch(place).await?;
        let forecast = parser::parse(&raw).map_err(|e| {
            tracing::warn!(reason = e.reason(), "Could not parse forecast: {}", e);
            e
        })?;

        tracing::info!("Forecast for {} updated {}", forecast.city(), forecast.updated_at());
        Ok(forecast)
    }

    /// [`Self::get_forecast`], abandoned with `Cancelled` once `cancel` fires.
    pub async fn get_forecast_cancellable(
        &self,
        place: &str,
        cancel: &CancellationToken,
    ) -> Result<Forecast, ForecastError> {
        if cancel.is_cancelled() {
            return Err(ForecastError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Forecast request for {} cancelled", place);
                Err(ForecastError::Cancelled)
            }
            result = self.get_forecast(place) => result,
        }
    }
}
