//! Background forecast lookups for interactive front ends.
//! Network work runs on a tokio runtime; results come back over mpsc so the
//! caller's thread never blocks on I/O.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::error::ForecastError;
use crate::provider::ForecastProvider;
use crate::types::Forecast;

/// Messages sent from background lookups back to the caller's thread
#[derive(Debug)]
pub enum ForecastServiceMessage {
    FetchDone {
        place: String,
        result: Result<Forecast, ForecastError>,
    },
}

/// Start a lookup for `place` on `runtime`.
/// Sends exactly one `FetchDone` on `tx` when complete. With `cancel`, the
/// lookup ends in `Cancelled` once the token fires; without it, it runs to
/// completion or timeout.
pub fn request_fetch(
    tx: &Sender<ForecastServiceMessage>,
    runtime: &Handle,
    provider: Arc<ForecastProvider>,
    place: String,
    cancel: Option<CancellationToken>,
) {
    let tx = tx.clone();

    if place.trim().is_empty() {
        let _ = tx.send(ForecastServiceMessage::FetchDone {
            place,
            result: Err(ForecastError::EmptyInput),
        });
        return;
    }

    runtime.spawn(async move {
        let result = match &cancel {
            Some(token) => provider.get_forecast_cancellable(&place, token).await,
            None => provider.get_forecast(&place).await,
        };
        if let Err(e) = &result {
            tracing::debug!(kind = e.kind(), "Background lookup for {} failed", place);
        }
        if tx
            .send(ForecastServiceMessage::FetchDone { place, result })
            .is_err()
        {
            tracing::debug!("Forecast receiver dropped before result arrived");
        }
    });
}
