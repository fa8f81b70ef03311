//! Text rendering for forecasts and failures.

use cityweather_forecast::{Forecast, ForecastError};

const SEPARATOR_WIDTH: usize = 40;

/// Resolve the service's icon file name against `base_url`.
pub fn icon_url(base_url: &str, icon_file_name: &str) -> String {
    format!("{}{}", base_url, icon_file_name)
}

/// Multi-line display in the order the forecast is read: headline, current
/// conditions, the next two days, then when the service last updated it.
pub fn render_forecast(forecast: &Forecast, icon_base_url: &str) -> String {
    let lines = [
        forecast.city().to_string(),
        icon_url(icon_base_url, forecast.icon_file_name()),
        forecast.temperature().to_string(),
        forecast.condition().to_string(),
        forecast.wind().to_string(),
        "-".repeat(SEPARATOR_WIDTH),
        format!("Tomorrow: {}", forecast.tomorrow()),
        format!("Day after tomorrow: {}", forecast.day_after_tomorrow()),
        format!("Updated: {}", forecast.updated_at()),
    ];
    lines.join("\n")
}

/// Single line replacing the forecast display on failure.
pub fn render_error(error: &ForecastError) -> String {
    match error {
        ForecastError::EmptyInput => error.user_message(),
        _ => format!("Error fetching weather: {}", error.user_message()),
    }
}
