use serde::{Deserialize, Serialize};

use crate::error::ParseFailure;

/// Placeholder used when the upstream response stops before the
/// day-after-tomorrow entries.
pub const NO_DATA: &str = "no data available";

/// Position of each forecast attribute in the upstream `<string>` sequence.
///
/// The service serializes an untyped array of strings, so this table is the
/// whole schema. Two-part entries are joined with a single space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIndex {
    pub city: usize,
    pub icon_file_name: usize,
    pub updated_at: usize,
    pub temperature: usize,
    pub condition: usize,
    pub wind: usize,
    pub tomorrow: (usize, usize),
    pub day_after_tomorrow: (usize, usize),
}

pub const FIELD_INDEX: FieldIndex = FieldIndex {
    city: 1,
    icon_file_name: 3,
    updated_at: 4,
    temperature: 5,
    condition: 6,
    wind: 7,
    tomorrow: (12, 13),
    day_after_tomorrow: (17, 18),
};

const fn max(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

impl FieldIndex {
    /// Fields every response must carry, in table order.
    pub const fn mandatory(&self) -> [(&'static str, usize); 6] {
        [
            ("city", self.city),
            ("icon_file_name", self.icon_file_name),
            ("updated_at", self.updated_at),
            ("temperature", self.temperature),
            ("condition", self.condition),
            ("wind", self.wind),
        ]
    }

    /// Minimum sequence length for the single-valued fields.
    pub const fn mandatory_len(&self) -> usize {
        let fields = self.mandatory();
        let mut highest = 0;
        let mut i = 0;
        while i < fields.len() {
            highest = max(highest, fields[i].1);
            i += 1;
        }
        highest + 1
    }

    /// Minimum sequence length for tomorrow's summary.
    pub const fn tomorrow_len(&self) -> usize {
        max(self.tomorrow.0, self.tomorrow.1) + 1
    }

    /// Minimum sequence length for the day-after-tomorrow summary.
    pub const fn day_after_tomorrow_len(&self) -> usize {
        max(self.day_after_tomorrow.0, self.day_after_tomorrow.1) + 1
    }
}

/// Unparsed body of one upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse(String);

impl RawResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Forecast for one place, exactly as the service reported it.
///
/// Values are opaque display text (the service formats temperatures and dates
/// itself). Built by [`crate::parse`]; deserializing applies the same
/// non-empty checks to `city` through `wind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ForecastFields")]
pub struct Forecast {
    pub(crate) city: String,
    pub(crate) updated_at: String,
    pub(crate) temperature: String,
    pub(crate) condition: String,
    pub(crate) wind: String,
    pub(crate) icon_file_name: String,
    pub(crate) tomorrow: String,
    pub(crate) day_after_tomorrow: String,
}

impl Forecast {
    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    pub fn temperature(&self) -> &str {
        &self.temperature
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn wind(&self) -> &str {
        &self.wind
    }

    /// Icon file name relative to the service's image directory.
    pub fn icon_file_name(&self) -> &str {
        &self.icon_file_name
    }

    /// Tomorrow's condition followed by its temperature range.
    pub fn tomorrow(&self) -> &str {
        &self.tomorrow
    }

    /// Same as [`Forecast::tomorrow`] for the following day, or [`NO_DATA`].
    pub fn day_after_tomorrow(&self) -> &str {
        &self.day_after_tomorrow
    }

    /// Fails on the first mandatory field that is empty, in table order.
    pub(crate) fn check_mandatory(&self) -> Result<(), ParseFailure> {
        let values = [
            ("city", &self.city),
            ("icon_file_name", &self.icon_file_name),
            ("updated_at", &self.updated_at),
            ("temperature", &self.temperature),
            ("condition", &self.condition),
            ("wind", &self.wind),
        ];
        match values.iter().find(|(_, value)| value.is_empty()) {
            Some((field, _)) => Err(ParseFailure::EmptyField(field)),
            None => Ok(()),
        }
    }
}

/// Unchecked wire form of [`Forecast`].
#[derive(Deserialize)]
struct ForecastFields {
    city: String,
    updated_at: String,
    temperature: String,
    condition: String,
    wind: String,
    icon_file_name: String,
    tomorrow: String,
    day_after_tomorrow: String,
}

impl TryFrom<ForecastFields> for Forecast {
    type Error = ParseFailure;

    fn try_from(fields: ForecastFields) -> Result<Self, Self::Error> {
        let forecast = Forecast {
            city: fields.city,
            updated_at: fields.updated_at,
            temperature: fields.temperature,
            condition: fields.condition,
            wind: fields.wind,
            icon_file_name: fields.icon_file_name,
            tomorrow: fields.tomorrow,
            day_after_tomorrow: fields.day_after_tomorrow,
        };
        forecast.check_mandatory()?;
        Ok(forecast)
    }
}
