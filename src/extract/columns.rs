//! Heuristic column lookup for device feeds.
//!
//! Device firmware names its CSV columns freely ("Air temperature (C)",
//! "Air temperature (deg C)", ...), so fields are located by substring rather
//! than by exact header. Matching is lexical and English-only; two columns
//! sharing the required substrings resolve to whichever comes first.

/// Substrings each semantic field's column must contain.
pub const LAMPPOST_ID_KEYS: &[&str] = &["Lamppost ID"];
pub const AIR_TEMPERATURE_KEYS: &[&str] = &["Air temperature"];
pub const RELATIVE_HUMIDITY_KEYS: &[&str] = &["Relative humidity"];
pub const DEVICE_HEIGHT_KEYS: &[&str] = &["Device height"];
pub const MEASUREMENT_YEAR_KEYS: &[&str] = &["Data measurement", "Year"];
pub const MEASUREMENT_MONTH_KEYS: &[&str] = &["Data measurement", "Month"];
pub const MEASUREMENT_DAY_KEYS: &[&str] = &["Data measurement", "Day"];
pub const MEASUREMENT_HOUR_KEYS: &[&str] = &["Data measurement", "Hour"];
pub const MEASUREMENT_MINUTE_KEYS: &[&str] = &["Data measurement", "Minute"];
pub const MEASUREMENT_SECOND_KEYS: &[&str] = &["Data measurement", "Second"];

/// Returns the first column, in input order, whose name contains every
/// required substring (case-sensitive). `None` if no column qualifies.
pub fn find_column<'a, S: AsRef<str>>(columns: &'a [S], required: &[&str]) -> Option<&'a str> {
    columns
        .iter()
        .map(|c| c.as_ref())
        .find(|name| required.iter().all(|needle| name.contains(needle)))
}

/// Resolved source column for each semantic field of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldColumns {
    pub lamppost_id: Option<String>,
    pub air_temperature: Option<String>,
    pub relative_humidity: Option<String>,
    pub device_height: Option<String>,
    pub measurement_year: Option<String>,
    pub measurement_month: Option<String>,
    pub measurement_day: Option<String>,
    pub measurement_hour: Option<String>,
    pub measurement_minute: Option<String>,
    pub measurement_second: Option<String>,
}

impl FieldColumns {
    pub fn resolve<S: AsRef<str>>(columns: &[S]) -> Self {
        let find = |keys: &[&str]| find_column(columns, keys).map(str::to_string);
        Self {
            lamppost_id: find(LAMPPOST_ID_KEYS),
            air_temperature: find(AIR_TEMPERATURE_KEYS),
            relative_humidity: find(RELATIVE_HUMIDITY_KEYS),
            device_height: find(DEVICE_HEIGHT_KEYS),
            measurement_year: find(MEASUREMENT_YEAR_KEYS),
            measurement_month: find(MEASUREMENT_MONTH_KEYS),
            measurement_day: find(MEASUREMENT_DAY_KEYS),
            measurement_hour: find(MEASUREMENT_HOUR_KEYS),
            measurement_minute: find(MEASUREMENT_MINUTE_KEYS),
            measurement_second: find(MEASUREMENT_SECOND_KEYS),
        }
    }

    /// True when not a single semantic field resolved.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
