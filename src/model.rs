/// Core data types for the lamppost weather collector.
///
/// This module defines the shared domain model imported by all other modules:
/// location rows read from the geospatial layer, raw device feeds, the
/// normalized output record, and the per-location failure type.

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Output schema
// ---------------------------------------------------------------------------

/// Output dataset columns, in file order.
pub const OUTPUT_COLUMNS: [&str; 8] = [
    "lamppost_id",
    "measurement_datetime",
    "air_temperature_c",
    "relative_humidity_pct",
    "device_height_m",
    "lp_latitude",
    "lp_longitude",
    "source_url",
];

// ---------------------------------------------------------------------------
// Location records
// ---------------------------------------------------------------------------

/// A single attribute value from the location layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Text(String),
    Number(f64),
}

impl AttrValue {
    /// Text form of the value, `None` for nulls and NaN.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Null => None,
            AttrValue::Text(s) => Some(s.clone()),
            AttrValue::Number(n) if n.is_nan() => None,
            AttrValue::Number(n) => Some(n.to_string()),
        }
    }

    /// Numeric form of the value. Text is parsed; anything unparseable is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Null => None,
            AttrValue::Number(n) => Some(*n).filter(|n| !n.is_nan()),
            AttrValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
        }
    }
}

/// One row of the location layer: a lamppost and its candidate telemetry
/// endpoints.
///
/// Attributes keep the layer's column order so that case-insensitive lookups
/// resolve to the first matching column, the same way every time.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    /// Zero-based position of the row in the layer.
    pub index: usize,
    pub attributes: Vec<(String, AttrValue)>,
}

impl LocationRecord {
    pub fn new(index: usize, attributes: Vec<(String, AttrValue)>) -> Self {
        Self { index, attributes }
    }

    /// Exact, case-sensitive attribute lookup.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Case-insensitive attribute lookup; the first matching column wins.
    pub fn get_ignore_case(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

// ---------------------------------------------------------------------------
// Device feeds
// ---------------------------------------------------------------------------

/// Tabular content fetched from one device URL, with the device's own
/// column naming. Cells are `None` when empty or a missing-value marker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawDeviceFeed {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawDeviceFeed {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell of `row` under `column`, if the column exists and the cell holds a value.
    pub fn cell<'a>(&self, row: &'a [Option<String>], column: &str) -> Option<&'a str> {
        let idx = self.column_index(column)?;
        row.get(idx).and_then(|c| c.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Output record
// ---------------------------------------------------------------------------

/// One normalized output row.
///
/// Every field is optional: a field that could not be located or coerced is
/// `None`, which keeps "not found" distinct from a genuine zero reading.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NormalizedRecord {
    pub lamppost_id: Option<String>,
    pub measurement_datetime: Option<String>, // YYYY-MM-DDTHH:MM:SS
    pub air_temperature_c: Option<f64>,
    pub relative_humidity_pct: Option<f64>,
    pub device_height_m: Option<f64>,
    pub lp_latitude: Option<f64>,
    pub lp_longitude: Option<f64>,
    pub source_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures that cause a single location to be skipped.
///
/// None of these abort the run; the driver logs them and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    /// None of the ranked device URL attributes holds a value.
    #[error("No device URL")]
    NoDeviceUrl,
    /// Connection, timeout, TLS or body read failure.
    #[error("Request failed: {0}")]
    Transport(String),
    /// Non-2xx HTTP response from the device.
    #[error("HTTP error: {0}")]
    HttpError(u16),
    /// The response body is not UTF-8 delimited text with a header row.
    #[error("Parse error: {0}")]
    ParseError(String),
    /// The feed parsed but none of the expected fields could be located.
    #[error("No matching columns found in device CSV")]
    NoMatchingFields,
}
