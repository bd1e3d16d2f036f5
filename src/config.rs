/// Collector configuration.
///
/// Everything tied to one particular lamppost dataset's schema lives here
/// rather than in code: the layer name, the ranked device-URL attributes and
/// the latitude/longitude attribute names. Firmware generations publish their
/// feed URL under different attributes, so the ranking is data, not logic.
///
/// Loaded from an optional TOML file; every key has a default matching the
/// public smart lamppost dataset.

use crate::error::{CollectorError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LAYER: &str = "smart_lamppost";

/// Device URL attributes, highest preference first.
pub const DEFAULT_DEVICE_URL_FIELDS: [&str; 3] = [
    "DEVICE_04_DATA_URL",
    "DEVICE_02_DATA_URL",
    "DEVICE_01_DATA_URL",
];

pub const DEFAULT_LATITUDE_FIELD: &str = "lp_latitude";
pub const DEFAULT_LONGITUDE_FIELD: &str = "lp_longitude";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    /// Layer (table) holding the lamppost rows.
    pub layer: String,
    /// Candidate device URL attributes, highest preference first.
    pub device_url_fields: Vec<String>,
    /// Matched case-insensitively.
    pub latitude_field: String,
    /// Matched case-insensitively.
    pub longitude_field: String,
    /// Per-request timeout for device feeds.
    pub request_timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            layer: DEFAULT_LAYER.to_string(),
            device_url_fields: DEFAULT_DEVICE_URL_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            latitude_field: DEFAULT_LATITUDE_FIELD.to_string(),
            longitude_field: DEFAULT_LONGITUDE_FIELD.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CollectorError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
            .map_err(|e| CollectorError::configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: CollectorConfig =
            toml::from_str(contents).map_err(|e| CollectorError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Either the file at `path` or the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.layer.trim().is_empty() {
            return Err(CollectorError::configuration("layer must not be empty"));
        }
        if self.device_url_fields.is_empty() {
            return Err(CollectorError::configuration(
                "device_url_fields must list at least one attribute",
            ));
        }
        if self.device_url_fields.iter().any(|f| f.trim().is_empty()) {
            return Err(CollectorError::configuration(
                "device_url_fields must not contain blank names",
            ));
        }
        if self.latitude_field.trim().is_empty() || self.longitude_field.trim().is_empty() {
            return Err(CollectorError::configuration(
                "latitude_field and longitude_field must not be empty",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CollectorError::configuration(
                "request_timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
