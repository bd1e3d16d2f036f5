//! Collection pass over the lamppost layer.
//!
//! One location at a time: pick the device URL, fetch, parse, extract, tag
//! with the lamppost's coordinates and the URL used. Any failure is logged
//! and the location skipped; nothing here aborts the pass. There are no
//! retries, a transient failure waits for the next run.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::CollectorConfig;
use crate::extract;
use crate::ingest::device_feed::{FeedFetcher, fetch_feed};
use crate::logging;
use crate::model::{AttrValue, FeedError, LocationRecord, NormalizedRecord};

/// Per-pass counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub locations_total: usize,
    pub without_device_url: usize,
    pub fetch_failed: usize,
    pub parse_failed: usize,
    pub no_matching_fields: usize,
    pub locations_collected: usize,
    pub records_collected: usize,
}

impl CollectionStats {
    fn record_failure(&mut self, err: &FeedError) {
        match err {
            FeedError::NoDeviceUrl => self.without_device_url += 1,
            FeedError::Transport(_) | FeedError::HttpError(_) => self.fetch_failed += 1,
            FeedError::ParseError(_) => self.parse_failed += 1,
            FeedError::NoMatchingFields => self.no_matching_fields += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionOutcome {
    pub records: Vec<NormalizedRecord>,
    pub stats: CollectionStats,
}

/// First non-blank value among the ranked URL attributes.
pub fn select_device_url(location: &LocationRecord, url_fields: &[String]) -> Option<String> {
    url_fields.iter().find_map(|field| {
        location
            .get(field)
            .and_then(AttrValue::as_text)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
    })
}

/// Latitude and longitude of a location, looked up case-insensitively.
pub fn location_coordinates(location: &LocationRecord, config: &CollectorConfig) -> (Option<f64>, Option<f64>) {
    let lat = location
        .get_ignore_case(&config.latitude_field)
        .and_then(AttrValue::as_f64);
    let lon = location
        .get_ignore_case(&config.longitude_field)
        .and_then(AttrValue::as_f64);
    (lat, lon)
}

/// Fetch and extract one location's records, tagged with coordinates and URL.
pub fn collect_location(
    location: &LocationRecord,
    url: &str,
    fetcher: &dyn FeedFetcher,
    config: &CollectorConfig,
) -> Result<Vec<NormalizedRecord>, FeedError> {
    let feed = fetch_feed(fetcher, url)?;
    if let Some(first) = feed.rows.first().and_then(|row| row.first()) {
        debug!(location = location.index, first_cell = ?first, "feed parsed");
    }

    let mut records = extract::extract(&feed);
    if records.is_empty() {
        return Err(FeedError::NoMatchingFields);
    }

    let (lat, lon) = location_coordinates(location, config);
    for record in &mut records {
        record.lp_latitude = lat;
        record.lp_longitude = lon;
        record.source_url = Some(url.to_string());
    }
    Ok(records)
}

/// Run one sequential pass over all locations.
///
/// Records come out in location order. A failed location contributes nothing
/// and does not affect the others.
pub fn collect_all(
    locations: &[LocationRecord],
    fetcher: &dyn FeedFetcher,
    config: &CollectorConfig,
) -> CollectionOutcome {
    let mut outcome = CollectionOutcome::default();
    outcome.stats.locations_total = locations.len();

    for location in locations {
        let Some(url) = select_device_url(location, &config.device_url_fields) else {
            let err = FeedError::NoDeviceUrl;
            logging::log_location_failure(location.index, None, &err);
            outcome.stats.record_failure(&err);
            continue;
        };

        info!(location = location.index, url = %url, "fetching");
        match collect_location(location, &url, fetcher, config) {
            Ok(records) => {
                debug!(location = location.index, records = records.len(), "collected");
                outcome.stats.locations_collected += 1;
                outcome.stats.records_collected += records.len();
                outcome.records.extend(records);
            }
            Err(err) => {
                logging::log_location_failure(location.index, Some(&url), &err);
                outcome.stats.record_failure(&err);
            }
        }
    }

    logging::log_collection_summary(
        outcome.stats.locations_total,
        outcome.stats.locations_collected,
        outcome.stats.records_collected,
    );
    outcome
}
