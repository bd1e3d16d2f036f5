//! One complete collection run: load locations, collect, merge, persist.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::collect::{self, CollectionStats};
use crate::config::CollectorConfig;
use crate::dataset;
use crate::error::{CollectorError, Result};
use crate::ingest::device_feed::FeedFetcher;
use crate::ingest::locations;

/// Inputs of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: PathBuf,
    pub output: PathBuf,
    pub config: CollectorConfig,
}

/// What a run did, for the summary line and the optional JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub source: PathBuf,
    pub output: PathBuf,
    pub layer: String,
    pub collection: CollectionStats,
    /// False when nothing was collected and the output was left alone.
    pub dataset_written: bool,
    pub prior_rows: usize,
    pub duplicates_removed: usize,
    pub total_rows: usize,
}

/// Execute a run with the given fetcher.
///
/// Fails only when the location layer cannot be read or the dataset cannot be
/// written. When no records were collected the output file is not touched.
pub fn run(options: &RunOptions, fetcher: &dyn FeedFetcher) -> Result<RunReport> {
    let config = &options.config;
    let locations = locations::load_locations(&options.source, &config.layer)?;
    info!(
        source = %options.source.display(),
        layer = %config.layer,
        locations = locations.len(),
        "loaded location layer"
    );

    let outcome = collect::collect_all(&locations, fetcher, config);

    let mut report = RunReport {
        timestamp: Utc::now(),
        source: options.source.clone(),
        output: options.output.clone(),
        layer: config.layer.clone(),
        collection: outcome.stats,
        dataset_written: false,
        prior_rows: 0,
        duplicates_removed: 0,
        total_rows: 0,
    };

    if outcome.records.is_empty() {
        info!("No device rows collected; exiting.");
        return Ok(report);
    }

    let summary = dataset::merge_into(&options.output, &outcome.records)?;
    info!(
        "Dedup: removed {} duplicates. Total rows now: {}",
        summary.duplicates_removed, summary.total_rows
    );
    info!(path = %options.output.display(), "Saved combined CSV");

    report.dataset_written = true;
    report.prior_rows = summary.prior_rows;
    report.duplicates_removed = summary.duplicates_removed;
    report.total_rows = summary.total_rows;
    Ok(report)
}

/// Write the report as pretty-printed JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(|e| CollectorError::Persist {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, json)?;
    Ok(())
}
