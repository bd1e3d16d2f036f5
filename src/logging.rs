/// Structured logging for the lamppost collector
///
/// Sets up the `tracing` subscriber and provides the failure-classification
/// helpers used by the collection driver, so that every skipped location is
/// reported with its index and URL at a level matching how surprising the
/// failure is.

use std::fmt;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::model::FeedError;

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Log level implied by the `-v` / `-q` flags.
pub fn level_for(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the flag-derived level.
pub fn init_logging(verbosity: u8, quiet: bool) {
    let level = level_for(verbosity, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lamppost_collector={}", level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .try_init();

    debug!("Logging initialized at level: {}", level);
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the lamppost simply has no telemetry endpoint
    Expected,
    /// Unexpected failure - the device answered but with something unusable
    Unexpected,
    /// Unknown - device may be offline or temporarily unreachable
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a per-location failure.
pub fn classify_feed_failure(err: &FeedError) -> FailureType {
    match err {
        FeedError::NoDeviceUrl => FailureType::Expected,
        // Offline devices and missing feeds are routine in the field
        FeedError::Transport(_) => FailureType::Unknown,
        FeedError::HttpError(code) if *code < 500 => FailureType::Unknown,
        FeedError::HttpError(_) => FailureType::Unexpected,
        // A response that is not the CSV we expect suggests a firmware change
        FeedError::ParseError(_) | FeedError::NoMatchingFields => FailureType::Unexpected,
    }
}

/// Log a skipped location with its classification.
pub fn log_location_failure(location: usize, url: Option<&str>, err: &FeedError) {
    let failure_type = classify_feed_failure(err);
    let url = url.unwrap_or("-");

    match failure_type {
        FailureType::Expected => info!(location, "{}; skipping", err),
        FailureType::Unknown => warn!(location, url, "{} [{}]; skipping", err, failure_type),
        FailureType::Unexpected => error!(location, url, "{} [{}]; skipping", err, failure_type),
    }
}

// ---------------------------------------------------------------------------
// Summary Logging
// ---------------------------------------------------------------------------

/// Log the end-of-pass summary. Level reflects how many locations failed.
pub fn log_collection_summary(total: usize, collected: usize, records: usize) {
    let failed = total - collected.min(total);
    let message = format!(
        "Collection complete: {}/{} locations collected, {} skipped, {} records",
        collected, total, failed, records
    );

    if failed == 0 {
        info!("{}", message);
    } else if collected == 0 {
        error!("{}", message);
    } else {
        warn!("{}", message);
    }
}
