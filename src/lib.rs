//! Lamppost weather collector.
//!
//! Reads the smart lamppost layer, fetches each lamppost's device CSV feed,
//! extracts temperature / humidity / device height and the measurement time
//! by heuristic column matching, and merges the result into a deduplicated
//! CSV dataset.

pub mod collect;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod runner;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use model::{FeedError, LocationRecord, NormalizedRecord, RawDeviceFeed};
