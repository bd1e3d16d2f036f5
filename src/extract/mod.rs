/// Field extraction from raw device feeds.
///
/// Turns one device's CSV (with whatever column names its firmware uses) into
/// normalized records carrying the identifier, the readings and the
/// measurement timestamp. Location and provenance fields are left for the
/// collection driver to fill in.
///
/// Submodules:
/// - `columns` : substring-based column lookup.
/// - `datetime` : timestamp assembly and canonicalization.

pub mod columns;
pub mod datetime;

use crate::model::{NormalizedRecord, RawDeviceFeed};
use columns::FieldColumns;

/// Parses a numeric reading. Non-numeric and NaN cells are `None`.
pub fn parse_reading(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Extracts one record per feed row.
///
/// Returns an empty vector when the feed has no rows, or when none of the
/// semantic fields could be located (the feed is not of the expected shape).
/// Otherwise unresolved or unparseable fields are simply `None`.
pub fn extract(feed: &RawDeviceFeed) -> Vec<NormalizedRecord> {
    let columns = FieldColumns::resolve(&feed.columns);
    if columns.is_empty() {
        return Vec::new();
    }

    feed.rows
        .iter()
        .map(|row| {
            let cell = |column: &Option<String>| {
                column.as_deref().and_then(|name| feed.cell(row, name))
            };

            NormalizedRecord {
                lamppost_id: cell(&columns.lamppost_id).map(str::to_string),
                measurement_datetime: datetime::assemble(feed, row, &columns),
                air_temperature_c: cell(&columns.air_temperature).and_then(parse_reading),
                relative_humidity_pct: cell(&columns.relative_humidity).and_then(parse_reading),
                device_height_m: cell(&columns.device_height).and_then(parse_reading),
                ..Default::default()
            }
        })
        .collect()
}
