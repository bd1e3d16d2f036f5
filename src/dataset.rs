//! Reconciliation and persistence of the output dataset.
//!
//! New records are merged behind whatever the output file already holds,
//! deduplicated on (measurement_datetime, lamppost_id) keeping the first
//! occurrence, and the whole file is rewritten. Prior rows are carried as the
//! text that was read, so values already on disk never get reformatted.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{CollectorError, Result};
use crate::extract::datetime::normalize_datetime;
use crate::ingest::device_feed::is_missing;
use crate::model::{NormalizedRecord, OUTPUT_COLUMNS};

const ID_COL: usize = 0;
const DATETIME_COL: usize = 1;

/// One persisted row: output columns in order, `None` for empty cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetRow(pub [Option<String>; OUTPUT_COLUMNS.len()]);

impl DatasetRow {
    pub fn lamppost_id(&self) -> Option<&str> {
        self.0[ID_COL].as_deref()
    }

    pub fn measurement_datetime(&self) -> Option<&str> {
        self.0[DATETIME_COL].as_deref()
    }

    /// Dedup key. Two absent parts compare equal.
    pub fn key(&self) -> (Option<String>, Option<String>) {
        (self.0[DATETIME_COL].clone(), self.0[ID_COL].clone())
    }

    /// Project a freshly collected record onto the output columns, normalizing
    /// its datetime on the way.
    pub fn from_record(record: &NormalizedRecord) -> Self {
        DatasetRow([
            record.lamppost_id.clone(),
            record
                .measurement_datetime
                .as_deref()
                .and_then(normalize_datetime),
            record.air_temperature_c.map(format_float),
            record.relative_humidity_pct.map(format_float),
            record.device_height_m.map(format_float),
            record.lp_latitude.map(format_float),
            record.lp_longitude.map(format_float),
            record.source_url.clone(),
        ])
    }
}

/// Float rendering for the CSV: integral values keep one decimal (`60.0`),
/// everything else uses the shortest round-trip form (`21.5`).
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read an existing dataset with every column as text.
///
/// Columns are matched by header name: unknown columns are dropped and
/// missing ones come back empty.
pub fn read_dataset(path: &Path) -> Result<Vec<DatasetRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let positions: Vec<Option<usize>> = OUTPUT_COLUMNS
        .iter()
        .map(|col| headers.iter().position(|h| h == *col))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = DatasetRow::default();
        for (slot, &position) in row.0.iter_mut().zip(&positions) {
            *slot = position
                .and_then(|i| record.get(i))
                .filter(|cell| !is_missing(cell))
                .map(str::to_string);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Load the prior dataset if there is one. Unreadable files are logged and
/// treated as empty; the run goes on and will overwrite them.
pub fn load_prior(path: &Path) -> Vec<DatasetRow> {
    if !path.exists() {
        debug!(path = %path.display(), "no existing dataset");
        return Vec::new();
    }
    match read_dataset(path) {
        Ok(rows) => {
            info!(path = %path.display(), rows = rows.len(), "loaded existing dataset");
            rows
        }
        Err(e) => {
            warn!(path = %path.display(), "could not read existing CSV; overwriting. Error: {}", e);
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub rows: Vec<DatasetRow>,
    pub duplicates_removed: usize,
}

/// Concatenate prior rows and new rows (prior first) and drop every row whose
/// key has already been seen.
pub fn reconcile(prior: Vec<DatasetRow>, new_rows: Vec<DatasetRow>) -> Reconciled {
    let before = prior.len() + new_rows.len();
    let mut seen = HashSet::with_capacity(before);
    let rows: Vec<DatasetRow> = prior
        .into_iter()
        .chain(new_rows)
        .filter(|row| seen.insert(row.key()))
        .collect();

    Reconciled {
        duplicates_removed: before - rows.len(),
        rows,
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Replace the dataset at `path` with `rows`.
///
/// Rows are written to a temporary file next to the target and renamed into
/// place, so the file on disk is always either the old or the new dataset.
pub fn write_dataset(path: &Path, rows: &[DatasetRow]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = temp_file_for(parent, path)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(OUTPUT_COLUMNS)?;
        for row in rows {
            writer.write_record(row.0.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        writer.flush()?;
    }

    tmp.persist(path).map_err(|e| CollectorError::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}

/// Temporary file in `parent` that will carry the target's permissions once
/// renamed over it. A new target gets the mode a plain create would give it.
fn temp_file_for(parent: &Path, target: &Path) -> Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let tmp = builder.tempfile_in(parent)?;

    if let Ok(existing) = fs::metadata(target) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    Ok(tmp)
}

/// Summary of one merge into the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub prior_rows: usize,
    pub new_rows: usize,
    pub duplicates_removed: usize,
    pub total_rows: usize,
}

/// Merge `records` into the dataset at `path` and rewrite it.
pub fn merge_into(path: &Path, records: &[NormalizedRecord]) -> Result<MergeSummary> {
    let new_rows: Vec<DatasetRow> = records.iter().map(DatasetRow::from_record).collect();
    let prior = load_prior(path);
    let prior_rows = prior.len();
    let new_count = new_rows.len();

    let reconciled = reconcile(prior, new_rows);
    write_dataset(path, &reconciled.rows)?;

    Ok(MergeSummary {
        prior_rows,
        new_rows: new_count,
        duplicates_removed: reconciled.duplicates_removed,
        total_rows: reconciled.rows.len(),
    })
}
