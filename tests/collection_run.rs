/// End-to-end tests for a collection run
///
/// Tests verify:
/// 1. A lamppost layer plus a device feed produce the expected CSV row
/// 2. Failed feeds are skipped without aborting the run
/// 3. Re-running against an existing dataset does not duplicate rows
/// 4. Fatal conditions (missing layer) surface as errors
///
/// Device feeds are served by an in-memory `FeedFetcher`; the real HTTP
/// client is only exercised against a closed local port.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lamppost_collector::config::CollectorConfig;
use lamppost_collector::ingest::device_feed::{FeedFetcher, HttpFeedFetcher};
use lamppost_collector::model::FeedError;
use lamppost_collector::runner::{self, RunOptions};
use lamppost_collector::CollectorError;
use rusqlite::Connection;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const HEADER: &str = "lamppost_id,measurement_datetime,air_temperature_c,relative_humidity_pct,device_height_m,lp_latitude,lp_longitude,source_url";

const LP1_FEED: &str = "Lamppost ID,Data measurement Year,Data measurement Month,Data measurement Day,Air temperature (C),Relative humidity (%),Device height (m)\nLP1,2024,3,5,21.5,60.0,3.2\n";

struct StubFetcher {
    responses: HashMap<String, Result<Vec<u8>, FeedError>>,
}

impl StubFetcher {
    fn new() -> Self {
        Self {
            responses: HashMap::new(),
        }
    }

    fn with(mut self, url: &str, response: Result<&str, FeedError>) -> Self {
        self.responses
            .insert(url.to_string(), response.map(|body| body.as_bytes().to_vec()));
        self
    }
}

impl FeedFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FeedError::Transport("connection refused".to_string())))
    }
}

/// Each entry: (DEVICE_04_DATA_URL, DEVICE_01_DATA_URL, latitude, longitude)
fn write_layer(dir: &Path, rows: &[(Option<&str>, Option<&str>, f64, f64)]) -> PathBuf {
    let path = dir.join("lampposts.gpkg");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE smart_lamppost (
            fid INTEGER PRIMARY KEY,
            geom BLOB,
            DEVICE_04_DATA_URL TEXT,
            DEVICE_02_DATA_URL TEXT,
            DEVICE_01_DATA_URL TEXT,
            LP_LATITUDE REAL,
            LP_LONGITUDE REAL
        );",
    )
    .unwrap();
    for (url4, url1, lat, lon) in rows {
        conn.execute(
            "INSERT INTO smart_lamppost (geom, DEVICE_04_DATA_URL, DEVICE_02_DATA_URL, DEVICE_01_DATA_URL, LP_LATITUDE, LP_LONGITUDE)
             VALUES (x'00', ?1, NULL, ?2, ?3, ?4)",
            rusqlite::params![url4, url1, lat, lon],
        )
        .unwrap();
    }
    path
}

fn options(source: PathBuf, output: PathBuf) -> RunOptions {
    RunOptions {
        source,
        output,
        config: CollectorConfig::default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_single_location_produces_expected_row() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_layer(dir.path(), &[(Some("http://lp1/feed.csv"), None, 1.23, 4.56)]);
    let output = dir.path().join("data").join("lamppost_data.csv");
    let fetcher = StubFetcher::new().with("http://lp1/feed.csv", Ok(LP1_FEED));

    let report = runner::run(&options(source, output.clone()), &fetcher).unwrap();

    assert!(report.dataset_written);
    assert_eq!(report.total_rows, 1);
    assert_eq!(report.duplicates_removed, 0);

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            HEADER,
            "LP1,2024-03-05T00:00:00,21.5,60.0,3.2,1.23,4.56,http://lp1/feed.csv",
        ]
    );
}

#[test]
fn test_failed_feed_does_not_abort_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_layer(
        dir.path(),
        &[
            (Some("http://offline/feed.csv"), None, 0.0, 0.0),
            (None, None, 0.0, 0.0),
            (None, Some("http://lp1/feed.csv"), 1.23, 4.56),
        ],
    );
    let output = dir.path().join("out.csv");
    let fetcher = StubFetcher::new().with("http://lp1/feed.csv", Ok(LP1_FEED));

    let report = runner::run(&options(source, output.clone()), &fetcher).unwrap();

    assert_eq!(report.collection.locations_total, 3);
    assert_eq!(report.collection.fetch_failed, 1);
    assert_eq!(report.collection.without_device_url, 1);
    assert_eq!(report.collection.locations_collected, 1);
    assert_eq!(report.total_rows, 1);

    let text = std::fs::read_to_string(&output).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("http://lp1/feed.csv"));
    assert!(!text.contains("offline"));
}

#[test]
fn test_rerun_does_not_duplicate_rows() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_layer(dir.path(), &[(Some("http://lp1/feed.csv"), None, 1.23, 4.56)]);
    let output = dir.path().join("out.csv");
    let fetcher = StubFetcher::new().with("http://lp1/feed.csv", Ok(LP1_FEED));
    let opts = options(source, output.clone());

    runner::run(&opts, &fetcher).unwrap();
    let second = runner::run(&opts, &fetcher).unwrap();

    assert_eq!(second.prior_rows, 1);
    assert_eq!(second.duplicates_removed, 1);
    assert_eq!(second.total_rows, 1);
    assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 2);
}

#[test]
fn test_prior_rows_win_and_come_first() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_layer(dir.path(), &[(Some("http://lp1/feed.csv"), None, 1.23, 4.56)]);
    let output = dir.path().join("out.csv");
    std::fs::write(
        &output,
        format!(
            "{}\nLP0,2024-03-04T00:00:00,19,55,3,1,4,http://old\nLP1,2024-03-05T00:00:00,20,50,3,1,4,http://old\n",
            HEADER
        ),
    )
    .unwrap();
    let fetcher = StubFetcher::new().with("http://lp1/feed.csv", Ok(LP1_FEED));

    let report = runner::run(&options(source, output.clone()), &fetcher).unwrap();
    assert_eq!(report.duplicates_removed, 1);

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "LP0,2024-03-04T00:00:00,19,55,3,1,4,http://old");
    assert_eq!(lines[2], "LP1,2024-03-05T00:00:00,20,50,3,1,4,http://old");
}

#[test]
fn test_nothing_collected_leaves_output_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_layer(dir.path(), &[(Some("http://down/feed.csv"), None, 0.0, 0.0)]);
    let output = dir.path().join("out.csv");

    let report = runner::run(&options(source, output.clone()), &StubFetcher::new()).unwrap();

    assert!(!report.dataset_written);
    assert!(!output.exists());
}

#[test]
fn test_missing_layer_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_layer(dir.path(), &[]);
    let mut opts = options(source, dir.path().join("out.csv"));
    opts.config.layer = "street_furniture".to_string();

    let err = runner::run(&opts, &StubFetcher::new()).unwrap_err();
    assert!(matches!(err, CollectorError::LayerNotFound { .. }));
}

#[test]
fn test_report_is_written_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_layer(dir.path(), &[(Some("http://lp1/feed.csv"), None, 1.23, 4.56)]);
    let fetcher = StubFetcher::new().with("http://lp1/feed.csv", Ok(LP1_FEED));
    let report = runner::run(&options(source, dir.path().join("out.csv")), &fetcher).unwrap();

    let report_path = dir.path().join("report.json");
    runner::write_report(&report_path, &report).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["layer"], "smart_lamppost");
    assert_eq!(json["collection"]["records_collected"], 1);
    assert_eq!(json["dataset_written"], true);
}

#[test]
fn test_http_fetcher_reports_connection_failure() {
    // Bind then release a port so nothing is listening on it.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let fetcher = HttpFeedFetcher::new(Duration::from_secs(5), None).unwrap();

    let err = fetcher
        .fetch(&format!("http://127.0.0.1:{}/feed.csv", port))
        .unwrap_err();
    assert!(matches!(err, FeedError::Transport(_)));
}
