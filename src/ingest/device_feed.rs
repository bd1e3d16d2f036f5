/// Device feed client
///
/// Retrieves the live CSV published by a lamppost's telemetry endpoint and
/// parses it into a `RawDeviceFeed`. Feeds are small (usually a single row)
/// so the whole body is read before parsing.
///
/// The HTTP side sits behind `FeedFetcher` so the collection driver can be
/// exercised without a network.

use std::time::Duration;

use tracing::debug;

use crate::error::CollectorError;
use crate::model::{FeedError, RawDeviceFeed};

/// Cell values treated as missing, in addition to the empty string.
pub const MISSING_VALUE_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const UTF8_BOM: &str = "\u{feff}";

// ============================================================================
// Fetching
// ============================================================================

/// Source of raw device feed bytes.
pub trait FeedFetcher {
    /// Fetch the body at `url`. Any transport failure or non-success status
    /// is an error.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError>;
}

/// Blocking HTTP fetcher with a per-request timeout.
pub struct HttpFeedFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, CollectorError> {
        let mut builder = reqwest::blocking::Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        let client = builder
            .build()
            .map_err(|e| CollectorError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

impl FeedFetcher for HttpFeedFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/csv, text/plain;q=0.9, */*;q=0.5")
            .send()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::HttpError(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        debug!(url, bytes = body.len(), "feed downloaded");
        Ok(body.to_vec())
    }
}

// ============================================================================
// Parsing
// ============================================================================

pub(crate) fn is_missing(cell: &str) -> bool {
    cell.is_empty() || MISSING_VALUE_MARKERS.contains(&cell)
}

/// Parse a device feed body: UTF-8, comma-separated, header row first.
///
/// Short rows are padded with missing cells; rows wider than the header, a
/// missing header, or invalid UTF-8 are parse errors.
pub fn parse_feed(bytes: &[u8]) -> Result<RawDeviceFeed, FeedError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| FeedError::ParseError(format!("body is not UTF-8: {}", e)))?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

    if text.trim().is_empty() {
        return Err(FeedError::ParseError("no columns to parse from body".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| FeedError::ParseError(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FeedError::ParseError(e.to_string()))?;
        if record.len() > columns.len() {
            return Err(FeedError::ParseError(format!(
                "row {} has {} fields, header has {}",
                i + 1,
                record.len(),
                columns.len()
            )));
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|cell| (!is_missing(cell)).then(|| cell.to_string()))
            .collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    Ok(RawDeviceFeed { columns, rows })
}

/// Fetch and parse in one step.
pub fn fetch_feed(fetcher: &dyn FeedFetcher, url: &str) -> Result<RawDeviceFeed, FeedError> {
    let body = fetcher.fetch(url)?;
    parse_feed(&body)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_row_feed() {
        let body = b"Lamppost ID,Air temperature (C),Relative humidity (%)\nLP1,21.5,60.0\n";
        let feed = parse_feed(body).unwrap();
        assert_eq!(feed.columns.len(), 3);
        assert_eq!(feed.columns[1], "Air temperature (C)");
        assert_eq!(
            feed.rows,
            vec![vec![Some("LP1".into()), Some("21.5".into()), Some("60.0".into())]]
        );
    }

    #[test]
    fn test_missing_markers_become_none() {
        let body = b"a,b,c,d\nNaN,,N/A,0\n";
        let feed = parse_feed(body).unwrap();
        assert_eq!(feed.rows[0], vec![None, None, None, Some("0".into())]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let feed = parse_feed(b"a,b,c\n1\n").unwrap();
        assert_eq!(feed.rows[0], vec![Some("1".into()), None, None]);
    }

    #[test]
    fn test_wide_rows_are_rejected() {
        let err = parse_feed(b"a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, FeedError::ParseError(_)));
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let feed = parse_feed("\u{feff}Lamppost ID,x\nLP2,1\n".as_bytes()).unwrap();
        assert_eq!(feed.columns[0], "Lamppost ID");
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let feed = parse_feed(b"\"Device height (m), approx\",b\n3.2,\"x,y\"\n").unwrap();
        assert_eq!(feed.columns[0], "Device height (m), approx");
        assert_eq!(feed.rows[0][1].as_deref(), Some("x,y"));
    }

    #[test]
    fn test_empty_and_non_utf8_bodies_fail() {
        assert!(matches!(parse_feed(b""), Err(FeedError::ParseError(_))));
        assert!(matches!(parse_feed(b"  \n"), Err(FeedError::ParseError(_))));
        assert!(matches!(parse_feed(&[0xff, 0xfe, 0x00]), Err(FeedError::ParseError(_))));
    }

    #[test]
    fn test_header_only_feed_has_no_rows() {
        let feed = parse_feed(b"Lamppost ID,Air temperature (C)\n").unwrap();
        assert!(feed.rows.is_empty());
    }

    struct FixedFetcher(Result<Vec<u8>, FeedError>);

    impl FeedFetcher for FixedFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, FeedError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_fetch_feed_propagates_fetch_errors() {
        let fetcher = FixedFetcher(Err(FeedError::HttpError(404)));
        assert_eq!(fetch_feed(&fetcher, "http://x"), Err(FeedError::HttpError(404)));

        let fetcher = FixedFetcher(Ok(b"a\n1\n".to_vec()));
        assert_eq!(fetch_feed(&fetcher, "http://x").unwrap().rows.len(), 1);
    }
}
