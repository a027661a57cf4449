//! CSV loading for the order dataset
//!
//! Reads the export once, records which columns were present and coerces
//! every malformed cell to `None` instead of failing the row.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{CsvRecord, OrderTable};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
];

/// Load counters reported alongside the table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub skipped_rows: usize,
    pub malformed_dates: usize,
}

/// Hour-only offsets ("+05") become "+05:00". Date-only strings pass through.
fn expand_short_offset(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let n = bytes.len();
    let short = n > 3
        && s.contains(':')
        && matches!(bytes[n - 3], b'+' | b'-')
        && bytes[n - 2].is_ascii_digit()
        && bytes[n - 1].is_ascii_digit();
    if short {
        Cow::Owned(format!("{}:00", s))
    } else {
        Cow::Borrowed(s)
    }
}

/// Parse a timestamp, dropping any timezone suffix while keeping the wall
/// clock (no conversion). Returns None for anything unparseable.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let s = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s)
        .trim_end();
    let with_offset = expand_short_offset(s);

    if let Ok(dt) = DateTime::parse_from_rfc3339(&with_offset) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&with_offset, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// "" / "NaN" / garbage → None
pub fn parse_number(raw: &Option<String>) -> Option<f64> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Boolean-like indicator: 1/0, true/false, yes/no
pub fn parse_flag(raw: &Option<String>) -> Option<bool> {
    let value = raw.as_deref()?.trim().to_ascii_lowercase();
    match value.as_str() {
        "1" | "1.0" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "0.0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Load the order dataset from a CSV file
pub fn load_orders(path: impl AsRef<Path>) -> Result<(OrderTable, LoadStats)> {
    let path = path.as_ref();
    info!("Reading CSV from {:?}", path);
    let file = std::fs::File::open(path)?;
    load_orders_from_reader(std::io::BufReader::new(file))
}

/// Core loading logic over any reader, used directly by tests
pub fn load_orders_from_reader<R: Read>(reader: R) -> Result<(OrderTable, LoadStats)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut stats = LoadStats::default();
    let mut records = Vec::new();

    for (i, row) in reader.deserialize::<CsvRecord>().enumerate() {
        match row {
            Ok(raw) => {
                let (order, malformed) = raw.to_order();
                stats.malformed_dates += malformed;
                records.push(order);
            }
            Err(e) => {
                if stats.skipped_rows < 5 {
                    warn!("Failed to parse row {}: {}", i + 1, e);
                }
                stats.skipped_rows += 1;
            }
        }
    }
    stats.rows = records.len();

    info!(
        "Loaded {} orders ({} skipped rows, {} malformed dates)",
        stats.rows, stats.skipped_rows, stats.malformed_dates
    );

    Ok((OrderTable::new(columns, records), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = ymd_hms(2023, 5, 17, 8, 30, 0);
        assert_eq!(parse_timestamp("2023-05-17 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-17 08:30:00 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-17T08:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-17 08:30:00+00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2023-05-17"),
            Some(ymd_hms(2023, 5, 17, 0, 0, 0))
        );
    }

    #[test]
    fn test_parse_timestamp_offset_variants() {
        let expected = ymd_hms(2023, 5, 17, 8, 30, 0);
        assert_eq!(parse_timestamp("2023-05-17 08:30:00 +00:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-17 08:30:00+00"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-17T08:30:00-05"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-17 08:30:00.250 +02:00").map(|t| t.date()), Some(expected.date()));
        assert_eq!(expand_short_offset("2023-05-17"), "2023-05-17");
    }

    #[test]
    fn test_parse_timestamp_keeps_wall_clock() {
        // offset is stripped, not converted
        assert_eq!(
            parse_timestamp("2023-05-17T08:30:00-05:00"),
            Some(ymd_hms(2023, 5, 17, 8, 30, 0))
        );
    }

    #[test]
    fn test_parse_timestamp_fractional_seconds() {
        let parsed = parse_timestamp("2023-05-17 08:30:00.123456 UTC").unwrap();
        assert_eq!(parsed.format("%H:%M:%S").to_string(), "08:30:00");
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("NULL"), None);
        assert_eq!(parse_timestamp("2023-13-45 99:00:00"), None);
    }

    #[test]
    fn test_parse_number_and_flag() {
        assert_eq!(parse_number(&Some(" 12.5 ".into())), Some(12.5));
        assert_eq!(parse_number(&Some("NaN".into())), None);
        assert_eq!(parse_number(&None), None);
        assert_eq!(parse_flag(&Some("TRUE".into())), Some(true));
        assert_eq!(parse_flag(&Some("0".into())), Some(false));
        assert_eq!(parse_flag(&Some("maybe".into())), None);
    }

    #[test]
    fn test_load_from_reader() {
        let data = "\
order_id,status,created_at,dc_name,dc_lat,dc_long,customer_lat,customer_long,extra
1,Processing,2024-01-01 10:00:00 UTC,Chicago IL,41.8,-87.6,40.0,-88.0,x
2,shipped,not-a-date,Chicago IL,41.8,-87.6,,-88.0,y
";
        let (table, stats) = load_orders_from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.malformed_dates, 1);
        assert!(table.has_column("dc_name"));
        assert!(table.has_column("extra"));
        assert!(!table.has_column("category"));

        let second = &table.records()[1];
        assert_eq!(second.status, Some(OrderStatus::Shipped));
        assert_eq!(second.created_at, None);
        assert_eq!(second.customer_lat, None);
    }

    #[test]
    fn test_load_short_rows() {
        let data = "order_id,status,created_at\n1,Processing\n";
        let (table, stats) = load_orders_from_reader(data.as_bytes()).unwrap();
        assert_eq!(stats.skipped_rows, 0);
        assert_eq!(table.records()[0].created_at, None);
    }
}
