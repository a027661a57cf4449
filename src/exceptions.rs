//! Fulfillment exception classification
//!
//! Flags orders stuck in processing or in transit for too long, then rolls
//! the flags up into KPIs, a daily trend and a severity-by-week matrix.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::filters::FilterConfig;
use crate::models::{column, elapsed_days, OrderRecord, OrderStatus, OrderTable, ReportStatus};
use crate::stats::{mean, percentage};

/// Rule A: processing for more than this many days
pub const PROCESSING_LAG_DAYS: i64 = 3;
/// Rule B: shipped but still open after this many days
pub const CARRIER_LAG_DAYS: i64 = 7;
/// Severity matrix keeps only the most recent weeks
pub const SEVERITY_WEEK_LIMIT: usize = 12;
pub const TOP_OVERDUE_LIMIT: usize = 10;

pub const REQUIRED_COLUMNS: &[&str] = &[column::ORDER_ID, column::CREATED_AT, column::STATUS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    NoException,
    ProcessingLag,
    CarrierLag,
}

impl ExceptionKind {
    pub fn is_exception(self) -> bool {
        self != ExceptionKind::NoException
    }

    pub fn label(self) -> &'static str {
        match self {
            ExceptionKind::NoException => "No Exception",
            ExceptionKind::ProcessingLag => "Processing Lag (>3 days)",
            ExceptionKind::CarrierLag => "Carrier Lag (>7 days)",
        }
    }
}

/// Apply the lag rules in priority order. Unlisted statuses never flag.
pub fn classify(status: Option<&OrderStatus>, days_since_created: i64) -> ExceptionKind {
    match status {
        Some(OrderStatus::Processing) if days_since_created > PROCESSING_LAG_DAYS => {
            ExceptionKind::ProcessingLag
        }
        Some(OrderStatus::Shipped) if days_since_created > CARRIER_LAG_DAYS => {
            ExceptionKind::CarrierLag
        }
        _ => ExceptionKind::NoException,
    }
}

/// Per-order classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedException {
    pub order_id: String,
    pub days_since_created: i64,
    pub exception_kind: ExceptionKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExceptionKpis {
    pub total_orders: usize,
    pub processing_lag: usize,
    pub carrier_lag: usize,
    pub total_exceptions: usize,
    pub exception_rate: f64,
    pub healthy_orders: usize,
    pub healthy_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub total_orders: usize,
    pub processing_lag: usize,
    pub carrier_lag: usize,
    pub total_exceptions: usize,
    pub exception_rate: f64,
}

/// Days-overdue bands used by the severity matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SeverityBucket {
    #[serde(rename = "≤7 days")]
    UpTo7,
    #[serde(rename = "8-14 days")]
    Days8To14,
    #[serde(rename = "15-30 days")]
    Days15To30,
    #[serde(rename = "31-60 days")]
    Days31To60,
    #[serde(rename = "60+ days")]
    Over60,
}

impl SeverityBucket {
    pub const ALL: [SeverityBucket; 5] = [
        SeverityBucket::UpTo7,
        SeverityBucket::Days8To14,
        SeverityBucket::Days15To30,
        SeverityBucket::Days31To60,
        SeverityBucket::Over60,
    ];

    /// Right-closed bands: (.., 7], (7, 14], (14, 30], (30, 60], (60, ..)
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d <= 7 => SeverityBucket::UpTo7,
            d if d <= 14 => SeverityBucket::Days8To14,
            d if d <= 30 => SeverityBucket::Days15To30,
            d if d <= 60 => SeverityBucket::Days31To60,
            _ => SeverityBucket::Over60,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeverityBucket::UpTo7 => "≤7 days",
            SeverityBucket::Days8To14 => "8-14 days",
            SeverityBucket::Days15To30 => "15-30 days",
            SeverityBucket::Days31To60 => "31-60 days",
            SeverityBucket::Over60 => "60+ days",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityRow {
    pub bucket: SeverityBucket,
    /// One count per entry of `SeverityMatrix::weeks`
    pub counts: Vec<usize>,
}

/// Exception counts by severity band and ISO week (Monday start)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeverityMatrix {
    pub weeks: Vec<NaiveDate>,
    pub rows: Vec<SeverityRow>,
}

impl SeverityMatrix {
    pub fn count(&self, bucket: SeverityBucket, week: NaiveDate) -> usize {
        let Some(col) = self.weeks.iter().position(|w| *w == week) else {
            return 0;
        };
        self.rows
            .iter()
            .find(|r| r.bucket == bucket)
            .map(|r| r.counts[col])
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueOrder {
    pub order_id: String,
    pub status: String,
    pub created_date: NaiveDate,
    pub days_since_created: i64,
    pub exception_kind: ExceptionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagStats {
    pub count: usize,
    pub mean_days: f64,
    pub min_days: i64,
    pub max_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionReport {
    pub status: ReportStatus,
    /// Rows skipped because `created_at` was missing or unparseable
    pub unclassifiable: usize,
    pub kpis: ExceptionKpis,
    pub classifications: Vec<DerivedException>,
    pub trend: Vec<TrendPoint>,
    pub severity: SeverityMatrix,
    pub status_distribution: Vec<StatusCount>,
    pub top_overdue: Vec<OverdueOrder>,
    pub processing_lag_stats: Option<LagStats>,
    pub carrier_lag_stats: Option<LagStats>,
}

impl ExceptionReport {
    fn no_data(unclassifiable: usize) -> Self {
        Self {
            status: ReportStatus::NoData,
            unclassifiable,
            kpis: ExceptionKpis::default(),
            classifications: Vec::new(),
            trend: Vec::new(),
            severity: SeverityMatrix::default(),
            status_distribution: Vec::new(),
            top_overdue: Vec::new(),
            processing_lag_stats: None,
            carrier_lag_stats: None,
        }
    }
}

struct Classified<'a> {
    record: &'a OrderRecord,
    created_at: NaiveDateTime,
    days: i64,
    kind: ExceptionKind,
}

/// Classify every order against `now` and build the exception report.
///
/// Fails only when a required column is absent from the table. Rows without
/// a usable `created_at` are counted in `unclassifiable` and left out of
/// every rate.
pub fn analyze_exceptions(
    table: &OrderTable,
    now: NaiveDateTime,
    filters: &FilterConfig,
) -> Result<ExceptionReport> {
    table.require(REQUIRED_COLUMNS)?;

    let mut unclassifiable = 0;
    let classified: Vec<Classified> = table
        .records()
        .iter()
        .filter(|r| filters.matches_category(r) && filters.matches_facility(r))
        .filter_map(|record| match record.created_at {
            Some(created_at) => Some((record, created_at)),
            None => {
                unclassifiable += 1;
                None
            }
        })
        .filter(|(record, _)| filters.matches_date(record))
        .map(|(record, created_at)| {
            let days = elapsed_days(now, created_at);
            Classified {
                record,
                created_at,
                days,
                kind: classify(record.status.as_ref(), days),
            }
        })
        .collect();

    if classified.is_empty() {
        debug!("No classifiable orders ({} unclassifiable)", unclassifiable);
        return Ok(ExceptionReport::no_data(unclassifiable));
    }

    let kpis = compute_kpis(&classified);
    debug!(
        "Classified {} orders: {} processing lag, {} carrier lag",
        kpis.total_orders, kpis.processing_lag, kpis.carrier_lag
    );

    Ok(ExceptionReport {
        status: ReportStatus::Ok,
        unclassifiable,
        classifications: classified
            .iter()
            .map(|c| DerivedException {
                order_id: c.record.order_id.clone(),
                days_since_created: c.days,
                exception_kind: c.kind,
            })
            .collect(),
        trend: compute_trend(&classified),
        severity: compute_severity(&classified),
        status_distribution: compute_status_distribution(&classified),
        top_overdue: compute_top_overdue(&classified, TOP_OVERDUE_LIMIT),
        processing_lag_stats: lag_stats(&classified, ExceptionKind::ProcessingLag),
        carrier_lag_stats: lag_stats(&classified, ExceptionKind::CarrierLag),
        kpis,
    })
}

fn compute_kpis(classified: &[Classified]) -> ExceptionKpis {
    let total_orders = classified.len();
    let processing_lag = count_kind(classified, ExceptionKind::ProcessingLag);
    let carrier_lag = count_kind(classified, ExceptionKind::CarrierLag);
    let total_exceptions = processing_lag + carrier_lag;
    let healthy_orders = total_orders - total_exceptions;

    ExceptionKpis {
        total_orders,
        processing_lag,
        carrier_lag,
        total_exceptions,
        exception_rate: percentage(total_exceptions, total_orders),
        healthy_orders,
        healthy_rate: percentage(healthy_orders, total_orders),
    }
}

fn count_kind(classified: &[Classified], kind: ExceptionKind) -> usize {
    classified.iter().filter(|c| c.kind == kind).count()
}

fn compute_trend(classified: &[Classified]) -> Vec<TrendPoint> {
    // (total, processing, carrier)
    let mut by_date: BTreeMap<NaiveDate, (usize, usize, usize)> = BTreeMap::new();
    for c in classified {
        let entry = by_date.entry(c.created_at.date()).or_default();
        entry.0 += 1;
        match c.kind {
            ExceptionKind::ProcessingLag => entry.1 += 1,
            ExceptionKind::CarrierLag => entry.2 += 1,
            ExceptionKind::NoException => {}
        }
    }

    by_date
        .into_iter()
        .map(|(date, (total, processing, carrier))| TrendPoint {
            date,
            total_orders: total,
            processing_lag: processing,
            carrier_lag: carrier,
            total_exceptions: processing + carrier,
            exception_rate: percentage(processing + carrier, total),
        })
        .collect()
}

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn compute_severity(classified: &[Classified]) -> SeverityMatrix {
    let mut by_week: BTreeMap<NaiveDate, [usize; 5]> = BTreeMap::new();
    for c in classified.iter().filter(|c| c.kind.is_exception()) {
        let week = week_start(c.created_at.date());
        by_week.entry(week).or_default()[SeverityBucket::from_days(c.days).index()] += 1;
    }

    let skip = by_week.len().saturating_sub(SEVERITY_WEEK_LIMIT);
    let kept: Vec<(NaiveDate, [usize; 5])> = by_week.into_iter().skip(skip).collect();

    SeverityMatrix {
        weeks: kept.iter().map(|(week, _)| *week).collect(),
        rows: SeverityBucket::ALL
            .iter()
            .map(|&bucket| SeverityRow {
                bucket,
                counts: kept.iter().map(|(_, counts)| counts[bucket.index()]).collect(),
            })
            .collect(),
    }
}

fn status_label(record: &OrderRecord) -> String {
    record
        .status
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "Unknown".to_string())
}

fn compute_status_distribution(classified: &[Classified]) -> Vec<StatusCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for c in classified {
        *counts.entry(status_label(c.record)).or_default() += 1;
    }
    let mut distribution: Vec<StatusCount> = counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();
    distribution.sort_by(|a, b| b.count.cmp(&a.count));
    distribution
}

fn compute_top_overdue(classified: &[Classified], limit: usize) -> Vec<OverdueOrder> {
    let mut exceptions: Vec<&Classified> =
        classified.iter().filter(|c| c.kind.is_exception()).collect();
    // stable: ties keep input order
    exceptions.sort_by(|a, b| b.days.cmp(&a.days));

    exceptions
        .into_iter()
        .take(limit)
        .map(|c| OverdueOrder {
            order_id: c.record.order_id.clone(),
            status: status_label(c.record),
            created_date: c.created_at.date(),
            days_since_created: c.days,
            exception_kind: c.kind,
        })
        .collect()
}

fn lag_stats(classified: &[Classified], kind: ExceptionKind) -> Option<LagStats> {
    let days: Vec<i64> = classified
        .iter()
        .filter(|c| c.kind == kind)
        .map(|c| c.days)
        .collect();
    let min_days = *days.iter().min()?;
    let max_days = *days.iter().max()?;
    let as_f64: Vec<f64> = days.iter().map(|&d| d as f64).collect();

    Some(LagStats {
        count: days.len(),
        mean_days: mean(&as_f64),
        min_days,
        max_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn order(id: usize, status: &str, days_ago: i64) -> OrderRecord {
        OrderRecord::new(id.to_string())
            .with_status(status)
            .with_created_at(now() - Duration::days(days_ago))
    }

    fn analyze(records: Vec<OrderRecord>) -> ExceptionReport {
        analyze_exceptions(
            &OrderTable::from_records(records),
            now(),
            &FilterConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_classify_rules() {
        let processing = OrderStatus::Processing;
        let shipped = OrderStatus::Shipped;
        assert_eq!(classify(Some(&processing), 4), ExceptionKind::ProcessingLag);
        assert_eq!(classify(Some(&processing), 3), ExceptionKind::NoException);
        assert_eq!(classify(Some(&shipped), 8), ExceptionKind::CarrierLag);
        assert_eq!(classify(Some(&shipped), 7), ExceptionKind::NoException);
        assert_eq!(classify(Some(&OrderStatus::Delivered), 90), ExceptionKind::NoException);
        assert_eq!(
            classify(Some(&OrderStatus::Other("On Hold".into())), 90),
            ExceptionKind::NoException
        );
        assert_eq!(classify(None, 90), ExceptionKind::NoException);
    }

    #[test]
    fn test_status_case_does_not_matter() {
        let report = analyze(vec![
            order(1, "PROCESSING", 5),
            order(2, "processing", 5),
            order(3, "Shipped", 10),
            order(4, "sHiPpEd", 10),
        ]);
        assert_eq!(report.kpis.processing_lag, 2);
        assert_eq!(report.kpis.carrier_lag, 2);
    }

    #[test]
    fn test_three_of_ten_processing() {
        let mut records: Vec<OrderRecord> = (0..3).map(|i| order(i, "Processing", 5)).collect();
        records.extend((3..10).map(|i| order(i, "Delivered", 5)));

        let report = analyze(records);
        assert_eq!(report.status, ReportStatus::Ok);
        assert_eq!(report.kpis.total_orders, 10);
        assert_eq!(report.kpis.processing_lag, 3);
        assert_eq!(report.kpis.carrier_lag, 0);
        assert!((report.kpis.exception_rate - 30.0).abs() < 1e-9);
        assert_eq!(report.kpis.healthy_orders, 7);
    }

    #[test]
    fn test_unparseable_created_at_excluded_from_rates() {
        let report = analyze(vec![
            order(1, "Processing", 5),
            OrderRecord::new("2").with_status("Processing"),
        ]);
        assert_eq!(report.unclassifiable, 1);
        assert_eq!(report.kpis.total_orders, 1);
        assert!((report.kpis.exception_rate - 100.0).abs() < 1e-9);
        assert_eq!(report.classifications.len(), 1);
    }

    #[test]
    fn test_unparseable_created_at_counted_under_date_range() {
        let table = OrderTable::from_records(vec![
            order(1, "Processing", 5),
            OrderRecord::new("2").with_status("Processing"),
        ]);
        for filters in [
            FilterConfig::default(),
            FilterConfig::default().with_date_range(NaiveDate::MIN, NaiveDate::MAX),
        ] {
            let report = analyze_exceptions(&table, now(), &filters).unwrap();
            assert_eq!(report.unclassifiable, 1);
            assert_eq!(report.kpis.total_orders, 1);
        }
    }

    #[test]
    fn test_date_range_excludes_classified_orders_outside_it() {
        let table = OrderTable::from_records(vec![
            order(1, "Processing", 5),
            order(2, "Shipped", 40),
            OrderRecord::new("3").with_status("Shipped"),
        ]);
        let recent = (now() - Duration::days(10)).date();
        let filters = FilterConfig::default().with_date_range(recent, now().date());
        let report = analyze_exceptions(&table, now(), &filters).unwrap();
        assert_eq!(report.kpis.total_orders, 1);
        assert_eq!(report.kpis.carrier_lag, 0);
        assert_eq!(report.unclassifiable, 1);
    }

    #[test]
    fn test_empty_table_is_no_data() {
        let report = analyze(vec![]);
        assert_eq!(report.status, ReportStatus::NoData);
        assert_eq!(report.kpis.total_orders, 0);
        assert_eq!(report.kpis.exception_rate, 0.0);
        assert!(report.trend.is_empty());
        assert!(report.severity.is_empty());
    }

    #[test]
    fn test_all_unparseable_is_no_data() {
        let report = analyze(vec![OrderRecord::new("1").with_status("Shipped")]);
        assert_eq!(report.status, ReportStatus::NoData);
        assert_eq!(report.unclassifiable, 1);
    }

    #[test]
    fn test_missing_schema_reported() {
        let table = OrderTable::new(["order_id"], vec![]);
        let err = analyze_exceptions(&table, now(), &FilterConfig::default()).unwrap_err();
        assert_eq!(err.missing_columns(), ["created_at", "status"]);
    }

    #[test]
    fn test_rate_stays_in_range() {
        let report = analyze((0..5).map(|i| order(i, "Processing", 30)).collect());
        assert!((report.kpis.exception_rate - 100.0).abs() < 1e-9);
        assert!(report.kpis.exception_rate <= 100.0);
    }

    #[test]
    fn test_trend_grouped_by_date() {
        let report = analyze(vec![
            order(1, "Processing", 5),
            order(2, "Delivered", 5),
            order(3, "Shipped", 9),
        ]);
        assert_eq!(report.trend.len(), 2);
        let older = &report.trend[0];
        assert_eq!(older.date, (now() - Duration::days(9)).date());
        assert_eq!(older.carrier_lag, 1);
        let newer = &report.trend[1];
        assert_eq!(newer.total_orders, 2);
        assert_eq!(newer.processing_lag, 1);
        assert!((newer.exception_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_severity_buckets() {
        assert_eq!(SeverityBucket::from_days(4), SeverityBucket::UpTo7);
        assert_eq!(SeverityBucket::from_days(7), SeverityBucket::UpTo7);
        assert_eq!(SeverityBucket::from_days(8), SeverityBucket::Days8To14);
        assert_eq!(SeverityBucket::from_days(30), SeverityBucket::Days15To30);
        assert_eq!(SeverityBucket::from_days(60), SeverityBucket::Days31To60);
        assert_eq!(SeverityBucket::from_days(61), SeverityBucket::Over60);
    }

    #[test]
    fn test_severity_matrix_counts() {
        let report = analyze(vec![
            order(1, "Processing", 5),
            order(2, "Processing", 5),
            order(3, "Shipped", 20),
            order(4, "Delivered", 20),
        ]);
        let week = week_start((now() - Duration::days(5)).date());
        assert_eq!(report.severity.count(SeverityBucket::UpTo7, week), 2);
        let older = week_start((now() - Duration::days(20)).date());
        assert_eq!(report.severity.count(SeverityBucket::Days15To30, older), 1);
        assert_eq!(report.severity.rows.len(), 5);
    }

    #[test]
    fn test_severity_keeps_last_twelve_weeks() {
        let records: Vec<OrderRecord> = (0..20).map(|w| order(w, "Shipped", 8 + w as i64 * 7)).collect();
        let report = analyze(records);
        assert_eq!(report.severity.weeks.len(), SEVERITY_WEEK_LIMIT);
        let newest = week_start((now() - Duration::days(8)).date());
        assert_eq!(report.severity.weeks.last(), Some(&newest));
        assert!(report.severity.weeks.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-06-30 is a Sunday
        let sunday = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2024, 6, 24).unwrap());
    }

    #[test]
    fn test_top_overdue_ordering() {
        let report = analyze(vec![
            order(1, "Processing", 5),
            order(2, "Shipped", 40),
            order(3, "Processing", 12),
            order(4, "Delivered", 100),
        ]);
        let ids: Vec<_> = report.top_overdue.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
        assert_eq!(report.top_overdue[0].exception_kind, ExceptionKind::CarrierLag);
    }

    #[test]
    fn test_lag_stats() {
        let report = analyze(vec![
            order(1, "Processing", 4),
            order(2, "Processing", 10),
        ]);
        let stats = report.processing_lag_stats.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min_days, 4);
        assert_eq!(stats.max_days, 10);
        assert!((stats.mean_days - 7.0).abs() < 1e-9);
        assert!(report.carrier_lag_stats.is_none());
    }

    #[test]
    fn test_status_distribution_sorted() {
        let report = analyze(vec![
            order(1, "Delivered", 1),
            order(2, "Delivered", 1),
            order(3, "Shipped", 1),
        ]);
        assert_eq!(report.status_distribution[0].status, "Delivered");
        assert_eq!(report.status_distribution[0].count, 2);
    }

    #[test]
    fn test_recomputation_is_idempotent() {
        let records = vec![order(1, "Processing", 5), order(2, "Shipped", 9)];
        assert_eq!(analyze(records.clone()), analyze(records));
    }
}
