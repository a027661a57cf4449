//! Aging inventory ("dead stock") view

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AnalyticsError, Result};
use crate::filters::FilterConfig;
use crate::models::{column, elapsed_days, OrderRecord, OrderTable, ReportStatus};
use crate::stats::percentage;

pub const DEFAULT_OLDEST_LIMIT: usize = 50;

pub const REQUIRED_COLUMNS: &[&str] = &[column::CATEGORY, column::DC_NAME];

/// Half-open age ranges in days. Negative ages fall in none of them.
pub const AGE_BUCKETS: &[(i64, Option<i64>, &str)] = &[
    (0, Some(30), "0-29"),
    (30, Some(60), "30-59"),
    (60, Some(90), "60-89"),
    (90, Some(180), "90-179"),
    (180, Some(365), "180-364"),
    (365, None, "365+"),
];

pub fn age_bucket(age_days: i64) -> Option<&'static str> {
    AGE_BUCKETS
        .iter()
        .find(|(lo, hi, _)| age_days >= *lo && hi.map_or(true, |hi| age_days < hi))
        .map(|(_, _, label)| *label)
}

/// Explicit age column first, otherwise days since stocking.
pub fn item_age(record: &OrderRecord, now: NaiveDateTime) -> Option<i64> {
    record
        .inventory_age_days
        .or_else(|| record.inventory_stocked_at.map(|t| elapsed_days(now, t)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadStockKpis {
    pub dead_items: usize,
    pub avg_dead_age_days: Option<f64>,
    pub dead_share_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryFacilityRow {
    pub category: String,
    pub total: usize,
    pub by_facility: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParetoRow {
    pub category: String,
    pub dead_items: usize,
    pub cumulative_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBucketRow {
    pub bucket: &'static str,
    pub category: String,
    pub items: usize,
    pub total_age_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgedItem {
    pub order_id: String,
    pub category: Option<String>,
    pub facility: Option<String>,
    pub age_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadStockReport {
    pub status: ReportStatus,
    pub threshold_days: i64,
    /// Rows with no usable age
    pub missing_age: usize,
    pub kpis: DeadStockKpis,
    pub by_category_facility: Vec<CategoryFacilityRow>,
    pub pareto: Vec<ParetoRow>,
    pub age_distribution: Vec<AgeBucketRow>,
    pub oldest: Vec<AgedItem>,
}

pub fn analyze_dead_stock(
    table: &OrderTable,
    now: NaiveDateTime,
    filters: &FilterConfig,
    oldest_limit: usize,
) -> Result<DeadStockReport> {
    let mut missing = table.missing_columns(REQUIRED_COLUMNS);
    if !table.has_column(column::INVENTORY_AGE_DAYS) && !table.has_column(column::INVENTORY_STOCKED_AT) {
        missing.push(column::INVENTORY_AGE_DAYS.to_string());
    }
    if !missing.is_empty() {
        return Err(AnalyticsError::MissingColumns(missing));
    }

    let threshold = filters.age_threshold_days;
    let mut missing_age = 0;
    let inventory: Vec<AgedItem> = table
        .records()
        .iter()
        .filter(|r| filters.matches(r))
        .filter_map(|r| match item_age(r, now) {
            Some(age_days) => Some(AgedItem {
                order_id: r.order_id.clone(),
                category: r.category.clone(),
                facility: r.dc_name.clone(),
                age_days,
            }),
            None => {
                missing_age += 1;
                None
            }
        })
        .collect();

    let mut dead: Vec<&AgedItem> = inventory.iter().filter(|i| i.age_days >= threshold).collect();

    let kpis = DeadStockKpis {
        dead_items: dead.len(),
        avg_dead_age_days: (!dead.is_empty())
            .then(|| dead.iter().map(|i| i.age_days as f64).sum::<f64>() / dead.len() as f64),
        // rows without an age still count toward the filtered inventory
        dead_share_pct: (inventory.len() + missing_age > 0)
            .then(|| percentage(dead.len(), inventory.len() + missing_age)),
    };

    let by_category_facility = category_facility(&dead);
    let pareto = pareto(&by_category_facility, dead.len());
    let age_distribution = age_distribution(&inventory);

    dead.sort_by(|a, b| b.age_days.cmp(&a.age_days));
    let oldest = dead.into_iter().take(oldest_limit).cloned().collect();

    Ok(DeadStockReport {
        status: if inventory.is_empty() {
            ReportStatus::NoData
        } else {
            ReportStatus::Ok
        },
        threshold_days: threshold,
        missing_age,
        kpis,
        by_category_facility,
        pareto,
        age_distribution,
        oldest,
    })
}

fn label(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "Unknown".to_string())
}

/// Categories by dead total desc, ties by name
fn category_facility(dead: &[&AgedItem]) -> Vec<CategoryFacilityRow> {
    let mut grouped: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for item in dead {
        *grouped
            .entry(label(&item.category))
            .or_default()
            .entry(label(&item.facility))
            .or_default() += 1;
    }
    let mut rows: Vec<CategoryFacilityRow> = grouped
        .into_iter()
        .map(|(category, by_facility)| CategoryFacilityRow {
            category,
            total: by_facility.values().sum(),
            by_facility,
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

fn pareto(rows: &[CategoryFacilityRow], total_dead: usize) -> Vec<ParetoRow> {
    let mut running = 0;
    rows.iter()
        .map(|row| {
            running += row.total;
            ParetoRow {
                category: row.category.clone(),
                dead_items: row.total,
                cumulative_pct: percentage(running, total_dead),
            }
        })
        .collect()
}

fn age_distribution(inventory: &[AgedItem]) -> Vec<AgeBucketRow> {
    let categories: BTreeSet<String> = inventory.iter().map(|i| label(&i.category)).collect();
    let mut rows = Vec::new();
    for &(_, _, bucket) in AGE_BUCKETS {
        for category in &categories {
            let items: Vec<&AgedItem> = inventory
                .iter()
                .filter(|i| age_bucket(i.age_days) == Some(bucket) && label(&i.category) == *category)
                .collect();
            if items.is_empty() {
                continue;
            }
            rows.push(AgeBucketRow {
                bucket,
                category: category.clone(),
                items: items.len(),
                total_age_days: items.iter().map(|i| i.age_days).sum(),
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn item(id: &str, category: &str, dc: &str, age: i64) -> OrderRecord {
        let mut r = OrderRecord::new(id).with_facility(dc, 0.0, 0.0).with_category(category);
        r.inventory_age_days = Some(age);
        r
    }

    fn analyze(records: Vec<OrderRecord>, filters: &FilterConfig) -> DeadStockReport {
        analyze_dead_stock(&OrderTable::from_records(records), now(), filters, DEFAULT_OLDEST_LIMIT)
            .unwrap()
    }

    #[test]
    fn test_age_bucket_bounds() {
        assert_eq!(age_bucket(0), Some("0-29"));
        assert_eq!(age_bucket(29), Some("0-29"));
        assert_eq!(age_bucket(30), Some("30-59"));
        assert_eq!(age_bucket(90), Some("90-179"));
        assert_eq!(age_bucket(364), Some("180-364"));
        assert_eq!(age_bucket(365), Some("365+"));
        assert_eq!(age_bucket(-1), None);
    }

    #[test]
    fn test_negative_ages_left_out_of_distribution() {
        let report = analyze(
            vec![item("1", "Jeans", "A", -5), item("2", "Jeans", "A", 10)],
            &FilterConfig::default(),
        );
        assert_eq!(report.age_distribution.len(), 1);
        let row = &report.age_distribution[0];
        assert_eq!((row.bucket, row.items, row.total_age_days), ("0-29", 1, 10));
    }

    #[test]
    fn test_dead_share_counts_rows_without_age() {
        let report = analyze(
            vec![item("1", "Jeans", "A", 100), OrderRecord::new("2").with_facility("A", 0.0, 0.0).with_category("Jeans")],
            &FilterConfig::default(),
        );
        assert_eq!(report.missing_age, 1);
        assert_eq!(report.kpis.dead_items, 1);
        assert_eq!(report.kpis.dead_share_pct, Some(50.0));
    }

    #[test]
    fn test_dead_share_with_only_missing_ages() {
        let report = analyze(
            vec![OrderRecord::new("1").with_category("Jeans")],
            &FilterConfig::default(),
        );
        assert_eq!(report.status, ReportStatus::NoData);
        assert_eq!(report.kpis.dead_share_pct, Some(0.0));
    }

    #[test]
    fn test_age_from_stocked_at() {
        let mut r = OrderRecord::new("1");
        r.inventory_stocked_at = Some(now() - Duration::days(100) - Duration::hours(3));
        assert_eq!(item_age(&r, now()), Some(100));
        r.inventory_age_days = Some(7);
        assert_eq!(item_age(&r, now()), Some(7));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let report = analyze(
            vec![
                item("1", "Jeans", "Chicago IL", 89),
                item("2", "Jeans", "Chicago IL", 90),
                item("3", "Socks", "Houston TX", 200),
                item("4", "Socks", "Houston TX", 10),
            ],
            &FilterConfig::default(),
        );
        assert_eq!(report.kpis.dead_items, 2);
        assert_eq!(report.kpis.avg_dead_age_days, Some(145.0));
        assert_eq!(report.kpis.dead_share_pct, Some(50.0));
        assert_eq!(report.oldest[0].order_id, "3");
    }

    #[test]
    fn test_pareto_cumulative() {
        let report = analyze(
            vec![
                item("1", "Jeans", "A", 100),
                item("2", "Jeans", "B", 100),
                item("3", "Jeans", "A", 100),
                item("4", "Socks", "A", 100),
            ],
            &FilterConfig::default(),
        );
        let jeans = &report.by_category_facility[0];
        assert_eq!(jeans.category, "Jeans");
        assert_eq!(jeans.by_facility.get("A"), Some(&2));
        assert_eq!(report.pareto[0].cumulative_pct, 75.0);
        assert_eq!(report.pareto[1].cumulative_pct, 100.0);
    }

    #[test]
    fn test_age_distribution_sums() {
        let report = analyze(
            vec![item("1", "Jeans", "A", 10), item("2", "Jeans", "A", 20), item("3", "Jeans", "A", 400)],
            &FilterConfig::default(),
        );
        let first = &report.age_distribution[0];
        assert_eq!((first.bucket, first.items, first.total_age_days), ("0-29", 2, 30));
        assert_eq!(report.age_distribution[1].bucket, "365+");
    }

    #[test]
    fn test_no_dead_items() {
        let report = analyze(vec![item("1", "Jeans", "A", 5)], &FilterConfig::default());
        assert_eq!(report.status, ReportStatus::Ok);
        assert_eq!(report.kpis.avg_dead_age_days, None);
        assert_eq!(report.kpis.dead_share_pct, Some(0.0));
    }

    #[test]
    fn test_empty_inventory() {
        let report = analyze(vec![], &FilterConfig::default().with_age_threshold(30));
        assert_eq!(report.status, ReportStatus::NoData);
        assert_eq!(report.kpis.dead_share_pct, None);
        assert_eq!(report.threshold_days, 30);
    }

    #[test]
    fn test_requires_an_age_column() {
        let table = OrderTable::new(["category", "dc_name"], vec![]);
        let err = analyze_dead_stock(&table, now(), &FilterConfig::default(), 50).unwrap_err();
        assert_eq!(err.missing_columns(), ["inventory_age_days"]);
    }
}
