//! Revenue leakage view: orders flagged as lost revenue

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::error::Result;
use crate::filters::FilterConfig;
use crate::models::{column, OrderRecord, OrderTable, ReportStatus};

pub const DEFAULT_TOP_ORDERS: usize = 200;

pub const REQUIRED_COLUMNS: &[&str] = &[column::IS_REVENUE_LOST, column::CREATED_AT];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeakageKpis {
    pub lost_revenue: f64,
    pub lost_margin: f64,
    pub sunk_cost: f64,
    pub orders_with_leakage: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityStatusLoss {
    pub facility: String,
    pub status: String,
    pub lost_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryLoss {
    pub category: String,
    pub lost_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeakingOrder {
    pub order_id: String,
    pub created_on: Option<NaiveDate>,
    pub facility: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub sale_price: Option<f64>,
    pub gross_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueReport {
    pub status: ReportStatus,
    /// Earliest/latest created date among all leaking rows, before filtering
    pub available_range: Option<(NaiveDate, NaiveDate)>,
    pub kpis: LeakageKpis,
    pub by_facility_status: Vec<FacilityStatusLoss>,
    pub by_category: Vec<CategoryLoss>,
    pub top_orders: Vec<LeakingOrder>,
}

pub fn analyze_revenue(
    table: &OrderTable,
    filters: &FilterConfig,
    top_limit: usize,
) -> Result<RevenueReport> {
    table.require(REQUIRED_COLUMNS)?;

    let leaking: Vec<&OrderRecord> = table
        .records()
        .iter()
        .filter(|r| r.is_revenue_lost == Some(true))
        .collect();

    let dates = leaking.iter().filter_map(|r| r.created_at.map(|c| c.date()));
    let available_range = dates.clone().min().zip(dates.max());

    let selected: Vec<&OrderRecord> = leaking.into_iter().filter(|r| filters.matches(r)).collect();

    if selected.is_empty() {
        return Ok(RevenueReport {
            status: ReportStatus::NoData,
            available_range,
            kpis: LeakageKpis::default(),
            by_facility_status: Vec::new(),
            by_category: Vec::new(),
            top_orders: Vec::new(),
        });
    }

    Ok(RevenueReport {
        status: ReportStatus::Ok,
        available_range,
        kpis: compute_kpis(&selected),
        by_facility_status: by_facility_status(&selected),
        by_category: by_category(&selected),
        top_orders: top_orders(&selected, top_limit),
    })
}

fn sum(records: &[&OrderRecord], field: impl Fn(&OrderRecord) -> Option<f64>) -> f64 {
    records.iter().copied().filter_map(field).sum()
}

fn compute_kpis(records: &[&OrderRecord]) -> LeakageKpis {
    LeakageKpis {
        lost_revenue: sum(records, |r| r.sale_price),
        lost_margin: sum(records, |r| r.gross_margin),
        sunk_cost: sum(records, |r| r.cost),
        orders_with_leakage: records
            .iter()
            .map(|r| r.order_id.as_str())
            .collect::<HashSet<_>>()
            .len(),
    }
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| "Unknown".to_string())
}

fn by_facility_status(records: &[&OrderRecord]) -> Vec<FacilityStatusLoss> {
    let mut grouped: BTreeMap<(String, String), f64> = BTreeMap::new();
    for r in records {
        let key = (
            or_unknown(r.dc_name.clone()),
            or_unknown(r.status.as_ref().map(|s| s.to_string())),
        );
        *grouped.entry(key).or_default() += r.sale_price.unwrap_or(0.0);
    }
    grouped
        .into_iter()
        .map(|((facility, status), lost_revenue)| FacilityStatusLoss {
            facility,
            status,
            lost_revenue,
        })
        .collect()
}

fn by_category(records: &[&OrderRecord]) -> Vec<CategoryLoss> {
    let mut grouped: BTreeMap<String, f64> = BTreeMap::new();
    for r in records {
        *grouped.entry(or_unknown(r.category.clone())).or_default() += r.sale_price.unwrap_or(0.0);
    }
    let mut rows: Vec<CategoryLoss> = grouped
        .into_iter()
        .map(|(category, lost_revenue)| CategoryLoss {
            category,
            lost_revenue,
        })
        .collect();
    rows.sort_by(|a, b| b.lost_revenue.total_cmp(&a.lost_revenue));
    rows
}

/// Highest sale price first; rows without a price sort last.
fn top_orders(records: &[&OrderRecord], limit: usize) -> Vec<LeakingOrder> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        b.sale_price
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&a.sale_price.unwrap_or(f64::NEG_INFINITY))
    });
    sorted
        .into_iter()
        .take(limit)
        .map(|r| LeakingOrder {
            order_id: r.order_id.clone(),
            created_on: r.created_at.map(|c| c.date()),
            facility: r.dc_name.clone(),
            category: r.category.clone(),
            status: r.status.as_ref().map(|s| s.to_string()),
            sale_price: r.sale_price,
            gross_margin: r.gross_margin,
        })
        .collect()
}
