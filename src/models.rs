use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{AnalyticsError, Result};
use crate::loader::{parse_flag, parse_number, parse_timestamp};

/// Column names of the order dataset
pub mod column {
    pub const ORDER_ID: &str = "order_id";
    pub const STATUS: &str = "status";
    pub const CREATED_AT: &str = "created_at";
    pub const SHIPPED_AT: &str = "shipped_at";
    pub const DELIVERED_AT: &str = "delivered_at";
    pub const INVENTORY_STOCKED_AT: &str = "inventory_stocked_at";
    pub const INVENTORY_AGE_DAYS: &str = "inventory_age_days";
    pub const DC_NAME: &str = "dc_name";
    pub const DC_LAT: &str = "dc_lat";
    pub const DC_LONG: &str = "dc_long";
    pub const CUSTOMER_LAT: &str = "customer_lat";
    pub const CUSTOMER_LONG: &str = "customer_long";
    pub const SALE_PRICE: &str = "sale_price";
    pub const COST: &str = "cost";
    pub const GROSS_MARGIN: &str = "gross_margin";
    pub const CATEGORY: &str = "category";
    pub const IS_REVENUE_LOST: &str = "is_revenue_lost";

    pub const ALL: &[&str] = &[
        ORDER_ID,
        STATUS,
        CREATED_AT,
        SHIPPED_AT,
        DELIVERED_AT,
        INVENTORY_STOCKED_AT,
        INVENTORY_AGE_DAYS,
        DC_NAME,
        DC_LAT,
        DC_LONG,
        CUSTOMER_LAT,
        CUSTOMER_LONG,
        SALE_PRICE,
        COST,
        GROSS_MARGIN,
        CATEGORY,
        IS_REVENUE_LOST,
    ];
}

/// Raw record from CSV ingestion. Every field is kept as text so a single
/// malformed cell never rejects the whole row.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CsvRecord {
    pub order_id: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub shipped_at: Option<String>,
    pub delivered_at: Option<String>,
    pub inventory_stocked_at: Option<String>,
    pub inventory_age_days: Option<String>,
    pub dc_name: Option<String>,
    pub dc_lat: Option<String>,
    pub dc_long: Option<String>,
    pub customer_lat: Option<String>,
    pub customer_long: Option<String>,
    pub sale_price: Option<String>,
    pub cost: Option<String>,
    pub gross_margin: Option<String>,
    pub category: Option<String>,
    pub is_revenue_lost: Option<String>,
}

/// Order lifecycle status
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Complete,
    Other(String),
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            "returned" => OrderStatus::Returned,
            "complete" => OrderStatus::Complete,
            _ => OrderStatus::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Processing => f.write_str("Processing"),
            OrderStatus::Shipped => f.write_str("Shipped"),
            OrderStatus::Delivered => f.write_str("Delivered"),
            OrderStatus::Cancelled => f.write_str("Cancelled"),
            OrderStatus::Returned => f.write_str("Returned"),
            OrderStatus::Complete => f.write_str("Complete"),
            OrderStatus::Other(label) => f.write_str(label),
        }
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One order/fulfillment row, timestamps already normalized to naive wall clock
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub status: Option<OrderStatus>,
    pub created_at: Option<NaiveDateTime>,
    pub shipped_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
    pub inventory_stocked_at: Option<NaiveDateTime>,
    pub inventory_age_days: Option<i64>,
    pub dc_name: Option<String>,
    pub dc_lat: Option<f64>,
    pub dc_long: Option<f64>,
    pub customer_lat: Option<f64>,
    pub customer_long: Option<f64>,
    pub sale_price: Option<f64>,
    pub cost: Option<f64>,
    pub gross_margin: Option<f64>,
    pub category: Option<String>,
    pub is_revenue_lost: Option<bool>,
}

impl OrderRecord {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(OrderStatus::from(status));
        self
    }

    pub fn with_created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_facility(mut self, name: &str, lat: f64, long: f64) -> Self {
        self.dc_name = Some(name.to_string());
        self.dc_lat = Some(lat);
        self.dc_long = Some(long);
        self
    }

    pub fn with_customer(mut self, lat: f64, long: f64) -> Self {
        self.customer_lat = Some(lat);
        self.customer_long = Some(long);
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}

/// Whole days elapsed from `then` to `now`, floored and never negative.
pub fn elapsed_days(now: NaiveDateTime, then: NaiveDateTime) -> i64 {
    (now - then).num_seconds().div_euclid(86_400).max(0)
}

/// Outcome marker carried by every report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    NoData,
}

/// Immutable snapshot of the order dataset: the columns the source carried
/// plus the parsed rows.
#[derive(Debug, Clone, Default)]
pub struct OrderTable {
    columns: BTreeSet<String>,
    records: Vec<OrderRecord>,
}

impl OrderTable {
    pub fn new<I, S>(columns: I, records: Vec<OrderRecord>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            records,
        }
    }

    /// Table carrying the full column set.
    pub fn from_records(records: Vec<OrderRecord>) -> Self {
        Self::new(column::ALL.iter().copied(), records)
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Fails with `MissingColumns` listing every absent required column.
    pub fn require(&self, required: &[&str]) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AnalyticsError::MissingColumns(missing))
        }
    }
}

impl CsvRecord {
    /// Convert into an `OrderRecord`, returning how many non-empty date cells
    /// failed to parse and were coerced to `None`.
    pub fn to_order(&self) -> (OrderRecord, usize) {
        let mut malformed_dates = 0;
        let mut date = |raw: &Option<String>| -> Option<NaiveDateTime> {
            let raw = raw.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                malformed_dates += 1;
            }
            parsed
        };

        let created_at = date(&self.created_at);
        let shipped_at = date(&self.shipped_at);
        let delivered_at = date(&self.delivered_at);
        let inventory_stocked_at = date(&self.inventory_stocked_at);

        let text = |raw: &Option<String>| {
            raw.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let order = OrderRecord {
            order_id: text(&self.order_id).unwrap_or_default(),
            status: text(&self.status).map(|s| OrderStatus::from(s.as_str())),
            created_at,
            shipped_at,
            delivered_at,
            inventory_stocked_at,
            inventory_age_days: parse_number(&self.inventory_age_days).map(|d| d.floor() as i64),
            dc_name: text(&self.dc_name),
            dc_lat: parse_number(&self.dc_lat),
            dc_long: parse_number(&self.dc_long),
            customer_lat: parse_number(&self.customer_lat),
            customer_long: parse_number(&self.customer_long),
            sale_price: parse_number(&self.sale_price),
            cost: parse_number(&self.cost),
            gross_margin: parse_number(&self.gross_margin),
            category: text(&self.category),
            is_revenue_lost: parse_flag(&self.is_revenue_lost),
        };

        (order, malformed_dates)
    }
}
