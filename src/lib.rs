//! Warehouse operations dashboard core
//!
//! Loads an order/fulfillment export once and builds the dashboard views
//! from it: fulfillment exceptions, delivery network geography, aging
//! inventory and revenue leakage.

pub mod api;
pub mod dead_stock;
pub mod error;
pub mod exceptions;
pub mod filters;
pub mod loader;
pub mod models;
pub mod network;
pub mod palette;
pub mod revenue;
pub mod stats;

pub use error::{AnalyticsError, Result};
pub use filters::FilterConfig;
pub use models::{OrderRecord, OrderTable, ReportStatus};
