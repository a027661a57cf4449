//! Shared business logic for the dashboard API
//!
//! Holds the loaded order snapshot and runs the report builders against it.
//! Every call filters into its own copy; the snapshot itself is read-only.

use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::dead_stock::{analyze_dead_stock, DeadStockReport};
use crate::error::Result;
use crate::exceptions::{analyze_exceptions, ExceptionReport};
use crate::filters::FilterConfig;
use crate::models::OrderTable;
use crate::network::{analyze_network, display_layer, DisplayLayer, NetworkOptions, NetworkReport};
use crate::palette::{FacilityPalette, RegionalPalette};
use crate::revenue::{analyze_revenue, RevenueReport};

// ============================================================================
// Data Structures
// ============================================================================

/// Network report plus the sampled map layer built from it
#[derive(Debug, Clone)]
pub struct NetworkView {
    pub report: NetworkReport,
    pub display: DisplayLayer,
}

// ============================================================================
// Service
// ============================================================================

pub struct DashboardService {
    table: Arc<OrderTable>,
    palette: Arc<dyn FacilityPalette>,
    /// Unfiltered network report; distances never depend on the clock
    cached_network: Arc<RwLock<Option<Arc<NetworkReport>>>>,
}

impl DashboardService {
    pub fn new(table: OrderTable) -> Self {
        Self {
            table: Arc::new(table),
            palette: Arc::new(RegionalPalette),
            cached_network: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_palette(mut self, palette: Arc<dyn FacilityPalette>) -> Self {
        self.palette = palette;
        self
    }

    pub fn table(&self) -> &OrderTable {
        &self.table
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    pub fn exceptions(&self, filters: &FilterConfig) -> Result<ExceptionReport> {
        self.exceptions_at(Self::now(), filters)
    }

    pub fn exceptions_at(&self, now: NaiveDateTime, filters: &FilterConfig) -> Result<ExceptionReport> {
        analyze_exceptions(&self.table, now, filters)
    }

    pub async fn network(&self, filters: &FilterConfig, options: &NetworkOptions) -> Result<NetworkView> {
        let unfiltered = *filters == FilterConfig::default();

        let report = if unfiltered {
            self.unfiltered_network(options).await?
        } else {
            analyze_network(&self.table, filters, options)?
        };

        let display = display_layer(&report, options.max_points, self.palette.as_ref());
        Ok(NetworkView { report, display })
    }

    async fn unfiltered_network(&self, options: &NetworkOptions) -> Result<NetworkReport> {
        // Check cache first
        {
            let cache = self.cached_network.read().await;
            if let Some(report) = cache.as_ref() {
                debug!("Network report served from cache");
                return Ok(with_limit(report, options.inefficient_limit));
            }
        }

        // Cache the uncapped list so any later limit can be served from it
        let full = NetworkOptions {
            inefficient_limit: usize::MAX,
            ..*options
        };
        let report = Arc::new(analyze_network(&self.table, &FilterConfig::default(), &full)?);

        // Update cache
        {
            let mut cache = self.cached_network.write().await;
            *cache = Some(report.clone());
        }

        Ok(with_limit(&report, options.inefficient_limit))
    }

    pub fn dead_stock(&self, filters: &FilterConfig, limit: usize) -> Result<DeadStockReport> {
        analyze_dead_stock(&self.table, Self::now(), filters, limit)
    }

    pub fn revenue(&self, filters: &FilterConfig, limit: usize) -> Result<RevenueReport> {
        analyze_revenue(&self.table, filters, limit)
    }
}

fn with_limit(report: &NetworkReport, limit: usize) -> NetworkReport {
    let mut report = report.clone();
    report.inefficiency.orders.truncate(limit);
    report
}
