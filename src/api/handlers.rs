//! REST API handlers for the warehouse dashboard
//!
//! These handlers use the shared DashboardService.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::service::DashboardService;
use crate::dead_stock::{DeadStockReport, DEFAULT_OLDEST_LIMIT};
use crate::error::AnalyticsError;
use crate::exceptions::{
    DerivedException, ExceptionKpis, ExceptionReport, LagStats, OverdueOrder, SeverityMatrix,
    StatusCount, TrendPoint,
};
use crate::filters::{parse_selection, FilterConfig};
use crate::models::ReportStatus;
use crate::network::{
    DisplayLayer, FacilityPerformance, InefficiencyReport, NetworkOptions, NetworkSummary,
    DEFAULT_INEFFICIENT_LIMIT, DEFAULT_MAX_POINTS,
};
use crate::revenue::{RevenueReport, DEFAULT_TOP_ORDERS};
use crate::stats::round_to;

// ============================================================================
// Response Types (JSON-serializable versions)
// ============================================================================

#[derive(Serialize)]
pub struct KpiResponse {
    pub total_orders: usize,
    pub processing_lag: usize,
    pub carrier_lag: usize,
    pub total_exceptions: usize,
    pub exception_rate: f64,
    pub healthy_orders: usize,
    pub healthy_rate: f64,
}

impl From<ExceptionKpis> for KpiResponse {
    fn from(k: ExceptionKpis) -> Self {
        Self {
            total_orders: k.total_orders,
            processing_lag: k.processing_lag,
            carrier_lag: k.carrier_lag,
            total_exceptions: k.total_exceptions,
            exception_rate: round_to(k.exception_rate, 1),
            healthy_orders: k.healthy_orders,
            healthy_rate: round_to(k.healthy_rate, 1),
        }
    }
}

#[derive(Serialize)]
pub struct ExceptionsResponse {
    pub status: ReportStatus,
    pub unclassifiable: usize,
    pub kpis: KpiResponse,
    pub classifications: Vec<DerivedException>,
    pub trend: Vec<TrendPoint>,
    pub severity: SeverityMatrix,
    pub status_distribution: Vec<StatusCount>,
    pub top_overdue: Vec<OverdueOrder>,
    pub processing_lag_stats: Option<LagStats>,
    pub carrier_lag_stats: Option<LagStats>,
}

impl From<ExceptionReport> for ExceptionsResponse {
    fn from(r: ExceptionReport) -> Self {
        Self {
            status: r.status,
            unclassifiable: r.unclassifiable,
            kpis: r.kpis.into(),
            classifications: r.classifications,
            trend: r
                .trend
                .into_iter()
                .map(|t| TrendPoint {
                    exception_rate: round_to(t.exception_rate, 1),
                    ..t
                })
                .collect(),
            severity: r.severity,
            status_distribution: r.status_distribution,
            top_overdue: r.top_overdue,
            processing_lag_stats: r.processing_lag_stats,
            carrier_lag_stats: r.carrier_lag_stats,
        }
    }
}

#[derive(Serialize)]
pub struct FacilityResponse {
    pub facility: String,
    pub total_orders: usize,
    pub avg_distance_km: f64,
    pub distinct_destinations: usize,
}

impl From<FacilityPerformance> for FacilityResponse {
    fn from(f: FacilityPerformance) -> Self {
        Self {
            facility: f.facility,
            total_orders: f.total_orders,
            avg_distance_km: round_to(f.avg_distance_km, 1),
            distinct_destinations: f.distinct_destinations,
        }
    }
}

#[derive(Serialize)]
pub struct NetworkResponse {
    pub status: ReportStatus,
    pub excluded_missing_geo: usize,
    pub summary: NetworkSummary,
    pub facilities: Vec<FacilityResponse>,
    pub inefficiency: InefficiencyReport,
    pub display: DisplayLayer,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: AnalyticsError) -> ApiError {
    match e {
        AnalyticsError::MissingColumns(missing) => {
            warn!("Rejected request, dataset lacks columns: {:?}", missing);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: "dataset is missing required columns".to_string(),
                    missing,
                }),
            )
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: other.to_string(),
                missing: Vec::new(),
            }),
        ),
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize)]
pub struct FilterQuery {
    pub categories: Option<String>,
    pub facilities: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl FilterQuery {
    /// A single date bound leaves the other side open.
    fn to_filters(&self) -> FilterConfig {
        let mut filters = FilterConfig {
            selected_categories: parse_selection(self.categories.as_deref()),
            selected_facilities: parse_selection(self.facilities.as_deref()),
            ..FilterConfig::default()
        };
        if self.start.is_some() || self.end.is_some() {
            filters.date_range = Some((
                self.start.unwrap_or(NaiveDate::MIN),
                self.end.unwrap_or(NaiveDate::MAX),
            ));
        }
        filters
    }
}

#[derive(Deserialize)]
pub struct NetworkQuery {
    pub facilities: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub max_points: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct DeadStockQuery {
    pub threshold: Option<i64>,
    pub categories: Option<String>,
    pub facilities: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct RevenueQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub categories: Option<String>,
    pub facilities: Option<String>,
    pub limit: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<DashboardService>;

/// GET /api/v1/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/v1/exceptions?categories=..&facilities=..&start=YYYY-MM-DD&end=YYYY-MM-DD
pub async fn get_exceptions(
    State(service): State<AppState>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<ExceptionsResponse>, ApiError> {
    match service.exceptions(&params.to_filters()) {
        Ok(report) => Ok(Json(report.into())),
        Err(e) => Err(error_response(e)),
    }
}

/// GET /api/v1/network?facilities=A,B&start=..&end=..&max_points=N&limit=N
pub async fn get_network(
    State(service): State<AppState>,
    Query(params): Query<NetworkQuery>,
) -> Result<Json<NetworkResponse>, ApiError> {
    let filters = FilterQuery {
        categories: None,
        facilities: params.facilities,
        start: params.start,
        end: params.end,
    }
    .to_filters();
    let options = NetworkOptions {
        max_points: params.max_points.unwrap_or(DEFAULT_MAX_POINTS),
        inefficient_limit: params.limit.unwrap_or(DEFAULT_INEFFICIENT_LIMIT),
    };
    match service.network(&filters, &options).await {
        Ok(view) => Ok(Json(NetworkResponse {
            status: view.report.status,
            excluded_missing_geo: view.report.excluded_missing_geo,
            summary: NetworkSummary {
                avg_distance_km: round_to(view.report.summary.avg_distance_km, 1),
                ..view.report.summary
            },
            facilities: view.report.facilities.into_iter().map(FacilityResponse::from).collect(),
            inefficiency: view.report.inefficiency,
            display: view.display,
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// GET /api/v1/dead-stock?threshold=N&categories=..&facilities=..&start=..&end=..&limit=N
pub async fn get_dead_stock(
    State(service): State<AppState>,
    Query(params): Query<DeadStockQuery>,
) -> Result<Json<DeadStockReport>, ApiError> {
    let mut filters = FilterQuery {
        categories: params.categories,
        facilities: params.facilities,
        start: params.start,
        end: params.end,
    }
    .to_filters();
    if let Some(threshold) = params.threshold {
        filters.age_threshold_days = threshold;
    }
    let limit = params.limit.unwrap_or(DEFAULT_OLDEST_LIMIT);
    service.dead_stock(&filters, limit).map(Json).map_err(error_response)
}

/// GET /api/v1/revenue?start=YYYY-MM-DD&end=YYYY-MM-DD&categories=..&facilities=..&limit=N
pub async fn get_revenue(
    State(service): State<AppState>,
    Query(params): Query<RevenueQuery>,
) -> Result<Json<RevenueReport>, ApiError> {
    let filters = FilterQuery {
        categories: params.categories,
        facilities: params.facilities,
        start: params.start,
        end: params.end,
    }
    .to_filters();
    let limit = params.limit.unwrap_or(DEFAULT_TOP_ORDERS);
    service.revenue(&filters, limit).map(Json).map_err(error_response)
}
