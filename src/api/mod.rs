//! API module for the warehouse dashboard
//!
//! REST interface over the loaded order snapshot.

pub mod handlers;
pub mod service;

pub use service::DashboardService;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(service: Arc<DashboardService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/exceptions", get(handlers::get_exceptions))
        .route("/api/v1/network", get(handlers::get_network))
        .route("/api/v1/dead-stock", get(handlers::get_dead_stock))
        .route("/api/v1/revenue", get(handlers::get_revenue))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderRecord, OrderTable};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn router(table: OrderTable) -> Router {
        create_router(Arc::new(DashboardService::new(table)))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn sample_table() -> OrderTable {
        let mut lost = OrderRecord::new("2")
            .with_status("Cancelled")
            .with_facility("Houston TX", 29.76, -95.37)
            .with_customer(30.0, -95.0)
            .with_category("Jeans");
        lost.is_revenue_lost = Some(true);
        lost.sale_price = Some(50.0);
        lost.created_at = chrono::NaiveDate::from_ymd_opt(2024, 1, 5)
            .and_then(|d| d.and_hms_opt(10, 0, 0));
        OrderTable::from_records(vec![
            OrderRecord::new("1")
                .with_status("Processing")
                .with_facility("Chicago IL", 41.88, -87.63)
                .with_customer(41.5, -88.0),
            lost,
        ])
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(router(OrderTable::default()), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_columns_is_422() {
        let table = OrderTable::new(["order_id", "status"], vec![]);
        let (status, body) = get_json(router(table), "/api/v1/exceptions").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["missing"], serde_json::json!(["created_at"]));
    }

    #[tokio::test]
    async fn test_network_endpoint() {
        let (status, body) = get_json(router(sample_table()), "/api/v1/network?max_points=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["summary"]["total_orders"], 2);
        assert_eq!(body["display"]["points"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_network_no_data() {
        let (status, body) =
            get_json(router(sample_table()), "/api/v1/network?facilities=Memphis%20TN").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "no_data");
    }

    #[tokio::test]
    async fn test_exceptions_date_filter() {
        let (status, body) = get_json(router(sample_table()), "/api/v1/exceptions?start=2024-01-01").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kpis"]["total_orders"], 1);
        assert_eq!(body["unclassifiable"], 1);

        let (_, body) = get_json(router(sample_table()), "/api/v1/exceptions?end=2023-12-31").await;
        assert_eq!(body["status"], "no_data");
        assert_eq!(body["unclassifiable"], 1);
    }

    #[tokio::test]
    async fn test_network_date_filter() {
        let (_, body) = get_json(router(sample_table()), "/api/v1/network?start=2024-01-01&end=2024-01-31").await;
        assert_eq!(body["summary"]["total_orders"], 1);

        let (_, body) = get_json(router(sample_table()), "/api/v1/network?start=2024-02-01").await;
        assert_eq!(body["status"], "no_data");
    }

    #[tokio::test]
    async fn test_revenue_date_filter() {
        let (_, body) = get_json(router(sample_table()), "/api/v1/revenue?start=2024-01-01&end=2024-01-31").await;
        assert_eq!(body["kpis"]["lost_revenue"], 50.0);

        let (_, body) = get_json(router(sample_table()), "/api/v1/revenue?start=2024-02-01").await;
        assert_eq!(body["status"], "no_data");
    }
}
