//! REST API Server for the warehouse dashboard
//!
//! Loads the order export once and serves every dashboard view over HTTP.
//!
//! Usage:
//!   ./target/release/api_server [options]
//!
//! Options:
//!   --port PORT       Port to listen on (default: 8080)
//!   --data PATH       Order export CSV (default: data/orders.csv)
//!
//! REST endpoints:
//!   GET /api/v1/health              - Health check
//!   GET /api/v1/exceptions          - Fulfillment exceptions (?categories=&facilities=&start=&end=)
//!   GET /api/v1/network             - Delivery network (?facilities=&start=&end=&max_points=&limit=)
//!   GET /api/v1/dead-stock          - Aging inventory (?threshold=&categories=&facilities=&start=&end=&limit=)
//!   GET /api/v1/revenue             - Revenue leakage (?start=&end=&categories=&facilities=&limit=)

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warehouse_dashboard::api::{create_router, DashboardService};
use warehouse_dashboard::loader;

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Serve the warehouse dashboard views over HTTP")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Order export CSV
    #[arg(long, default_value = "data/orders.csv")]
    data: String,
}

fn print_banner(port: u16, data: &str, rows: usize) {
    println!("============================================================");
    println!("         WAREHOUSE OPERATIONS DASHBOARD API");
    println!("============================================================");
    println!();
    println!("  Port:     {}", port);
    println!("  REST:     http://localhost:{}/api/v1/", port);
    println!("  Dataset:  {} ({} orders)", data, rows);
    println!();
    println!("REST Endpoints:");
    println!("  GET /api/v1/health              Health check");
    println!("  GET /api/v1/exceptions          Fulfillment exceptions");
    println!("  GET /api/v1/network             Delivery network");
    println!("  GET /api/v1/dead-stock          Aging inventory");
    println!("  GET /api/v1/revenue             Revenue leakage");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();

    let (table, stats) = loader::load_orders(&args.data)?;
    if stats.skipped_rows > 0 {
        tracing::warn!("{} rows could not be read and were skipped", stats.skipped_rows);
    }

    print_banner(args.port, &args.data, table.len());

    let service = Arc::new(DashboardService::new(table));
    let app = create_router(service);

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    tracing::info!("Starting REST server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
