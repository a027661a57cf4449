//! Warehouse operations dashboard CLI
//!
//! Usage:
//!   warehouse_dashboard [--data PATH] [--json] [filters] <exceptions|network|dead-stock|revenue|all>

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warehouse_dashboard::dead_stock::{analyze_dead_stock, DeadStockReport, DEFAULT_OLDEST_LIMIT};
use warehouse_dashboard::exceptions::{analyze_exceptions, ExceptionReport, SeverityBucket};
use warehouse_dashboard::filters::{parse_selection, FilterConfig, DEFAULT_AGE_THRESHOLD_DAYS};
use warehouse_dashboard::loader;
use warehouse_dashboard::network::{
    analyze_network, display_layer, DisplayLayer, NetworkOptions, NetworkReport,
    DEFAULT_INEFFICIENT_LIMIT, DEFAULT_MAX_POINTS,
};
use warehouse_dashboard::palette::RegionalPalette;
use warehouse_dashboard::revenue::{analyze_revenue, RevenueReport, DEFAULT_TOP_ORDERS};
use warehouse_dashboard::{AnalyticsError, OrderTable, ReportStatus};

#[derive(Parser, Debug)]
#[command(name = "warehouse_dashboard")]
#[command(about = "Warehouse operations dashboard reports")]
struct Cli {
    /// Order export CSV
    #[arg(long, global = true, default_value = "data/orders.csv")]
    data: String,

    /// Print reports as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(subcommand)]
    view: View,
}

#[derive(ClapArgs, Debug)]
struct FilterArgs {
    /// Comma-separated categories (empty = all)
    #[arg(long, global = true)]
    categories: Option<String>,

    /// Comma-separated distribution centers (empty = all)
    #[arg(long, global = true)]
    facilities: Option<String>,

    /// First created date to include (YYYY-MM-DD)
    #[arg(long, global = true)]
    start: Option<NaiveDate>,

    /// Last created date to include (YYYY-MM-DD)
    #[arg(long, global = true)]
    end: Option<NaiveDate>,

    /// Dead-stock age threshold in days
    #[arg(long, global = true, default_value_t = DEFAULT_AGE_THRESHOLD_DAYS)]
    threshold: i64,
}

impl FilterArgs {
    fn to_filters(&self) -> FilterConfig {
        let mut filters = FilterConfig::default()
            .with_age_threshold(self.threshold)
            .with_categories(parse_selection(self.categories.as_deref()))
            .with_facilities(parse_selection(self.facilities.as_deref()));
        if self.start.is_some() || self.end.is_some() {
            filters = filters.with_date_range(
                self.start.unwrap_or(NaiveDate::MIN),
                self.end.unwrap_or(NaiveDate::MAX),
            );
        }
        filters
    }
}

#[derive(Subcommand, Debug)]
enum View {
    /// Fulfillment exceptions (processing and carrier lag)
    Exceptions,
    /// Delivery network distances and inefficient orders
    Network {
        #[arg(long, default_value_t = DEFAULT_INEFFICIENT_LIMIT)]
        limit: usize,
        #[arg(long, default_value_t = DEFAULT_MAX_POINTS)]
        max_points: usize,
    },
    /// Aging inventory
    DeadStock {
        #[arg(long, default_value_t = DEFAULT_OLDEST_LIMIT)]
        limit: usize,
    },
    /// Revenue leakage
    Revenue {
        #[arg(long, default_value_t = DEFAULT_TOP_ORDERS)]
        limit: usize,
    },
    /// Every view with default limits
    All,
}

fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(80));
    println!("  {}", title);
    println!("{}\n", "═".repeat(80));
}

fn print_subsection(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(70));
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

fn print_no_data(status: ReportStatus) -> bool {
    if status == ReportStatus::NoData {
        println!("  No data for the current filters.");
        return true;
    }
    false
}

fn print_exceptions(report: &ExceptionReport) {
    print_section_header("FULFILLMENT EXCEPTIONS");
    if report.unclassifiable > 0 {
        println!("  ({} orders without a usable created date were skipped)", report.unclassifiable);
    }
    if print_no_data(report.status) {
        return;
    }

    let k = &report.kpis;
    println!("  Total orders:       {:>10}", k.total_orders);
    println!("  Processing lag:     {:>10}", k.processing_lag);
    println!("  Carrier lag:        {:>10}", k.carrier_lag);
    println!("  Exception rate:     {:>9.1}%", k.exception_rate);
    println!("  Healthy orders:     {:>10} ({:.1}%)", k.healthy_orders, k.healthy_rate);

    for (name, stats) in [
        ("Processing lag", &report.processing_lag_stats),
        ("Carrier lag", &report.carrier_lag_stats),
    ] {
        if let Some(s) = stats {
            println!(
                "  {:<18}  n={:<6} mean {:.1}d  min {}d  max {}d",
                name, s.count, s.mean_days, s.min_days, s.max_days
            );
        }
    }

    print_subsection("Status distribution");
    for s in &report.status_distribution {
        println!("  {:<20} {:>8}", s.status, s.count);
    }

    print_subsection("Daily trend (last 14 days with orders)");
    println!("  {:<12} {:>8} {:>10} {:>10} {:>8}", "Date", "Orders", "Proc lag", "Carr lag", "Rate");
    for t in report.trend.iter().rev().take(14).rev() {
        println!(
            "  {:<12} {:>8} {:>10} {:>10} {:>7.1}%",
            t.date, t.total_orders, t.processing_lag, t.carrier_lag, t.exception_rate
        );
    }

    if !report.severity.is_empty() {
        print_subsection("Severity by week");
        print!("  {:<12}", "Days");
        for week in &report.severity.weeks {
            print!(" {:>6}", week.format("%m-%d"));
        }
        println!();
        for bucket in SeverityBucket::ALL {
            print!("  {:<12}", bucket.label());
            for week in &report.severity.weeks {
                print!(" {:>6}", report.severity.count(bucket, *week));
            }
            println!();
        }
    }

    print_subsection("Most overdue");
    println!("  {:<16} {:<12} {:<12} {:>6}  {}", "Order", "Status", "Created", "Days", "Kind");
    for o in &report.top_overdue {
        println!(
            "  {:<16} {:<12} {:<12} {:>6}  {}",
            truncate(&o.order_id, 16),
            o.status,
            o.created_date,
            o.days_since_created,
            o.exception_kind.label()
        );
    }
}

fn print_network(report: &NetworkReport, display: &DisplayLayer) {
    print_section_header("DELIVERY NETWORK");
    if report.excluded_missing_geo > 0 {
        println!("  ({} orders without coordinates were skipped)", report.excluded_missing_geo);
    }
    if print_no_data(report.status) {
        return;
    }

    let s = &report.summary;
    println!("  Orders:               {:>10}", s.total_orders);
    println!("  Active facilities:    {:>10}", s.active_facilities);
    println!("  Avg distance:         {:>9.1} km", s.avg_distance_km);
    println!("  Delivery locations:   {:>10}", s.unique_delivery_locations);

    print_subsection("Facility performance");
    println!("  {:<36} {:>8} {:>12} {:>12}", "Facility", "Orders", "Avg km", "Destinations");
    for f in &report.facilities {
        println!(
            "  {:<36} {:>8} {:>12.1} {:>12}",
            truncate(&f.facility, 36),
            f.total_orders,
            f.avg_distance_km,
            f.distinct_destinations
        );
    }

    let ineff = &report.inefficiency;
    print_subsection("Inefficient routing");
    println!(
        "  Median {:.1} km, threshold {:.1} km, {} orders flagged",
        ineff.median_distance_km, ineff.threshold_km, ineff.flagged_count
    );
    for o in &ineff.orders {
        println!(
            "  {:<16} {:<36} {:>10.1} km",
            truncate(&o.order_id, 16),
            truncate(o.facility.as_deref().unwrap_or("Unknown"), 36),
            o.distance_km
        );
    }

    print_subsection("Map layer");
    println!("  {} points displayed", display.points.len());
    if let Some(view) = &display.map_view {
        println!(
            "  Center ({:.3}, {:.3}), zoom {}",
            view.center_lat, view.center_long, view.zoom
        );
    }
    for entry in &display.legend {
        println!(
            "  {} {:<36} {}",
            entry.hex,
            truncate(&entry.facility, 36),
            entry.region.unwrap_or("Other")
        );
    }
}

fn print_dead_stock(report: &DeadStockReport) {
    print_section_header(&format!("DEAD STOCK (age >= {} days)", report.threshold_days));
    if print_no_data(report.status) {
        return;
    }

    let k = &report.kpis;
    println!("  Dead items:      {:>10}", k.dead_items);
    match k.avg_dead_age_days {
        Some(avg) => println!("  Avg dead age:    {:>8.1} d", avg),
        None => println!("  Avg dead age:           n/a"),
    }
    if let Some(pct) = k.dead_share_pct {
        println!("  Share of stock:  {:>9.1}%", pct);
    }

    print_subsection("Pareto by category");
    for p in &report.pareto {
        println!("  {:<28} {:>8} {:>9.1}%", truncate(&p.category, 28), p.dead_items, p.cumulative_pct);
    }

    print_subsection("Age distribution");
    for row in &report.age_distribution {
        println!(
            "  {:<10} {:<28} {:>8} items",
            row.bucket,
            truncate(&row.category, 28),
            row.items
        );
    }

    print_subsection("Oldest items");
    for item in &report.oldest {
        println!(
            "  {:<16} {:<24} {:<28} {:>6} d",
            truncate(&item.order_id, 16),
            truncate(item.category.as_deref().unwrap_or("Unknown"), 24),
            truncate(item.facility.as_deref().unwrap_or("Unknown"), 28),
            item.age_days
        );
    }
}

fn print_revenue(report: &RevenueReport) {
    print_section_header("REVENUE LEAKAGE");
    if let Some((first, last)) = report.available_range {
        println!("  Data available {} to {}", first, last);
    }
    if print_no_data(report.status) {
        return;
    }

    let k = &report.kpis;
    println!("  Lost revenue:     ${:>12.2}", k.lost_revenue);
    println!("  Lost margin:      ${:>12.2}", k.lost_margin);
    println!("  Sunk cost:        ${:>12.2}", k.sunk_cost);
    println!("  Orders affected:   {:>12}", k.orders_with_leakage);

    print_subsection("By category");
    for c in &report.by_category {
        println!("  {:<28} ${:>12.2}", truncate(&c.category, 28), c.lost_revenue);
    }

    print_subsection("By facility and status");
    for f in &report.by_facility_status {
        println!(
            "  {:<36} {:<12} ${:>12.2}",
            truncate(&f.facility, 36),
            f.status,
            f.lost_revenue
        );
    }

    print_subsection("Top leaking orders");
    for o in report.top_orders.iter().take(20) {
        println!(
            "  {:<16} {:<12} ${:>10.2}",
            truncate(&o.order_id, 16),
            o.created_on.map(|d| d.to_string()).unwrap_or_default(),
            o.sale_price.unwrap_or(0.0)
        );
    }
}

fn run_network(
    table: &OrderTable,
    filters: &FilterConfig,
    options: &NetworkOptions,
) -> warehouse_dashboard::Result<(NetworkReport, DisplayLayer)> {
    let report = analyze_network(table, filters, options)?;
    let display = display_layer(&report, options.max_points, &RegionalPalette);
    Ok((report, display))
}

/// In the combined view a dataset lacking one view's columns skips that view.
fn skip_missing<T>(view: &str, result: warehouse_dashboard::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(report) => Ok(Some(report)),
        Err(AnalyticsError::MissingColumns(missing)) => {
            warn!("Skipping {} view, missing columns: {}", view, missing.join(", "));
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let cli = Cli::parse();
    let filters = cli.filters.to_filters();
    let (table, _stats) = loader::load_orders(&cli.data)?;
    let now = Local::now().naive_local();
    info!("Building {:?} view over {} orders", cli.view, table.len());

    let network_options = |limit, max_points| NetworkOptions {
        max_points,
        inefficient_limit: limit,
    };

    match cli.view {
        View::Exceptions => {
            let report = analyze_exceptions(&table, now, &filters)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_exceptions(&report);
            }
        }
        View::Network { limit, max_points } => {
            let (report, display) = run_network(&table, &filters, &network_options(limit, max_points))?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({"report": report, "display": display}))?
                );
            } else {
                print_network(&report, &display);
            }
        }
        View::DeadStock { limit } => {
            let report = analyze_dead_stock(&table, now, &filters, limit)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_dead_stock(&report);
            }
        }
        View::Revenue { limit } => {
            let report = analyze_revenue(&table, &filters, limit)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_revenue(&report);
            }
        }
        View::All => {
            let exceptions = skip_missing("exceptions", analyze_exceptions(&table, now, &filters))?;
            let network = skip_missing(
                "network",
                run_network(
                    &table,
                    &filters,
                    &network_options(DEFAULT_INEFFICIENT_LIMIT, DEFAULT_MAX_POINTS),
                ),
            )?;
            let dead_stock = skip_missing(
                "dead-stock",
                analyze_dead_stock(&table, now, &filters, DEFAULT_OLDEST_LIMIT),
            )?;
            let revenue = skip_missing("revenue", analyze_revenue(&table, &filters, DEFAULT_TOP_ORDERS))?;
            if cli.json {
                let all = json!({
                    "exceptions": exceptions,
                    "network": network.map(|(report, display)| json!({"report": report, "display": display})),
                    "dead_stock": dead_stock,
                    "revenue": revenue,
                });
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                if let Some(report) = &exceptions {
                    print_exceptions(report);
                }
                if let Some((report, display)) = &network {
                    print_network(report, display);
                }
                if let Some(report) = &dead_stock {
                    print_dead_stock(report);
                }
                if let Some(report) = &revenue {
                    print_revenue(report);
                }
            }
        }
    }

    Ok(())
}
