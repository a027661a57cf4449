//! Synthetic order export generator
//!
//! Writes a seeded, plausible order/fulfillment CSV with the columns every
//! dashboard view reads. A configurable share of cells is blanked or garbled
//! so the loader's coercion paths get exercised too.
//!
//! Usage:
//!   cargo run --release --bin generate_synthetic -- [OPTIONS]
//!
//! Options:
//!   --orders <N>        Number of orders to generate (default: 5000)
//!   --days <N>          Spread created dates over the last N days (default: 120)
//!   --dirty-rate <F>    Probability of a malformed cell per row (default: 0.02)
//!   --seed <N>          Random seed for reproducibility (optional)
//!   --output <PATH>     Output CSV path (default: data/orders.csv)

use anyhow::Result;
use chrono::{Duration, Local, NaiveDateTime};
use clap::Parser;
use csv::WriterBuilder;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use std::path::PathBuf;

/// Synthetic data generator for the order export
#[derive(Parser, Debug)]
#[command(name = "generate_synthetic")]
#[command(about = "Generate a synthetic order export with controlled noise")]
struct Args {
    /// Number of orders to generate
    #[arg(long, default_value = "5000")]
    orders: usize,

    /// Spread created dates over this many past days
    #[arg(long, default_value = "120")]
    days: i64,

    /// Probability that a row carries a malformed cell (0.0 - 1.0)
    #[arg(long, default_value = "0.02")]
    dirty_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Output CSV path
    #[arg(long, default_value = "data/orders.csv")]
    output: PathBuf,
}

/// (name, lat, long)
const DISTRIBUTION_CENTERS: &[(&str, f64, f64)] = &[
    ("Port Authority of New York/New Jersey NY/NJ", 40.68, -74.04),
    ("Philadelphia PA", 39.95, -75.17),
    ("Charleston SC", 32.78, -79.93),
    ("Chicago IL", 41.88, -87.63),
    ("Memphis TN", 35.15, -90.05),
    ("Houston TX", 29.76, -95.37),
    ("New Orleans LA", 29.95, -90.07),
    ("Savannah GA", 32.08, -81.09),
    ("Mobile AL", 30.69, -88.04),
    ("Los Angeles CA", 34.05, -118.24),
];

const CATEGORIES: &[&str] = &[
    "Jeans", "Tops & Tees", "Outerwear & Coats", "Sweaters", "Socks", "Accessories",
    "Swim", "Active", "Sleep & Lounge", "Intimates",
];

/// (status, weight)
const STATUSES: &[(&str, u32)] = &[
    ("Processing", 15),
    ("Shipped", 25),
    ("Complete", 40),
    ("Cancelled", 12),
    ("Returned", 8),
];

#[derive(Debug, Serialize)]
struct OutputRecord {
    order_id: String,
    status: String,
    created_at: String,
    shipped_at: String,
    delivered_at: String,
    inventory_stocked_at: String,
    inventory_age_days: String,
    dc_name: String,
    dc_lat: String,
    dc_long: String,
    customer_lat: String,
    customer_long: String,
    sale_price: String,
    cost: String,
    gross_margin: String,
    category: String,
    is_revenue_lost: String,
}

/// Format datetime the way the upstream export does
fn format_datetime(dt: &NaiveDateTime) -> String {
    format!("{} UTC", dt.format("%Y-%m-%d %H:%M:%S"))
}

fn pick_status(rng: &mut impl Rng) -> &'static str {
    let total: u32 = STATUSES.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for &(status, weight) in STATUSES {
        if roll < weight {
            return status;
        }
        roll -= weight;
    }
    STATUSES[0].0
}

/// Customer location scattered around the DC; occasional long-haul outliers
fn customer_location(dc_lat: f64, dc_long: f64, rng: &mut impl Rng) -> (f64, f64) {
    let spread = if rng.gen_bool(0.08) { 12.0 } else { 3.0 };
    (
        (dc_lat + rng.gen_range(-spread..=spread)).clamp(-89.0, 89.0),
        dc_long + rng.gen_range(-spread..=spread),
    )
}

fn generate_order(id: usize, now: NaiveDateTime, args: &Args, rng: &mut impl Rng) -> OutputRecord {
    let (dc_name, dc_lat, dc_long) = DISTRIBUTION_CENTERS[rng.gen_range(0..DISTRIBUTION_CENTERS.len())];
    let (customer_lat, customer_long) = customer_location(dc_lat, dc_long, rng);
    let status = pick_status(rng);
    let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];

    let created = now - Duration::minutes(rng.gen_range(0..args.days.max(1) * 24 * 60));
    let shipped = created + Duration::hours(rng.gen_range(4..96));
    let delivered = shipped + Duration::hours(rng.gen_range(24..240));
    let stocked = created - Duration::days(rng.gen_range(0..400));
    let age_days = (now - stocked).num_days();

    let shipped_at = match status {
        "Processing" | "Cancelled" => String::new(),
        _ => format_datetime(&shipped),
    };
    let delivered_at = match status {
        "Complete" | "Returned" => format_datetime(&delivered),
        _ => String::new(),
    };

    let sale_price: f64 = rng.gen_range(8.0..180.0);
    let cost = sale_price * rng.gen_range(0.35..0.65);
    let revenue_lost = matches!(status, "Cancelled" | "Returned");

    let mut record = OutputRecord {
        order_id: format!("ORD-{:07}", id),
        status: status.to_string(),
        created_at: format_datetime(&created),
        shipped_at,
        delivered_at,
        inventory_stocked_at: format_datetime(&stocked),
        inventory_age_days: age_days.to_string(),
        dc_name: dc_name.to_string(),
        dc_lat: format!("{:.4}", dc_lat),
        dc_long: format!("{:.4}", dc_long),
        customer_lat: format!("{:.5}", customer_lat),
        customer_long: format!("{:.5}", customer_long),
        sale_price: format!("{:.2}", sale_price),
        cost: format!("{:.2}", cost),
        gross_margin: format!("{:.2}", sale_price - cost),
        category: category.to_string(),
        is_revenue_lost: if revenue_lost { "1" } else { "0" }.to_string(),
    };

    if rng.gen::<f64>() < args.dirty_rate {
        dirty(&mut record, rng);
    }
    record
}

/// Blank or garble one cell the loader must coerce to missing
fn dirty(record: &mut OutputRecord, rng: &mut impl Rng) {
    match rng.gen_range(0..5) {
        0 => record.created_at = "not-a-date".to_string(),
        1 => record.customer_lat = String::new(),
        2 => record.dc_long = "NaN".to_string(),
        3 => record.status = record.status.to_uppercase(),
        _ => record.inventory_age_days = String::new(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("🔧 Synthetic Order Generator");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Output:           {}", args.output.display());
    println!("Orders:           {}", args.orders);
    println!("Created window:   last {} days", args.days);
    println!("Dirty rate:       {:.1}%", args.dirty_rate * 100.0);
    if let Some(seed) = args.seed {
        println!("Random seed:      {}", seed);
    }
    println!();

    // Initialize RNG
    let mut rng: StdRng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    // Ensure output directory exists
    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    println!("🏭 Generating orders...");
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(&args.output)?;

    let now = Local::now().naive_local();
    let mut lost = 0;
    for i in 0..args.orders {
        let record = generate_order(i + 1, now, &args, &mut rng);
        if record.is_revenue_lost == "1" {
            lost += 1;
        }
        writer.serialize(&record)?;

        if (i + 1) % 10_000 == 0 {
            println!("   Written {} orders...", i + 1);
        }
    }
    writer.flush()?;

    println!();
    println!("✅ Done");
    println!("   Orders written:     {}", args.orders);
    println!("   Revenue-lost rows:  {}", lost);

    Ok(())
}
