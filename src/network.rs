//! Delivery network geography
//!
//! Great-circle shipping distance per order, distribution-center rollups,
//! median-based inefficiency detection and the display-only sampling used
//! by map views.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::error::Result;
use crate::filters::FilterConfig;
use crate::models::{column, OrderRecord, OrderTable, ReportStatus};
use crate::palette::{FacilityPalette, LegendEntry, Rgba};
use crate::stats::{mean, median};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Orders farther than `median * INEFFICIENCY_MULTIPLIER` are flagged
pub const INEFFICIENCY_MULTIPLIER: f64 = 1.5;
/// Fixed seed so the same filtered set always yields the same map sample.
/// Keeps the display stable between refreshes; the sample carries no
/// statistical meaning.
pub const DISPLAY_SAMPLE_SEED: u64 = 42;
pub const DEFAULT_MAX_POINTS: usize = 5000;
pub const DEFAULT_INEFFICIENT_LIMIT: usize = 20;

pub const REQUIRED_COLUMNS: &[&str] = &[
    column::DC_NAME,
    column::DC_LAT,
    column::DC_LONG,
    column::CUSTOMER_LAT,
    column::CUSTOMER_LONG,
    column::ORDER_ID,
];

/// Great-circle distance in km between two points given in decimal degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Per-order shipping distance, with the destination kept for map layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedDistance {
    pub order_id: String,
    pub facility: Option<String>,
    pub customer_lat: f64,
    pub customer_long: f64,
    pub distance_km: f64,
}

impl DerivedDistance {
    /// None when any of the four coordinates is missing.
    pub fn from_record(record: &OrderRecord) -> Option<Self> {
        let (dc_lat, dc_long) = (record.dc_lat?, record.dc_long?);
        let (customer_lat, customer_long) = (record.customer_lat?, record.customer_long?);
        Some(Self {
            order_id: record.order_id.clone(),
            facility: record.dc_name.clone(),
            customer_lat,
            customer_long,
            distance_km: haversine_distance(dc_lat, dc_long, customer_lat, customer_long),
        })
    }

    fn destination_key(&self) -> (u64, u64) {
        // + 0.0 folds -0.0 into 0.0
        ((self.customer_lat + 0.0).to_bits(), (self.customer_long + 0.0).to_bits())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityPerformance {
    pub facility: String,
    pub total_orders: usize,
    pub avg_distance_km: f64,
    pub distinct_destinations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkSummary {
    pub total_orders: usize,
    pub active_facilities: usize,
    pub avg_distance_km: f64,
    pub unique_delivery_locations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InefficientOrder {
    pub order_id: String,
    pub facility: Option<String>,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InefficiencyReport {
    pub median_distance_km: f64,
    pub threshold_km: f64,
    /// Every flagged order, not only the rows returned in `orders`
    pub flagged_count: usize,
    /// Flagged orders, farthest first, capped at the caller's limit
    pub orders: Vec<InefficientOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkOptions {
    pub max_points: usize,
    pub inefficient_limit: usize,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
            inefficient_limit: DEFAULT_INEFFICIENT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkReport {
    pub status: ReportStatus,
    pub excluded_missing_geo: usize,
    /// Sorted distinct facility names among geo-valid rows, before filtering
    pub all_facilities: Vec<String>,
    pub summary: NetworkSummary,
    pub facilities: Vec<FacilityPerformance>,
    pub inefficiency: InefficiencyReport,
    pub distances: Vec<DerivedDistance>,
}

/// Compute distances, facility rollups and outliers for the filtered orders.
pub fn analyze_network(
    table: &OrderTable,
    filters: &FilterConfig,
    options: &NetworkOptions,
) -> Result<NetworkReport> {
    table.require(REQUIRED_COLUMNS)?;

    let mut excluded_missing_geo = 0;
    let geo_valid: Vec<(&OrderRecord, DerivedDistance)> = table
        .records()
        .iter()
        .filter_map(|r| match DerivedDistance::from_record(r) {
            Some(d) => Some((r, d)),
            None => {
                excluded_missing_geo += 1;
                None
            }
        })
        .collect();

    let all_facilities: Vec<String> = geo_valid
        .iter()
        .filter_map(|(_, d)| d.facility.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let distances: Vec<DerivedDistance> = geo_valid
        .into_iter()
        .filter(|(r, _)| filters.matches(r))
        .map(|(_, d)| d)
        .collect();

    debug!(
        "Network: {} orders with geo data, {} excluded",
        distances.len(),
        excluded_missing_geo
    );

    if distances.is_empty() {
        return Ok(NetworkReport {
            status: ReportStatus::NoData,
            excluded_missing_geo,
            all_facilities,
            summary: NetworkSummary::default(),
            facilities: Vec::new(),
            inefficiency: InefficiencyReport::default(),
            distances,
        });
    }

    Ok(NetworkReport {
        status: ReportStatus::Ok,
        excluded_missing_geo,
        all_facilities,
        summary: summarize(&distances),
        facilities: facility_performance(&distances),
        inefficiency: detect_inefficiencies(&distances, options.inefficient_limit),
        distances,
    })
}

fn summarize(distances: &[DerivedDistance]) -> NetworkSummary {
    let km: Vec<f64> = distances.iter().map(|d| d.distance_km).collect();
    NetworkSummary {
        total_orders: distances.len(),
        active_facilities: distances
            .iter()
            .filter_map(|d| d.facility.as_deref())
            .collect::<HashSet<_>>()
            .len(),
        avg_distance_km: mean(&km),
        unique_delivery_locations: distances
            .iter()
            .map(DerivedDistance::destination_key)
            .collect::<HashSet<_>>()
            .len(),
    }
}

/// Per-facility rollup, busiest first (ties by name). Rows with no
/// facility name are left out.
pub fn facility_performance(distances: &[DerivedDistance]) -> Vec<FacilityPerformance> {
    let mut grouped: BTreeMap<&str, Vec<&DerivedDistance>> = BTreeMap::new();
    for d in distances {
        if let Some(name) = d.facility.as_deref() {
            grouped.entry(name).or_default().push(d);
        }
    }

    let mut rows: Vec<FacilityPerformance> = grouped
        .into_iter()
        .map(|(name, orders)| {
            let km: Vec<f64> = orders.iter().map(|d| d.distance_km).collect();
            FacilityPerformance {
                facility: name.to_string(),
                total_orders: orders.len(),
                avg_distance_km: mean(&km),
                distinct_destinations: orders
                    .iter()
                    .map(|d| d.destination_key())
                    .collect::<HashSet<_>>()
                    .len(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.total_orders.cmp(&a.total_orders));
    rows
}

/// Flag orders strictly farther than 1.5x the median distance.
pub fn detect_inefficiencies(distances: &[DerivedDistance], limit: usize) -> InefficiencyReport {
    let km: Vec<f64> = distances.iter().map(|d| d.distance_km).collect();
    let median_distance_km = median(&km);
    let threshold_km = median_distance_km * INEFFICIENCY_MULTIPLIER;

    let mut flagged: Vec<&DerivedDistance> = distances
        .iter()
        .filter(|d| d.distance_km > threshold_km)
        .collect();
    flagged.sort_by(|a, b| b.distance_km.total_cmp(&a.distance_km));

    InefficiencyReport {
        median_distance_km,
        threshold_km,
        flagged_count: flagged.len(),
        orders: flagged
            .into_iter()
            .take(limit)
            .map(|d| InefficientOrder {
                order_id: d.order_id.clone(),
                facility: d.facility.clone(),
                distance_km: d.distance_km,
            })
            .collect(),
    }
}

/// Cap `items` at `max_points` with a fixed-seed pseudorandom pick.
///
/// Same input, same output (membership and order). This is for display
/// stability only; do not read statistics off the sample.
pub fn sample_for_display<T: Clone>(items: &[T], max_points: usize) -> Vec<T> {
    if items.len() <= max_points {
        return items.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(DISPLAY_SAMPLE_SEED);
    rand::seq::index::sample(&mut rng, items.len(), max_points)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// Zoom level for a span of degrees: wider spans zoom further out
pub fn zoom_level(span_degrees: f64) -> u8 {
    match span_degrees {
        s if s > 100.0 => 1,
        s if s > 50.0 => 2,
        s if s > 20.0 => 3,
        s if s > 10.0 => 4,
        _ => 5,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center_lat: f64,
    pub center_long: f64,
    pub zoom: u8,
}

impl MapView {
    /// Centered on the mean destination; None for an empty set.
    pub fn fit(points: &[DerivedDistance]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let lats: Vec<f64> = points.iter().map(|p| p.customer_lat).collect();
        let longs: Vec<f64> = points.iter().map(|p| p.customer_long).collect();
        let span = |v: &[f64]| {
            let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = v.iter().copied().fold(f64::INFINITY, f64::min);
            max - min
        };
        Some(Self {
            center_lat: mean(&lats),
            center_long: mean(&longs),
            zoom: zoom_level(span(&lats).max(span(&longs))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPoint {
    pub order_id: String,
    pub facility: Option<String>,
    pub lat: f64,
    pub long: f64,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayLayer {
    pub points: Vec<DisplayPoint>,
    pub map_view: Option<MapView>,
    pub legend: Vec<LegendEntry>,
}

/// Sampled, coloured points plus view and legend for a map renderer.
pub fn display_layer(
    report: &NetworkReport,
    max_points: usize,
    palette: &dyn FacilityPalette,
) -> DisplayLayer {
    let sample = sample_for_display(&report.distances, max_points);
    let color_of = |facility: Option<&str>| match facility {
        Some(name) => palette.color(name, &report.all_facilities),
        None => crate::palette::UNKNOWN_COLOR,
    };

    let active: Vec<String> = report
        .facilities
        .iter()
        .map(|f| f.facility.clone())
        .collect();

    DisplayLayer {
        map_view: MapView::fit(&sample),
        points: sample
            .iter()
            .map(|d| DisplayPoint {
                order_id: d.order_id.clone(),
                facility: d.facility.clone(),
                lat: d.customer_lat,
                long: d.customer_long,
                color: color_of(d.facility.as_deref()),
            })
            .collect(),
        legend: crate::palette::legend(palette, &active, &report.all_facilities),
    }
}
