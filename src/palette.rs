//! Facility colour mapping for map layers
//! Maps distribution-center names to fixed RGBA colours and regions

use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

pub type Rgba = [u8; 4];

/// Used for facilities outside the known facility list
pub const UNKNOWN_COLOR: Rgba = [128, 128, 128, 200];

const FALLBACK_COLORS: [Rgba; 4] = [
    [0, 255, 255, 220],
    [255, 215, 0, 220],
    [255, 105, 180, 220],
    [64, 224, 208, 220],
];

/// Colour source for facility markers. Injected into the network display
/// layer so callers can swap the scheme.
pub trait FacilityPalette: Send + Sync {
    /// `known` is the sorted distinct facility list of the unfiltered data;
    /// a facility's position in it drives fallback colours.
    fn color(&self, facility: &str, known: &[String]) -> Rgba;

    fn region(&self, _facility: &str) -> Option<&'static str> {
        None
    }
}

/// Facility -> (colour, region)
pub static FACILITY_COLORS: LazyLock<HashMap<&'static str, (Rgba, &'static str)>> =
    LazyLock::new(|| {
        let mut m = HashMap::new();

        // Northeast
        m.insert("Port Authority of New York/New Jersey NY/NJ", ([0, 100, 255, 220], "Northeast"));
        m.insert("Philadelphia PA", ([138, 43, 226, 220], "Northeast"));
        m.insert("Charleston SC", ([70, 130, 180, 220], "Northeast"));

        // Midwest
        m.insert("Chicago IL", ([34, 139, 34, 220], "Midwest"));
        m.insert("Memphis TN", ([50, 205, 50, 220], "Midwest"));

        // South
        m.insert("Houston TX", ([255, 69, 0, 220], "South"));
        m.insert("New Orleans LA", ([255, 140, 0, 220], "South"));
        m.insert("Savannah GA", ([220, 20, 60, 220], "South"));
        m.insert("Mobile AL", ([255, 165, 0, 220], "South"));

        // West
        m.insert("Los Angeles CA", ([199, 21, 133, 220], "West"));

        m
    });

/// Default palette: fixed colours for the known distribution centers,
/// rotating fallbacks for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionalPalette;

impl FacilityPalette for RegionalPalette {
    fn color(&self, facility: &str, known: &[String]) -> Rgba {
        if let Some((color, _)) = FACILITY_COLORS.get(facility) {
            return *color;
        }
        known
            .iter()
            .position(|f| f == facility)
            .map(|i| FALLBACK_COLORS[i % FALLBACK_COLORS.len()])
            .unwrap_or(UNKNOWN_COLOR)
    }

    fn region(&self, facility: &str) -> Option<&'static str> {
        FACILITY_COLORS.get(facility).map(|(_, region)| *region)
    }
}

/// "#rrggbb", alpha dropped
pub fn hex(color: Rgba) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub facility: String,
    pub region: Option<&'static str>,
    pub color: Rgba,
    pub hex: String,
}

/// One entry per active facility, grouped by region (unmapped last).
pub fn legend(palette: &dyn FacilityPalette, active: &[String], known: &[String]) -> Vec<LegendEntry> {
    let mut entries: Vec<LegendEntry> = active
        .iter()
        .map(|facility| {
            let color = palette.color(facility, known);
            LegendEntry {
                facility: facility.clone(),
                region: palette.region(facility),
                color,
                hex: hex(color),
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        (a.region.is_none(), a.region, &a.facility).cmp(&(b.region.is_none(), b.region, &b.facility))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_known_facility() {
        let palette = RegionalPalette;
        assert_eq!(palette.color("Chicago IL", &[]), [34, 139, 34, 220]);
        assert_eq!(palette.region("Houston TX"), Some("South"));
    }

    #[test]
    fn test_fallback_by_position() {
        let palette = RegionalPalette;
        let list = known(&["Alpha", "Beta", "Chicago IL", "Delta", "Echo"]);
        assert_eq!(palette.color("Alpha", &list), FALLBACK_COLORS[0]);
        assert_eq!(palette.color("Delta", &list), FALLBACK_COLORS[3]);
        assert_eq!(palette.color("Echo", &list), FALLBACK_COLORS[0]);
    }

    #[test]
    fn test_unknown_facility_is_grey() {
        assert_eq!(RegionalPalette.color("Nowhere", &known(&["Alpha"])), UNKNOWN_COLOR);
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex([255, 69, 0, 220]), "#ff4500");
    }

    #[test]
    fn test_legend_groups_by_region() {
        let active = known(&["Zulu", "Houston TX", "Chicago IL"]);
        let entries = legend(&RegionalPalette, &active, &active);
        let names: Vec<_> = entries.iter().map(|e| e.facility.as_str()).collect();
        assert_eq!(names, vec!["Chicago IL", "Houston TX", "Zulu"]);
    }
}
