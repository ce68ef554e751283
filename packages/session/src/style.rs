//! Layer styles and popup text.

use impact_map_layer_models::{DataSource, Feature};

/// Colour applied to the selected feature.
pub const HIGHLIGHT_COLOR: &str = "#1d4ed8";
/// Colour applied to the selected road.
pub const ROAD_HIGHLIGHT_COLOR: &str = "#f97316";
/// Base road colour, restored when road selection is cleared.
pub const ROAD_COLOR: &str = "#1e40af";
/// Colour recorded for features whose style carries none.
pub const FALLBACK_COLOR: &str = "#f59e0b";

/// Vector style of a layer group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStyle {
    /// Stroke colour.
    pub color: &'static str,
    /// Stroke width in pixels.
    pub weight: f64,
    /// Fill opacity.
    pub fill_opacity: f64,
    /// Stroke opacity.
    pub opacity: f64,
    /// Circle-marker radius for point members.
    pub radius: Option<f64>,
    /// Stroke dash pattern.
    pub dash_array: Option<&'static str>,
}

impl LayerStyle {
    const fn stroke(color: &'static str, weight: f64, fill_opacity: f64) -> Self {
        Self {
            color,
            weight,
            fill_opacity,
            opacity: 1.0,
            radius: None,
            dash_array: None,
        }
    }

    const fn marker(color: &'static str, radius: f64, fill_opacity: f64) -> Self {
        Self {
            color,
            weight: 2.0,
            fill_opacity,
            opacity: 1.0,
            radius: Some(radius),
            dash_array: None,
        }
    }

    /// Administrative boundary overlay.
    #[must_use]
    pub const fn boundary(source: DataSource) -> Self {
        let color = match source {
            DataSource::District => "#00ff78",
            DataSource::Province => "#7800ff",
            _ => "#ff7800",
        };
        Self::stroke(color, 2.0, 0.1)
    }

    /// Uploaded shapefile in slot A.
    pub const SLOT_A: Self = Self::stroke("#6b7280", 2.0, 0.2);
    /// Uploaded shapefile in slot B.
    pub const SLOT_B: Self = Self::stroke("#16a34a", 2.0, 0.2);

    /// Buffer tool output.
    pub const BUFFER_RESULT: Self = Self::stroke("#f59e0b", 2.0, 0.2);
    /// Intersect tool output.
    pub const INTERSECT_RESULT: Self = Self::stroke("#dc2626", 2.0, 0.2);
    /// Union tool output.
    pub const UNION_RESULT: Self = Self::stroke("#8b5cf6", 2.0, 0.2);

    /// Road network.
    pub const ROADS: Self = Self::stroke(ROAD_COLOR, 3.0, 0.2);
    /// Buildings in the road-corridor tool.
    pub const CORRIDOR_BUILDINGS: Self = Self::marker("#be123c", 5.0, 0.5);
    /// Buildings in the proximity tool.
    pub const PROXIMITY_BUILDINGS: Self = Self::marker("#be123c", 5.0, 0.7);
    /// Hospitals.
    pub const HOSPITALS: Self = Self::marker("#16a34a", 6.0, 0.7);

    /// Road corridor polygon.
    pub const ROAD_BUFFER: Self = Self::stroke("#f59e0b", 3.0, 0.5);
    /// Buildings inside the corridor.
    pub const AFFECTED_BUILDINGS: Self = Self::marker("#dc2626", 5.0, 0.5);
    /// Hospitals inside the corridor.
    pub const AFFECTED_HOSPITALS: Self = Self::marker("#16a34a", 6.0, 0.7);

    /// User-marked location.
    pub const MARKED_POINT: Self = Self::marker("#8b5cf6", 10.0, 0.9);
    /// Proximity search radius.
    pub const SEARCH_RADIUS: Self = Self::stroke("#8b5cf6", 3.0, 0.3);
    /// Nearest hospital marker.
    pub const NEAREST_HOSPITAL: Self = Self {
        color: "#16a34a",
        weight: 3.0,
        fill_opacity: 0.9,
        opacity: 1.0,
        radius: Some(10.0),
        dash_array: None,
    };
    /// Marked point to hospital connector.
    pub const DISTANCE_LINE: Self = Self {
        color: "#ff0000",
        weight: 4.0,
        fill_opacity: 0.0,
        opacity: 0.8,
        radius: None,
        dash_array: Some("5, 10"),
    };
}

/// Popup text for a boundary feature.
#[must_use]
pub fn boundary_popup(source: DataSource, feature: &Feature) -> String {
    format!(
        "{}: {}",
        source.label(),
        feature.property("name").unwrap_or_else(|| "Unknown".to_string())
    )
}

/// Popup text for a road.
#[must_use]
pub fn road_popup(feature: &Feature) -> String {
    format!("Road ID: {}", feature.id_label())
}

/// Popup text for a building.
#[must_use]
pub fn building_popup(feature: &Feature) -> String {
    format!("Building ID: {}", feature.id_label())
}

/// Popup text for a hospital: id, name, and type.
#[must_use]
pub fn hospital_popup(feature: &Feature) -> String {
    let na = || "N/A".to_string();
    format!(
        "Hospital ID: {}\nName: {}\nType: {}",
        feature.id_label(),
        feature.property("name").unwrap_or_else(na),
        feature.property("type").unwrap_or_else(na)
    )
}
