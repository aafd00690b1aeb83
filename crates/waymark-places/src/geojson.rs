//! GeoJSON feature types.
//!
//! Only the geometry kinds waymark renders are modelled: `Point`,
//! `Polygon` and `MultiPolygon`. Anything else the provider returns
//! (`LineString`, `GeometryCollection`, ...) is kept as raw JSON in
//! [`Geometry::Other`] and carried through unchanged.
//!
//! Coordinates stay as raw JSON so malformed positions survive
//! deserialization; the accessors below skip them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Longitude in degrees.
    pub lng: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl Position {
    /// Parses a GeoJSON position. At least two numeric components are
    /// required; extra components (altitude) are ignored.
    pub fn from_value(value: &Value) -> Option<Self> {
        let arr = value.as_array()?;
        let lng = arr.first()?.as_f64()?;
        let lat = arr.get(1)?.as_f64()?;
        Some(Self { lng, lat })
    }
}

/// Geometry kinds with a known rendering strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    /// A single position, rendered as a marker.
    Point {
        /// `[lng, lat]`
        coordinates: Value,
    },
    /// Linear rings, the first being the outer boundary.
    Polygon {
        /// `[[[lng, lat], ...], ...]`
        coordinates: Value,
    },
    /// A list of polygons.
    MultiPolygon {
        /// `[[[[lng, lat], ...], ...], ...]`
        coordinates: Value,
    },
}

/// A feature geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Geometry {
    /// A point, polygon or multipolygon.
    Known(Shape),
    /// Any other GeoJSON geometry, passed through as-is.
    Other(Value),
}

impl Geometry {
    /// The position of a `Point` geometry, if it is well-formed.
    pub fn point(&self) -> Option<Position> {
        match self {
            Self::Known(Shape::Point { coordinates }) => Position::from_value(coordinates),
            _ => None,
        }
    }

    /// Whether this is a `Point` geometry, well-formed or not.
    pub fn is_point(&self) -> bool {
        matches!(self, Self::Known(Shape::Point { .. }))
    }

    /// Every well-formed vertex of every ring of a `Polygon` or
    /// `MultiPolygon`. Empty for other kinds.
    pub fn ring_vertices(&self) -> Vec<Position> {
        let polygons: Vec<&Value> = match self {
            Self::Known(Shape::Polygon { coordinates }) => vec![coordinates],
            Self::Known(Shape::MultiPolygon { coordinates }) => {
                coordinates.as_array().map(|a| a.iter().collect()).unwrap_or_default()
            }
            _ => return Vec::new(),
        };
        polygons
            .into_iter()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Position::from_value)
            .collect()
    }
}

/// Feature properties. `name` is the display label; any other keys are
/// preserved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// The provider's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining properties.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A located search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct LocationFeature {
    /// Where the place is.
    pub geometry: Geometry,
    /// What it is called.
    #[serde(default)]
    pub properties: FeatureProperties,
}

impl LocationFeature {
    /// A feature with the given geometry and display name.
    pub fn new(geometry: Geometry, name: impl Into<String>) -> Self {
        Self {
            geometry,
            properties: FeatureProperties {
                name: Some(name.into()),
                extra: Map::new(),
            },
        }
    }

    /// The display name, if the provider supplied one.
    pub fn name(&self) -> Option<&str> {
        self.properties.name.as_deref()
    }
}

/// An ordered list of features.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    /// The features, in provider rank order.
    #[serde(default)]
    pub features: Vec<LocationFeature>,
}

impl FeatureCollection {
    /// Reads the feature list out of a tool output, skipping entries that
    /// are not valid features. Returns `None` when `value` has no
    /// `features` array at all.
    pub fn features_from_output(value: &Value) -> Option<Vec<LocationFeature>> {
        let raw = value.get("features")?.as_array()?;
        Some(
            raw.iter()
                .filter_map(|f| serde_json::from_value(f.clone()).ok())
                .collect(),
        )
    }
}
