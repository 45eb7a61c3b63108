//! Geographic primitives for area-of-interest (AOI) asset selection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::{Loadable, LoaderError};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl GeoPoint {
    fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// An area of interest used as an asset selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Axis-aligned bounding box, inclusive on all edges.
    Bbox {
        /// Southern edge.
        min_lat: f64,
        /// Western edge.
        min_lon: f64,
        /// Northern edge.
        max_lat: f64,
        /// Eastern edge.
        max_lon: f64,
    },
    /// Simple polygon given as a ring of vertices (closing vertex optional).
    Polygon(Vec<GeoPoint>),
}

/// Errors for malformed regions and asset locations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// A bounding box with inverted or out-of-range edges.
    #[error("invalid bounding box: {0}")]
    InvalidBbox(String),

    /// A polygon with too few vertices or invalid coordinates.
    #[error("invalid polygon: {0}")]
    InvalidPolygon(String),

    /// An asset location outside the WGS84 range.
    #[error("asset '{0}' has coordinates outside the valid range")]
    InvalidAssetLocation(String),
}

impl Region {
    /// Validates the region geometry.
    pub fn validate(&self) -> Result<(), GeoError> {
        match self {
            Region::Bbox { min_lat, min_lon, max_lat, max_lon } => {
                let corners = [
                    GeoPoint { lat: *min_lat, lon: *min_lon },
                    GeoPoint { lat: *max_lat, lon: *max_lon },
                ];
                if corners.iter().any(|p| !p.is_valid()) {
                    return Err(GeoError::InvalidBbox("coordinates out of range".into()));
                }
                if min_lat > max_lat || min_lon > max_lon {
                    return Err(GeoError::InvalidBbox("min edge exceeds max edge".into()));
                }
                Ok(())
            }
            Region::Polygon(points) => {
                if points.len() < 3 {
                    return Err(GeoError::InvalidPolygon(format!(
                        "at least 3 vertices required, got {}",
                        points.len()
                    )));
                }
                if points.iter().any(|p| !p.is_valid()) {
                    return Err(GeoError::InvalidPolygon("coordinates out of range".into()));
                }
                Ok(())
            }
        }
    }

    /// Point-in-region test.
    pub fn contains(&self, point: GeoPoint) -> bool {
        match self {
            Region::Bbox { min_lat, min_lon, max_lat, max_lon } =>
                (*min_lat..=*max_lat).contains(&point.lat)
                    && (*min_lon..=*max_lon).contains(&point.lon),
            Region::Polygon(points) => polygon_contains(points, point),
        }
    }
}

// Even-odd ray casting along the longitude axis.
fn polygon_contains(ring: &[GeoPoint], point: GeoPoint) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let crossing_lon = (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if point.lon < crossing_lon {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// The registered location of an asset, loaded from `assets.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetLocation {
    /// The asset identifier as it appears on events.
    pub asset_id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl AssetLocation {
    /// The asset position.
    pub fn point(&self) -> GeoPoint {
        GeoPoint { lat: self.lat, lon: self.lon }
    }
}

/// Errors that can occur while loading asset locations.
#[derive(Debug, Error)]
pub enum AssetLoaderError {
    /// The file could not be loaded.
    #[error("Failed to load asset locations: {0}")]
    Loader(#[from] LoaderError),

    /// An asset location is invalid.
    #[error("Invalid asset location: {0}")]
    Validation(#[from] GeoError),
}

impl Loadable for AssetLocation {
    type Error = AssetLoaderError;

    const KEY: &'static str = "assets";

    fn validate(&mut self) -> Result<(), Self::Error> {
        if !self.point().is_valid() {
            return Err(GeoError::InvalidAssetLocation(self.asset_id.clone()).into());
        }
        Ok(())
    }
}
