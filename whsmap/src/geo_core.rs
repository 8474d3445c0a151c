use geo::Point;
use serde::{Deserialize, Serialize};

/// EPSG code of WGS84 geographic coordinates (longitude, latitude in degrees)
pub const WGS84_EPSG: i32 = 4326;

/// Base struct for geospatial datasets
/// Holds the CRS (Coordinate Reference System) a dataset is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoCore {
    /// EPSG code
    pub epsg: i32,
}

impl GeoCore {
    /// Create a new GeoCore with EPSG
    pub fn new(epsg: i32) -> Self {
        GeoCore { epsg }
    }

    /// GeoCore for WGS84 (EPSG:4326)
    pub fn wgs84() -> Self {
        GeoCore::new(WGS84_EPSG)
    }

    /// Get EPSG code
    pub fn get_epsg(&self) -> i32 {
        self.epsg
    }

    /// Set EPSG code
    pub fn set_epsg(&mut self, epsg: i32) {
        self.epsg = epsg;
    }

    /// Whether the dataset is in WGS84 geographic coordinates
    pub fn is_wgs84(&self) -> bool {
        self.epsg == WGS84_EPSG
    }

    /// CRS identifier in "EPSG:xxxx" form
    pub fn crs_string(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl Default for GeoCore {
    fn default() -> Self {
        GeoCore::wgs84()
    }
}

/// Bounding box structure
/// Edges are inclusive: a point lying exactly on any edge is inside the box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    /// United Kingdom region: lon in [-10, 2], lat in [50, 60]
    pub const UK: BoundingBox = BoundingBox {
        min_x: -10.0,
        min_y: 50.0,
        max_x: 2.0,
        max_y: 60.0,
    };

    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Check whether a longitude/latitude pair falls inside the box
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_x && lon <= self.max_x && lat >= self.min_y && lat <= self.max_y
    }

    /// Check whether a point (x = longitude, y = latitude) falls inside the box
    pub fn contains_point(&self, point: &Point<f64>) -> bool {
        self.contains(point.x(), point.y())
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox::UK
    }
}
