use anyhow::{Context, Result};
use geo::Point;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geo_core::{BoundingBox, GeoCore};

/// A World Heritage Site with WGS84 coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeritageSite {
    pub site_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl HeritageSite {
    pub fn new(site_name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        HeritageSite {
            site_name: site_name.into(),
            latitude,
            longitude,
        }
    }

    /// Point geometry (x = longitude, y = latitude)
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// World Heritage Sites as a point dataset
/// Coordinates are always WGS84 (EPSG:4326)
#[derive(Debug, Clone, Default)]
pub struct HeritageSiteCollection {
    sites: Vec<HeritageSite>,
    /// GeoCore for CRS handling
    pub geo_core: GeoCore,
}

impl HeritageSiteCollection {
    /// Build the point dataset from parsed sites, tagged EPSG:4326
    pub fn from_sites(sites: Vec<HeritageSite>) -> Self {
        HeritageSiteCollection {
            sites,
            geo_core: GeoCore::wgs84(),
        }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn sites(&self) -> &[HeritageSite] {
        &self.sites
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeritageSite> {
        self.sites.iter()
    }

    /// Point geometries in dataset order
    pub fn points(&self) -> Vec<Point<f64>> {
        self.sites.iter().map(HeritageSite::point).collect()
    }

    /// Keep the sites whose point lies inside `bbox` (edges included).
    /// Order is preserved and `self` is left untouched.
    pub fn filter_region(&self, bbox: &BoundingBox) -> Self {
        let sites = self
            .sites
            .iter()
            .filter(|site| bbox.contains_point(&site.point()))
            .cloned()
            .collect();

        HeritageSiteCollection {
            sites,
            geo_core: self.geo_core,
        }
    }

    /// Convert to a GeoJSON FeatureCollection of points
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .sites
            .iter()
            .map(|site| {
                let mut feature =
                    Feature::from(Geometry::new(Value::Point(vec![site.longitude, site.latitude])));
                feature.set_property("site_name", site.site_name.clone());
                feature.set_property("latitude", site.latitude);
                feature.set_property("longitude", site.longitude);
                feature
            })
            .collect();

        FeatureCollection {
            bbox: None,
            foreign_members: None,
            features,
        }
    }

    /// Save to GeoJSON file
    pub fn to_geojson(&self, output_file: &Path) -> Result<()> {
        if let Some(parent) = output_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create output directory: {:?}", parent))?;
        }

        let geojson = GeoJson::from(self.to_feature_collection());
        std::fs::write(output_file, geojson.to_string())
            .context(format!("Failed to write GeoJSON file: {:?}", output_file))?;

        println!("World Heritage Sites saved to: {:?}", output_file);

        Ok(())
    }
}

impl From<Vec<HeritageSite>> for HeritageSiteCollection {
    fn from(sites: Vec<HeritageSite>) -> Self {
        HeritageSiteCollection::from_sites(sites)
    }
}
