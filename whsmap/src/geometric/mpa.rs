use geo::MultiPolygon;
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, Value};
use std::path::{Path, PathBuf};

use crate::geo_core::GeoCore;

#[cfg(feature = "gdal")]
use anyhow::{Context, Result};
#[cfg(feature = "gdal")]
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
#[cfg(feature = "gdal")]
use gdal::vector::{Feature as GdalFeature, LayerAccess};
#[cfg(feature = "gdal")]
use gdal::Dataset;
#[cfg(feature = "gdal")]
use geo::Geometry as GeoGeometry;
#[cfg(feature = "gdal")]
use log::{debug, warn};

#[cfg(feature = "gdal")]
use crate::collect::global_variables::MPA_NAME_FIELD;
#[cfg(feature = "gdal")]
use crate::geo_core::WGS84_EPSG;

/// One marine protected area polygon
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedArea {
    /// Value of the name attribute, empty when the attribute is null or absent
    pub site_name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Marine Protected Areas (MPA) polygon dataset
/// Loaded from a shapefile (or any OGR vector source) and always held in WGS84
#[derive(Debug, Clone)]
pub struct MarineProtectedAreas {
    /// Source path
    filepath: PathBuf,
    /// CRS the source was declared in, as printed at load time
    source_crs: String,
    /// Whether geometries had to be reprojected to EPSG:4326
    reprojected: bool,
    /// GeoCore for CRS handling
    pub geo_core: GeoCore,
    areas: Vec<ProtectedArea>,
}

#[cfg(feature = "gdal")]
impl MarineProtectedAreas {
    /// Load every polygon of the first layer of `filepath`.
    ///
    /// The layer CRS is printed; when it is not equivalent to EPSG:4326 every
    /// geometry is reprojected. `name_field` defaults to `SITE_NAME`.
    pub fn from_path(filepath: impl AsRef<Path>, name_field: Option<&str>) -> Result<Self> {
        let filepath = filepath.as_ref();
        let name_field = name_field.unwrap_or(MPA_NAME_FIELD);

        let dataset = Dataset::open(filepath)
            .context(format!("Failed to open shapefile: {:?}", filepath))?;

        let mut layer = dataset
            .layer(0)
            .context(format!("Failed to access first layer of {:?}", filepath))?;

        let mut source_srs = layer.spatial_ref().context(format!(
            "Shapefile {:?} has no CRS; cannot reproject naive geometries",
            filepath
        ))?;
        source_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let mut target_srs = SpatialRef::from_epsg(WGS84_EPSG as u32)
            .context("Failed to create EPSG:4326 spatial reference")?;
        target_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        let source_crs = describe_srs(&source_srs);
        println!("MPA CRS: {}", source_crs);

        let transform = if same_crs(&source_srs, &target_srs) {
            None
        } else {
            println!("Reprojecting MPA data to EPSG:4326...");
            Some(
                CoordTransform::new(&source_srs, &target_srs)
                    .context("Failed to create transformation to EPSG:4326")?,
            )
        };

        let mut areas = Vec::new();
        let mut missing_name_field = false;

        for (idx, feature) in layer.features().enumerate() {
            let Some(geom_ref) = feature.geometry() else {
                warn!("Feature {} of {:?} has no geometry, skipping", idx, filepath);
                continue;
            };

            let geo_geom = match &transform {
                Some(transform) => geom_ref
                    .transform(transform)
                    .context(format!("Failed to reproject feature {}", idx))?
                    .to_geo(),
                None => geom_ref.to_geo(),
            }
            .context(format!("Failed to convert feature {} to geo geometry", idx))?;

            let geometry = match geo_geom {
                GeoGeometry::MultiPolygon(mp) => mp,
                GeoGeometry::Polygon(p) => MultiPolygon::new(vec![p]),
                _ => {
                    warn!("Feature {} of {:?} is not a polygon, skipping", idx, filepath);
                    continue;
                }
            };

            let site_name = match read_name(&feature, name_field) {
                Some(name) => name,
                None => {
                    missing_name_field = true;
                    String::new()
                }
            };

            areas.push(ProtectedArea {
                site_name,
                geometry,
            });
        }

        if missing_name_field {
            warn!(
                "Attribute {:?} missing or null on some features of {:?}",
                name_field, filepath
            );
        }
        debug!("Loaded {} MPA polygons from {:?}", areas.len(), filepath);

        Ok(MarineProtectedAreas {
            filepath: filepath.to_path_buf(),
            source_crs,
            reprojected: transform.is_some(),
            geo_core: GeoCore::wgs84(),
            areas,
        })
    }
}

impl MarineProtectedAreas {
    /// Build a dataset from polygons already expressed in WGS84
    pub fn from_areas(filepath: impl Into<PathBuf>, areas: Vec<ProtectedArea>) -> Self {
        MarineProtectedAreas {
            filepath: filepath.into(),
            source_crs: GeoCore::wgs84().crs_string(),
            reprojected: false,
            geo_core: GeoCore::wgs84(),
            areas,
        }
    }

    pub fn areas(&self) -> &[ProtectedArea] {
        &self.areas
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// CRS of the source file as printed at load time
    pub fn source_crs(&self) -> &str {
        &self.source_crs
    }

    pub fn was_reprojected(&self) -> bool {
        self.reprojected
    }

    pub fn get_filepath(&self) -> &Path {
        &self.filepath
    }

    /// Convert to a GeoJSON FeatureCollection.
    /// Feature ids are the positional index as a string, matching the
    /// `locations` of the choropleth layer.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .areas
            .iter()
            .enumerate()
            .map(|(idx, area)| {
                let mut feature = Feature::from(Geometry::new(Value::from(&area.geometry)));
                feature.id = Some(Id::String(idx.to_string()));
                feature.set_property("SITE_NAME", area.site_name.clone());
                feature
            })
            .collect();

        FeatureCollection {
            bbox: None,
            foreign_members: None,
            features,
        }
    }
}

#[cfg(feature = "gdal")]
fn read_name(feature: &GdalFeature, name_field: &str) -> Option<String> {
    let idx = feature.field_index(name_field).ok()?;
    feature.field_as_string(idx).ok().flatten()
}

#[cfg(feature = "gdal")]
/// Compare two CRS by their PROJ definition, which ignores naming and axis mapping
fn same_crs(a: &SpatialRef, b: &SpatialRef) -> bool {
    match (a.to_proj4(), b.to_proj4()) {
        (Ok(a), Ok(b)) => a.trim() == b.trim(),
        _ => a == b,
    }
}

#[cfg(feature = "gdal")]
fn describe_srs(srs: &SpatialRef) -> String {
    match srs.auth_code() {
        Ok(code) => format!("EPSG:{}", code),
        Err(_) => srs.to_wkt().unwrap_or_else(|_| "unknown".to_string()),
    }
}
