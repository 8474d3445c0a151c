use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::collect::global_variables::{
    MPA_NAME_FIELD, MPA_SHAPEFILE_PATH, OUTPUT_HTML, PLOTLY_JS_PATH, WHS_GEORSS_PATH,
};
use crate::geo_core::BoundingBox;
use crate::render::plotly_map::MapOptions;

/// Run configuration. Every field has a default, so an empty file is valid.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub input: InputConfig,
    /// Heritage sites outside this box are not drawn
    pub region: BoundingBox,
    pub view: MapOptions,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub shapefile: PathBuf,
    pub georss: PathBuf,
    /// MPA attribute used as the polygon hover label
    pub name_field: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            shapefile: PathBuf::from(MPA_SHAPEFILE_PATH),
            georss: PathBuf::from(WHS_GEORSS_PATH),
            name_field: MPA_NAME_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub html: PathBuf,
    /// Open the map in a browser before saving
    pub show: bool,
    /// plotly.js bundle embedded in the page
    pub plotly_js: PathBuf,
    /// Also export the filtered heritage sites as GeoJSON
    pub sites_geojson: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            html: PathBuf::from(OUTPUT_HTML),
            show: true,
            plotly_js: PathBuf::from(PLOTLY_JS_PATH),
            sites_geojson: None,
        }
    }
}

impl MapConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}
