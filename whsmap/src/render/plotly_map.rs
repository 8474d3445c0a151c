//! Interactive map output built on plotly.js.
//!
//! The figure is assembled as plotly JSON (a `choroplethmapbox` trace for the
//! protected areas, a `scattermapbox` trace for the heritage sites, one
//! annotation per site) and embedded in a standalone HTML page. The page
//! carries the plotly.js bundle inline so it renders without network access.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::geometric::heritage::HeritageSiteCollection;
use crate::geometric::mpa::MarineProtectedAreas;

const PLOTLY_CDN_URL: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

static SHOWN_MAPS: AtomicUsize = AtomicUsize::new(0);

/// Source of the plotly.js library in the generated page
#[derive(Debug, Clone, PartialEq)]
pub enum PlotlyJs {
    /// Bundle source written into the page
    Inline(String),
    /// URL loaded with `<script src>`, the page then needs network access
    Cdn(String),
}

impl PlotlyJs {
    /// Read a `plotly.min.js` bundle to inline
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .context(format!("Failed to read plotly.js bundle: {:?}", path))?;
        Ok(PlotlyJs::Inline(source))
    }

    /// Inline the bundle at `path`, or reference the plotly CDN when there is
    /// no file there
    pub fn resolve(path: &Path) -> Result<Self> {
        if path.is_file() {
            return Self::from_file(path);
        }
        warn!(
            "plotly.js bundle {:?} not found, the saved map will load it from {}",
            path, PLOTLY_CDN_URL
        );
        Ok(PlotlyJs::Cdn(PLOTLY_CDN_URL.to_string()))
    }

    fn script_element(&self) -> String {
        match self {
            PlotlyJs::Inline(source) => format!(
                "<script type=\"text/javascript\">{}</script>",
                source.replace("</script", "<\\/script").replace("</SCRIPT", "<\\/SCRIPT")
            ),
            PlotlyJs::Cdn(url) => format!("<script src=\"{}\"></script>", escape_html(url)),
        }
    }
}

/// Map center in geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapCenter {
    pub lat: f64,
    pub lon: f64,
}

impl Default for MapCenter {
    // London
    fn default() -> Self {
        MapCenter {
            lat: 51.5074,
            lon: -0.1278,
        }
    }
}

/// Heritage site marker styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    pub size: u32,
    pub color: String,
    /// Legend label of the marker layer
    pub name: String,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        MarkerStyle {
            size: 5,
            color: "green".to_string(),
            name: "World Heritage Sites (WHS)".to_string(),
        }
    }
}

/// Site label styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    pub arrowhead: u8,
    /// Arrow tail offset in pixels
    pub ax: i32,
    pub ay: i32,
    pub font_size: u32,
    pub font_color: String,
    pub font_family: String,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        AnnotationStyle {
            arrowhead: 3,
            ax: 0,
            ay: -40,
            font_size: 10,
            font_color: "black".to_string(),
            font_family: "Arial".to_string(),
        }
    }
}

/// View and styling parameters of the rendered map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    pub title: String,
    pub center: MapCenter,
    pub zoom: f64,
    pub mapbox_style: String,
    /// Colorscale of the protected area layer
    pub colorscale: String,
    pub marker: MarkerStyle,
    pub annotation: AnnotationStyle,
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions {
            title: "Marine Protected Areas (MPA)".to_string(),
            center: MapCenter::default(),
            zoom: 6.0,
            mapbox_style: "carto-positron".to_string(),
            colorscale: "Blues".to_string(),
            marker: MarkerStyle::default(),
            annotation: AnnotationStyle::default(),
        }
    }
}

/// A composed plotly figure ready to be displayed or saved
#[derive(Debug, Clone, PartialEq)]
pub struct MapArtifact {
    pub data: Vec<Value>,
    pub layout: Value,
}

/// Compose the protected areas and the heritage sites into one map
pub fn render_map(
    areas: &MarineProtectedAreas,
    sites: &HeritageSiteCollection,
    options: &MapOptions,
) -> Result<MapArtifact> {
    let feature_collection = areas.to_feature_collection();
    let locations: Vec<String> = (0..areas.len()).map(|idx| idx.to_string()).collect();
    // Same value everywhere so every polygon gets one hue
    let z = vec![1; areas.len()];
    let hover_names: Vec<&str> = areas.areas().iter().map(|a| a.site_name.as_str()).collect();

    let choropleth = json!({
        "type": "choroplethmapbox",
        "geojson": serde_json::to_value(&feature_collection)
            .context("Failed to serialize MPA polygons")?,
        "locations": locations,
        "z": z,
        "zmin": 0,
        "zmax": 1,
        "colorscale": options.colorscale,
        "showscale": false,
        "hovertext": hover_names,
        "hoverinfo": "text",
        "marker": { "opacity": 0.6 },
        "name": options.title,
    });

    let names: Vec<&str> = sites.iter().map(|s| s.site_name.as_str()).collect();
    let markers = json!({
        "type": "scattermapbox",
        "lat": sites.iter().map(|s| s.latitude).collect::<Vec<_>>(),
        "lon": sites.iter().map(|s| s.longitude).collect::<Vec<_>>(),
        "mode": "markers",
        "marker": {
            "size": options.marker.size,
            "color": options.marker.color,
        },
        "text": names,
        "hoverinfo": "text",
        "name": options.marker.name,
    });

    let style = &options.annotation;
    let annotations: Vec<Value> = sites
        .iter()
        .map(|site| {
            json!({
                "x": site.longitude,
                "y": site.latitude,
                "text": site.site_name,
                "showarrow": true,
                "arrowhead": style.arrowhead,
                "ax": style.ax,
                "ay": style.ay,
                "font": {
                    "size": style.font_size,
                    "color": style.font_color,
                    "family": style.font_family,
                },
            })
        })
        .collect();

    let layout = json!({
        "title": { "text": options.title },
        "mapbox": {
            "style": options.mapbox_style,
            "center": { "lat": options.center.lat, "lon": options.center.lon },
            "zoom": options.zoom,
        },
        "annotations": annotations,
        "margin": { "r": 0, "t": 40, "l": 0, "b": 0 },
        "showlegend": true,
    });

    Ok(MapArtifact {
        data: vec![choropleth, markers],
        layout,
    })
}

impl MapArtifact {
    /// Standalone HTML page rendering the figure
    pub fn to_html(&self, plotly_js: &PlotlyJs) -> Result<String> {
        let data = script_safe_json(&self.data)?;
        let layout = script_safe_json(&self.layout)?;
        let title = self
            .layout
            .pointer("/title/text")
            .and_then(Value::as_str)
            .unwrap_or("Map");

        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<title>{title}</title>
{plotly}
<style>html, body, #map {{ width: 100%; height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
Plotly.newPlot("map", {data}, {layout}, {{"responsive": true}});
</script>
</body>
</html>
"#,
            title = escape_html(title),
            plotly = plotly_js.script_element(),
            data = data,
            layout = layout,
        ))
    }

    /// Save the map as a standalone HTML file
    pub fn write_html(&self, output_file: &Path, plotly_js: &PlotlyJs) -> Result<()> {
        if let Some(parent) = output_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create output directory: {:?}", parent))?;
        }
        std::fs::write(output_file, self.to_html(plotly_js)?)
            .context(format!("Failed to write HTML file: {:?}", output_file))?;
        Ok(())
    }

    /// Write the map to a temporary HTML file and hand it to `opener`
    pub fn show<F>(&self, plotly_js: &PlotlyJs, opener: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let temp_html = std::env::temp_dir().join(format!(
            "whsmap_{}_{}.html",
            std::process::id(),
            SHOWN_MAPS.fetch_add(1, Ordering::Relaxed)
        ));
        self.write_html(&temp_html, plotly_js)?;
        opener(&temp_html)?;
        Ok(temp_html)
    }

    /// Optionally display the map, then save it to `output_file`.
    ///
    /// A display failure is printed as `Error displaying plot: ...` and
    /// returned, the file is saved regardless. Only a failed save is an error.
    pub fn display_and_save<F>(
        &self,
        output_file: &Path,
        plotly_js: &PlotlyJs,
        show: bool,
        opener: F,
    ) -> Result<Option<anyhow::Error>>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let display_error = if show {
            match self.show(plotly_js, opener) {
                Ok(path) => {
                    debug!("Map opened from {:?}", path);
                    None
                }
                Err(e) => {
                    println!("Error displaying plot: {:#}", e);
                    Some(e)
                }
            }
        } else {
            None
        };

        self.write_html(output_file, plotly_js)?;
        println!("Interactive map saved as '{}'.", output_file.display());
        Ok(display_error)
    }
}

/// Serialize for embedding inside a `<script>` element
fn script_safe_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value).context("Failed to serialize plotly figure")?;
    Ok(json.replace("</", "<\\/"))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Open `path` with the platform's default browser
pub fn open_in_browser(path: &Path) -> Result<()> {
    let status = if cfg!(target_os = "macos") {
        Command::new("open").arg(path).status()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", ""]).arg(path).status()
    } else {
        Command::new("xdg-open").arg(path).status()
    }
    .context("Failed to launch a browser. No display opener is available")?;

    if !status.success() {
        anyhow::bail!("Browser opener exited with {}", status);
    }
    Ok(())
}
