use anyhow::Result;
use clap::Parser;
use log::debug;
use std::path::PathBuf;

use whsmap::collect::georss::georss_collect::parse_georss;
use whsmap::config::MapConfig;
use whsmap::geometric::heritage::HeritageSiteCollection;
use whsmap::geometric::mpa::MarineProtectedAreas;
use whsmap::render::plotly_map::{open_in_browser, render_map, PlotlyJs};

/// Map UK World Heritage Sites over Marine Protected Areas
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// MPA shapefile
    #[arg(long, value_name = "FILE")]
    shapefile: Option<PathBuf>,

    /// World Heritage Sites GeoRSS feed
    #[arg(long, value_name = "FILE")]
    georss: Option<PathBuf>,

    /// Output HTML file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Do not open the map in a browser
    #[arg(long)]
    no_show: bool,

    /// plotly.js bundle to embed in the saved page
    #[arg(long, value_name = "FILE")]
    plotly_js: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<MapConfig> {
        let mut config = match &self.config {
            Some(path) => MapConfig::load_from_file(path)?,
            None => MapConfig::default(),
        };
        if let Some(shapefile) = self.shapefile {
            config.input.shapefile = shapefile;
        }
        if let Some(georss) = self.georss {
            config.input.georss = georss;
        }
        if let Some(output) = self.output {
            config.output.html = output;
        }
        if let Some(plotly_js) = self.plotly_js {
            config.output.plotly_js = plotly_js;
        }
        if self.no_show {
            config.output.show = false;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = Cli::parse().into_config()?;
    debug!("Configuration: {:?}", config);

    // 1. Marine Protected Areas, reprojected to WGS84 if needed
    let mpa = MarineProtectedAreas::from_path(
        &config.input.shapefile,
        Some(config.input.name_field.as_str()),
    )?;
    debug!(
        "MPA layer {:?}: {} polygons, source CRS {}",
        mpa.get_filepath(),
        mpa.len(),
        mpa.source_crs()
    );

    // 2. World Heritage Sites from the GeoRSS feed
    let report = parse_georss(&config.input.georss)?;
    for skipped in report.skipped() {
        println!("{}", skipped);
    }
    let skipped_count = report.skipped().count();
    let whs = HeritageSiteCollection::from_sites(report.into_sites());

    // 3. Keep the sites inside the region of interest
    let whs_region = whs.filter_region(&config.region);

    println!(
        "MPA polygons: {}, heritage sites parsed: {}, skipped: {}, in region: {}",
        mpa.len(),
        whs.len(),
        skipped_count,
        whs_region.len()
    );

    // 4. Compose the map
    let map = render_map(&mpa, &whs_region, &config.view)?;

    // 5. Display, then save; a display failure is reported but not fatal
    let plotly_js = PlotlyJs::resolve(&config.output.plotly_js)?;
    map.display_and_save(
        &config.output.html,
        &plotly_js,
        config.output.show,
        open_in_browser,
    )?;

    if let Some(path) = &config.output.sites_geojson {
        whs_region.to_geojson(path)?;
    }

    Ok(())
}
