/// Default marine protected areas shapefile
pub const MPA_SHAPEFILE_PATH: &str = "MPA_shapefile.shp";

/// Default World Heritage Sites GeoRSS feed
pub const WHS_GEORSS_PATH: &str = "whcgeorss-en.xml";

/// Attribute holding the protected area name in the MPA dataset
pub const MPA_NAME_FIELD: &str = "SITE_NAME";

/// plotly.js bundle inlined into the saved map
pub const PLOTLY_JS_PATH: &str = "plotly.min.js";

pub const OUTPUT_HTML: &str = "interactive_whs_sac_uk_map_with_counts_and_distances.html";
