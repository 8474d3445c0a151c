pub mod collect;
pub mod config;
pub mod geo_core;
pub mod geometric;
pub mod render;

pub use collect::georss::georss_collect::{parse_georss, GeoRssReport};
pub use geo_core::{BoundingBox, GeoCore};
pub use geometric::heritage::{HeritageSite, HeritageSiteCollection};
pub use geometric::mpa::MarineProtectedAreas;
pub use render::plotly_map::{render_map, MapArtifact, MapOptions};
