pub mod plotly_map;
