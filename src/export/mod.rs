//! Output sinks for classification results.
//!
//! Currently only GeoJSON map documents; they open directly in geojson.io,
//! QGIS, or any Leaflet/folium viewer that honours simplestyle properties.

pub mod geojson;

pub use geojson::{grid_cells, verdict_points, write_feature_collection};
