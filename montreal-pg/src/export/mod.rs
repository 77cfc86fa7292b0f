//! Modules d'export (GeoJSON, PostgreSQL)

pub mod geojson;
pub mod pool;
pub mod postgres;
pub mod reproject;
pub mod transaction;
