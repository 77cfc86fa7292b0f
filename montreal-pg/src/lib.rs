//! # montreal-pg
//!
//! Import des données ouvertes de Montréal vers PostGIS.
//!
//! Quatre jeux de données, un seul pipeline piloté par configuration :
//!
//! - limites administratives (GeoJSON, MTM zone 8)
//! - affectation du sol (GeoJSON, traduction anglaise des catégories)
//! - empreintes de bâtiments (GeoPackage, lots de 1000)
//! - unités d'évaluation foncière (Shapefile, géométrie Polygon)
//!
//! Chaque import recrée sa table, reprojette en WGS84 (EPSG:4326), insère
//! par lots transactionnels puis affiche un résumé.
//!
//! ## Usage CLI
//!
//! ```bash
//! montreal-pg admin-boundaries
//! montreal-pg land-use --path ./data/graffectations.json
//! montreal-pg buildings --sample
//! montreal-pg buildings --bbox=-73.62,45.49,-73.54,45.52 --limit 100
//! montreal-pg property-assessment --batch-size 500
//!
//! # Sans base de données
//! montreal-pg land-use --export ./land_use.geojson
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod mapping;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod reproject_lite;
pub mod translate;

pub use config::DatasetConfig;
pub use error::ImportError;
pub use export::pool::{create_pool, DatabaseConfig};
pub use pipeline::{run, ImportOptions};
pub use report::{ImportReport, ImportStatus};
