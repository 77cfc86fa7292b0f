//! # geosource
//!
//! Lecture en mémoire de jeux de données géospatiaux vectoriels.
//!
//! ## Formats
//!
//! - GeoJSON (`.geojson`, `.json`) : FeatureCollection, membre `crs` reconnu
//! - GeoPackage (`.gpkg`) : une couche de features nommée, lue via SQLite
//! - Shapefile (`.shp` + `.dbf`)
//!
//! Les géométries restent dans le système de coordonnées de la source; la
//! reprojection est à la charge de l'appelant.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geosource::{read, ReadOptions};
//! use std::path::Path;
//!
//! let data = read(Path::new("CARTO_BAT_TOIT.gpkg"), &ReadOptions {
//!     layer: Some("cartobattoit".into()),
//!     limit: Some(5000),
//!     ..Default::default()
//! })?;
//! println!("{} features ({})", data.features.len(), data.format);
//! ```

pub mod error;
pub mod filter;
pub mod gpkg;
pub mod json;
pub mod shapefile;
pub mod types;

pub use error::SourceError;
pub use filter::ReadOptions;
pub use types::{Feature, Properties, SourceData, SourceFormat, Value};

use std::path::Path;
use tracing::info;

/// Lit une source complète puis applique emprise et limite.
///
/// # Errors
///
/// `SourceError::NotFound` si le fichier n'existe pas, ou toute erreur de
/// lecture propre au format. Une emprise vide n'est pas une erreur : le
/// résultat contient alors zéro feature.
pub fn read(path: &Path, options: &ReadOptions) -> Result<SourceData, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let format = SourceFormat::from_path(path)?;
    let early_limit = options.early_limit();

    let (features, layer, srid) = match format {
        SourceFormat::GeoJson => {
            let source = json::read(path)?;
            (source.features, None, source.srid)
        }
        SourceFormat::GeoPackage => {
            let source = gpkg::read(path, options.layer.as_deref(), early_limit)?;
            (source.features, Some(source.layer), source.srid)
        }
        SourceFormat::Shapefile => {
            let source = shapefile::read(path, early_limit)?;
            (source.features, None, source.srid)
        }
    };

    let total_read = features.len();
    let features = filter::apply(features, options);
    info!(
        format = %format,
        read = total_read,
        kept = features.len(),
        "Source lue"
    );

    Ok(SourceData {
        features,
        format,
        layer,
        srid,
        total_read,
    })
}
