//! Types d'erreurs pour le crate geosource

use std::path::PathBuf;
use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'une source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Fichier source absent
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Extension non reconnue
    #[error("Unsupported source format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Erreur d'I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON invalide ou structure GeoJSON inattendue
    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    /// Erreur SQLite lors de la lecture d'un GeoPackage
    #[error("GeoPackage error: {0}")]
    GeoPackage(#[from] rusqlite::Error),

    /// Couche absente du GeoPackage
    #[error("Layer not found: {layer} (available: {available})")]
    UnknownLayer { layer: String, available: String },

    /// Erreur de lecture Shapefile/DBF
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] geozero::shp::Error),

    /// Géométrie illisible
    #[error("Invalid geometry for feature {feature}: {reason}")]
    InvalidGeometry { feature: u64, reason: String },
}

impl SourceError {
    /// Crée une erreur GeoJSON avec contexte
    pub fn geojson(reason: impl Into<String>) -> Self {
        Self::GeoJson(reason.into())
    }

    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(feature: u64, reason: impl ToString) -> Self {
        Self::InvalidGeometry {
            feature,
            reason: reason.to_string(),
        }
    }
}
