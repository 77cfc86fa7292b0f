//! Erreurs propres à l'import

use std::path::PathBuf;
use thiserror::Error;

/// Erreurs qui déterminent le comportement du binaire
#[derive(Error, Debug)]
pub enum ImportError {
    /// Fichier source absent : message déjà affiché, sortie en code 1
    #[error("File not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Invalid bounding box {0:?}: expected minLng,minLat,maxLng,maxLat")]
    InvalidBbox(String),
}
