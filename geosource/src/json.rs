//! Lecture d'une FeatureCollection GeoJSON

use geojson::{FeatureCollection, GeoJson};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::{Feature, Properties, SourceError, Value};

/// Contenu brut d'un fichier GeoJSON
pub struct GeoJsonSource {
    pub features: Vec<Feature>,
    pub srid: Option<u32>,
}

/// Charge le fichier entier en mémoire
pub fn read(path: &Path) -> Result<GeoJsonSource, SourceError> {
    let reader = BufReader::new(File::open(path)?);
    let geojson = GeoJson::from_reader(reader).map_err(|e| SourceError::geojson(e.to_string()))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(f) => FeatureCollection {
            bbox: None,
            features: vec![f],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => {
            return Err(SourceError::geojson("expected a FeatureCollection, found a bare geometry"))
        }
    };

    let srid = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(crs_srid);
    debug!(srid = ?srid, count = collection.features.len(), "GeoJSON chargé");

    let features = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(idx, feature)| convert_feature(idx as u64, feature))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GeoJsonSource { features, srid })
}

fn convert_feature(idx: u64, feature: geojson::Feature) -> Result<Feature, SourceError> {
    let geometry = match feature.geometry {
        Some(g) => Some(
            geo::Geometry::<f64>::try_from(g).map_err(|e| SourceError::invalid_geometry(idx, e))?,
        ),
        None => None,
    };

    let properties: Properties = feature
        .properties
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), Value::from_json(v)))
        .collect();

    Ok(Feature {
        id: idx,
        geometry,
        properties,
    })
}

/// Extrait le code EPSG du membre `crs` (forme "name" de GeoJSON 2008)
///
/// Reconnaît `urn:ogc:def:crs:EPSG::32188`, `EPSG:32188` et `urn:ogc:def:crs:OGC:1.3:CRS84`.
pub fn crs_srid(crs: &serde_json::Value) -> Option<u32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    if !name.to_ascii_uppercase().contains("EPSG") {
        return None;
    }
    name.rsplit(':').next()?.trim().parse().ok()
}
