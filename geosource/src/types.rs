//! Types de données pour le crate geosource

use geo::Geometry;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::SourceError;

/// Attributs d'une feature : nom du champ -> valeur typée (None si NULL à la source)
pub type Properties = HashMap<String, Option<Value>>;

/// Valeur attributaire typée, telle que lue dans la source
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Numeric(f64),
    Boolean(bool),
}

impl Value {
    /// Convertit une valeur JSON scalaire. Les tableaux et objets sont sérialisés en texte.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Integer(i)),
                None => n.as_f64().map(Value::Numeric),
            },
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            other => Some(Value::Text(other.to_string())),
        }
    }

    /// Conversion texte "best effort".
    ///
    /// Les valeurs vides ou nulles (chaîne vide, 0, false, NaN) deviennent `None`,
    /// les autres sont converties en texte puis nettoyées des espaces de bord.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) if s.is_empty() => None,
            Value::Text(s) => Some(s.trim().to_string()),
            Value::Integer(0) => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Numeric(f) if f.is_nan() || *f == 0.0 => None,
            Value::Numeric(f) => Some(format_float(*f)),
            Value::Boolean(false) => None,
            Value::Boolean(true) => Some("True".to_string()),
        }
    }

    /// Conversion entière "best effort" : troncature des flottants, parsing du texte.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Numeric(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Numeric(_) => None,
            Value::Text(s) => s.trim().parse().ok(),
            Value::Boolean(b) => Some(i64::from(*b)),
        }
    }

    /// Conversion numérique "best effort" : NaN devient `None`.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Numeric(f) if f.is_nan() => None,
            Value::Numeric(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            Value::Boolean(_) => None,
        }
    }
}

/// Un flottant entier garde sa décimale ("1234.0"), comme les exports tabulaires usuels
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Numeric(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Une feature avec sa géométrie (absente si NULL ou vide à la source) et ses attributs
#[derive(Debug, Clone)]
pub struct Feature {
    /// Identifiant de la feature (fid GeoPackage, sinon rang dans la source)
    pub id: u64,

    /// Géométrie dans le système de coordonnées de la source
    pub geometry: Option<Geometry>,

    /// Attributs de la feature
    pub properties: Properties,
}

impl Feature {
    /// Valeur d'un attribut, `None` s'il est absent ou NULL
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).and_then(Option::as_ref)
    }
}

/// Format de la source, déduit de l'extension du fichier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    GeoJson,
    GeoPackage,
    Shapefile,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "geojson" | "json" => Ok(SourceFormat::GeoJson),
            "gpkg" => Ok(SourceFormat::GeoPackage),
            "shp" => Ok(SourceFormat::Shapefile),
            _ => Err(SourceError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::GeoJson => write!(f, "GeoJSON"),
            SourceFormat::GeoPackage => write!(f, "GeoPackage"),
            SourceFormat::Shapefile => write!(f, "Shapefile"),
        }
    }
}

/// Résultat de la lecture d'une source
#[derive(Debug)]
pub struct SourceData {
    /// Features retenues après filtrage
    pub features: Vec<Feature>,

    /// Format lu
    pub format: SourceFormat,

    /// Couche lue (GeoPackage uniquement)
    pub layer: Option<String>,

    /// Code EPSG déclaré par la source, s'il existe
    pub srid: Option<u32>,

    /// Nombre de features lues avant filtrage
    pub total_read: usize,
}
