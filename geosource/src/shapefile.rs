//! Lecture d'un Shapefile ESRI (.shp + .dbf)
//!
//! Les enregistrements sont parcourus avec le lecteur `geozero`, qui envoie
//! attributs et géométrie à un collecteur. La géométrie est construite par
//! un `GeoWriter`; les polygones mono-partie sont ramenés à un `Polygon`.

use geo::Geometry;
use geozero::error::Result as GeozeroResult;
use geozero::geo_types::GeoWriter;
use geozero::shp::ShpReader;
use geozero::{ColumnValue, FeatureProcessor, GeomProcessor, PropertyProcessor};
use std::path::Path;
use tracing::debug;

use crate::{Feature, Properties, SourceError, Value};

/// Contenu brut d'un Shapefile
pub struct ShapefileSource {
    pub features: Vec<Feature>,
    pub srid: Option<u32>,
}

/// Lit le Shapefile entier (ou les `limit` premiers enregistrements)
pub fn read(path: &Path, limit: Option<usize>) -> Result<ShapefileSource, SourceError> {
    let reader = ShpReader::from_path(path)?;
    debug!(shape_type = ?reader.header().shape_type, "En-tête Shapefile lu");

    let mut collector = FeatureCollector::default();
    let max = limit.unwrap_or(usize::MAX);
    {
        let records = reader.iter_features(&mut collector)?;
        for record in records.take(max) {
            record?;
        }
    }

    let srid = match std::fs::read_to_string(path.with_extension("prj")) {
        Ok(wkt) => prj_srid(&wkt),
        Err(_) => None,
    };

    Ok(ShapefileSource {
        features: collector.features,
        srid,
    })
}

/// Code EPSG d'un fichier .prj (WKT ESRI ou OGC)
///
/// L'autorité EPSG du PROJCS est prise si présente, sinon le nom est comparé
/// aux zones MTM du NAD83. Un GEOGCS seul est considéré comme du WGS84.
pub fn prj_srid(wkt: &str) -> Option<u32> {
    let wkt = wkt.trim();
    if wkt.starts_with("GEOGCS") {
        return Some(4326);
    }
    if !wkt.starts_with("PROJCS") {
        return None;
    }

    // La dernière AUTHORITY d'un PROJCS est la sienne
    if let Some(pos) = wkt.rfind("AUTHORITY[\"EPSG\",") {
        let code: String = wkt
            .get(pos + 17..)
            .unwrap_or_default()
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(code) = code.parse() {
            return Some(code);
        }
    }

    let name = wkt.split('"').nth(1)?.to_ascii_uppercase().replace(['_', ' ', '/'], "");
    let zone = name
        .split("MTM")
        .nth(1)?
        .trim_start_matches("ZONE")
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse::<u32>()
        .ok()?;

    match (name.contains("CSRS"), zone) {
        (true, 8) => Some(2950),
        (false, 1..=10) => Some(32180 + zone),
        _ => None,
    }
}

/// Accumule les features émises par le lecteur
#[derive(Default)]
struct FeatureCollector {
    features: Vec<Feature>,
    current: Properties,
    geometry: GeoWriter,
}

impl FeatureProcessor for FeatureCollector {
    fn feature_begin(&mut self, _idx: u64) -> GeozeroResult<()> {
        self.current = Properties::new();
        Ok(())
    }

    fn feature_end(&mut self, idx: u64) -> GeozeroResult<()> {
        let geometry = self.geometry.take_geometry().map(single_part);
        self.features.push(Feature {
            id: idx,
            geometry,
            properties: std::mem::take(&mut self.current),
        });
        Ok(())
    }
}

impl PropertyProcessor for FeatureCollector {
    fn property(&mut self, _idx: usize, name: &str, value: &ColumnValue) -> GeozeroResult<bool> {
        let value = match value {
            ColumnValue::String(s) | ColumnValue::DateTime(s) | ColumnValue::Json(s) => {
                Some(Value::Text(s.to_string()))
            }
            ColumnValue::Byte(v) => Some(Value::Integer(i64::from(*v))),
            ColumnValue::UByte(v) => Some(Value::Integer(i64::from(*v))),
            ColumnValue::Short(v) => Some(Value::Integer(i64::from(*v))),
            ColumnValue::UShort(v) => Some(Value::Integer(i64::from(*v))),
            ColumnValue::Int(v) => Some(Value::Integer(i64::from(*v))),
            ColumnValue::UInt(v) => Some(Value::Integer(i64::from(*v))),
            ColumnValue::Long(v) => Some(Value::Integer(*v)),
            ColumnValue::ULong(v) => Some(Value::Integer(*v as i64)),
            ColumnValue::Float(v) => Some(Value::Numeric(f64::from(*v))),
            ColumnValue::Double(v) => Some(Value::Numeric(*v)),
            ColumnValue::Bool(v) => Some(Value::Boolean(*v)),
            ColumnValue::Binary(_) => None,
        };
        self.current.insert(name.to_string(), value);
        Ok(false)
    }
}

// La géométrie est déléguée au GeoWriter
impl GeomProcessor for FeatureCollector {
    fn xy(&mut self, x: f64, y: f64, idx: usize) -> GeozeroResult<()> {
        self.geometry.xy(x, y, idx)
    }

    fn point_begin(&mut self, idx: usize) -> GeozeroResult<()> {
        self.geometry.point_begin(idx)
    }

    fn point_end(&mut self, idx: usize) -> GeozeroResult<()> {
        self.geometry.point_end(idx)
    }

    fn multipoint_begin(&mut self, size: usize, idx: usize) -> GeozeroResult<()> {
        self.geometry.multipoint_begin(size, idx)
    }

    fn multipoint_end(&mut self, idx: usize) -> GeozeroResult<()> {
        self.geometry.multipoint_end(idx)
    }

    fn linestring_begin(&mut self, tagged: bool, size: usize, idx: usize) -> GeozeroResult<()> {
        self.geometry.linestring_begin(tagged, size, idx)
    }

    fn linestring_end(&mut self, tagged: bool, idx: usize) -> GeozeroResult<()> {
        self.geometry.linestring_end(tagged, idx)
    }

    fn multilinestring_begin(&mut self, size: usize, idx: usize) -> GeozeroResult<()> {
        self.geometry.multilinestring_begin(size, idx)
    }

    fn multilinestring_end(&mut self, idx: usize) -> GeozeroResult<()> {
        self.geometry.multilinestring_end(idx)
    }

    fn polygon_begin(&mut self, tagged: bool, size: usize, idx: usize) -> GeozeroResult<()> {
        self.geometry.polygon_begin(tagged, size, idx)
    }

    fn polygon_end(&mut self, tagged: bool, idx: usize) -> GeozeroResult<()> {
        self.geometry.polygon_end(tagged, idx)
    }

    fn multipolygon_begin(&mut self, size: usize, idx: usize) -> GeozeroResult<()> {
        self.geometry.multipolygon_begin(size, idx)
    }

    fn multipolygon_end(&mut self, idx: usize) -> GeozeroResult<()> {
        self.geometry.multipolygon_end(idx)
    }
}

/// Le lecteur émet toujours des multi-géométries pour les polygones et polylignes
fn single_part(geometry: Geometry) -> Geometry {
    match geometry {
        Geometry::MultiPolygon(mut mp) if mp.0.len() == 1 => match mp.0.pop() {
            Some(polygon) => Geometry::Polygon(polygon),
            None => Geometry::MultiPolygon(mp),
        },
        Geometry::MultiLineString(mut ml) if ml.0.len() == 1 => match ml.0.pop() {
            Some(line) => Geometry::LineString(line),
            None => Geometry::MultiLineString(ml),
        },
        other => other,
    }
}
