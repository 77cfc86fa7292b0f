//! Export vers GeoJSON avec geozero (streaming)
//!
//! Permet d'inspecter un jeu normalisé (WGS84, attributs mappés) sans base.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use crate::export::postgres::TARGET_SRID;
use crate::mapping::FieldMapper;
use crate::normalize::Record;

/// Exporte les enregistrements normalisés en FeatureCollection
pub fn export_to_geojson(records: &[Record], mapper: &FieldMapper, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"features":["#,
        TARGET_SRID
    )?;

    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(&mut writer, record, mapper)?;
    }

    write!(writer, "]}}")?;
    writer.flush()?;

    Ok(())
}

fn write_feature<W: Write>(writer: &mut W, record: &Record, mapper: &FieldMapper) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":{},"#, record.id)?;

    write!(writer, r#""geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    record.geometry.process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    let properties: serde_json::Map<String, serde_json::Value> = mapper
        .columns()
        .iter()
        .zip(&record.values)
        .map(|(column, value)| (column.target.clone(), value.to_json()))
        .collect();
    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &properties)?;
    write!(writer, "}}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldMapping;
    use crate::mapping::SqlValue;
    use geo::{polygon, Geometry, MultiPolygon};
    use std::io::Cursor;

    fn mapper() -> FieldMapper {
        FieldMapper::new(&[
            FieldMapping {
                source: "AFFECTATIO".into(),
                target: "affectation".into(),
                data_type: "text".into(),
                default: None,
                not_null: false,
                translate: None,
            },
            FieldMapping {
                source: "Shape_Area".into(),
                target: "area_sqm".into(),
                data_type: "numeric".into(),
                default: None,
                not_null: false,
                translate: None,
            },
        ])
        .unwrap()
    }

    fn record() -> Record {
        Record {
            id: 7,
            geometry: Geometry::MultiPolygon(MultiPolygon(vec![polygon![
                (x: -73.56, y: 45.50),
                (x: -73.55, y: 45.50),
                (x: -73.55, y: 45.51),
                (x: -73.56, y: 45.50),
            ]])),
            values: vec![
                SqlValue::Text(Some("Industrie \"lourde\"".into())),
                SqlValue::Numeric(None),
            ],
        }
    }

    #[test]
    fn test_write_feature() {
        let mut buffer = Cursor::new(Vec::new());
        write_feature(&mut buffer, &record(), &mapper()).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&buffer.into_inner()).unwrap();
        assert_eq!(json["type"], "Feature");
        assert_eq!(json["id"], 7);
        assert_eq!(json["geometry"]["type"], "MultiPolygon");
        assert_eq!(json["properties"]["affectation"], "Industrie \"lourde\"");
        assert!(json["properties"]["area_sqm"].is_null());
    }

    #[test]
    fn test_export_to_geojson() {
        let dir = tempfile::TempDir::new().unwrap();
        let output_path = dir.path().join("land_use.geojson");

        export_to_geojson(&[record(), record()], &mapper(), &output_path).unwrap();

        let content = std::fs::read_to_string(&output_path).unwrap();
        assert!(content.contains("EPSG::4326"));
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"].as_array().unwrap().len(), 2);
    }
}
