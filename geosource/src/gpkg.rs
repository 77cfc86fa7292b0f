//! Lecture d'une couche de features GeoPackage
//!
//! Le GeoPackage est ouvert en lecture seule via SQLite. Les géométries sont
//! décodées depuis le format binaire GeoPackage (en-tête `GP` + WKB).

use geo::HasDimensions;
use geozero::wkb::GpkgWkb;
use geozero::ToGeo;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

use crate::{Feature, Properties, SourceError, Value};

/// Contenu brut d'une couche
pub struct GpkgSource {
    pub features: Vec<Feature>,
    pub layer: String,
    pub srid: Option<u32>,
}

/// Lit une couche entière. Sans nom de couche, la première couche de features est prise.
pub fn read(
    path: &Path,
    layer: Option<&str>,
    limit: Option<usize>,
) -> Result<GpkgSource, SourceError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let layers = feature_layers(&conn)?;
    let layer = match layer {
        Some(name) if layers.iter().any(|l| l == name) => name.to_string(),
        Some(name) => {
            return Err(SourceError::UnknownLayer {
                layer: name.to_string(),
                available: layers.join(", "),
            })
        }
        None => layers.first().cloned().ok_or_else(|| SourceError::UnknownLayer {
            layer: "<default>".to_string(),
            available: String::new(),
        })?,
    };

    let (geom_column, srs_id) = geometry_column(&conn, &layer)?;
    let pk_columns = primary_key_columns(&conn, &layer)?;
    info!(layer = %layer, geom_column = %geom_column, srs_id = ?srs_id, "Lecture de la couche GeoPackage");

    let mut sql = format!("SELECT * FROM {}", quote_ident(&layer));
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n));
    }

    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = stmt.query([])?;

    let mut features = Vec::new();
    let mut rank: u64 = 0;
    while let Some(row) = rows.next()? {
        let mut id = rank;
        let mut geometry = None;
        let mut properties = Properties::new();

        for (idx, name) in columns.iter().enumerate() {
            let value = row.get_ref(idx)?;
            if name.eq_ignore_ascii_case(&geom_column) {
                geometry = decode_geometry(rank, value)?;
            } else if pk_columns.iter().any(|pk| pk == name) {
                if let ValueRef::Integer(fid) = value {
                    id = fid as u64;
                }
            } else if let Some(prop) = convert_value(value) {
                properties.insert(name.clone(), prop);
            }
        }

        features.push(Feature {
            id,
            geometry,
            properties,
        });
        rank += 1;
    }
    debug!(count = features.len(), "Features lues");

    Ok(GpkgSource {
        features,
        layer,
        // srs_id 0 ou -1 : système non défini
        srid: srs_id.filter(|s| *s > 0).map(|s| s as u32),
    })
}

/// Couches de type `features` déclarées dans `gpkg_contents`
pub fn feature_layers(conn: &Connection) -> Result<Vec<String>, SourceError> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' ORDER BY table_name",
    )?;
    let layers = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(layers)
}

fn geometry_column(conn: &Connection, layer: &str) -> Result<(String, Option<i64>), SourceError> {
    let found = conn
        .query_row(
            "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
            [layer],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)),
        )
        .optional()?;

    // Sans entrée dans gpkg_geometry_columns, nom usuel des exports OGR
    Ok(found.unwrap_or_else(|| ("geom".to_string(), None)))
}

fn primary_key_columns(conn: &Connection, layer: &str) -> Result<Vec<String>, SourceError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(layer)))?;
    let columns = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns
        .into_iter()
        .filter(|(_, pk)| *pk > 0)
        .map(|(name, _)| name)
        .collect())
}

fn decode_geometry(feature: u64, value: ValueRef<'_>) -> Result<Option<geo::Geometry>, SourceError> {
    let blob = match value {
        ValueRef::Blob(b) if !b.is_empty() => b,
        _ => return Ok(None),
    };

    let geometry = GpkgWkb(blob)
        .to_geo()
        .map_err(|e| SourceError::invalid_geometry(feature, e))?;

    if geometry.is_empty() {
        Ok(None)
    } else {
        Ok(Some(geometry))
    }
}

fn convert_value(value: ValueRef<'_>) -> Option<Option<Value>> {
    match value {
        ValueRef::Null => Some(None),
        ValueRef::Integer(i) => Some(Some(Value::Integer(i))),
        ValueRef::Real(f) => Some(Some(Value::Numeric(f))),
        ValueRef::Text(t) => Some(Some(Value::Text(String::from_utf8_lossy(t).into_owned()))),
        // Colonnes binaires ignorées
        ValueRef::Blob(_) => None,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("cartobattoit"), "\"cartobattoit\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_convert_value() {
        assert_eq!(convert_value(ValueRef::Null), Some(None));
        assert_eq!(
            convert_value(ValueRef::Real(12.5)),
            Some(Some(Value::Numeric(12.5)))
        );
        assert_eq!(
            convert_value(ValueRef::Text(b"CARTO-BAT-TOIT")),
            Some(Some(Value::Text("CARTO-BAT-TOIT".into())))
        );
        assert_eq!(convert_value(ValueRef::Blob(&[1, 2])), None);
    }
}
