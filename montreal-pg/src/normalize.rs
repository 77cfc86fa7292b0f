//! Normalisation des géométries : reprojection vers WGS84 et famille cible

use anyhow::{Context, Result};
use geo::{Area, Geometry, MultiPolygon, Polygon};
use geosource::Feature;
use tracing::{debug, warn};

use crate::config::GeometryTarget;
use crate::mapping::{FieldMapper, SqlValue};
use crate::reproject_lite::SmartReprojector;

/// Enregistrement prêt à charger : géométrie WGS84 de la famille cible et valeurs des colonnes
#[derive(Debug, Clone)]
pub struct Record {
    /// Identifiant de la feature source
    pub id: u64,
    pub geometry: Geometry,
    pub values: Vec<SqlValue>,
}

/// Résultat de la normalisation d'une collection
#[derive(Debug, Default)]
pub struct Normalized {
    pub records: Vec<Record>,
    /// Features écartées (géométrie absente ou non surfacique)
    pub skipped: usize,
}

/// Ramène une géométrie à la famille de la colonne cible.
///
/// `None` si la géométrie n'est pas surfacique. Pour une cible `Polygon`, un
/// multipolygone ne garde que son plus grand membre (le premier en cas
/// d'égalité); un multipolygone vide est écarté.
pub fn canonicalize(geometry: Geometry, target: GeometryTarget) -> Option<Geometry> {
    match (geometry, target) {
        (Geometry::Polygon(p), GeometryTarget::MultiPolygon) => {
            Some(Geometry::MultiPolygon(MultiPolygon(vec![p])))
        }
        (Geometry::MultiPolygon(mp), GeometryTarget::MultiPolygon) => {
            Some(Geometry::MultiPolygon(mp))
        }
        (Geometry::Polygon(p), GeometryTarget::Polygon) => Some(Geometry::Polygon(p)),
        (Geometry::MultiPolygon(mp), GeometryTarget::Polygon) => {
            largest_member(mp).map(Geometry::Polygon)
        }
        _ => None,
    }
}

fn largest_member(mp: MultiPolygon) -> Option<Polygon> {
    mp.0.into_iter()
        .fold(None, |best: Option<(f64, Polygon)>, p| {
            let area = p.unsigned_area();
            match best {
                Some((best_area, _)) if area <= best_area => best,
                _ => Some((area, p)),
            }
        })
        .map(|(_, p)| p)
}

fn is_surface(geometry: &Geometry) -> bool {
    matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
}

/// Reprojette et canonicalise toute la collection en mémoire.
///
/// Les features sans géométrie ou de famille non surfacique sont comptées
/// une fois dans `skipped`. Un échec de reprojection interrompt l'import.
pub fn normalize(
    features: Vec<Feature>,
    reprojector: &SmartReprojector,
    target: GeometryTarget,
    mapper: &FieldMapper,
) -> Result<Normalized> {
    let mut out = Normalized {
        records: Vec::with_capacity(features.len()),
        skipped: 0,
    };

    for feature in features {
        let geometry = match &feature.geometry {
            Some(g) if is_surface(g) => g,
            other => {
                debug!(id = feature.id, geometry = ?other.as_ref().map(geometry_kind), "Feature ignorée");
                out.skipped += 1;
                continue;
            }
        };

        let projected = reprojector
            .transform_geometry(geometry)
            .with_context(|| format!("Failed to reproject feature {}", feature.id))?;

        let Some(geometry) = canonicalize(projected, target) else {
            debug!(id = feature.id, "Multipolygone vide ignoré");
            out.skipped += 1;
            continue;
        };

        out.records.push(Record {
            id: feature.id,
            values: mapper.map(&feature),
            geometry,
        });
    }

    if out.skipped > 0 {
        warn!(skipped = out.skipped, kept = out.records.len(), "Features sans géométrie surfacique ignorées");
    }

    Ok(out)
}

fn geometry_kind(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
