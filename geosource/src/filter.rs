//! Filtrage des features lues : emprise puis limite

use geo::{BoundingRect, Intersects, Rect};

use crate::Feature;

/// Contraintes de lecture
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Nombre maximal de features retenues
    pub limit: Option<usize>,

    /// Emprise de filtrage, exprimée dans le système de coordonnées de la source
    pub bbox: Option<Rect>,

    /// Couche à lire (GeoPackage)
    pub layer: Option<String>,
}

impl ReadOptions {
    /// La limite peut être appliquée pendant la lecture seulement sans filtre spatial
    pub(crate) fn early_limit(&self) -> Option<usize> {
        match self.bbox {
            Some(_) => None,
            None => self.limit,
        }
    }
}

/// Applique l'emprise (intersection) puis la limite.
///
/// Avec une emprise, les features sans géométrie sont écartées.
pub fn apply(features: Vec<Feature>, options: &ReadOptions) -> Vec<Feature> {
    let limit = options.limit.unwrap_or(usize::MAX);

    match options.bbox {
        Some(bbox) => features
            .into_iter()
            .filter(|f| f.geometry.as_ref().is_some_and(|g| intersects_bbox(g, &bbox)))
            .take(limit)
            .collect(),
        None => features.into_iter().take(limit).collect(),
    }
}

fn intersects_bbox(geometry: &geo::Geometry, bbox: &Rect) -> bool {
    // Test rapide sur l'enveloppe avant l'intersection exacte
    let Some(envelope) = geometry.bounding_rect() else {
        return false;
    };
    if envelope.max().x < bbox.min().x
        || envelope.min().x > bbox.max().x
        || envelope.max().y < bbox.min().y
        || envelope.min().y > bbox.max().y
    {
        return false;
    }
    bbox.intersects(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon, Geometry};
    use std::collections::HashMap;

    fn square(id: u64, x: f64, y: f64) -> Feature {
        Feature {
            id,
            geometry: Some(Geometry::Polygon(polygon![
                (x: x, y: y),
                (x: x + 10.0, y: y),
                (x: x + 10.0, y: y + 10.0),
                (x: x, y: y + 10.0),
                (x: x, y: y),
            ])),
            properties: HashMap::new(),
        }
    }

    #[test]
    fn test_limit_only() {
        let features = vec![square(0, 0.0, 0.0), square(1, 100.0, 0.0), square(2, 200.0, 0.0)];
        let options = ReadOptions {
            limit: Some(2),
            ..Default::default()
        };
        let kept = apply(features, &options);
        assert_eq!(kept.iter().map(|f| f.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_bbox_then_limit() {
        let features = vec![
            square(0, 0.0, 0.0),
            square(1, 100.0, 0.0),
            square(2, 105.0, 5.0),
            square(3, 300.0, 0.0),
        ];
        let options = ReadOptions {
            limit: Some(1),
            bbox: Some(Rect::new(coord! { x: 95.0, y: -5.0 }, coord! { x: 120.0, y: 20.0 })),
            layer: None,
        };
        let kept = apply(features, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);
    }

    #[test]
    fn test_bbox_drops_null_geometries() {
        let mut empty = square(0, 0.0, 0.0);
        empty.geometry = None;
        let options = ReadOptions {
            bbox: Some(Rect::new(coord! { x: -50.0, y: -50.0 }, coord! { x: 50.0, y: 50.0 })),
            ..Default::default()
        };
        assert!(apply(vec![empty, square(1, 0.0, 0.0)], &options)
            .iter()
            .all(|f| f.id == 1));
    }

    #[test]
    fn test_empty_bbox_region() {
        let options = ReadOptions {
            bbox: Some(Rect::new(coord! { x: 5000.0, y: 5000.0 }, coord! { x: 6000.0, y: 6000.0 })),
            ..Default::default()
        };
        assert!(apply(vec![square(0, 0.0, 0.0)], &options).is_empty());
    }
}
