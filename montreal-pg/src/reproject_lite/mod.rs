//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Supporte les projections Transverse Mercator usuelles au Québec :
//! - NAD83 / MTM zones 1 à 10 (EPSG:32181 à 32190)
//! - NAD83(CSRS) / MTM zone 8 (EPSG:2950)
//! - NAD83 / UTM nord (EPSG:26901 à 26923)
//! - WGS84 / UTM nord et sud (EPSG:32601 à 32660, 32701 à 32760)
//!
//! L'autre extrémité est toujours WGS84 (EPSG:4326), dans les deux sens.
//! NAD83 est assimilé à WGS84 (pas de changement de datum).

mod ellipsoid;
mod smart;
mod tmerc;

pub use smart::SmartReprojector;
pub use tmerc::TransverseMercator;

use anyhow::{bail, Result};
use geo::{Coord, Geometry, MapCoords};

/// Code EPSG du WGS84 géographique
pub const WGS84: u32 = 4326;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Sens de la transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Projeté → WGS84
    ToGeographic,
    /// WGS84 → projeté
    FromGeographic,
}

/// Reprojection légère entre une projection TM et WGS84
#[derive(Debug, Clone)]
pub struct ReprojectorLite {
    projection: TransverseMercator,
    direction: Direction,
    source_epsg: u32,
    target_epsg: u32,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let (projected, direction) = match (source_epsg, target_epsg) {
            (s, WGS84) => (s, Direction::ToGeographic),
            (WGS84, t) => (t, Direction::FromGeographic),
            _ => bail!(
                "EPSG:{} → EPSG:{} non supporté. Une des deux extrémités doit être EPSG:4326",
                source_epsg,
                target_epsg
            ),
        };

        let Some(projection) = Self::projection_for(projected) else {
            bail!(
                "EPSG:{} non supporté. Projections supportées: 32181-32190, 2950, 26901-26923, 32601-32660, 32701-32760",
                projected
            );
        };

        Ok(Self {
            projection,
            direction,
            source_epsg,
            target_epsg,
        })
    }

    /// Paramètres TM associés à un code EPSG projeté
    pub fn projection_for(epsg: u32) -> Option<TransverseMercator> {
        match epsg {
            32181..=32190 => TransverseMercator::mtm(epsg - 32180),
            2950 => TransverseMercator::mtm(8),
            26901..=26923 => TransverseMercator::utm(epsg - 26900, false),
            32601..=32660 => TransverseMercator::utm(epsg - 32600, false),
            32701..=32760 => TransverseMercator::utm(epsg - 32700, true),
            _ => None,
        }
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        match (source, target) {
            (s, WGS84) => Self::projection_for(s).is_some(),
            (WGS84, t) => Self::projection_for(t).is_some(),
            _ => false,
        }
    }

    /// Reprojector du sens inverse
    pub fn inverse(&self) -> Self {
        Self {
            projection: self.projection.clone(),
            direction: match self.direction {
                Direction::ToGeographic => Direction::FromGeographic,
                Direction::FromGeographic => Direction::ToGeographic,
            },
            source_epsg: self.target_epsg,
            target_epsg: self.source_epsg,
        }
    }

    /// Transforme un point (x, y) de la source vers la cible (x = longitude en WGS84)
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            bail!("Coordonnée non finie: ({}, {})", x, y);
        }
        match self.direction {
            Direction::ToGeographic => Ok(self.projection.inverse(x, y).to_degrees()),
            Direction::FromGeographic => {
                Ok(self.projection.forward(Geographic::from_degrees(x, y)))
            }
        }
    }

    /// Transforme une géométrie, sommet par sommet
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        geom.try_map_coords(|c: Coord| {
            let (x, y) = self.transform_point(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }
}
