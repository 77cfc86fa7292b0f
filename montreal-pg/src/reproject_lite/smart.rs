//! Choix du moteur de reprojection
//!
//! Le moteur intégré couvre les projections MTM et UTM des jeux de données
//! montréalais; PROJ ne sert que pour les autres codes EPSG.

use anyhow::Result;
use geo::{coord, Geometry, Rect};

use super::ReprojectorLite;
#[cfg(feature = "reproject")]
use crate::export::reproject::ProjTransform;

enum Engine {
    /// Source et cible identiques
    Identity,
    Lite(ReprojectorLite),
    #[cfg(feature = "reproject")]
    Proj(ProjTransform),
}

/// Reprojection entre deux codes EPSG, avec le moteur le plus léger disponible
pub struct SmartReprojector {
    engine: Engine,
    source_epsg: u32,
    target_epsg: u32,
}

impl SmartReprojector {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let engine = if source_epsg == target_epsg {
            Engine::Identity
        } else if ReprojectorLite::is_supported(source_epsg, target_epsg) {
            Engine::Lite(ReprojectorLite::new(source_epsg, target_epsg)?)
        } else {
            Self::fallback(source_epsg, target_epsg)?
        };

        Ok(Self {
            engine,
            source_epsg,
            target_epsg,
        })
    }

    #[cfg(feature = "reproject")]
    fn fallback(source_epsg: u32, target_epsg: u32) -> Result<Engine> {
        Ok(Engine::Proj(ProjTransform::new(source_epsg, target_epsg)?))
    }

    #[cfg(not(feature = "reproject"))]
    fn fallback(source_epsg: u32, target_epsg: u32) -> Result<Engine> {
        anyhow::bail!(
            "Unsupported reprojection EPSG:{} -> EPSG:{}. Built-in codes: \
             32181-32190 and 2950 (NAD83 MTM), 26901-26923, 32601-32660 and \
             32701-32760 (UTM), to or from 4326. Rebuild with --features reproject \
             to use PROJ for other systems.",
            source_epsg,
            target_epsg
        )
    }

    /// Même moteur, sens cible vers source
    pub fn inverse(&self) -> Result<Self> {
        let engine = match &self.engine {
            Engine::Identity => Engine::Identity,
            Engine::Lite(lite) => Engine::Lite(lite.inverse()),
            #[cfg(feature = "reproject")]
            Engine::Proj(proj) => Engine::Proj(proj.inverse()?),
        };
        Ok(Self {
            engine,
            source_epsg: self.target_epsg,
            target_epsg: self.source_epsg,
        })
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.engine, Engine::Identity)
    }

    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        match &self.engine {
            Engine::Identity => Ok(geom.clone()),
            Engine::Lite(lite) => lite.transform_geometry(geom),
            #[cfg(feature = "reproject")]
            Engine::Proj(proj) => proj.transform_geometry(geom),
        }
    }

    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match &self.engine {
            Engine::Identity => Ok((x, y)),
            Engine::Lite(lite) => lite.transform_point(x, y),
            #[cfg(feature = "reproject")]
            Engine::Proj(proj) => proj.transform_point(x, y),
        }
    }

    /// Projette une emprise par ses coins min et max.
    ///
    /// La rotation de la grille n'est pas compensée : l'emprise obtenue peut
    /// manquer une frange des bords.
    pub fn transform_rect(&self, rect: Rect) -> Result<Rect> {
        let (min_x, min_y) = self.transform_point(rect.min().x, rect.min().y)?;
        let (max_x, max_y) = self.transform_point(rect.max().x, rect.max().y)?;
        Ok(Rect::new(
            coord! { x: min_x, y: min_y },
            coord! { x: max_x, y: max_y },
        ))
    }

    /// Moteur retenu, pour les logs
    pub fn description(&self) -> String {
        let engine = match &self.engine {
            Engine::Identity => "identity",
            Engine::Lite(_) => "built-in transverse Mercator",
            #[cfg(feature = "reproject")]
            Engine::Proj(_) => "PROJ",
        };
        format!("EPSG:{} -> EPSG:{} ({})", self.source_epsg, self.target_epsg, engine)
    }
}
