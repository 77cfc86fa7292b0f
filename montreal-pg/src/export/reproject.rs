//! Reprojection via PROJ, pour les codes EPSG hors du moteur intégré
//!
//! Compilé seulement avec le feature `reproject` (nécessite libproj).

#[cfg(feature = "reproject")]
pub use self::proj_backend::ProjTransform;

/// PROJ est-il compilé dans ce binaire ?
pub fn is_available() -> bool {
    cfg!(feature = "reproject")
}

#[cfg(feature = "reproject")]
mod proj_backend {
    use anyhow::{anyhow, Result};
    use geo::{Coord, Geometry, MapCoords};
    use proj::Proj;

    pub struct ProjTransform {
        proj: Proj,
        from: u32,
        to: u32,
    }

    impl ProjTransform {
        pub fn new(from: u32, to: u32) -> Result<Self> {
            let proj = Proj::new_known_crs(&format!("EPSG:{}", from), &format!("EPSG:{}", to), None)
                .map_err(|e| anyhow!("PROJ cannot build EPSG:{} -> EPSG:{}: {}", from, to, e))?;
            Ok(Self { proj, from, to })
        }

        pub fn inverse(&self) -> Result<Self> {
            Self::new(self.to, self.from)
        }

        pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
            self.proj
                .convert((x, y))
                .map_err(|e| anyhow!("PROJ failed on ({}, {}): {}", x, y, e))
        }

        pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
            geom.try_map_coords(|c: Coord| {
                let (x, y) = self.transform_point(c.x, c.y)?;
                Ok(Coord { x, y })
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_proj_matches_builtin_engine() {
            let proj = ProjTransform::new(32188, 4326).unwrap();
            let (lon, lat) = proj.transform_point(299540.647, 5040199.783).unwrap();
            assert!((lon - (-73.5673)).abs() < 0.001, "lon={}", lon);
            assert!((lat - 45.5017).abs() < 0.001, "lat={}", lat);
        }

        #[test]
        fn test_unknown_code() {
            assert!(ProjTransform::new(99999, 4326).is_err());
        }
    }
}
