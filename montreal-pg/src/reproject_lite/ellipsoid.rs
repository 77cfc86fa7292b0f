//! Définitions des ellipsoïdes

/// Ellipsoïde GRS80 (NAD83, NAD83(CSRS))
/// Note: Quasi identique à WGS84, différence < 0.1mm
pub struct GRS80;

impl GRS80 {
    /// Demi-grand axe (rayon équatorial) en mètres
    pub const A: f64 = 6378137.0;

    /// Aplatissement
    pub const F: f64 = 1.0 / 298.257222101;

    /// Troisième aplatissement n = f / (2 - f)
    pub const N: f64 = Self::F / (2.0 - Self::F);

    /// Première excentricité au carré
    pub const E2: f64 = 2.0 * Self::F - Self::F * Self::F;
}
