//! Projection Transverse Mercator (séries de Krüger à l'ordre 4)
//!
//! Couvre le MTM (Modified Transverse Mercator, zones de 3°) utilisé au Québec
//! et l'UTM. La précision est submillimétrique dans la zone d'usage.

use super::ellipsoid::GRS80;
use super::Geographic;

/// Paramètres d'une projection Transverse Mercator sur GRS80
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Méridien central (radians)
    lon0: f64,
    /// Facteur d'échelle sur le méridien central
    k0: f64,
    false_easting: f64,
    false_northing: f64,
    /// Rayon rectifiant A
    a_hat: f64,
    /// Excentricité
    e: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
}

impl TransverseMercator {
    pub fn new(lon0_deg: f64, k0: f64, false_easting: f64, false_northing: f64) -> Self {
        let n = GRS80::N;
        let (n2, n3, n4) = (n * n, n * n * n, n * n * n * n);

        let a_hat = GRS80::A / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
            49561.0 * n4 / 161280.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
            4397.0 * n4 / 161280.0,
        ];

        Self {
            lon0: lon0_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
            a_hat,
            e: GRS80::E2.sqrt(),
            alpha,
            beta,
        }
    }

    /// Zone MTM du NAD83 (1 à 10)
    pub fn mtm(zone: u32) -> Option<Self> {
        let lon0 = match zone {
            1 => -53.0,
            2 => -56.0,
            3..=10 => -(58.5 + 3.0 * (zone - 3) as f64),
            _ => return None,
        };
        Some(Self::new(lon0, 0.9999, 304800.0, 0.0))
    }

    /// Zone UTM (1 à 60)
    pub fn utm(zone: u32, south: bool) -> Option<Self> {
        if !(1..=60).contains(&zone) {
            return None;
        }
        let lon0 = -183.0 + 6.0 * zone as f64;
        let false_northing = if south { 10_000_000.0 } else { 0.0 };
        Some(Self::new(lon0, 0.9996, 500000.0, false_northing))
    }

    /// Géographique → projeté (x = est, y = nord)
    pub fn forward(&self, geo: Geographic) -> (f64, f64) {
        let e = self.e;
        let lam = geo.lon - self.lon0;
        let sin_phi = geo.lat.sin();

        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();
        let xi_p = t.atan2(lam.cos());
        let eta_p = (lam.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        (
            self.false_easting + self.k0 * self.a_hat * eta,
            self.false_northing + self.k0 * self.a_hat * xi,
        )
    }

    /// Projeté → géographique
    pub fn inverse(&self, x: f64, y: f64) -> Geographic {
        let xi = (y - self.false_northing) / (self.k0 * self.a_hat);
        let eta = (x - self.false_easting) / (self.k0 * self.a_hat);

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        // Latitude conforme, puis latitude géodésique par itération
        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let lam = eta_p.sinh().atan2(xi_p.cos());

        let e = self.e;
        let q = chi.sin().atanh();
        let mut phi = chi;
        for _ in 0..15 {
            let next = (q + e * (e * phi.sin()).atanh()).tanh().asin();
            let done = (next - phi).abs() < 1e-14;
            phi = next;
            if done {
                break;
            }
        }

        Geographic::new(self.lon0 + lam, phi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_meridian_arc() {
        // Sur le méridien central, y = k0 * arc de méridien (4 984 944.378 m à 45°N sur GRS80)
        let mtm8 = TransverseMercator::mtm(8).unwrap();
        let (x, y) = mtm8.forward(Geographic::from_degrees(-73.5, 45.0));
        assert!((x - 304800.0).abs() < 1e-6, "x={}", x);
        assert!((y - 0.9999 * 4984944.378).abs() < 0.01, "y={}", y);
    }

    #[test]
    fn test_mtm8_downtown_montreal() {
        let mtm8 = TransverseMercator::mtm(8).unwrap();
        let (x, y) = mtm8.forward(Geographic::from_degrees(-73.5673, 45.5017));
        assert!((x - 299540.647).abs() < 0.01, "x={}", x);
        assert!((y - 5040199.783).abs() < 0.01, "y={}", y);
    }

    #[test]
    fn test_round_trip() {
        let mtm8 = TransverseMercator::mtm(8).unwrap();
        for (x, y) in [(300000.0, 5040000.0), (280000.0, 5020000.0), (320000.0, 5065000.0)] {
            let (x2, y2) = mtm8.forward(mtm8.inverse(x, y));
            assert!((x - x2).abs() < 1e-6, "{} vs {}", x, x2);
            assert!((y - y2).abs() < 1e-6, "{} vs {}", y, y2);
        }
    }

    #[test]
    fn test_zone_bounds() {
        assert!(TransverseMercator::mtm(0).is_none());
        assert!(TransverseMercator::mtm(11).is_none());
        assert!(TransverseMercator::utm(61, false).is_none());
        assert!(TransverseMercator::utm(18, false).is_some());
    }

    #[test]
    fn test_utm18_montreal() {
        // Montréal en UTM 18N : environ 611 000 E, 5 040 000 N
        let utm = TransverseMercator::utm(18, false).unwrap();
        let (x, y) = utm.forward(Geographic::from_degrees(-73.5673, 45.5017));
        assert!((x - 611_000.0).abs() < 2_000.0, "x={}", x);
        assert!((y - 5_040_000.0).abs() < 5_000.0, "y={}", y);
    }
}
