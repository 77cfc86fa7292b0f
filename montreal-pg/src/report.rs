//! Rapport d'import et résumé des agrégats
//!
//! `ImportReport` collecte les compteurs d'une exécution; `Summary` porte les
//! statistiques lues en base après chargement et sait s'afficher.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

/// Statut global de l'import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    /// Import chargé en base
    Success,
    /// Aucune feature dans la zone demandée
    NoFeatures,
    /// Export GeoJSON, sans base
    Exported,
}

/// Rapport d'une exécution
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Table cible
    pub table: String,
    pub status: ImportStatus,
    pub duration_secs: f64,

    /// Features lues (après emprise et limite)
    pub features_read: usize,
    /// Features sans géométrie surfacique
    pub features_skipped: usize,
    pub records_inserted: usize,
    pub batches_committed: usize,
}

impl ImportReport {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            status: ImportStatus::Success,
            duration_secs: 0.0,
            features_read: 0,
            features_skipped: 0,
            records_inserted: 0,
            batches_committed: 0,
        }
    }

    /// Définit la durée de l'import
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Affichage compact pour les logs
    pub fn summary(&self) -> String {
        format!(
            "{}: {} read, {} skipped, {} inserted in {} batches ({:.2}s)",
            self.table,
            self.features_read,
            self.features_skipped,
            self.records_inserted,
            self.batches_committed,
            self.duration_secs
        )
    }
}

/// Comptage des valeurs non nulles d'une colonne
#[derive(Debug, Clone, PartialEq)]
pub struct NonNullStat {
    pub column: String,
    pub count: i64,
}

/// Min/max d'une colonne (None si aucune ligne au-dessus du seuil)
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSummary {
    pub column: String,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: Option<String>,
    pub count: i64,
    pub area_km2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSection {
    pub label: String,
    pub rows: Vec<GroupRow>,
}

/// Statistiques lues en base après chargement
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: i64,
    pub non_null: Vec<NonNullStat>,
    pub range: Option<RangeSummary>,
    /// `Some(None)` si l'emprise est demandée mais la table vide
    pub extent: Option<Option<[f64; 4]>>,
    pub groups: Option<GroupSection>,
}

impl Summary {
    /// Texte du résumé, bannière comprise
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "IMPORT SUMMARY");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Total: {}", thousands(self.total));

        for stat in &self.non_null {
            let _ = writeln!(
                out,
                "With {}: {} ({:.1}%)",
                stat.column,
                thousands(stat.count),
                percent(stat.count, self.total)
            );
        }

        if let Some(range) = &self.range {
            let _ = match (range.min, range.max) {
                (Some(min), Some(max)) => writeln!(out, "{} range: {} - {}", range.column, min, max),
                _ => writeln!(out, "{} range: n/a", range.column),
            };
        }

        if let Some(extent) = &self.extent {
            let _ = match extent {
                Some([xmin, ymin, xmax, ymax]) => writeln!(
                    out,
                    "Bounding box: ({:.6}, {:.6}, {:.6}, {:.6})",
                    xmin, ymin, xmax, ymax
                ),
                None => writeln!(out, "Bounding box: empty"),
            };
        }

        if let Some(groups) = &self.groups {
            let _ = writeln!(out, "\n{}:", groups.label);
            for row in &groups.rows {
                let key = row.key.as_deref().unwrap_or("(null)");
                let _ = match row.area_km2 {
                    Some(area) => writeln!(
                        out,
                        "  {}: {} ({:.2} km²)",
                        key,
                        thousands(row.count),
                        area
                    ),
                    None => writeln!(out, "  {}: {}", key, thousands(row.count)),
                };
            }
        }

        out
    }
}

fn percent(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Entier avec séparateur de milliers ("12,345")
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Bannière de titre (début d'import)
pub fn banner(title: &str) -> String {
    let rule = "=".repeat(60);
    format!("{}\n{}\n{}", rule, title, rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_summary(total: i64) -> Summary {
        Summary {
            total,
            non_null: Vec::new(),
            range: None,
            extent: None,
            groups: None,
        }
    }

    #[test]
    fn test_import_report_new() {
        let report = ImportReport::new("land_use");
        assert_eq!(report.status, ImportStatus::Success);
        assert_eq!(report.records_inserted, 0);
    }

    #[test]
    fn test_report_summary() {
        let mut report = ImportReport::new("montreal_buildings");
        report.features_read = 5000;
        report.features_skipped = 2;
        report.records_inserted = 4998;
        report.batches_committed = 5;
        report.set_duration(Duration::from_millis(1500));

        let summary = report.summary();
        assert!(summary.starts_with("montreal_buildings:"));
        assert!(summary.contains("4998 inserted in 5 batches"));
        assert!(summary.contains("1.50s"));
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
        assert_eq!(thousands(-45000), "-45,000");
    }

    #[test]
    fn test_render_starts_with_total() {
        let text = empty_summary(1).render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "=".repeat(60));
        assert_eq!(lines[2], "IMPORT SUMMARY");
        assert_eq!(lines[4], "Total: 1");
    }

    #[test]
    fn test_render_property_assessment() {
        let summary = Summary {
            total: 2000,
            non_null: vec![
                NonNullStat {
                    column: "year_built".into(),
                    count: 1500,
                },
                NonNullStat {
                    column: "floors".into(),
                    count: 0,
                },
            ],
            range: Some(RangeSummary {
                column: "year_built".into(),
                min: Some(1650),
                max: Some(2024),
            }),
            extent: None,
            groups: Some(GroupSection {
                label: "Top 10 building types".into(),
                rows: vec![GroupRow {
                    key: Some("Logement".into()),
                    count: 1200,
                    area_km2: None,
                }],
            }),
        };

        let text = summary.render();
        assert!(text.contains("Total: 2,000"));
        assert!(text.contains("With year_built: 1,500 (75.0%)"));
        assert!(text.contains("With floors: 0 (0.0%)"));
        assert!(text.contains("year_built range: 1650 - 2024"));
        assert!(text.contains("\nTop 10 building types:\n  Logement: 1,200\n"));
    }

    #[test]
    fn test_render_groups_with_area_and_extent() {
        let mut summary = empty_summary(3);
        summary.extent = Some(Some([-73.62, 45.49, -73.54, 45.52]));
        summary.groups = Some(GroupSection {
            label: "By type".into(),
            rows: vec![
                GroupRow {
                    key: Some("Residential".into()),
                    count: 2,
                    area_km2: Some(12.5),
                },
                GroupRow {
                    key: None,
                    count: 1,
                    area_km2: Some(0.0),
                },
            ],
        });

        let text = summary.render();
        assert!(text.contains("Bounding box: (-73.620000, 45.490000, -73.540000, 45.520000)"));
        assert!(text.contains("  Residential: 2 (12.50 km²)"));
        assert!(text.contains("  (null): 1 (0.00 km²)"));
    }

    #[test]
    fn test_percent_of_empty_table() {
        assert_eq!(percent(0, 0), 0.0);
    }

    #[test]
    fn test_banner() {
        let b = banner("Montreal Land Use Import");
        assert_eq!(b.lines().count(), 3);
        assert_eq!(b.lines().nth(1), Some("Montreal Land Use Import"));
    }
}
