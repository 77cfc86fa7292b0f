//! Pipeline d'import commun aux quatre jeux de données
//!
//! Étapes strictement séquentielles : schéma, lecture, normalisation,
//! chargement par lots, résumé.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use geo::Rect;
use geosource::{filter, Feature, ReadOptions};
use tracing::{debug, info, warn};

use crate::config::DatasetConfig;
use crate::error::ImportError;
use crate::export::pool::{self, DatabaseConfig};
use crate::export::{geojson, postgres, reproject};
use crate::mapping::FieldMapper;
use crate::normalize::{self, Normalized};
use crate::report::{banner, ImportReport, ImportStatus};
use crate::reproject_lite::{SmartReprojector, WGS84};

/// Options d'une exécution
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Nombre maximal de features, appliqué après l'emprise
    pub limit: Option<usize>,
    /// Emprise en WGS84 (lng/lat)
    pub bbox: Option<Rect>,
    /// SRID imposé à la source, prioritaire sur sa déclaration
    pub source_srid: Option<u32>,
    /// Écrit un GeoJSON au lieu de charger en base
    pub export: Option<PathBuf>,
}

/// Features filtrées et SRID retenu pour la source
struct SourceRead {
    features: Vec<Feature>,
    srid: u32,
}

/// Exécute un import complet.
///
/// # Errors
///
/// `ImportError::SourceNotFound` si le fichier source n'existe pas (aucune
/// connexion n'est alors ouverte), sinon toute erreur de lecture, de
/// reprojection ou SQL.
pub async fn run(
    config: &DatasetConfig,
    database: &DatabaseConfig,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let started = Instant::now();
    let mut report = ImportReport::new(&config.table);

    println!("{}", banner(&config.title));

    let path = config.source.path.clone();
    if !path.exists() {
        println!("ERROR: File not found: {}", path.display());
        return Err(ImportError::SourceNotFound(path).into());
    }

    if let Some(output) = &options.export {
        let source = read_source(config, options).await?;
        report.features_read = source.features.len();
        let mapper = FieldMapper::new(&config.fields)?;
        let normalized = transform(config, &mapper, source)?;
        report.features_skipped = normalized.skipped;

        geojson::export_to_geojson(&normalized.records, &mapper, output)?;
        println!(
            "Exported {} {} to {}",
            normalized.records.len(),
            config.noun,
            output.display()
        );
        report.status = ImportStatus::Exported;
        report.set_duration(started.elapsed());
        return Ok(report);
    }

    println!("Connecting to database: {}", database.display_target());
    let db_pool = pool::create_pool(database)?;
    let mut client = pool::connect(&db_pool).await?;

    postgres::ensure_postgis(&client).await?;
    postgres::recreate_table(&mut client, config).await?;
    println!("Created table: {}", config.table);

    let source = read_source(config, options).await?;
    if source.features.is_empty() {
        println!("No features found!");
        report.status = ImportStatus::NoFeatures;
        report.set_duration(started.elapsed());
        return Ok(report);
    }
    report.features_read = source.features.len();

    let mapper = FieldMapper::new(&config.fields)?;
    let normalized = transform(config, &mapper, source)?;
    report.features_skipped = normalized.skipped;

    println!("Inserting {} into database...", config.noun);
    let stats = postgres::load_records(&mut client, config, &mapper, &normalized.records).await?;
    report.records_inserted = stats.inserted;
    report.batches_committed = stats.batches;
    println!(
        "Inserted {} {} (skipped {} invalid geometries)",
        stats.inserted, config.noun, normalized.skipped
    );

    if let Some(view) = &config.api_view {
        if postgres::create_api_view(&client, &config.table, view).await? {
            println!("Created view: {}", view.name);
        }
    }

    let summary = postgres::query_summary(&client, config).await?;
    print!("{}", summary.render());

    println!("\n{}", banner("IMPORT COMPLETE!"));

    report.set_duration(started.elapsed());
    info!(report = %report.summary(), "Import terminé");
    debug!(report = %serde_json::to_string(&report).unwrap_or_default(), "Rapport JSON");
    Ok(report)
}

/// Lit la source hors du runtime, puis applique emprise et limite dans le
/// système de la source.
async fn read_source(config: &DatasetConfig, options: &ImportOptions) -> Result<SourceRead> {
    let path = config.source.path.clone();
    match &config.source.layer {
        Some(layer) => println!(
            "Reading {}, layer: {}...",
            display_name(&path),
            layer
        ),
        None => println!("Reading {}...", display_name(&path)),
    }

    // Sans emprise, la limite peut être appliquée dès la lecture
    let read_options = ReadOptions {
        limit: if options.bbox.is_none() { options.limit } else { None },
        bbox: None,
        layer: config.source.layer.clone(),
    };
    let data = tokio::task::spawn_blocking(move || geosource::read(&path, &read_options))
        .await
        .context("Source reader task failed")?
        .with_context(|| format!("Failed to read {}", config.source.path.display()))?;
    println!("Read {} features", data.features.len());

    let srid = resolve_srid(options.source_srid, data.srid, config.source.srid);
    debug!(srid, declared = ?data.srid, "SRID de la source");

    let features = match options.bbox {
        Some(bbox) => {
            let inverse = SmartReprojector::new(srid, WGS84)?.inverse()?;
            let source_bbox = inverse.transform_rect(bbox)?;
            debug!(?source_bbox, "Emprise dans le système de la source");
            filter::apply(
                data.features,
                &ReadOptions {
                    limit: options.limit,
                    bbox: Some(source_bbox),
                    layer: None,
                },
            )
        }
        None => data.features,
    };
    if options.bbox.is_some() || options.limit.is_some() {
        println!("Limited to {} features", features.len());
    }

    Ok(SourceRead { features, srid })
}

/// Ordre de priorité : option de ligne de commande, déclaration de la source, configuration
pub fn resolve_srid(flag: Option<u32>, declared: Option<u32>, configured: u32) -> u32 {
    match (flag, declared) {
        (Some(srid), _) => srid,
        (None, Some(srid)) => {
            if srid != configured {
                warn!(declared = srid, configured, "Source declares a different CRS than configured");
            }
            srid
        }
        (None, None) => configured,
    }
}

fn transform(config: &DatasetConfig, mapper: &FieldMapper, source: SourceRead) -> Result<Normalized> {
    println!("Transforming coordinates to WGS84...");
    let reprojector = SmartReprojector::new(source.srid, WGS84)?;
    info!(
        from = source.srid,
        engine = %reprojector.description(),
        proj_available = reproject::is_available(),
        "Reprojection"
    );

    let normalized = normalize::normalize(source.features, &reprojector, config.geometry, mapper)?;
    println!("Transformed {} features to WGS84", normalized.records.len());
    Ok(normalized)
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;

    #[test]
    fn test_resolve_srid_precedence() {
        assert_eq!(resolve_srid(Some(2950), Some(32188), 32188), 2950);
        assert_eq!(resolve_srid(None, Some(4326), 32188), 4326);
        assert_eq!(resolve_srid(None, None, 32188), 32188);
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_connecting() {
        let mut config = DatasetConfig::from_preset("land-use").unwrap();
        config.source.path = PathBuf::from("/nonexistent/graffectations.json");

        // Aucun serveur n'écoute sur ce port : l'erreur doit venir du fichier
        let database = DatabaseConfig {
            port: 1,
            ..Default::default()
        };
        let err = run(&config, &database, &ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::SourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_export_mode_writes_geojson() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("graffectations.json");
        let content = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"AFFECTATIO": "Agricole", "Shape_Area": 100.0},
                    "geometry": {"type": "Polygon", "coordinates": [[
                        [300000.0, 5040000.0], [300000.0, 5040010.0],
                        [300010.0, 5040010.0], [300010.0, 5040000.0],
                        [300000.0, 5040000.0]
                    ]]}
                },
                {
                    "type": "Feature",
                    "properties": {"AFFECTATIO": "Industrie"},
                    "geometry": {"type": "Point", "coordinates": [300000.0, 5040000.0]}
                }
            ]
        });
        std::fs::write(&source, content.to_string()).unwrap();

        let mut config = DatasetConfig::from_preset("land-use").unwrap();
        config.source.path = source;
        let output = dir.path().join("out.geojson");
        let options = ImportOptions {
            export: Some(output.clone()),
            ..Default::default()
        };

        let report = run(&config, &DatabaseConfig::default(), &options).await.unwrap();
        assert_eq!(report.status, ImportStatus::Exported);
        assert_eq!(report.features_read, 2);
        assert_eq!(report.features_skipped, 1);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        let feature = &json["features"][0];
        assert_eq!(feature["geometry"]["type"], "MultiPolygon");
        assert_eq!(feature["properties"]["affectation_en"], "Agricultural");
        let lon = feature["geometry"]["coordinates"][0][0][0][0].as_f64().unwrap();
        assert!((lon - (-73.5614)).abs() < 1e-3, "lon={}", lon);
    }
}
