//! Définition et implémentation des commandes CLI
//!
//! Une sous-commande par jeu de données, toutes avec les mêmes options.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use geo::{coord, Rect};
use tracing::info;

use montreal_pg::config::DatasetConfig;
use montreal_pg::error::ImportError;
use montreal_pg::export::pool::DatabaseConfig;
use montreal_pg::pipeline::{self, ImportOptions};

#[derive(Subcommand)]
pub enum Commands {
    /// Import administrative boundaries (GeoJSON) into admin_boundaries
    AdminBoundaries(ImportArgs),

    /// Import land use designations (GeoJSON) into land_use
    LandUse(ImportArgs),

    /// Import building footprints (GeoPackage) into montreal_buildings
    Buildings(ImportArgs),

    /// Import property assessment units (Shapefile) into property_assessment
    PropertyAssessment(ImportArgs),
}

impl Commands {
    /// Nom du preset embarqué correspondant
    pub fn preset(&self) -> &'static str {
        match self {
            Self::AdminBoundaries(_) => "admin-boundaries",
            Self::LandUse(_) => "land-use",
            Self::Buildings(_) => "buildings",
            Self::PropertyAssessment(_) => "property-assessment",
        }
    }

    pub fn args(&self) -> &ImportArgs {
        match self {
            Self::AdminBoundaries(args)
            | Self::LandUse(args)
            | Self::Buildings(args)
            | Self::PropertyAssessment(args) => args,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// Path to the source file (défaut : chemin du preset)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// GeoPackage layer name
    #[arg(long)]
    pub layer: Option<String>,

    /// Limit number of features to import
    #[arg(long)]
    pub limit: Option<usize>,

    /// Bounding box filter: minLng,minLat,maxLng,maxLat
    #[arg(long, allow_hyphen_values = true, conflicts_with = "sample")]
    pub bbox: Option<String>,

    /// Import only a sample near downtown (up to 5000 features unless --limit)
    #[arg(long)]
    pub sample: bool,

    /// Path to a JSON dataset config replacing the preset
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the source SRID (défaut : déclaré par la source, sinon preset)
    #[arg(long)]
    pub source_srid: Option<u32>,

    /// Insert batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Write normalized features to a GeoJSON file instead of loading PostGIS
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5433)
    #[arg(long)]
    pub port: Option<u16>,

    /// PostgreSQL database name (défaut : env PGDATABASE / montreal)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / montreal)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD / montreal)
    #[arg(long)]
    pub password: Option<String>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

/// Exécute l'import d'un jeu de données
pub async fn cmd_import(command: &Commands) -> Result<()> {
    let args = command.args();
    let config = dataset_config(command.preset(), args)?;

    let mut database = DatabaseConfig::from_env();
    apply_database_overrides(&mut database, args)?;

    let options = import_options(&config, args)?;
    if args.sample {
        if let Some(limit) = options.limit {
            println!(
                "Sample mode: importing up to {} {} in downtown area",
                limit, config.noun
            );
        }
    }

    info!(
        dataset = command.preset(),
        table = %config.table,
        path = %config.source.path.display(),
        "Import"
    );
    let report = pipeline::run(&config, &database, &options).await?;
    info!(status = ?report.status, "{}", report.summary());
    Ok(())
}

/// Charge la configuration (fichier ou preset) puis applique les options
fn dataset_config(preset: &str, args: &ImportArgs) -> Result<DatasetConfig> {
    let mut config = match &args.config {
        Some(path) => DatasetConfig::load(path)?,
        None => DatasetConfig::from_preset(preset)?,
    };

    if let Some(path) = &args.path {
        config.source.path = path.clone();
    }
    if let Some(layer) = &args.layer {
        config.source.layer = Some(layer.clone());
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = Some(batch_size);
    }
    config.validate()?;
    Ok(config)
}

fn import_options(config: &DatasetConfig, args: &ImportArgs) -> Result<ImportOptions> {
    let mut options = ImportOptions {
        limit: args.limit,
        bbox: None,
        source_srid: args.source_srid,
        export: args.export.clone(),
    };

    if args.sample {
        let sample = config
            .sample
            .as_ref()
            .with_context(|| format!("No sample area configured for {}", config.table))?;
        let [min_x, min_y, max_x, max_y] = sample.bbox;
        options.bbox = Some(Rect::new(
            coord! { x: min_x, y: min_y },
            coord! { x: max_x, y: max_y },
        ));
        options.limit = Some(args.limit.unwrap_or(sample.limit));
    } else if let Some(bbox) = &args.bbox {
        options.bbox = Some(parse_bbox(bbox)?);
    }

    Ok(options)
}

/// Parse "minLng,minLat,maxLng,maxLat"
pub fn parse_bbox(value: &str) -> Result<Rect, ImportError> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| ImportError::InvalidBbox(value.to_string()))?;

    match parts.as_slice() {
        [min_x, min_y, max_x, max_y]
            if parts.iter().all(|v| v.is_finite()) && min_x < max_x && min_y < max_y =>
        {
            Ok(Rect::new(
                coord! { x: *min_x, y: *min_y },
                coord! { x: *max_x, y: *max_y },
            ))
        }
        _ => Err(ImportError::InvalidBbox(value.to_string())),
    }
}

/// Les options de ligne de commande priment sur l'environnement
fn apply_database_overrides(database: &mut DatabaseConfig, args: &ImportArgs) -> Result<()> {
    if let Some(host) = &args.host {
        database.host = host.clone();
    }
    if let Some(port) = args.port {
        database.port = port;
    }
    if let Some(dbname) = &args.database {
        database.dbname = dbname.clone();
    }
    if let Some(user) = &args.user {
        database.user = user.clone();
    }
    if let Some(password) = &args.password {
        database.password = Some(password.clone());
    }
    if let Some(ssl) = &args.ssl {
        database.ssl_mode = ssl.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use montreal_pg::export::pool::SslMode;

    #[test]
    fn test_parse_bbox() {
        let rect = parse_bbox("-73.62,45.49,-73.54,45.52").unwrap();
        assert_eq!(rect.min(), coord! { x: -73.62, y: 45.49 });
        assert_eq!(rect.max(), coord! { x: -73.54, y: 45.52 });

        let spaced = parse_bbox(" -73.62 , 45.49, -73.54 ,45.52 ").unwrap();
        assert_eq!(spaced, rect);
    }

    #[test]
    fn test_parse_bbox_invalid() {
        assert!(parse_bbox("-73.62,45.49,-73.54").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
        assert!(parse_bbox("-73.54,45.49,-73.62,45.52").is_err());
        assert!(parse_bbox("NaN,45.49,-73.54,45.52").is_err());
    }

    #[test]
    fn test_sample_options() {
        let config = DatasetConfig::from_preset("buildings").unwrap();
        let args = ImportArgs {
            sample: true,
            ..Default::default()
        };
        let options = import_options(&config, &args).unwrap();
        assert_eq!(options.limit, Some(5000));
        let bbox = options.bbox.unwrap();
        assert_eq!(bbox.min(), coord! { x: -73.62, y: 45.49 });

        let args = ImportArgs {
            sample: true,
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(import_options(&config, &args).unwrap().limit, Some(10));
    }

    #[test]
    fn test_sample_without_area() {
        let config = DatasetConfig::from_preset("admin-boundaries").unwrap();
        let args = ImportArgs {
            sample: true,
            ..Default::default()
        };
        assert!(import_options(&config, &args).is_err());
    }

    #[test]
    fn test_dataset_config_overrides() {
        let args = ImportArgs {
            path: Some(PathBuf::from("/tmp/CARTO_BAT_TOIT_2016.gpkg")),
            layer: Some("batiments".into()),
            batch_size: Some(250),
            ..Default::default()
        };
        let config = dataset_config("buildings", &args).unwrap();
        assert_eq!(config.source.path, PathBuf::from("/tmp/CARTO_BAT_TOIT_2016.gpkg"));
        assert_eq!(config.source.layer.as_deref(), Some("batiments"));
        assert_eq!(config.batch_size, Some(250));

        let zero = ImportArgs {
            batch_size: Some(0),
            ..Default::default()
        };
        assert!(dataset_config("buildings", &zero).is_err());
    }

    #[test]
    fn test_database_overrides() {
        let mut database = DatabaseConfig::default();
        let args = ImportArgs {
            host: Some("db.internal".into()),
            port: Some(5432),
            ssl: Some("require".into()),
            ..Default::default()
        };
        apply_database_overrides(&mut database, &args).unwrap();
        assert_eq!(database.display_target(), "db.internal:5432/montreal");
        assert_eq!(database.ssl_mode, SslMode::Require);

        let bad = ImportArgs {
            ssl: Some("maybe".into()),
            ..Default::default()
        };
        assert!(apply_database_overrides(&mut database, &bad).is_err());
    }
}
