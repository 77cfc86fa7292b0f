//! Configuration des jeux de données
//!
//! Chaque import est décrit par un fichier JSON : source, table cible,
//! mapping des champs, index, vue éventuelle et plan de résumé. Les quatre
//! jeux de Montréal sont embarqués comme presets.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};

/// Noms des presets embarqués
pub const PRESETS: [&str; 4] = [
    "admin-boundaries",
    "land-use",
    "buildings",
    "property-assessment",
];

/// Configuration d'un jeu de données
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    /// Titre affiché dans la bannière
    pub title: String,

    /// Fichier source
    pub source: SourceConfig,

    /// Nom de la table PostgreSQL cible
    pub table: String,

    /// Type de la clé primaire
    #[serde(default)]
    pub id_type: IdType,

    /// Type de la colonne géométrique
    #[serde(default)]
    pub geometry: GeometryTarget,

    /// Taille des lots d'insertion (absent = un seul lot)
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Nom des enregistrements dans les messages ("boundaries", "buildings"...)
    #[serde(default = "default_noun")]
    pub noun: String,

    /// Mapping des champs source vers colonnes SQL
    pub fields: Vec<FieldMapping>,

    /// Colonnes indexées en plus de la géométrie
    #[serde(default)]
    pub indexes: Vec<String>,

    /// Vue d'exposition à l'API, recréée après le chargement
    #[serde(default)]
    pub api_view: Option<ApiView>,

    /// Emprise et limite du mode `--sample`
    #[serde(default)]
    pub sample: Option<SampleConfig>,

    /// Requêtes du résumé final
    #[serde(default)]
    pub summary: SummaryPlan,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub path: PathBuf,

    /// Couche GeoPackage
    #[serde(default)]
    pub layer: Option<String>,

    /// SRID déclaré de la source, utilisé si le fichier n'en déclare pas
    pub srid: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdType {
    #[default]
    Serial,
    BigSerial,
}

impl IdType {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Serial => "SERIAL",
            Self::BigSerial => "BIGSERIAL",
        }
    }
}

/// Famille géométrique de la colonne cible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum GeometryTarget {
    #[default]
    MultiPolygon,
    Polygon,
}

impl GeometryTarget {
    pub fn sql(self) -> &'static str {
        match self {
            Self::MultiPolygon => "MultiPolygon",
            Self::Polygon => "Polygon",
        }
    }
}

/// Mapping d'un champ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldMapping {
    /// Nom du champ source
    pub source: String,

    /// Nom de la colonne SQL cible
    pub target: String,

    /// Type SQL (text, integer, numeric, varchar(10)...)
    #[serde(default = "default_type")]
    pub data_type: String,

    /// Valeur utilisée quand le champ est absent ou nul
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub not_null: bool,

    /// Table de traduction appliquée à la valeur texte
    #[serde(default)]
    pub translate: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiView {
    pub name: String,

    /// Table externe réunie avec la table importée
    pub union_table: String,

    /// Valeur de building_type pour les lignes importées
    pub building_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SampleConfig {
    /// minLng, minLat, maxLng, maxLat
    pub bbox: [f64; 4],
    pub limit: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SummaryPlan {
    #[serde(default)]
    pub group_by: Option<GroupBy>,

    /// Colonnes dont on compte les valeurs non nulles
    #[serde(default)]
    pub non_null: Vec<String>,

    #[serde(default)]
    pub range: Option<RangeStat>,

    /// Emprise de la géométrie (ST_Extent)
    #[serde(default)]
    pub extent: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupBy {
    pub column: String,

    /// Titre de la section ("By type")
    pub label: String,

    /// Colonne de surface (m²) sommée en km²
    #[serde(default)]
    pub area_column: Option<String>,

    #[serde(default)]
    pub skip_null: bool,

    #[serde(default)]
    pub limit: Option<u32>,
}

/// Min/max d'une colonne au-delà d'un seuil
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RangeStat {
    pub column: String,
    pub above: i64,
}

fn default_type() -> String {
    "text".to_string()
}

fn default_noun() -> String {
    "features".to_string()
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("identifier pattern is valid"))
}

fn data_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(text|integer|bigint|smallint|numeric|double precision|real|varchar\(\d+\))$")
            .expect("data type pattern is valid")
    })
}

/// Vérifie qu'un identifiant SQL peut être interpolé sans guillemets
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

impl DatasetConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "admin-boundaries" => Self::load_embedded(include_str!("presets/admin_boundaries.json")),
            "land-use" => Self::load_embedded(include_str!("presets/land_use.json")),
            "buildings" => Self::load_embedded(include_str!("presets/montreal_buildings.json")),
            "property-assessment" => {
                Self::load_embedded(include_str!("presets/property_assessment.json"))
            }
            _ => bail!("Unknown preset: {}. Use: {}", preset, PRESETS.join(", ")),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse embedded config")?;
        config.validate()?;
        Ok(config)
    }

    /// Valide les identifiants et types SQL avant toute interpolation
    pub fn validate(&self) -> Result<()> {
        let mut identifiers = vec![self.table.as_str()];
        identifiers.extend(self.fields.iter().map(|f| f.target.as_str()));
        identifiers.extend(self.indexes.iter().map(String::as_str));
        if let Some(view) = &self.api_view {
            identifiers.push(&view.name);
            identifiers.push(&view.union_table);
        }
        if let Some(group) = &self.summary.group_by {
            identifiers.push(&group.column);
            identifiers.extend(group.area_column.as_deref());
        }
        identifiers.extend(self.summary.non_null.iter().map(String::as_str));
        if let Some(range) = &self.summary.range {
            identifiers.push(&range.column);
        }

        for name in identifiers {
            if !is_valid_identifier(name) {
                bail!("Invalid SQL identifier in config: {:?}", name);
            }
        }

        for field in &self.fields {
            if !data_type_regex().is_match(&field.data_type) {
                bail!(
                    "Invalid data type {:?} for column {}",
                    field.data_type,
                    field.target
                );
            }
            if let Some(table) = &field.translate {
                if crate::translate::lookup(table).is_none() {
                    bail!("Unknown translation table {:?} for column {}", table, field.target);
                }
            }
        }

        let columns: Vec<&str> = self.fields.iter().map(|f| f.target.as_str()).collect();
        for index in &self.indexes {
            if !columns.contains(&index.as_str()) {
                bail!("Index on unknown column: {}", index);
            }
        }

        if self.batch_size == Some(0) {
            bail!("batch_size must be greater than 0");
        }

        Ok(())
    }

    /// Taille effective d'un lot pour `total` enregistrements
    pub fn effective_batch_size(&self, total: usize) -> usize {
        self.batch_size.unwrap_or(total).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_load() {
        for preset in PRESETS {
            let config = DatasetConfig::from_preset(preset).unwrap();
            assert!(!config.fields.is_empty(), "{} has no fields", preset);
            assert_eq!(config.source.srid, 32188);
        }
    }

    #[test]
    fn test_unknown_preset() {
        let err = DatasetConfig::from_preset("roads").unwrap_err();
        assert!(err.to_string().contains("Unknown preset"));
    }

    #[test]
    fn test_preset_shapes() {
        let admin = DatasetConfig::from_preset("admin-boundaries").unwrap();
        assert_eq!(admin.table, "admin_boundaries");
        assert_eq!(admin.id_type, IdType::Serial);
        assert_eq!(admin.batch_size, None);
        assert_eq!(admin.indexes, vec!["name", "boundary_type"]);

        let buildings = DatasetConfig::from_preset("buildings").unwrap();
        assert_eq!(buildings.id_type, IdType::BigSerial);
        assert_eq!(buildings.batch_size, Some(1000));
        assert!(buildings.api_view.is_some());
        assert!(buildings.summary.extent);
        let sample = buildings.sample.unwrap();
        assert_eq!(sample.bbox, [-73.62, 45.49, -73.54, 45.52]);
        assert_eq!(sample.limit, 5000);

        let assessment = DatasetConfig::from_preset("property-assessment").unwrap();
        assert_eq!(assessment.geometry, GeometryTarget::Polygon);
        assert_eq!(assessment.fields.len(), 16);
        let range = assessment.summary.range.unwrap();
        assert_eq!((range.column.as_str(), range.above), ("year_built", 1600));
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let mut config = DatasetConfig::from_preset("land-use").unwrap();
        config.table = "land_use; DROP TABLE x".into();
        assert!(config.validate().is_err());

        let mut config = DatasetConfig::from_preset("land-use").unwrap();
        config.fields[0].data_type = "text); --".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_index_must_reference_column() {
        let mut config = DatasetConfig::from_preset("land-use").unwrap();
        config.indexes.push("missing".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identifier_regex() {
        assert!(is_valid_identifier("property_assessment"));
        assert!(is_valid_identifier("_tmp1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("Name"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_effective_batch_size() {
        let mut config = DatasetConfig::from_preset("admin-boundaries").unwrap();
        assert_eq!(config.effective_batch_size(42), 42);
        assert_eq!(config.effective_batch_size(0), 1);
        config.batch_size = Some(1000);
        assert_eq!(config.effective_batch_size(42), 1000);
    }
}
