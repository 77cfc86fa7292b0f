//! Conversion des attributs source vers les colonnes SQL
//!
//! Les valeurs source sont hétérogènes (texte, entier, flottant, booléen);
//! chaque colonne applique une conversion tolérante vers son type et produit
//! NULL plutôt qu'une erreur.

use anyhow::{bail, Result};
use geosource::Feature;
use tokio_postgres::types::ToSql;

use crate::config::FieldMapping;
use crate::translate::{self, Translator};

/// Famille de conversion d'une colonne
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Numeric,
}

impl ColumnKind {
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type {
            "integer" | "bigint" | "smallint" => Self::Integer,
            "numeric" | "double precision" | "real" => Self::Numeric,
            _ => Self::Text,
        }
    }

    /// Type du paramètre lié (les colonnes plus étroites sont castées à l'insertion)
    pub fn param_cast(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "bigint",
            Self::Numeric => "float8",
        }
    }
}

/// Valeur prête à être liée à une requête
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Numeric(Option<f64>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Text(v) => v.is_none(),
            Self::Integer(v) => v.is_none(),
            Self::Numeric(v) => v.is_none(),
        }
    }

    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Text(v) => v,
            Self::Integer(v) => v,
            Self::Numeric(v) => v,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(Some(s)) => serde_json::Value::String(s.clone()),
            Self::Integer(Some(i)) => serde_json::Value::from(*i),
            Self::Numeric(Some(f)) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            _ => serde_json::Value::Null,
        }
    }
}

/// Une colonne cible et sa règle de conversion
#[derive(Debug, Clone)]
pub struct Column {
    pub target: String,
    pub source: String,
    pub kind: ColumnKind,
    default: SqlValue,
    translate: Option<Translator>,
}

impl Column {
    fn new(mapping: &FieldMapping) -> Result<Self> {
        let kind = ColumnKind::from_data_type(&mapping.data_type);
        let default = match &mapping.default {
            None => null_of(kind),
            Some(raw) => {
                let value = convert(kind, &geosource::Value::Text(raw.clone()));
                if value.is_null() {
                    bail!(
                        "Default {:?} is not a valid {} for column {}",
                        raw,
                        mapping.data_type,
                        mapping.target
                    );
                }
                value
            }
        };
        if mapping.not_null && default.is_null() {
            bail!("Column {} is NOT NULL but has no default", mapping.target);
        }
        let translate = match &mapping.translate {
            Some(name) => match translate::lookup(name) {
                Some(t) => Some(t),
                None => bail!("Unknown translation table: {}", name),
            },
            None => None,
        };

        Ok(Self {
            target: mapping.target.clone(),
            source: mapping.source.clone(),
            kind,
            default,
            translate,
        })
    }

    /// Valeur de la colonne pour une feature : conversion, défaut, traduction
    pub fn extract(&self, feature: &Feature) -> SqlValue {
        let value = match feature.property(&self.source) {
            Some(v) => convert(self.kind, v),
            None => null_of(self.kind),
        };
        let value = if value.is_null() {
            self.default.clone()
        } else {
            value
        };

        match (value, self.translate) {
            (SqlValue::Text(Some(text)), Some(translate)) => SqlValue::Text(Some(translate(&text))),
            (value, _) => value,
        }
    }
}

fn null_of(kind: ColumnKind) -> SqlValue {
    match kind {
        ColumnKind::Text => SqlValue::Text(None),
        ColumnKind::Integer => SqlValue::Integer(None),
        ColumnKind::Numeric => SqlValue::Numeric(None),
    }
}

fn convert(kind: ColumnKind, value: &geosource::Value) -> SqlValue {
    match kind {
        ColumnKind::Text => SqlValue::Text(value.as_text()),
        ColumnKind::Integer => SqlValue::Integer(value.as_integer()),
        ColumnKind::Numeric => SqlValue::Numeric(value.as_numeric()),
    }
}

/// Ensemble ordonné des colonnes d'une table
#[derive(Debug, Clone)]
pub struct FieldMapper {
    columns: Vec<Column>,
}

impl FieldMapper {
    pub fn new(fields: &[FieldMapping]) -> Result<Self> {
        let columns = fields.iter().map(Column::new).collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Valeurs de toutes les colonnes, dans l'ordre de la configuration
    pub fn map(&self, feature: &Feature) -> Vec<SqlValue> {
        self.columns.iter().map(|c| c.extract(feature)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosource::{Properties, Value};

    fn mapping(source: &str, target: &str, data_type: &str) -> FieldMapping {
        FieldMapping {
            source: source.into(),
            target: target.into(),
            data_type: data_type.into(),
            default: None,
            not_null: false,
            translate: None,
        }
    }

    fn feature(props: &[(&str, Option<Value>)]) -> Feature {
        let properties: Properties = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Feature {
            id: 0,
            geometry: None,
            properties,
        }
    }

    #[test]
    fn test_column_kind() {
        assert_eq!(ColumnKind::from_data_type("varchar(10)"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_data_type("integer"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_data_type("numeric"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::Numeric.param_cast(), "float8");
    }

    #[test]
    fn test_best_effort_conversions() {
        let mapper = FieldMapper::new(&[
            mapping("NOM_RUE", "street_name", "text"),
            mapping("ANNEE_CONS", "year_built", "integer"),
            mapping("SUPERFICIE", "land_area", "numeric"),
            mapping("SUITE_DEBU", "suite", "text"),
        ])
        .unwrap();

        let f = feature(&[
            ("NOM_RUE", Some(Value::Text("  rue Peel ".into()))),
            ("ANNEE_CONS", Some(Value::Numeric(1925.7))),
            ("SUPERFICIE", Some(Value::Numeric(f64::NAN))),
            ("SUITE_DEBU", Some(Value::Integer(0))),
        ]);
        assert_eq!(
            mapper.map(&f),
            vec![
                SqlValue::Text(Some("rue Peel".into())),
                SqlValue::Integer(Some(1925)),
                SqlValue::Numeric(None),
                SqlValue::Text(None),
            ]
        );
    }

    #[test]
    fn test_default_on_missing_and_null() {
        let mut name = mapping("NOM", "name", "text");
        name.default = Some("Unknown".into());
        name.not_null = true;
        let mapper = FieldMapper::new(&[name]).unwrap();

        assert_eq!(mapper.map(&feature(&[])), vec![SqlValue::Text(Some("Unknown".into()))]);
        assert_eq!(
            mapper.map(&feature(&[("NOM", None)])),
            vec![SqlValue::Text(Some("Unknown".into()))]
        );
        assert_eq!(
            mapper.map(&feature(&[("NOM", Some(Value::Text("Verdun".into())))])),
            vec![SqlValue::Text(Some("Verdun".into()))]
        );
    }

    #[test]
    fn test_translation() {
        let mut en = mapping("AFFECTATIO", "affectation_en", "text");
        en.translate = Some("land_use_en".into());
        let mapper = FieldMapper::new(&[mapping("AFFECTATIO", "affectation", "text"), en]).unwrap();

        let values = mapper.map(&feature(&[("AFFECTATIO", Some(Value::Text("Industrie".into())))]));
        assert_eq!(
            values,
            vec![
                SqlValue::Text(Some("Industrie".into())),
                SqlValue::Text(Some("Industrial".into())),
            ]
        );
    }

    #[test]
    fn test_invalid_mappings() {
        let mut not_null = mapping("NOM", "name", "text");
        not_null.not_null = true;
        assert!(FieldMapper::new(&[not_null]).is_err());

        let mut bad_default = mapping("NUM", "num", "integer");
        bad_default.default = Some("abc".into());
        assert!(FieldMapper::new(&[bad_default]).is_err());
    }

    #[test]
    fn test_to_json() {
        assert_eq!(SqlValue::Integer(Some(3)).to_json(), serde_json::json!(3));
        assert_eq!(SqlValue::Numeric(Some(f64::INFINITY)).to_json(), serde_json::Value::Null);
        assert_eq!(SqlValue::Text(None).to_json(), serde_json::Value::Null);
    }
}
