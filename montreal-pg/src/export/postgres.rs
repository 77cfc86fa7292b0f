//! Export vers PostgreSQL/PostGIS
//!
//! Les identifiants interpolés dans le SQL viennent de la configuration et
//! sont validés au chargement (`DatasetConfig::validate`).

use anyhow::{Context, Result};
use deadpool_postgres::Object;
use geo::Geometry;
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};
use wkb::geom_to_wkb;

use crate::config::{ApiView, DatasetConfig, SummaryPlan};
use crate::export::transaction::BatchTransaction;
use crate::mapping::FieldMapper;
use crate::normalize::Record;
use crate::report::{GroupRow, GroupSection, NonNullStat, RangeSummary, Summary};

/// SRID de toutes les colonnes géométriques
pub const TARGET_SRID: u32 = 4326;

/// Compteurs du chargement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub inserted: usize,
    pub batches: usize,
}

/// Active PostGIS si nécessaire.
///
/// Sans droits suffisants, on vérifie simplement que l'extension est déjà là.
pub async fn ensure_postgis(client: &Object) -> Result<()> {
    match client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let exists = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if !exists {
                return Err(anyhow::anyhow!(
                    "PostGIS extension is not installed and could not be created: {e}"
                ));
            }
            Ok(())
        }
    }
}

/// Instructions de (re)création de la table et de ses index
pub fn table_ddl(config: &DatasetConfig) -> Vec<String> {
    let table = &config.table;

    let mut columns = vec![format!("id {} PRIMARY KEY", config.id_type.sql())];
    for field in &config.fields {
        let mut column = format!("{} {}", field.target, field.data_type.to_uppercase());
        if field.not_null {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }
    columns.push(format!(
        "geom geometry({}, {})",
        config.geometry.sql(),
        TARGET_SRID
    ));
    columns.push("created_at TIMESTAMP NOT NULL DEFAULT now()".to_string());

    let mut statements = vec![
        format!("DROP TABLE IF EXISTS {} CASCADE", table),
        format!("CREATE TABLE {} (\n    {}\n)", table, columns.join(",\n    ")),
        format!(
            "CREATE INDEX idx_{}_geom ON {} USING GIST (geom)",
            table, table
        ),
    ];
    for column in &config.indexes {
        statements.push(format!(
            "CREATE INDEX idx_{}_{} ON {} ({})",
            table, column, table, column
        ));
    }
    statements
}

/// Supprime puis recrée la table, en une seule transaction
pub async fn recreate_table(client: &mut Object, config: &DatasetConfig) -> Result<()> {
    let transaction = client
        .transaction()
        .await
        .context("Failed to begin schema transaction")?;

    for sql in table_ddl(config) {
        debug!(sql = %sql, "DDL");
        transaction
            .execute(sql.as_str(), &[])
            .await
            .with_context(|| format!("Failed to create table {}", config.table))?;
    }

    transaction
        .commit()
        .await
        .with_context(|| format!("Failed to commit schema of {}", config.table))?;

    info!(table = %config.table, "Table recréée");
    Ok(())
}

/// Requête d'insertion paramétrée d'une ligne
///
/// Les paramètres sont typés explicitement; la géométrie arrive en WKB hex.
pub fn insert_sql(table: &str, mapper: &FieldMapper) -> String {
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    for (i, column) in mapper.columns().iter().enumerate() {
        columns.push(column.target.as_str());
        placeholders.push(format!("${}::{}", i + 1, column.kind.param_cast()));
    }
    columns.push("geom");
    placeholders.push(format!(
        "ST_SetSRID(${}::text::geometry, {})",
        mapper.columns().len() + 1,
        TARGET_SRID
    ));

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Insère les enregistrements par lots, un commit par lot.
///
/// Un échec annule le lot en cours et interrompt le chargement; les lots
/// précédents restent en base.
pub async fn load_records(
    client: &mut Object,
    config: &DatasetConfig,
    mapper: &FieldMapper,
    records: &[Record],
) -> Result<LoadStats> {
    let mut stats = LoadStats::default();
    if records.is_empty() {
        return Ok(stats);
    }

    let sql = insert_sql(&config.table, mapper);
    debug!(sql = %sql, "Insert statement");
    let statement = client
        .prepare(&sql)
        .await
        .with_context(|| format!("Failed to prepare insert into {}", config.table))?;

    let total = records.len();
    let batch_size = config.effective_batch_size(total);

    for (index, chunk) in records.chunks(batch_size).enumerate() {
        let mut batch = BatchTransaction::begin(client, &config.table, index + 1).await?;

        let mut failure = None;
        for record in chunk {
            let result = match geometry_to_wkb_hex(&record.geometry) {
                Ok(hex) => {
                    let mut params: Vec<&(dyn ToSql + Sync)> =
                        record.values.iter().map(|v| v.as_sql()).collect();
                    params.push(&hex);
                    batch.insert(&statement, &params).await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failure = Some(e.context(format!("Feature {}", record.id)));
                break;
            }
        }

        if let Some(e) = failure {
            batch.rollback(&format!("{:#}", e)).await;
            return Err(e);
        }

        let report = batch.commit().await?;
        stats.inserted += report.rows;
        stats.batches += 1;
        println!("  Inserted {}/{} {}...", stats.inserted, total, config.noun);
    }

    info!(
        table = %config.table,
        inserted = stats.inserted,
        batches = stats.batches,
        "Chargement terminé"
    );
    Ok(stats)
}

/// Vue d'exposition à l'API réunissant la table importée et une table externe
pub fn api_view_sql(table: &str, view: &ApiView) -> String {
    format!(
        r#"CREATE VIEW {view} AS
SELECT
    id::text AS id,
    NULL AS address,
    NULL AS neighborhood,
    NULL AS year_built,
    NULL AS floors,
    '{building_type}' AS building_type,
    geom,
    created_at,
    created_at AS updated_at
FROM {table}

UNION ALL

SELECT
    id::text,
    address,
    neighborhood,
    year_built,
    floors,
    building_type,
    geom,
    created_at,
    updated_at
FROM {union_table}"#,
        view = view.name,
        building_type = view.building_type.replace('\'', "''"),
        table = table,
        union_table = view.union_table,
    )
}

/// Recrée la vue API. Ignorée (avec un warning) si la table externe n'existe pas.
pub async fn create_api_view(client: &Object, table: &str, view: &ApiView) -> Result<bool> {
    let union_exists: Option<String> = client
        .query_one("SELECT to_regclass($1::text)::text", &[&view.union_table])
        .await
        .context("Failed to look up union table")?
        .get(0);
    if union_exists.is_none() {
        warn!(
            view = %view.name,
            table = %view.union_table,
            "Union table does not exist, view not created"
        );
        return Ok(false);
    }

    client
        .execute(&format!("DROP VIEW IF EXISTS {}", view.name), &[])
        .await
        .with_context(|| format!("Failed to drop view {}", view.name))?;
    client
        .execute(&api_view_sql(table, view), &[])
        .await
        .with_context(|| format!("Failed to create view {}", view.name))?;

    Ok(true)
}

/// Requêtes du résumé, dans l'ordre d'affichage
pub fn summary_queries(table: &str, plan: &SummaryPlan) -> SummaryQueries {
    SummaryQueries {
        total: format!("SELECT COUNT(*) FROM {}", table),
        non_null: plan
            .non_null
            .iter()
            .map(|c| {
                (
                    c.clone(),
                    format!("SELECT COUNT(*) FROM {} WHERE {} IS NOT NULL", table, c),
                )
            })
            .collect(),
        range: plan.range.as_ref().map(|r| {
            format!(
                "SELECT MIN({c})::bigint, MAX({c})::bigint FROM {t} WHERE {c} > {above}",
                c = r.column,
                t = table,
                above = r.above
            )
        }),
        extent: plan.extent.then(|| {
            format!(
                "SELECT ST_XMin(ext)::float8, ST_YMin(ext)::float8, ST_XMax(ext)::float8, ST_YMax(ext)::float8 \
                 FROM (SELECT ST_Extent(geom) AS ext FROM {}) e",
                table
            )
        }),
        group_by: plan.group_by.as_ref().map(|g| {
            let area = match &g.area_column {
                Some(a) => format!(", ROUND((SUM({})::numeric / 1000000), 2)::float8", a),
                None => ", NULL::float8".to_string(),
            };
            let filter = if g.skip_null {
                format!(" WHERE {} IS NOT NULL", g.column)
            } else {
                String::new()
            };
            let limit = g.limit.map(|l| format!(" LIMIT {}", l)).unwrap_or_default();
            format!(
                "SELECT {c}::text, COUNT(*){area} FROM {t}{filter} GROUP BY {c} ORDER BY COUNT(*) DESC{limit}",
                c = g.column,
                t = table,
            )
        }),
    }
}

/// SQL des statistiques du résumé
#[derive(Debug, Clone)]
pub struct SummaryQueries {
    pub total: String,
    pub non_null: Vec<(String, String)>,
    pub range: Option<String>,
    pub extent: Option<String>,
    pub group_by: Option<String>,
}

/// Exécute les requêtes d'agrégat sur la table fraîchement chargée
pub async fn query_summary(client: &Object, config: &DatasetConfig) -> Result<Summary> {
    let queries = summary_queries(&config.table, &config.summary);
    let ctx = || format!("Failed to query summary of {}", config.table);

    let total: i64 = client
        .query_one(queries.total.as_str(), &[])
        .await
        .with_context(ctx)?
        .get(0);

    let mut non_null = Vec::new();
    for (column, sql) in &queries.non_null {
        let count: i64 = client.query_one(sql.as_str(), &[]).await.with_context(ctx)?.get(0);
        non_null.push(NonNullStat {
            column: column.clone(),
            count,
        });
    }

    let range = match (&queries.range, &config.summary.range) {
        (Some(sql), Some(plan)) => {
            let row = client.query_one(sql.as_str(), &[]).await.with_context(ctx)?;
            Some(RangeSummary {
                column: plan.column.clone(),
                min: row.get(0),
                max: row.get(1),
            })
        }
        _ => None,
    };

    let extent = match &queries.extent {
        Some(sql) => {
            let row = client.query_one(sql.as_str(), &[]).await.with_context(ctx)?;
            let values: [Option<f64>; 4] = [row.get(0), row.get(1), row.get(2), row.get(3)];
            Some(match values {
                [Some(a), Some(b), Some(c), Some(d)] => Some([a, b, c, d]),
                _ => None,
            })
        }
        None => None,
    };

    let groups = match (&queries.group_by, &config.summary.group_by) {
        (Some(sql), Some(plan)) => {
            let rows = client.query(sql.as_str(), &[]).await.with_context(ctx)?;
            Some(GroupSection {
                label: plan.label.clone(),
                rows: rows
                    .iter()
                    .map(|r| GroupRow {
                        key: r.get(0),
                        count: r.get(1),
                        area_km2: r.get(2),
                    })
                    .collect(),
            })
        }
        _ => None,
    };

    Ok(Summary {
        total,
        non_null,
        range,
        extent,
        groups,
    })
}

/// Convertit une géométrie geo en WKB hexadécimal
pub fn geometry_to_wkb_hex(geom: &Geometry) -> Result<String> {
    let wkb = geom_to_wkb(geom)
        .map_err(|e| anyhow::anyhow!("Failed to convert geometry to WKB: {:?}", e))?;
    Ok(hex::encode(wkb))
}
