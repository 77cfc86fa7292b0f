//! Transaction d'un lot d'insertion
//!
//! Chaque lot est commité indépendamment : un échec annule le lot en cours
//! mais laisse en place les lots déjà commités.

use anyhow::{Context, Result};
use deadpool_postgres::{Object, Transaction};
use tokio_postgres::types::ToSql;
use tokio_postgres::Statement;
use tracing::{debug, error};

/// Statut d'un lot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Lot commité
    Committed,
    /// Lot annulé (rollback)
    RolledBack,
}

/// Rapport d'un lot
#[derive(Debug)]
pub struct BatchReport {
    /// Rang du lot (à partir de 1)
    pub batch: usize,
    /// Lignes insérées (0 si annulé)
    pub rows: usize,
    pub status: BatchStatus,
}

/// Transaction encapsulant l'insertion d'un lot
pub struct BatchTransaction<'a> {
    transaction: Transaction<'a>,
    table: String,
    batch: usize,
    rows: usize,
}

impl<'a> BatchTransaction<'a> {
    /// Démarre la transaction du lot `batch`
    pub async fn begin(client: &'a mut Object, table: &str, batch: usize) -> Result<Self> {
        let transaction = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        debug!(table = %table, batch, "Batch transaction started");

        Ok(Self {
            transaction,
            table: table.to_string(),
            batch,
            rows: 0,
        })
    }

    /// Insère une ligne avec la requête préparée
    pub async fn insert(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<()> {
        self.transaction
            .execute(statement, params)
            .await
            .with_context(|| format!("Failed to insert row into {}", self.table))?;
        self.rows += 1;
        Ok(())
    }

    /// Valide et commit le lot
    pub async fn commit(self) -> Result<BatchReport> {
        self.transaction
            .commit()
            .await
            .with_context(|| format!("Failed to commit batch {} of {}", self.batch, self.table))?;

        debug!(table = %self.table, batch = self.batch, rows = self.rows, "Batch committed");

        Ok(BatchReport {
            batch: self.batch,
            rows: self.rows,
            status: BatchStatus::Committed,
        })
    }

    /// Annule le lot (rollback)
    ///
    /// La transaction est également annulée si elle est droppée.
    pub async fn rollback(self, reason: &str) -> BatchReport {
        error!(
            table = %self.table,
            batch = self.batch,
            reason = %reason,
            rows_attempted = self.rows,
            "Rolling back batch"
        );

        if let Err(e) = self.transaction.rollback().await {
            error!(error = %e, "Explicit rollback failed (will rollback on drop anyway)");
        }

        BatchReport {
            batch: self.batch,
            rows: 0,
            status: BatchStatus::RolledBack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_status_equality() {
        assert_eq!(BatchStatus::Committed, BatchStatus::Committed);
        assert_ne!(BatchStatus::Committed, BatchStatus::RolledBack);
    }

    #[test]
    fn test_batch_report_debug() {
        let report = BatchReport {
            batch: 3,
            rows: 1000,
            status: BatchStatus::Committed,
        };
        let debug_str = format!("{:?}", report);
        assert!(debug_str.contains("1000"));
        assert!(debug_str.contains("Committed"));
    }
}
