// ABOUTME: Error kinds raised while migrating one database pair
// ABOUTME: Separates skip reasons, fatal stage failures, and soft verification failures

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stage of the per-pair pipeline an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Backup,
    Translate,
    Materialize,
    Transport,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Plan => "plan",
            Stage::Backup => "backup",
            Stage::Translate => "translate",
            Stage::Materialize => "materialize",
            Stage::Transport => "transport",
            Stage::Verify => "verify",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("{key} is not configured")]
    ConfigurationMissing { key: String },

    #[error("unsupported database type: {url}")]
    UnsupportedDialect { url: String },

    #[error("failed to back up '{}': {source}", path.display())]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to reflect source schema: {source:#}")]
    SchemaReflection { source: anyhow::Error },

    #[error("failed to prepare target database '{database}': {source:#}")]
    DatabaseCreation {
        database: String,
        source: anyhow::Error,
    },

    #[error(
        "failed to create table '{table}' ({} table(s) already created: [{}]): {source:#}",
        created.len(),
        created.join(", ")
    )]
    TableCreation {
        table: String,
        created: Vec<String>,
        source: anyhow::Error,
    },

    #[error("failed to transfer rows for table '{table}': {source:#}")]
    RowTransfer {
        table: String,
        source: anyhow::Error,
    },

    #[error("row counts differ for {} table(s): [{}]", tables.len(), tables.join(", "))]
    VerificationMismatch { tables: Vec<String> },
}

impl MigrationError {
    pub fn stage(&self) -> Stage {
        match self {
            MigrationError::ConfigurationMissing { .. }
            | MigrationError::UnsupportedDialect { .. } => Stage::Plan,
            MigrationError::Backup { .. } => Stage::Backup,
            MigrationError::SchemaReflection { .. } => Stage::Translate,
            MigrationError::DatabaseCreation { .. } | MigrationError::TableCreation { .. } => {
                Stage::Materialize
            }
            MigrationError::RowTransfer { .. } => Stage::Transport,
            MigrationError::VerificationMismatch { .. } => Stage::Verify,
        }
    }

    /// Fatal errors abort the current pair; the rest are skips or soft failures.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            MigrationError::ConfigurationMissing { .. }
                | MigrationError::UnsupportedDialect { .. }
                | MigrationError::VerificationMismatch { .. }
        )
    }
}
