// ABOUTME: Creates the target database and recreates translated tables in it
// ABOUTME: Drops same-named target tables first (clean slate; existing data is lost)

use crate::error::MigrationError;
use crate::migration::schema::TableSchema;
use crate::mysql::{self, reader, writer};
use crate::utils::redact_url;
use anyhow::anyhow;
use mysql_async::Conn;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Target tables that shared a name with a source table and were dropped
    pub dropped: Vec<String>,
    pub created: Vec<String>,
    /// Target tables with no source counterpart, left untouched
    pub orphans: Vec<String>,
}

/// Make sure the target database exists, creating it if absent
///
/// Connects at the server level (no database selected) so it works before
/// the database itself exists. Returns the database name.
pub async fn ensure_database(target_url: &str) -> Result<String, MigrationError> {
    let database = mysql::extract_database_name(target_url).ok_or_else(|| {
        MigrationError::DatabaseCreation {
            database: String::new(),
            source: anyhow!(
                "Target connection string '{}' does not name a database",
                redact_url(target_url)
            ),
        }
    })?;

    let creation_error = |source| MigrationError::DatabaseCreation {
        database: database.clone(),
        source,
    };

    let mut conn = mysql::connect_mysql_server(target_url)
        .await
        .map_err(creation_error)?;
    let created = writer::create_database_if_missing(&mut conn, &database).await;
    mysql::disconnect(conn).await;
    created.map_err(creation_error)?;

    tracing::info!("Database '{}' ensured in MySQL", database);

    Ok(database)
}

/// Open a connection to the target database for the remaining stages
pub async fn open_target(target_url: &str, database: &str) -> Result<Conn, MigrationError> {
    mysql::connect_mysql(target_url)
        .await
        .map_err(|source| MigrationError::DatabaseCreation {
            database: database.to_string(),
            source,
        })
}

/// Split existing target tables into those clashing with the translated set and orphans
pub fn partition_existing(
    existing: Vec<String>,
    schemas: &[TableSchema],
) -> (Vec<String>, Vec<String>) {
    let translated: HashSet<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
    existing
        .into_iter()
        .partition(|table| translated.contains(table.as_str()))
}

/// Drop clashing target tables, then create every translated table in order
///
/// Table creation is not transactional in MySQL. When a CREATE fails the
/// tables created before it stay in place and are listed in the error.
pub async fn materialize_tables(
    conn: &mut Conn,
    database: &str,
    schemas: &[TableSchema],
) -> Result<MaterializeReport, MigrationError> {
    let existing = reader::list_tables(conn, database)
        .await
        .map_err(|source| MigrationError::DatabaseCreation {
            database: database.to_string(),
            source,
        })?;

    let (conflicts, orphans) = partition_existing(existing, schemas);

    if !orphans.is_empty() {
        tracing::warn!(
            "Target database '{}' has {} table(s) not present in the source; leaving them untouched: {}",
            database,
            orphans.len(),
            orphans.join(", ")
        );
    }

    if !conflicts.is_empty() {
        tracing::warn!(
            "Dropping {} existing MySQL table(s) in '{}' for a fresh migration; their data will be lost: {}",
            conflicts.len(),
            database,
            conflicts.join(", ")
        );
        drop_tables(conn, database, &conflicts).await?;
        tracing::info!("Cleared existing MySQL tables");
    }

    let mut created = Vec::with_capacity(schemas.len());
    for schema in schemas {
        if let Err(source) = writer::create_table(conn, schema).await {
            return Err(MigrationError::TableCreation {
                table: schema.name.clone(),
                created,
                source,
            });
        }
        created.push(schema.name.clone());
    }

    tracing::info!("Created {} tables in MySQL", created.len());

    Ok(MaterializeReport {
        dropped: conflicts,
        created,
        orphans,
    })
}

async fn drop_tables(
    conn: &mut Conn,
    database: &str,
    tables: &[String],
) -> Result<(), MigrationError> {
    // Dropped tables may be referenced by foreign keys of other tables
    writer::set_foreign_key_checks(conn, false)
        .await
        .map_err(|source| MigrationError::DatabaseCreation {
            database: database.to_string(),
            source,
        })?;

    let mut outcome = Ok(());
    for table in tables {
        if let Err(source) = writer::drop_table(conn, table).await {
            outcome = Err(MigrationError::TableCreation {
                table: table.clone(),
                created: Vec::new(),
                source,
            });
            break;
        }
        tracing::debug!("Dropped table '{}'", table);
    }

    if let Err(e) = writer::set_foreign_key_checks(conn, true).await {
        tracing::warn!("Failed to re-enable foreign key checks: {:#}", e);
    }

    outcome
}
