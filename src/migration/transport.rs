// ABOUTME: Streams rows from SQLite tables into MySQL in fixed-size batches
// ABOUTME: All tables of a pair share one target transaction committed at the end

use crate::error::MigrationError;
use crate::migration::schema::TableSchema;
use crate::mysql::writer;
use crate::sqlite::{converter, reader};
use anyhow::{anyhow, Context, Result};
use mysql_async::{prelude::*, Conn, Transaction, TxOpts, Value};
use rusqlite::Connection;

/// Rows read from the source before each flush to the target
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTransfer {
    pub table: String,
    pub rows: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportReport {
    pub tables: Vec<TableTransfer>,
}

impl TransportReport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Number of batches needed to move `rows` rows
pub fn batch_count(rows: usize, batch_size: usize) -> usize {
    rows.div_ceil(batch_size.max(1))
}

/// Destination for row batches
pub(crate) trait BatchSink {
    async fn write_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<()>;
}

impl BatchSink for Transaction<'_> {
    async fn write_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<()> {
        writer::insert_rows(self, table, columns, rows).await?;
        Ok(())
    }
}

/// Copy every row of every table into the target inside one transaction
///
/// Nothing is committed until all tables are copied. On failure the
/// transaction is rolled back, so the target tables exist but hold no rows.
/// The session keeps explicit zero values in AUTO_INCREMENT columns.
pub async fn transport_rows(
    source: &Connection,
    target: &mut Conn,
    schemas: &[TableSchema],
    batch_size: usize,
) -> Result<TransportReport, MigrationError> {
    let first_table = schemas.first().map(|s| s.name.clone()).unwrap_or_default();

    writer::keep_zero_auto_increment(target)
        .await
        .map_err(|source| MigrationError::RowTransfer {
            table: first_table.clone(),
            source,
        })?;

    let mut tx = target
        .start_transaction(TxOpts::default())
        .await
        .map_err(|e| MigrationError::RowTransfer {
            table: first_table,
            source: anyhow!(e).context("Failed to start target transaction"),
        })?;

    match transport_tables(source, &mut tx, schemas, batch_size).await {
        Ok(report) => {
            let last_table = schemas.last().map(|s| s.name.clone()).unwrap_or_default();
            tx.commit().await.map_err(|e| MigrationError::RowTransfer {
                table: last_table,
                source: anyhow!(e).context("Failed to commit transferred rows"),
            })?;
            tracing::info!(
                "Committed {} rows across {} tables",
                report.total_rows(),
                report.tables.len()
            );
            Ok(report)
        }
        Err(err) => {
            if let Err(e) = tx.rollback().await {
                tracing::warn!("Failed to roll back target transaction: {}", e);
            }
            Err(err)
        }
    }
}

/// Copy tables in order, stopping at the first failing table
pub(crate) async fn transport_tables<S: BatchSink>(
    source: &Connection,
    sink: &mut S,
    schemas: &[TableSchema],
    batch_size: usize,
) -> Result<TransportReport, MigrationError> {
    let mut report = TransportReport::default();

    for schema in schemas {
        let transfer = transport_table(source, sink, schema, batch_size)
            .await
            .map_err(|source| MigrationError::RowTransfer {
                table: schema.name.clone(),
                source,
            })?;
        report.tables.push(transfer);
    }

    tracing::info!("Migration completed: {} total rows migrated", report.total_rows());

    Ok(report)
}

async fn transport_table<S: BatchSink>(
    source: &Connection,
    sink: &mut S,
    schema: &TableSchema,
    batch_size: usize,
) -> Result<TableTransfer> {
    let batch_size = batch_size.max(1);
    let table = schema.name.as_str();

    let expected = reader::get_table_row_count(source, table)?;
    if expected == 0 {
        tracing::info!("[{}] No data to migrate", table);
        return Ok(TableTransfer {
            table: table.to_string(),
            rows: 0,
            batches: 0,
        });
    }

    tracing::info!("[{}] Migrating {} rows...", table, expected);

    let columns = schema.column_names();
    let query = reader::select_all_sql(table, &columns);
    let mut stmt = source
        .prepare(&query)
        .with_context(|| format!("Failed to prepare read of table '{}'", table))?;
    let mut rows = stmt
        .query([])
        .with_context(|| format!("Failed to read table '{}'", table))?;

    let mut batch: Vec<Vec<Value>> = Vec::with_capacity(batch_size.min(expected));
    let mut copied = 0;
    let mut batches = 0;

    while let Some(row) = rows
        .next()
        .with_context(|| format!("Failed to read row {} of table '{}'", copied + batch.len() + 1, table))?
    {
        batch.push(converter::row_to_values(row, columns.len())?);

        if batch.len() == batch_size {
            flush(sink, table, &columns, &mut batch, batches).await?;
            copied += batch_size;
            batches += 1;
            tracing::debug!("[{}] Migrated {}/{} rows", table, copied, expected);
        }
    }

    if !batch.is_empty() {
        let remaining = batch.len();
        flush(sink, table, &columns, &mut batch, batches).await?;
        copied += remaining;
        batches += 1;
    }

    tracing::info!("[{}] Migrated {} rows in {} batch(es)", table, copied, batches);

    Ok(TableTransfer {
        table: table.to_string(),
        rows: copied,
        batches,
    })
}

async fn flush<S: BatchSink>(
    sink: &mut S,
    table: &str,
    columns: &[String],
    batch: &mut Vec<Vec<Value>>,
    batch_index: usize,
) -> Result<()> {
    sink.write_batch(table, columns, batch)
        .await
        .with_context(|| format!("Batch {} ({} rows) failed", batch_index + 1, batch.len()))?;
    batch.clear();
    Ok(())
}
