// ABOUTME: Row-count verification between a SQLite source and its MySQL target
// ABOUTME: A mismatch or an uncountable table marks the pair unverified, never failed

use crate::error::MigrationError;
use crate::migration::schema::TableSchema;
use crate::mysql::reader as mysql_reader;
use crate::sqlite::reader as sqlite_reader;
use mysql_async::Conn;
use rusqlite::Connection;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: String,
    pub expected: usize,
    pub actual: usize,
}

impl TableCount {
    pub fn matches(&self) -> bool {
        self.expected == self.actual
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub counts: Vec<TableCount>,
    /// Tables whose counts differ or could not be read
    pub unverified: Vec<String>,
    /// Target tables with no source counterpart
    pub orphans: Vec<String>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.unverified.is_empty()
    }

    pub fn record(&mut self, table: &str, expected: usize, actual: usize) {
        let count = TableCount {
            table: table.to_string(),
            expected,
            actual,
        };

        if count.matches() {
            tracing::info!("✓ {}: {} rows", table, expected);
        } else {
            tracing::error!(
                "✗ Row count mismatch for {}: SQLite={}, MySQL={}",
                table,
                expected,
                actual
            );
            self.unverified.push(table.to_string());
        }

        self.counts.push(count);
    }

    pub fn mark_unverified(&mut self, table: &str, reason: &anyhow::Error) {
        tracing::error!("✗ Could not verify {}: {:#}", table, reason);
        self.unverified.push(table.to_string());
    }

    pub fn into_result(self) -> Result<(), MigrationError> {
        if self.passed() {
            Ok(())
        } else {
            Err(MigrationError::VerificationMismatch {
                tables: self.unverified,
            })
        }
    }
}

/// Target tables that the translated schema does not know about
pub fn find_orphans(existing: &[String], schemas: &[TableSchema]) -> Vec<String> {
    let translated: HashSet<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
    existing
        .iter()
        .filter(|table| !translated.contains(table.as_str()))
        .cloned()
        .collect()
}

/// Compare per-table row counts of source and target
///
/// A translated table missing from the target counts as zero rows. Errors
/// never propagate: they leave the affected tables unverified.
pub async fn verify_row_counts(
    source: &Connection,
    target: &mut Conn,
    database: &str,
    schemas: &[TableSchema],
) -> VerificationReport {
    let mut report = VerificationReport::default();

    let existing = match mysql_reader::list_tables(target, database).await {
        Ok(tables) => tables,
        Err(e) => {
            for schema in schemas {
                report.mark_unverified(&schema.name, &e);
            }
            return report;
        }
    };
    let existing_set: HashSet<&str> = existing.iter().map(String::as_str).collect();

    for schema in schemas {
        let table = schema.name.as_str();

        let expected = match sqlite_reader::get_table_row_count(source, table) {
            Ok(count) => count,
            Err(e) => {
                report.mark_unverified(table, &e);
                continue;
            }
        };

        let actual = if existing_set.contains(table) {
            match mysql_reader::get_table_row_count(target, database, table).await {
                Ok(count) => count,
                Err(e) => {
                    report.mark_unverified(table, &e);
                    continue;
                }
            }
        } else {
            tracing::warn!("Table '{}' is missing from MySQL database '{}'", table, database);
            0
        };

        report.record(table, expected, actual);
    }

    report.orphans = find_orphans(&existing, schemas);
    if !report.orphans.is_empty() {
        tracing::warn!(
            "Not verified (no SQLite counterpart): {}",
            report.orphans.join(", ")
        );
    }

    report
}
