// ABOUTME: Reads table catalog, column metadata, and row counts from a SQLite source
// ABOUTME: Also builds the SELECT that streams a table's rows in column order

use crate::utils::quote_sqlite_ident;
use anyhow::{Context, Result};
use rusqlite::Connection;

/// Column as SQLite reports it through `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    /// Declared type exactly as written in `CREATE TABLE` (may be empty)
    pub declared_type: String,
    pub not_null: bool,
    /// Default expression as SQL text, e.g. `'pending'`, `0`, `CURRENT_TIMESTAMP`
    pub default_value: Option<String>,
    /// 1-based position within the primary key, 0 when not part of it
    pub pk_position: u32,
}

/// Names of the user tables in `conn`, sorted
///
/// SQLite's own bookkeeping tables (`sqlite_sequence`, `sqlite_stat1`, ...)
/// are left out since they have no meaning on the MySQL side.
///
/// ```no_run
/// # use sqlite_mysql_migrator::sqlite::{open_sqlite, reader::list_tables};
/// # fn example() -> anyhow::Result<()> {
/// let conn = open_sqlite("db/openalgo.db")?;
/// assert!(list_tables(&conn)?.iter().all(|t| !t.starts_with("sqlite_")));
/// # Ok(())
/// # }
/// ```
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
             ORDER BY name",
        )
        .context("Cannot read the SQLite table catalog")?;

    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("Cannot read the SQLite table catalog")?;

    tracing::debug!("SQLite source holds {} table(s)", tables.len());

    Ok(tables)
}

/// Describe the columns of a table in declaration order
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<RawColumn>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?1) \
             ORDER BY cid",
        )
        .context("Failed to prepare table_info statement")?;

    let columns = stmt
        .query_map([table], |row| {
            Ok(RawColumn {
                name: row.get(0)?,
                declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                not_null: row.get::<_, i64>(2)? != 0,
                default_value: row.get(3)?,
                pk_position: row.get::<_, i64>(4)?.max(0) as u32,
            })
        })
        .with_context(|| format!("Failed to read column info for table '{}'", table))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to collect column info for table '{}'", table))?;

    tracing::debug!("Table '{}' has {} columns", table, columns.len());

    Ok(columns)
}

pub fn get_table_row_count(conn: &Connection, table: &str) -> Result<usize> {
    let query = format!("SELECT COUNT(*) FROM {}", quote_sqlite_ident(table));

    let count: i64 = conn
        .query_row(&query, [], |row| row.get(0))
        .with_context(|| format!("Cannot count rows of SQLite table '{}'", table))?;

    Ok(count as usize)
}

/// Build the statement that reads every row of a table
///
/// Columns are listed explicitly so the values of each row line up with the
/// column list used on the insert side. No ORDER BY: rows come back in the
/// table's physical order.
pub fn select_all_sql(table: &str, columns: &[String]) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_sqlite_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", column_list, quote_sqlite_ident(table))
}
