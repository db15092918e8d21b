// ABOUTME: MySQL target introspection for materialization and verification
// ABOUTME: Lists existing tables and counts rows with quoted identifiers

use crate::utils::quote_mysql_ident;
use anyhow::{Context, Result};
use mysql_async::{prelude::*, Conn};

/// Base tables (views excluded) of `database`, sorted by name
///
/// ```no_run
/// # use sqlite_mysql_migrator::mysql::{connect_mysql, reader::list_tables};
/// # async fn example() -> anyhow::Result<()> {
/// let mut conn = connect_mysql("mysql://localhost:3306/openalgo").await?;
/// for table in list_tables(&mut conn, "openalgo").await? {
///     println!("{}", table);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn list_tables(conn: &mut Conn, database: &str) -> Result<Vec<String>> {
    let tables: Vec<String> = conn
        .exec(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
            (database,),
        )
        .await
        .with_context(|| format!("Cannot list tables of MySQL database '{}'", database))?;

    tracing::debug!("MySQL database '{}' holds {} table(s)", database, tables.len());

    Ok(tables)
}

pub async fn get_table_row_count(conn: &mut Conn, database: &str, table: &str) -> Result<usize> {
    let query = format!(
        "SELECT COUNT(*) FROM {}.{}",
        quote_mysql_ident(database),
        quote_mysql_ident(table)
    );

    let count: Option<u64> = conn
        .query_first(query.as_str())
        .await
        .with_context(|| format!("Cannot count rows of MySQL table '{}'", table))?;

    Ok(count.map_or(0, |n| n as usize))
}
