// ABOUTME: Write translated schemas and rows to MySQL
// ABOUTME: Renders CREATE/DROP statements and issues multi-row parameterized inserts

use crate::migration::schema::{ColumnDef, SemanticType, TableSchema, DEFAULT_STRING_LENGTH};
use crate::utils::quote_mysql_ident;
use anyhow::{Context, Result};
use mysql_async::{prelude::*, Conn, Value};

/// MySQL's limit on placeholders in a single prepared statement
pub const MAX_PLACEHOLDERS: usize = 65_535;

/// Keep explicit zeros in AUTO_INCREMENT columns instead of renumbering them
pub const KEEP_ZERO_AUTO_INCREMENT_SQL: &str = "SET SESSION sql_mode = \
     CONCAT_WS(',', NULLIF(@@SESSION.sql_mode, ''), 'NO_AUTO_VALUE_ON_ZERO')";

/// Render the MySQL column type for a translated column
pub fn column_type_sql(column: &ColumnDef) -> String {
    match column.semantic_type {
        SemanticType::String => format!(
            "VARCHAR({})",
            column.max_length.unwrap_or(DEFAULT_STRING_LENGTH)
        ),
        SemanticType::Text => "TEXT".to_string(),
        SemanticType::Integer => "INTEGER".to_string(),
        SemanticType::BigInteger => "BIGINT".to_string(),
        SemanticType::Float => "FLOAT".to_string(),
        SemanticType::Double => "DOUBLE".to_string(),
        SemanticType::Decimal { precision, scale } => match (precision, scale) {
            (Some(p), Some(s)) => format!("NUMERIC({}, {})", p, s),
            (Some(p), None) => format!("NUMERIC({})", p),
            _ => "NUMERIC".to_string(),
        },
        SemanticType::Boolean => "BOOL".to_string(),
        SemanticType::Date => "DATE".to_string(),
        SemanticType::Time => "TIME".to_string(),
        SemanticType::DateTime => "DATETIME".to_string(),
        SemanticType::Binary => match column.max_length {
            Some(n) => format!("VARBINARY({})", n),
            None => "BLOB".to_string(),
        },
    }
}

/// Render a reported default as a MySQL DEFAULT expression, if it is portable
///
/// Carried over: numeric literals, quoted string literals, `NULL` on nullable
/// columns, `TRUE`/`FALSE` on booleans, and `CURRENT_TIMESTAMP` on datetime
/// columns. TEXT and BLOB columns never get a default. Anything else
/// (SQLite functions such as `datetime('now')`) returns `None`.
pub fn portable_default(column: &ColumnDef) -> Option<String> {
    let raw = column.default_value.as_deref()?;
    if column.is_auto_increment
        || matches!(
            column.semantic_type,
            SemanticType::Text | SemanticType::Binary
        )
    {
        return None;
    }

    let expr = strip_outer_parens(raw.trim());

    if expr.eq_ignore_ascii_case("NULL") {
        return column.nullable.then(|| "NULL".to_string());
    }

    if column.semantic_type == SemanticType::Boolean {
        if expr.eq_ignore_ascii_case("TRUE") {
            return Some("1".to_string());
        }
        if expr.eq_ignore_ascii_case("FALSE") {
            return Some("0".to_string());
        }
    }

    if is_numeric_literal(expr) {
        return Some(expr.to_string());
    }

    if is_string_literal(expr) {
        // SQLite has no backslash escapes; MySQL does by default
        return Some(expr.replace('\\', "\\\\"));
    }

    if column.semantic_type == SemanticType::DateTime
        && expr.eq_ignore_ascii_case("CURRENT_TIMESTAMP")
    {
        return Some("CURRENT_TIMESTAMP".to_string());
    }

    None
}

fn strip_outer_parens(expr: &str) -> &str {
    let mut expr = expr;
    while expr.len() >= 2 && expr.starts_with('(') && expr.ends_with(')') {
        expr = expr[1..expr.len() - 1].trim();
    }
    expr
}

fn is_numeric_literal(expr: &str) -> bool {
    !expr.is_empty()
        && expr
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && expr.parse::<f64>().is_ok()
}

fn is_string_literal(expr: &str) -> bool {
    expr.len() >= 2
        && expr.starts_with('\'')
        && expr.ends_with('\'')
        && !expr[1..expr.len() - 1].replace("''", "").contains('\'')
}

fn column_definition_sql(column: &ColumnDef) -> String {
    let mut sql = format!(
        "{} {}",
        quote_mysql_ident(&column.name),
        column_type_sql(column)
    );

    if !column.nullable || column.is_primary_key {
        sql.push_str(" NOT NULL");
    }
    if column.is_auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }
    if let Some(default) = portable_default(column) {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default);
    }

    sql
}

/// Render the CREATE TABLE statement for a translated table
///
/// # Examples
///
/// ```
/// # use sqlite_mysql_migrator::migration::schema::translate_table;
/// # use sqlite_mysql_migrator::sqlite::reader::RawColumn;
/// # use sqlite_mysql_migrator::mysql::writer::create_table_sql;
/// let schema = translate_table(
///     "users",
///     &[RawColumn {
///         name: "id".to_string(),
///         declared_type: "INTEGER".to_string(),
///         not_null: false,
///         default_value: None,
///         pk_position: 1,
///     }],
/// );
/// assert_eq!(
///     create_table_sql(&schema),
///     "CREATE TABLE `users` (\n  `id` BIGINT NOT NULL AUTO_INCREMENT,\n  PRIMARY KEY (`id`)\n)"
/// );
/// ```
pub fn create_table_sql(schema: &TableSchema) -> String {
    let mut lines: Vec<String> = schema.columns.iter().map(column_definition_sql).collect();

    if !schema.primary_key.is_empty() {
        let key = schema
            .primary_key
            .iter()
            .map(|c| quote_mysql_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("PRIMARY KEY ({})", key));
    }

    format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_mysql_ident(&schema.name),
        lines.join(",\n  ")
    )
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_mysql_ident(table))
}

/// Render a multi-row INSERT with one `(?, ...)` group per row
pub fn insert_sql(table: &str, columns: &[String], row_count: usize) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_mysql_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let group = format!("({})", vec!["?"; columns.len()].join(", "));
    let groups = vec![group.as_str(); row_count].join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_mysql_ident(table),
        column_list,
        groups
    )
}

/// How many rows fit in one statement without exceeding the placeholder limit
pub fn rows_per_statement(column_count: usize) -> usize {
    (MAX_PLACEHOLDERS / column_count.max(1)).max(1)
}

pub async fn create_database_if_missing(conn: &mut Conn, db_name: &str) -> Result<()> {
    let sql = format!(
        "CREATE DATABASE IF NOT EXISTS {}",
        quote_mysql_ident(db_name)
    );
    conn.query_drop(sql.as_str())
        .await
        .with_context(|| format!("Failed to create database '{}'", db_name))
}

/// Let a source rowid of 0 land as 0 rather than the next sequence value
pub async fn keep_zero_auto_increment<Q>(queryable: &mut Q) -> Result<()>
where
    Q: Queryable,
{
    queryable
        .query_drop(KEEP_ZERO_AUTO_INCREMENT_SQL)
        .await
        .context("Failed to enable NO_AUTO_VALUE_ON_ZERO")
}

pub async fn set_foreign_key_checks(conn: &mut Conn, enabled: bool) -> Result<()> {
    let sql = format!("SET FOREIGN_KEY_CHECKS = {}", if enabled { 1 } else { 0 });
    conn.query_drop(sql.as_str())
        .await
        .context("Failed to toggle foreign key checks")
}

pub async fn drop_table(conn: &mut Conn, table: &str) -> Result<()> {
    let sql = drop_table_sql(table);
    conn.query_drop(sql.as_str())
        .await
        .with_context(|| format!("Failed to drop table '{}'", table))
}

pub async fn create_table(conn: &mut Conn, schema: &TableSchema) -> Result<()> {
    for column in &schema.columns {
        if column.default_value.is_some() && portable_default(column).is_none() {
            tracing::warn!(
                "Dropping non-portable default {:?} on column '{}.{}'",
                column.default_value.as_deref().unwrap_or_default(),
                schema.name,
                column.name
            );
        }
    }

    let sql = create_table_sql(schema);
    tracing::debug!("{}", sql);

    conn.query_drop(sql.as_str())
        .await
        .with_context(|| format!("Failed to create table '{}'", schema.name))
}

/// Insert rows with as few statements as the placeholder limit allows
///
/// Works on a plain connection or inside a transaction. Returns the number
/// of statements issued.
pub async fn insert_rows<Q>(
    queryable: &mut Q,
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> Result<usize>
where
    Q: Queryable,
{
    let mut statements = 0;

    for chunk in rows.chunks(rows_per_statement(columns.len())) {
        let sql = insert_sql(table, columns, chunk.len());
        let params: Vec<Value> = chunk.iter().flatten().cloned().collect();

        queryable
            .exec_drop(sql.as_str(), params)
            .await
            .with_context(|| {
                format!("Failed to insert {} row(s) into '{}'", chunk.len(), table)
            })?;
        statements += 1;
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::schema::translate_table;
    use crate::sqlite::reader::RawColumn;

    fn column(name: &str, semantic_type: SemanticType, default: Option<&str>) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            semantic_type,
            max_length: (semantic_type == SemanticType::String).then_some(255),
            nullable: true,
            is_primary_key: false,
            is_auto_increment: false,
            default_value: default.map(str::to_string),
        }
    }

    fn raw(name: &str, declared: &str, not_null: bool, default: Option<&str>, pk: u32) -> RawColumn {
        RawColumn {
            name: name.to_string(),
            declared_type: declared.to_string(),
            not_null,
            default_value: default.map(str::to_string),
            pk_position: pk,
        }
    }

    #[test]
    fn test_column_types() {
        let mut c = column("symbol", SemanticType::String, None);
        assert_eq!(column_type_sql(&c), "VARCHAR(255)");
        c.max_length = Some(20);
        assert_eq!(column_type_sql(&c), "VARCHAR(20)");

        let c = column(
            "price",
            SemanticType::Decimal {
                precision: Some(12),
                scale: Some(4),
            },
            None,
        );
        assert_eq!(column_type_sql(&c), "NUMERIC(12, 4)");

        assert_eq!(column_type_sql(&column("b", SemanticType::Boolean, None)), "BOOL");
        assert_eq!(column_type_sql(&column("t", SemanticType::DateTime, None)), "DATETIME");
        assert_eq!(column_type_sql(&column("r", SemanticType::Binary, None)), "BLOB");

        let mut key = column("digest", SemanticType::Binary, None);
        key.max_length = Some(255);
        assert_eq!(column_type_sql(&key), "VARBINARY(255)");
    }

    #[test]
    fn test_portable_defaults() {
        assert_eq!(
            portable_default(&column("qty", SemanticType::Integer, Some("0"))),
            Some("0".to_string())
        );
        assert_eq!(
            portable_default(&column("ratio", SemanticType::Double, Some("(-1.5)"))),
            Some("-1.5".to_string())
        );
        assert_eq!(
            portable_default(&column("status", SemanticType::String, Some("'it''s'"))),
            Some("'it''s'".to_string())
        );
        assert_eq!(
            portable_default(&column("path", SemanticType::String, Some("'C:\\tmp'"))),
            Some("'C:\\\\tmp'".to_string())
        );
        assert_eq!(
            portable_default(&column("on", SemanticType::Boolean, Some("TRUE"))),
            Some("1".to_string())
        );
        assert_eq!(
            portable_default(&column("at", SemanticType::DateTime, Some("CURRENT_TIMESTAMP"))),
            Some("CURRENT_TIMESTAMP".to_string())
        );
        assert_eq!(
            portable_default(&column("n", SemanticType::String, Some("NULL"))),
            Some("NULL".to_string())
        );
    }

    #[test]
    fn test_non_portable_defaults_are_dropped() {
        assert_eq!(
            portable_default(&column("at", SemanticType::DateTime, Some("(datetime('now'))"))),
            None
        );
        assert_eq!(
            portable_default(&column("body", SemanticType::Text, Some("''"))),
            None
        );
        assert_eq!(
            portable_default(&column("d", SemanticType::Date, Some("CURRENT_TIMESTAMP"))),
            None
        );
        assert_eq!(
            portable_default(&column("x", SemanticType::String, Some("'a' || 'b'"))),
            None
        );
        assert_eq!(
            portable_default(&column("nan", SemanticType::Double, Some("inf"))),
            None
        );
    }

    #[test]
    fn test_create_table_sql() {
        let schema = translate_table(
            "orders",
            &[
                raw("id", "INTEGER", false, None, 1),
                raw("symbol", "VARCHAR", true, None, 0),
                raw("qty", "INTEGER", true, Some("0"), 0),
                raw("notes", "TEXT", false, Some("''"), 0),
            ],
        );

        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE `orders` (\n  \
             `id` BIGINT NOT NULL AUTO_INCREMENT,\n  \
             `symbol` VARCHAR(255) NOT NULL,\n  \
             `qty` BIGINT NOT NULL DEFAULT 0,\n  \
             `notes` TEXT,\n  \
             PRIMARY KEY (`id`)\n)"
        );
    }

    #[test]
    fn test_create_table_sql_text_primary_key() {
        let schema = translate_table(
            "sessions",
            &[
                raw("token", "TEXT", true, None, 1),
                raw("payload", "TEXT", false, None, 0),
            ],
        );

        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE `sessions` (\n  \
             `token` VARCHAR(255) NOT NULL,\n  \
             `payload` TEXT,\n  \
             PRIMARY KEY (`token`)\n)"
        );
    }

    #[test]
    fn test_create_table_sql_blob_primary_key() {
        let schema = translate_table("blobs", &[raw("hash", "BLOB", true, None, 1)]);
        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE `blobs` (\n  `hash` VARBINARY(255) NOT NULL,\n  PRIMARY KEY (`hash`)\n)"
        );
    }

    #[test]
    fn test_keep_zero_auto_increment_sql_appends_mode() {
        assert!(KEEP_ZERO_AUTO_INCREMENT_SQL.starts_with("SET SESSION sql_mode"));
        assert!(KEEP_ZERO_AUTO_INCREMENT_SQL.contains("@@SESSION.sql_mode"));
        assert!(KEEP_ZERO_AUTO_INCREMENT_SQL.contains("'NO_AUTO_VALUE_ON_ZERO'"));
    }

    #[test]
    fn test_create_table_sql_composite_key_order() {
        let schema = translate_table(
            "holdings",
            &[
                raw("account_id", "INTEGER", true, None, 2),
                raw("symbol", "VARCHAR(20)", true, None, 1),
            ],
        );

        let sql = create_table_sql(&schema);
        assert!(sql.contains("PRIMARY KEY (`symbol`, `account_id`)"));
        assert!(!sql.contains("AUTO_INCREMENT"));
    }

    #[test]
    fn test_create_table_without_primary_key() {
        let schema = translate_table("traffic_logs", &[raw("path", "TEXT", false, None, 0)]);
        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE `traffic_logs` (\n  `path` TEXT\n)"
        );
    }

    #[test]
    fn test_drop_table_sql() {
        assert_eq!(drop_table_sql("orders"), "DROP TABLE IF EXISTS `orders`");
    }

    #[test]
    fn test_insert_sql() {
        let columns = vec!["id".to_string(), "symbol".to_string()];
        assert_eq!(
            insert_sql("orders", &columns, 3),
            "INSERT INTO `orders` (`id`, `symbol`) VALUES (?, ?), (?, ?), (?, ?)"
        );
    }

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(5), 13_107);
        assert_eq!(rows_per_statement(100), 655);
        assert_eq!(rows_per_statement(70_000), 1);
        assert_eq!(rows_per_statement(0), MAX_PLACEHOLDERS);
    }
}
