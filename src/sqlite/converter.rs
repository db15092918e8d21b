// ABOUTME: SQLite to MySQL value conversion for row transport
// ABOUTME: Maps SQLite storage classes onto MySQL protocol values without loss

use mysql_async::Value;
use rusqlite::types::Value as SqliteValue;

/// Convert a single SQLite value to a MySQL parameter value
///
/// Maps SQLite storage classes:
/// - NULL → NULL
/// - INTEGER → signed 64-bit integer
/// - REAL → double
/// - TEXT → UTF-8 bytes
/// - BLOB → raw bytes
///
/// # Examples
///
/// ```
/// # use sqlite_mysql_migrator::sqlite::converter::sqlite_value_to_mysql;
/// # use rusqlite::types::Value;
/// let value = sqlite_value_to_mysql(Value::Integer(42));
/// assert_eq!(value, mysql_async::Value::Int(42));
/// ```
pub fn sqlite_value_to_mysql(value: SqliteValue) -> Value {
    match value {
        SqliteValue::Null => Value::NULL,
        SqliteValue::Integer(i) => Value::Int(i),
        SqliteValue::Real(f) => Value::Double(f),
        SqliteValue::Text(s) => Value::Bytes(s.into_bytes()),
        SqliteValue::Blob(b) => Value::Bytes(b),
    }
}

/// Read the first `column_count` values of a row as MySQL parameter values
///
/// The values keep the order of the SELECT column list, which is the same
/// order the insert statement names its columns in.
pub fn row_to_values(row: &rusqlite::Row<'_>, column_count: usize) -> rusqlite::Result<Vec<Value>> {
    (0..column_count)
        .map(|idx| row.get::<_, SqliteValue>(idx).map(sqlite_value_to_mysql))
        .collect()
}
