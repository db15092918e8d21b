// ABOUTME: Schema reflection and type translation from SQLite to MySQL
// ABOUTME: Classifies declared column types and builds ordered table definitions

use crate::error::MigrationError;
use crate::sqlite::reader::{self, RawColumn};
use crate::utils::validate_identifier;
use anyhow::Context;
use rusqlite::Connection;

/// Length assigned to variable-length strings declared without one
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Longest VARCHAR that fits a MySQL row in utf8mb4; longer strings become TEXT
pub const MAX_VARCHAR_LENGTH: u32 = 16_383;

/// Semantic column type, independent of either dialect's spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    String,
    Text,
    Integer,
    BigInteger,
    Float,
    Double,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Boolean,
    Date,
    Time,
    DateTime,
    Binary,
}

impl SemanticType {
    pub fn is_integer(&self) -> bool {
        matches!(self, SemanticType::Integer | SemanticType::BigInteger)
    }
}

/// Result of classifying a declared type string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub semantic: SemanticType,
    /// Resolved length; always `Some(n > 0)` for [`SemanticType::String`],
    /// and set on [`SemanticType::Binary`] only for key columns
    pub max_length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub semantic_type: SemanticType,
    pub max_length: Option<u32>,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    /// Default expression as reported by the source, unmodified
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Primary key column names in key order
    pub primary_key: Vec<String>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Classify a SQLite declared type into a semantic type
///
/// Exact type names are matched first; anything else falls back to SQLite's
/// affinity rules (`INT` → integer, `CHAR`/`CLOB`/`TEXT` → textual, `BLOB` →
/// binary, `REAL`/`FLOA`/`DOUB` → floating point, otherwise numeric).
/// Columns with no declared type are treated as TEXT.
///
/// SQLite stores every integer in up to 8 bytes, so `INT`, `INTEGER` and
/// integer affinity resolve to [`SemanticType::BigInteger`]. Only the
/// explicitly narrow names (`SMALLINT`, `TINYINT`, `MEDIUMINT`) stay
/// [`SemanticType::Integer`].
///
/// # Examples
///
/// ```
/// # use sqlite_mysql_migrator::migration::schema::{classify_declared_type, SemanticType};
/// let info = classify_declared_type("VARCHAR");
/// assert_eq!(info.semantic, SemanticType::String);
/// assert_eq!(info.max_length, Some(255));
///
/// let info = classify_declared_type("varchar(64)");
/// assert_eq!(info.max_length, Some(64));
/// ```
pub fn classify_declared_type(declared: &str) -> TypeInfo {
    let (base, args) = split_type_args(declared);
    let length = args.first().copied().flatten();

    let semantic = match base.as_str() {
        "" => SemanticType::Text,
        "VARCHAR" | "NVARCHAR" | "CHAR" | "NCHAR" | "CHARACTER" | "VARYING CHARACTER"
        | "NATIVE CHARACTER" | "STRING" => SemanticType::String,
        "TEXT" | "CLOB" | "JSON" | "LONGTEXT" | "MEDIUMTEXT" | "TINYTEXT" => {
            return TypeInfo {
                semantic: SemanticType::Text,
                max_length: None,
            };
        }
        "SMALLINT" | "TINYINT" | "MEDIUMINT" => SemanticType::Integer,
        "INT" | "INTEGER" | "BIGINT" | "UNSIGNED BIG INT" | "INT8" => SemanticType::BigInteger,
        "BOOL" | "BOOLEAN" => SemanticType::Boolean,
        "FLOAT" => SemanticType::Float,
        "REAL" | "DOUBLE" | "DOUBLE PRECISION" => SemanticType::Double,
        "NUMERIC" | "DECIMAL" => decimal(&args),
        "DATE" => SemanticType::Date,
        "TIME" => SemanticType::Time,
        "DATETIME" | "TIMESTAMP" => SemanticType::DateTime,
        "BLOB" | "BINARY" | "VARBINARY" | "LONGBLOB" => SemanticType::Binary,
        other => affinity(other, length.is_some(), &args),
    };

    if semantic != SemanticType::String {
        return TypeInfo {
            semantic,
            max_length: None,
        };
    }

    match length {
        Some(n) if n > MAX_VARCHAR_LENGTH => TypeInfo {
            semantic: SemanticType::Text,
            max_length: None,
        },
        Some(n) if n > 0 => TypeInfo {
            semantic: SemanticType::String,
            max_length: Some(n),
        },
        _ => TypeInfo {
            semantic: SemanticType::String,
            max_length: Some(DEFAULT_STRING_LENGTH),
        },
    }
}

fn affinity(base: &str, has_length: bool, args: &[Option<u32>]) -> SemanticType {
    if base.contains("INT") {
        SemanticType::BigInteger
    } else if base.contains("CHAR") || base.contains("CLOB") || base.contains("TEXT") {
        if has_length {
            SemanticType::String
        } else {
            SemanticType::Text
        }
    } else if base.contains("BLOB") {
        SemanticType::Binary
    } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
        SemanticType::Double
    } else {
        decimal(args)
    }
}

fn decimal(args: &[Option<u32>]) -> SemanticType {
    SemanticType::Decimal {
        precision: args.first().copied().flatten(),
        scale: args.get(1).copied().flatten(),
    }
}

/// Split `NUMERIC(10, 2)` into (`"NUMERIC"`, `[Some(10), Some(2)]`)
///
/// The base name is upper-cased with runs of whitespace collapsed.
/// Arguments that are not plain integers are kept as `None`.
fn split_type_args(declared: &str) -> (String, Vec<Option<u32>>) {
    let (base, rest) = match declared.split_once('(') {
        Some((base, rest)) => (base, Some(rest)),
        None => (declared, None),
    };

    let base = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    let args = rest
        .map(|rest| {
            rest.trim_end()
                .trim_end_matches(')')
                .split(',')
                .map(|arg| arg.trim().parse::<u32>().ok())
                .collect()
        })
        .unwrap_or_default();

    (base, args)
}

/// Bound a primary-key column's type so MySQL can index it
///
/// MySQL refuses TEXT and BLOB columns in a key without a prefix length.
/// Textual keys become `VARCHAR(255)` and binary keys `VARBINARY(255)`.
fn key_column_type(info: TypeInfo) -> TypeInfo {
    match info.semantic {
        SemanticType::Text => TypeInfo {
            semantic: SemanticType::String,
            max_length: Some(DEFAULT_STRING_LENGTH),
        },
        SemanticType::Binary => TypeInfo {
            semantic: SemanticType::Binary,
            max_length: Some(DEFAULT_STRING_LENGTH),
        },
        _ => info,
    }
}

/// Translate one reflected table into its target definition
///
/// Nullability, primary key membership and order, and the reported default
/// are carried over as-is. A column is auto-increment when it is an integer
/// column and the table's sole primary-key column (SQLite's rowid alias).
/// Textual and binary primary-key columns get bounded types.
pub fn translate_table(name: &str, raw_columns: &[RawColumn]) -> TableSchema {
    let mut pk: Vec<&RawColumn> = raw_columns.iter().filter(|c| c.pk_position > 0).collect();
    pk.sort_by_key(|c| c.pk_position);
    let single_pk = pk.len() == 1;

    let columns = raw_columns
        .iter()
        .map(|raw| {
            let is_primary_key = raw.pk_position > 0;
            let mut info = classify_declared_type(&raw.declared_type);
            if is_primary_key {
                info = key_column_type(info);
            }
            ColumnDef {
                name: raw.name.clone(),
                semantic_type: info.semantic,
                max_length: info.max_length,
                nullable: !raw.not_null,
                is_primary_key,
                is_auto_increment: is_primary_key && single_pk && info.semantic.is_integer(),
                default_value: raw.default_value.clone(),
            }
        })
        .collect();

    TableSchema {
        name: name.to_string(),
        columns,
        primary_key: pk.into_iter().map(|c| c.name.clone()).collect(),
    }
}

/// Reflect and translate every user table of the source database
///
/// Tables come back sorted by name with columns in declaration order.
/// An empty result is not an error; the caller decides what "nothing to
/// migrate" means.
pub fn reflect_schema(conn: &Connection) -> Result<Vec<TableSchema>, MigrationError> {
    reflect(conn).map_err(|source| MigrationError::SchemaReflection { source })
}

fn reflect(conn: &Connection) -> anyhow::Result<Vec<TableSchema>> {
    let tables = reader::list_tables(conn)?;
    let mut schemas = Vec::with_capacity(tables.len());

    for table in tables {
        validate_identifier(&table).context("Unsupported table name")?;

        let raw_columns = reader::table_columns(conn, &table)?;
        for column in &raw_columns {
            validate_identifier(&column.name)
                .with_context(|| format!("Unsupported column name in table '{}'", table))?;
        }

        let schema = translate_table(&table, &raw_columns);
        tracing::debug!(
            "Translated table '{}' ({} columns, primary key {:?})",
            schema.name,
            schema.columns.len(),
            schema.primary_key
        );
        schemas.push(schema);
    }

    tracing::info!("Reflected {} table(s) from source", schemas.len());

    Ok(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, declared: &str, not_null: bool, pk: u32) -> RawColumn {
        RawColumn {
            name: name.to_string(),
            declared_type: declared.to_string(),
            not_null,
            default_value: None,
            pk_position: pk,
        }
    }

    #[test]
    fn test_varchar_without_length_gets_default() {
        let info = classify_declared_type("VARCHAR");
        assert_eq!(info.semantic, SemanticType::String);
        assert_eq!(info.max_length, Some(DEFAULT_STRING_LENGTH));

        let info = classify_declared_type("nvarchar");
        assert_eq!(info.max_length, Some(DEFAULT_STRING_LENGTH));

        let info = classify_declared_type("VARCHAR(0)");
        assert_eq!(info.max_length, Some(DEFAULT_STRING_LENGTH));
    }

    #[test]
    fn test_varchar_with_length_is_kept() {
        let info = classify_declared_type("VARCHAR(50)");
        assert_eq!(info.semantic, SemanticType::String);
        assert_eq!(info.max_length, Some(50));

        let info = classify_declared_type("character varying ( 80 )");
        assert_eq!(info.max_length, Some(80));
    }

    #[test]
    fn test_oversized_varchar_becomes_text() {
        let info = classify_declared_type("VARCHAR(70000)");
        assert_eq!(info.semantic, SemanticType::Text);
        assert_eq!(info.max_length, None);
    }

    #[test]
    fn test_exact_type_names() {
        let cases = [
            ("INTEGER", SemanticType::BigInteger),
            ("INT", SemanticType::BigInteger),
            ("SMALLINT", SemanticType::Integer),
            ("BIGINT", SemanticType::BigInteger),
            ("BOOLEAN", SemanticType::Boolean),
            ("FLOAT", SemanticType::Float),
            ("REAL", SemanticType::Double),
            ("DATETIME", SemanticType::DateTime),
            ("TIMESTAMP", SemanticType::DateTime),
            ("DATE", SemanticType::Date),
            ("TIME", SemanticType::Time),
            ("TEXT", SemanticType::Text),
            ("BLOB", SemanticType::Binary),
            ("", SemanticType::Text),
        ];

        for (declared, expected) in cases {
            assert_eq!(
                classify_declared_type(declared).semantic,
                expected,
                "declared type '{}'",
                declared
            );
        }
    }

    #[test]
    fn test_decimal_arguments() {
        assert_eq!(
            classify_declared_type("NUMERIC(10, 2)").semantic,
            SemanticType::Decimal {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert_eq!(
            classify_declared_type("DECIMAL").semantic,
            SemanticType::Decimal {
                precision: None,
                scale: None
            }
        );
    }

    #[test]
    fn test_affinity_fallback() {
        assert_eq!(
            classify_declared_type("UNSIGNED INTEGER").semantic,
            SemanticType::BigInteger
        );
        assert_eq!(
            classify_declared_type("VARCHAR2(40)"),
            TypeInfo {
                semantic: SemanticType::String,
                max_length: Some(40)
            }
        );
        assert_eq!(
            classify_declared_type("LONGVARCHAR").semantic,
            SemanticType::Text
        );
        assert_eq!(classify_declared_type("MYBLOB").semantic, SemanticType::Binary);
        assert_eq!(classify_declared_type("FLOAT8").semantic, SemanticType::Double);
        // "POINT" contains "INT", so SQLite gives this integer affinity
        assert_eq!(
            classify_declared_type("FLOATING POINT").semantic,
            SemanticType::BigInteger
        );
        assert!(matches!(
            classify_declared_type("MONEY").semantic,
            SemanticType::Decimal { .. }
        ));
    }

    #[test]
    fn test_every_string_column_has_positive_length() {
        for declared in ["VARCHAR", "CHAR", "VARCHAR(1)", "NCHAR(0)", "STRING", "VARCHAR2(9)"] {
            let info = classify_declared_type(declared);
            if info.semantic == SemanticType::String {
                assert!(
                    info.max_length.is_some_and(|n| n > 0),
                    "'{}' resolved without a length",
                    declared
                );
            }
        }
    }

    #[test]
    fn test_translate_rowid_alias_is_auto_increment() {
        let schema = translate_table(
            "users",
            &[
                raw("id", "INTEGER", false, 1),
                raw("username", "VARCHAR", true, 0),
                raw("bio", "TEXT", false, 0),
            ],
        );

        assert_eq!(schema.primary_key, vec!["id"]);
        assert!(schema.columns[0].is_primary_key);
        assert!(schema.columns[0].is_auto_increment);
        assert!(!schema.columns[1].nullable);
        assert_eq!(schema.columns[1].max_length, Some(255));
        assert!(schema.columns[2].nullable);
        assert_eq!(schema.column_names(), vec!["id", "username", "bio"]);
    }

    #[test]
    fn test_translate_composite_key_has_no_auto_increment() {
        let schema = translate_table(
            "holdings",
            &[
                raw("account_id", "INTEGER", true, 2),
                raw("symbol", "VARCHAR(20)", true, 1),
                raw("qty", "INTEGER", false, 0),
            ],
        );

        assert_eq!(schema.primary_key, vec!["symbol", "account_id"]);
        assert!(schema.columns.iter().all(|c| !c.is_auto_increment));
    }

    #[test]
    fn test_translate_text_primary_key_is_not_auto_increment() {
        let schema = translate_table("sessions", &[raw("token", "TEXT", true, 1)]);
        assert!(schema.columns[0].is_primary_key);
        assert!(!schema.columns[0].is_auto_increment);
    }

    #[test]
    fn test_translate_unbounded_key_columns_get_lengths() {
        let schema = translate_table(
            "cache",
            &[
                raw("token", "TEXT", true, 1),
                raw("digest", "BLOB", true, 2),
                raw("label", "", false, 3),
                raw("body", "TEXT", false, 0),
                raw("raw", "BLOB", false, 0),
            ],
        );

        let token = &schema.columns[0];
        assert_eq!(token.semantic_type, SemanticType::String);
        assert_eq!(token.max_length, Some(DEFAULT_STRING_LENGTH));

        let digest = &schema.columns[1];
        assert_eq!(digest.semantic_type, SemanticType::Binary);
        assert_eq!(digest.max_length, Some(DEFAULT_STRING_LENGTH));

        assert_eq!(schema.columns[2].semantic_type, SemanticType::String);

        // Non-key columns keep their unbounded types
        assert_eq!(schema.columns[3].semantic_type, SemanticType::Text);
        assert_eq!(schema.columns[4].max_length, None);
    }

    #[test]
    fn test_reflect_schema_from_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE strategies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR NOT NULL,
                enabled BOOLEAN DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE api_keys (
                user_id VARCHAR(64) PRIMARY KEY,
                api_key_hash TEXT NOT NULL
            );
            ",
        )
        .unwrap();

        let schemas = reflect_schema(&conn).unwrap();

        let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["api_keys", "strategies"]);

        let strategies = &schemas[1];
        assert_eq!(
            strategies.column_names(),
            vec!["id", "name", "enabled", "created_at"]
        );
        assert!(strategies.columns[0].is_auto_increment);
        assert_eq!(strategies.columns[1].semantic_type, SemanticType::String);
        assert_eq!(strategies.columns[1].max_length, Some(255));
        assert_eq!(strategies.columns[2].default_value.as_deref(), Some("1"));
        assert_eq!(
            strategies.columns[3].default_value.as_deref(),
            Some("CURRENT_TIMESTAMP")
        );

        let api_keys = &schemas[0];
        assert_eq!(api_keys.primary_key, vec!["user_id"]);
        assert!(!api_keys.columns[0].is_auto_increment);
    }

    #[test]
    fn test_reflect_schema_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(reflect_schema(&conn).unwrap().is_empty());
    }
}
