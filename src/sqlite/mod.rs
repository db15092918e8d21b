// ABOUTME: SQLite source access for migration to MySQL
// ABOUTME: Validates source file paths and opens read-only connections

pub mod converter;
pub mod reader;

use crate::utils::{redact_url, sqlite_path_from_url};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Resolve a source database path and make sure it names a regular file
///
/// Checks:
/// - Canonicalizes the path (symlinks and `..` resolved)
/// - Verifies the file exists and is a regular file (not a directory)
///
/// Any file name is accepted. Whether the file really is SQLite is decided
/// by [`open_sqlite`], which probes `sqlite_master`.
///
/// # Arguments
///
/// * `path` - Path to the SQLite file (relative or absolute)
///
/// # Returns
///
/// Canonicalized absolute path of the source file
///
/// # Errors
///
/// Fails when the path is empty, does not resolve, or names something other
/// than a regular file.
///
/// # Examples
///
/// ```no_run
/// # use sqlite_mysql_migrator::sqlite::validate_sqlite_path;
/// assert!(validate_sqlite_path("db/openalgo.db").is_ok());
/// assert!(validate_sqlite_path("db/latency").is_ok());
/// assert!(validate_sqlite_path("/nonexistent.db").is_err());
/// ```
pub fn validate_sqlite_path(path: &str) -> Result<PathBuf> {
    if path.trim().is_empty() {
        bail!("Source database path is empty");
    }

    let resolved = Path::new(path)
        .canonicalize()
        .with_context(|| format!("Source database '{}' does not exist or is unreadable", path))?;

    if !resolved.is_file() {
        bail!("Source database '{}' is not a regular file", path);
    }

    tracing::debug!("Resolved source database {}", resolved.display());

    Ok(resolved)
}

/// Open a SQLite database file without write access
///
/// The file is probed against `sqlite_master` so a corrupt or non-SQLite
/// file fails here rather than halfway through a migration.
///
/// # Arguments
///
/// * `path` - Path to the SQLite file, validated with [`validate_sqlite_path`]
///
/// # Returns
///
/// A read-only `rusqlite::Connection`
///
/// # Errors
///
/// Fails when the path is invalid, the file cannot be opened, or the file
/// is not a readable SQLite database.
pub fn open_sqlite(path: &str) -> Result<rusqlite::Connection> {
    let resolved = validate_sqlite_path(path)?;

    tracing::info!("Reading SQLite source {}", resolved.display());

    let conn = rusqlite::Connection::open_with_flags(
        &resolved,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Cannot open {} as SQLite", resolved.display()))?;

    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .with_context(|| format!("{} is not a readable SQLite database", resolved.display()))?;

    Ok(conn)
}

/// Open the SQLite database named by a `sqlite:///<path>` connection string
///
/// # Errors
///
/// Fails when the string is not a file-based SQLite URL, or for any reason
/// [`open_sqlite`] fails. The URL is redacted in the error.
pub fn open_sqlite_url(connection_string: &str) -> Result<rusqlite::Connection> {
    let path = sqlite_path_from_url(connection_string).with_context(|| {
        format!(
            "'{}' is not a file-based SQLite connection string",
            redact_url(connection_string)
        )
    })?;
    open_sqlite(path)
}
