// ABOUTME: Timestamped copies of SQLite database files taken before migration
// ABOUTME: Keeps permission bits and modification time of the original file

use crate::error::MigrationError;
use crate::utils::sqlite_path_from_url;
use chrono::{Local, NaiveDateTime};
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Name of the backup file for `source` taken at `timestamp`
///
/// `openalgo.db` at 2025-01-02 03:04:05 becomes
/// `openalgo_backup_20250102_030405.db`. Files without an extension get `.db`.
pub fn backup_file_name(source: &Path, timestamp: &NaiveDateTime) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("database");
    let extension = source
        .extension()
        .and_then(|s| s.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("db");

    format!(
        "{}_backup_{}.{}",
        stem,
        timestamp.format("%Y%m%d_%H%M%S"),
        extension
    )
}

/// Copy the SQLite file behind `source_url` into `backup_dir`
///
/// Returns `Ok(None)` when there is nothing to copy: the URL is not a
/// file-based SQLite URL, or the file does not exist. The source file is
/// only read.
pub fn create_backup(
    source_url: &str,
    backup_dir: &Path,
) -> Result<Option<PathBuf>, MigrationError> {
    let Some(path) = sqlite_path_from_url(source_url) else {
        tracing::debug!("Source is not a SQLite file; skipping backup");
        return Ok(None);
    };

    let source = Path::new(path);
    if !source.is_file() {
        tracing::warn!("SQLite database not found: {}", source.display());
        return Ok(None);
    }

    fs::create_dir_all(backup_dir).map_err(|e| MigrationError::Backup {
        path: backup_dir.to_path_buf(),
        source: e,
    })?;

    let destination = backup_dir.join(backup_file_name(source, &Local::now().naive_local()));

    copy_with_metadata(source, &destination).map_err(|e| MigrationError::Backup {
        path: source.to_path_buf(),
        source: e,
    })?;

    tracing::info!("Created backup: {}", destination.display());

    Ok(Some(destination))
}

fn copy_with_metadata(from: &Path, to: &Path) -> io::Result<()> {
    // fs::copy carries the permission bits over
    fs::copy(from, to)?;

    let metadata = fs::metadata(from)?;
    let mut times = FileTimes::new().set_modified(metadata.modified()?);
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }

    // Timestamps are best effort; the copy itself is what matters
    if let Err(e) = File::open(to).and_then(|file| file.set_times(times)) {
        tracing::warn!(
            "Could not preserve timestamps on backup {}: {}",
            to.display(),
            e
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    fn sqlite_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1);")
            .unwrap();
        path
    }

    #[test]
    fn test_backup_file_name() {
        assert_eq!(
            backup_file_name(Path::new("db/openalgo.db"), &timestamp()),
            "openalgo_backup_20250102_030405.db"
        );
        assert_eq!(
            backup_file_name(Path::new("/data/latency.sqlite3"), &timestamp()),
            "latency_backup_20250102_030405.sqlite3"
        );
        assert_eq!(
            backup_file_name(Path::new("logs"), &timestamp()),
            "logs_backup_20250102_030405.db"
        );
    }

    #[test]
    fn test_create_backup_copies_file() {
        let dir = TempDir::new().unwrap();
        let source = sqlite_file(dir.path(), "openalgo.db");
        let original = fs::read(&source).unwrap();
        let backup_dir = dir.path().join("nested").join("backups");

        let url = format!("sqlite:///{}", source.display());
        let backup = create_backup(&url, &backup_dir).unwrap().unwrap();

        assert!(backup.starts_with(&backup_dir));
        let name = backup.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("openalgo_backup_"));
        assert!(name.ends_with(".db"));
        assert_eq!(fs::read(&backup).unwrap(), original);
        assert_eq!(fs::read(&source).unwrap(), original);
    }

    #[test]
    fn test_create_backup_preserves_modified_time() {
        let dir = TempDir::new().unwrap();
        let source = sqlite_file(dir.path(), "latency.db");
        let backup_dir = dir.path().join("backups");

        let url = format!("sqlite:///{}", source.display());
        let backup = create_backup(&url, &backup_dir).unwrap().unwrap();

        let source_mtime = fs::metadata(&source).unwrap().modified().unwrap();
        let backup_mtime = fs::metadata(&backup).unwrap().modified().unwrap();
        assert_eq!(source_mtime, backup_mtime);
    }

    #[cfg(unix)]
    #[test]
    fn test_create_backup_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let source = sqlite_file(dir.path(), "logs.db");
        fs::set_permissions(&source, fs::Permissions::from_mode(0o640)).unwrap();

        let url = format!("sqlite:///{}", source.display());
        let backup = create_backup(&url, &dir.path().join("backups"))
            .unwrap()
            .unwrap();

        let mode = fs::metadata(&backup).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_missing_source_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:///{}", dir.path().join("absent.db").display());

        assert!(create_backup(&url, &dir.path().join("backups")).unwrap().is_none());
        assert!(!dir.path().join("backups").exists());
    }

    #[test]
    fn test_non_file_url_skips_backup() {
        let dir = TempDir::new().unwrap();
        assert!(create_backup("mysql://localhost/openalgo", dir.path())
            .unwrap()
            .is_none());
        assert!(create_backup("sqlite://", dir.path()).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_backup_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = sqlite_file(dir.path(), "openalgo.db");
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"file").unwrap();

        let url = format!("sqlite:///{}", source.display());
        let err = create_backup(&url, &blocker.join("backups")).unwrap_err();
        assert!(matches!(err, MigrationError::Backup { .. }));
    }
}
