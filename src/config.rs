// ABOUTME: Environment-based configuration for the logical databases to migrate
// ABOUTME: Loads .env files and resolves source/target connection strings per database

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

/// The three logical databases an installation keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogicalDatabase {
    Main,
    Latency,
    Logs,
}

impl LogicalDatabase {
    pub const ALL: [LogicalDatabase; 3] = [
        LogicalDatabase::Main,
        LogicalDatabase::Latency,
        LogicalDatabase::Logs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogicalDatabase::Main => "main",
            LogicalDatabase::Latency => "latency",
            LogicalDatabase::Logs => "logs",
        }
    }

    /// Variable holding the current (source) connection string
    pub fn source_key(&self) -> &'static str {
        match self {
            LogicalDatabase::Main => "DATABASE_URL",
            LogicalDatabase::Latency => "LATENCY_DATABASE_URL",
            LogicalDatabase::Logs => "LOGS_DATABASE_URL",
        }
    }

    /// Variable holding the MySQL target connection string
    pub fn target_key(&self) -> &'static str {
        match self {
            LogicalDatabase::Main => "MYSQL_MAIN_URL",
            LogicalDatabase::Latency => "MYSQL_LATENCY_URL",
            LogicalDatabase::Logs => "MYSQL_LOGS_URL",
        }
    }
}

/// Connection strings found for one logical database, either may be absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredDatabase {
    pub database: LogicalDatabase,
    pub source_url: Option<String>,
    pub target_url: Option<String>,
}

/// A source and target that are both present and of a supported dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePair {
    pub label: String,
    pub source_url: String,
    pub target_url: String,
}

/// Read a variable from the process environment
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Resolve connection strings for every selected logical database
///
/// `only` restricts the result to a single database. Order is always
/// main, latency, logs.
pub fn resolve_databases<F>(lookup: F, only: Option<LogicalDatabase>) -> Vec<ConfiguredDatabase>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    LogicalDatabase::ALL
        .into_iter()
        .filter(|db| only.map_or(true, |selected| selected == *db))
        .map(|database| ConfiguredDatabase {
            database,
            source_url: read(database.source_key()),
            target_url: read(database.target_key()),
        })
        .collect()
}

/// Environment files to load from `base`, in load order
///
/// The first of `.env` / `../.env` supplies the source URLs, the first of
/// `.update/.env` / `.env` the MySQL targets. A file found twice is listed once.
pub fn discover_env_files(base: &Path) -> Vec<PathBuf> {
    let groups = [
        [base.join(".env"), base.join("..").join(".env")],
        [base.join(".update").join(".env"), base.join(".env")],
    ];

    let mut files: Vec<PathBuf> = Vec::new();
    for group in groups {
        if let Some(found) = group.into_iter().find(|path| path.is_file()) {
            if !files.contains(&found) {
                files.push(found);
            }
        }
    }
    files
}

/// Load explicit env files, then discovered ones from the working directory
///
/// Variables already set in the process are never overridden, so explicit
/// files win over discovered ones and the real environment wins over both.
/// A missing explicit file is an error; a broken discovered file is skipped.
pub fn load_env_files(explicit: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut loaded = Vec::new();

    for path in explicit {
        dotenvy::from_path(path)
            .with_context(|| format!("Failed to load environment file {}", path.display()))?;
        loaded.push(path.clone());
    }

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    for path in discover_env_files(&cwd) {
        match dotenvy::from_path(&path) {
            Ok(()) => loaded.push(path),
            Err(e) => tracing::warn!("Ignoring environment file {}: {}", path.display(), e),
        }
    }

    Ok(loaded)
}
