// ABOUTME: Orchestrates SQLite → MySQL migration for each configured database pair
// ABOUTME: Runs backup, translate, materialize, transport, verify and folds results into a summary

use crate::backup;
use crate::config::{ConfiguredDatabase, DatabasePair};
use crate::error::{MigrationError, Stage};
use crate::migration::{materialize, schema, transport, verify};
use crate::mysql;
use crate::sqlite;
use crate::utils::{detect_dialect, redact_url, Dialect};
use rusqlite::Connection;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateOptions {
    pub dry_run: bool,
    pub backup: bool,
    pub verify: bool,
    pub backup_dir: PathBuf,
    pub batch_size: usize,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
            verify: true,
            backup_dir: PathBuf::from(backup::DEFAULT_BACKUP_DIR),
            batch_size: transport::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Source already points at MySQL
    AlreadyMigrated,
    DryRun,
    NotConfigured,
    UnsupportedDialect,
}

impl SkipReason {
    /// Skips that still count toward the success total
    pub fn counts_as_success(&self) -> bool {
        matches!(self, SkipReason::AlreadyMigrated | SkipReason::DryRun)
    }
}

/// Lifecycle of one database pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Pending,
    Skipped(SkipReason),
    BackedUp,
    Translated,
    Materialized,
    Transported,
    Verified,
    Unverified,
    Done,
    Failed(Stage),
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairState::Pending => write!(f, "pending"),
            PairState::Skipped(reason) => write!(f, "skipped ({:?})", reason),
            PairState::BackedUp => write!(f, "backed up"),
            PairState::Translated => write!(f, "translated"),
            PairState::Materialized => write!(f, "materialized"),
            PairState::Transported => write!(f, "transported"),
            PairState::Verified => write!(f, "verified"),
            PairState::Unverified => write!(f, "unverified"),
            PairState::Done => write!(f, "done"),
            PairState::Failed(stage) => write!(f, "failed at {}", stage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug)]
pub struct MigrationResult {
    pub label: String,
    pub state: PairState,
    pub tables_created: usize,
    pub total_rows_copied: usize,
    pub verification: Verification,
    pub backup_path: Option<PathBuf>,
    pub error: Option<MigrationError>,
}

impl MigrationResult {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: PairState::Pending,
            tables_created: 0,
            total_rows_copied: 0,
            verification: Verification::Skipped,
            backup_path: None,
            error: None,
        }
    }

    fn skipped(label: &str, reason: SkipReason, error: Option<MigrationError>) -> Self {
        let mut result = Self::new(label);
        result.state = PairState::Skipped(reason);
        result.error = error;
        result
    }

    fn advance(&mut self, state: PairState) {
        tracing::debug!("[{}] {} -> {}", self.label, self.state, state);
        self.state = state;
    }

    pub fn succeeded(&self) -> bool {
        match self.state {
            PairState::Done => true,
            PairState::Skipped(reason) => reason.counts_as_success(),
            _ => false,
        }
    }

    /// Only attempted pairs can fail; skips never do
    pub fn failed(&self) -> bool {
        matches!(self.state, PairState::Failed(_))
    }

    pub fn unverified(&self) -> bool {
        self.state == PairState::Done && self.verification == Verification::Failed
    }
}

#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub dry_run: bool,
    /// Setup failed before any database was looked at
    pub aborted: bool,
    pub results: Vec<MigrationResult>,
}

impl MigrationSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Summary for a run that stopped before planning any database
    pub fn aborted() -> Self {
        Self {
            aborted: true,
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.failed()).count()
    }

    pub fn unverified(&self) -> usize {
        self.results.iter().filter(|r| r.unverified()).count()
    }

    /// 0 on full success or dry run, 1 when any attempted pair failed or
    /// setup aborted the run
    pub fn exit_code(&self) -> u8 {
        if self.aborted || (!self.dry_run && self.failed() > 0) {
            1
        } else {
            0
        }
    }

    pub fn summary_line(&self) -> String {
        if self.aborted {
            return "Migration aborted: 0 databases processed".to_string();
        }

        if self.dry_run {
            return format!(
                "Dry run completed: {}/{} databases would be migrated",
                self.succeeded(),
                self.total()
            );
        }

        let mut line = format!(
            "Migration summary: {}/{} databases migrated successfully",
            self.succeeded(),
            self.total()
        );
        if self.unverified() > 0 {
            line.push_str(&format!(", {} unverified", self.unverified()));
        }
        if self.failed() > 0 {
            line.push_str(&format!(", {} failed", self.failed()));
        }
        line
    }
}

/// What to do with one configured database
#[derive(Debug)]
pub enum Plan {
    Skip(SkipReason, Option<MigrationError>),
    Migrate(DatabasePair),
}

pub fn plan_database(configured: &ConfiguredDatabase) -> Plan {
    let db = configured.database;

    let Some(source_url) = configured.source_url.as_deref() else {
        return Plan::Skip(
            SkipReason::NotConfigured,
            Some(MigrationError::ConfigurationMissing {
                key: db.source_key().to_string(),
            }),
        );
    };

    match detect_dialect(source_url) {
        Dialect::Sqlite => {}
        Dialect::MySql => return Plan::Skip(SkipReason::AlreadyMigrated, None),
        Dialect::Unsupported => {
            return Plan::Skip(
                SkipReason::UnsupportedDialect,
                Some(MigrationError::UnsupportedDialect {
                    url: redact_url(source_url),
                }),
            )
        }
    }

    let Some(target_url) = configured.target_url.as_deref() else {
        return Plan::Skip(
            SkipReason::NotConfigured,
            Some(MigrationError::ConfigurationMissing {
                key: db.target_key().to_string(),
            }),
        );
    };

    if detect_dialect(target_url) != Dialect::MySql {
        return Plan::Skip(
            SkipReason::UnsupportedDialect,
            Some(MigrationError::UnsupportedDialect {
                url: redact_url(target_url),
            }),
        );
    }

    Plan::Migrate(DatabasePair {
        label: db.name().to_string(),
        source_url: source_url.to_string(),
        target_url: target_url.to_string(),
    })
}

/// Migrate every configured database in order
///
/// Pairs are independent: a failure is recorded and the next pair runs.
pub async fn migrate_databases(
    databases: &[ConfiguredDatabase],
    options: &MigrateOptions,
) -> MigrationSummary {
    let mut summary = MigrationSummary::new(options.dry_run);

    for configured in databases {
        let db = configured.database;
        let key = db.source_key();

        let result = match plan_database(configured) {
            Plan::Skip(reason, error) => {
                match (&reason, &error) {
                    (SkipReason::AlreadyMigrated, _) => {
                        tracing::info!("{} already using MySQL", key);
                    }
                    (_, Some(err)) => tracing::warn!("Skipping {}: {}", key, err),
                    (_, None) => tracing::warn!("Skipping {}", key),
                }
                MigrationResult::skipped(db.name(), reason, error)
            }
            Plan::Migrate(pair) if options.dry_run => {
                tracing::info!(
                    "Would migrate {}: {} → {}",
                    key,
                    redact_url(&pair.source_url),
                    redact_url(&pair.target_url)
                );
                MigrationResult::skipped(&pair.label, SkipReason::DryRun, None)
            }
            Plan::Migrate(pair) => {
                tracing::info!("Processing {}...", key);
                let result = migrate_pair(&pair, options).await;
                if result.failed() {
                    tracing::error!("Migration failed for {}", key);
                }
                result
            }
        };

        summary.results.push(result);
    }

    summary
}

/// Run every stage for one pair, capturing failure in the result
pub async fn migrate_pair(pair: &DatabasePair, options: &MigrateOptions) -> MigrationResult {
    let mut result = MigrationResult::new(&pair.label);

    tracing::info!(
        "Starting migration: {} → {}",
        redact_url(&pair.source_url),
        redact_url(&pair.target_url)
    );

    if let Err(err) = run_stages(pair, options, &mut result).await {
        if let MigrationError::TableCreation { created, .. } = &err {
            result.tables_created = created.len();
        }

        tracing::error!(
            "[{}] Migration failed during {}: {}",
            pair.label,
            err.stage(),
            err
        );
        if let Some(path) = &result.backup_path {
            tracing::info!("Backup available at: {}", path.display());
        }

        result.advance(PairState::Failed(err.stage()));
        result.error = Some(err);
    }

    result
}

async fn run_stages(
    pair: &DatabasePair,
    options: &MigrateOptions,
    result: &mut MigrationResult,
) -> Result<(), MigrationError> {
    if options.backup {
        result.backup_path = backup::create_backup(&pair.source_url, &options.backup_dir)?;
    }
    result.advance(PairState::BackedUp);

    let source = sqlite::open_sqlite_url(&pair.source_url)
        .map_err(|source| MigrationError::SchemaReflection { source })?;
    let schemas = schema::reflect_schema(&source)?;
    tracing::info!("[{}] Found {} tables to migrate", pair.label, schemas.len());
    result.advance(PairState::Translated);

    if schemas.is_empty() {
        tracing::warn!("[{}] No tables found in SQLite database", pair.label);
        result.advance(PairState::Done);
        return Ok(());
    }

    let database = materialize::ensure_database(&pair.target_url).await?;
    let mut target = materialize::open_target(&pair.target_url, &database).await?;

    let outcome = load_target(&source, &mut target, &database, &schemas, options, result).await;
    mysql::disconnect(target).await;
    outcome
}

async fn load_target(
    source: &Connection,
    target: &mut mysql_async::Conn,
    database: &str,
    schemas: &[schema::TableSchema],
    options: &MigrateOptions,
    result: &mut MigrationResult,
) -> Result<(), MigrationError> {
    let materialized = materialize::materialize_tables(target, database, schemas).await?;
    result.tables_created = materialized.created.len();
    result.advance(PairState::Materialized);

    let transported =
        transport::transport_rows(source, target, schemas, options.batch_size).await?;
    result.total_rows_copied = transported.total_rows();
    result.advance(PairState::Transported);

    if options.verify {
        tracing::info!("Verifying data integrity...");
        let report = verify::verify_row_counts(source, target, database, schemas).await;
        match report.into_result() {
            Ok(()) => {
                tracing::info!("Data integrity verification passed");
                result.verification = Verification::Passed;
                result.advance(PairState::Verified);
            }
            Err(err) => {
                tracing::error!("Data integrity verification failed: {}", err);
                result.verification = Verification::Failed;
                result.error = Some(err);
                result.advance(PairState::Unverified);
            }
        }
    }

    result.advance(PairState::Done);
    Ok(())
}
