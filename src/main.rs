// ABOUTME: CLI entry point for sqlite-mysql-migrator
// ABOUTME: Loads environment files, runs the migration, and maps the summary to an exit code

use clap::Parser;
use sqlite_mysql_migrator::commands::{self, MigrateOptions, MigrationSummary};
use sqlite_mysql_migrator::config::{self, LogicalDatabase};
use sqlite_mysql_migrator::migration::DEFAULT_BATCH_SIZE;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sqlite-mysql-migrator", version)]
#[command(about = "One-shot migration of SQLite databases into MySQL")]
#[command(
    long_about = "One-shot migration of SQLite databases into MySQL.\n\n\
    WARNING: target tables that share a name with a source table are DROPPED \
    and recreated. Any data they hold is lost. Use --dry-run first."
)]
struct Cli {
    /// Show what would be migrated without touching any database
    #[arg(long)]
    dry_run: bool,
    /// Skip the SQLite file backup
    #[arg(long)]
    no_backup: bool,
    /// Skip the row-count verification after copying
    #[arg(long)]
    no_verify: bool,
    /// Migrate only this database
    #[arg(long, value_enum)]
    database: Option<LogicalDatabase>,
    /// Directory that receives SQLite backups
    #[arg(long, default_value = sqlite_mysql_migrator::backup::DEFAULT_BACKUP_DIR)]
    backup_dir: PathBuf,
    /// Rows read from SQLite per insert batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// Extra environment file to load before the discovered ones (repeatable)
    #[arg(long = "env-file")]
    env_files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let loaded = match config::load_env_files(&cli.env_files) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("{:#}", e);
            let summary = MigrationSummary::aborted();
            tracing::info!("{}", summary.summary_line());
            return Ok(ExitCode::from(summary.exit_code()));
        }
    };
    if loaded.is_empty() {
        tracing::info!("No .env files found; using process environment");
    }
    for path in &loaded {
        tracing::info!("Loaded environment from {}", path.display());
    }

    if cli.dry_run {
        tracing::info!("DRY RUN MODE - no changes will be made");
    }

    let databases = config::resolve_databases(config::env_lookup, cli.database);
    let options = MigrateOptions {
        dry_run: cli.dry_run,
        backup: !cli.no_backup,
        verify: !cli.no_verify,
        backup_dir: cli.backup_dir,
        batch_size: cli.batch_size,
    };

    let summary = commands::migrate_databases(&databases, &options).await;

    tracing::info!("{}", summary.summary_line());

    Ok(ExitCode::from(summary.exit_code()))
}
