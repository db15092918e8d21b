// ABOUTME: Command implementations for the migrator CLI
// ABOUTME: Exports the per-database migration orchestrator

pub mod migrate;

pub use migrate::{
    migrate_databases, migrate_pair, plan_database, MigrateOptions, MigrationResult,
    MigrationSummary, PairState, Plan, SkipReason, Verification,
};
