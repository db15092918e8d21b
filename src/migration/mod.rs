// ABOUTME: Migration stages for one SQLite → MySQL database pair
// ABOUTME: Schema translation, table materialization, row transport, and verification

pub mod materialize;
pub mod schema;
pub mod transport;
pub mod verify;

pub use materialize::{ensure_database, materialize_tables, open_target, MaterializeReport};
pub use schema::{reflect_schema, ColumnDef, SemanticType, TableSchema};
pub use transport::{transport_rows, TableTransfer, TransportReport, DEFAULT_BATCH_SIZE};
pub use verify::{verify_row_counts, TableCount, VerificationReport};
