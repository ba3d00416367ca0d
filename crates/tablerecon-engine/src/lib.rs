//! tablerecon engine - reconciliation logic
//!
//! This crate implements the reconciliation pipeline:
//! - Catalog partitioning
//! - Bidirectional content diff
//! - Incremental report persistence
//! - Run orchestration

pub mod partition;
pub mod differ;
pub mod reporter;
pub mod orchestrator;

pub use partition::partition;
pub use differ::{ContentDiffer, WorkQueue, except_count_query};
pub use reporter::{Reporter, ReportSink, ReportSinks, CsvSink, MemorySink, ReportError};
pub use orchestrator::{Reconciler, ReconcileRequest, ReconcileError};
