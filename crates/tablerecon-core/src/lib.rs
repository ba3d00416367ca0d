//! tablerecon core
//!
//! Domain model shared by the catalog, engine and CLI crates.
//! Report row shapes are part of the public output format - never rename fields.

pub mod identity;
pub mod outcome;
pub mod report;
pub mod config;

pub use identity::{ObjectIdentity, ComparisonKey, CatalogSnapshot, PartitionResult};
pub use outcome::{Direction, ComparisonOutcome, ObjectDiff};
pub use report::{
    ReportVersion, StreamKind, ReportRecord, CatalogOnlyRecord, MismatchRecord, ErrorRecord,
    RunSummary, RunReport, ArtifactEntry,
};
pub use config::{
    Config, ConfigError, WarehouseConfig, CatalogConfig, DiffConfig, DirectionPolicy, OutputConfig,
};
