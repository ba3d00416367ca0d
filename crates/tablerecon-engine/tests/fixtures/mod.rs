//! Test fixtures for reconciliation integration tests
//!
//! The central scenario: `PROD` holds `A, B, C` and `DEV` holds `B, C, D`
//! in the `SALES` namespace. `B` has identical rows on both sides, `C` has
//! one extra row in `DEV`.

#![allow(dead_code)]

use std::path::Path;
use tablerecon_catalog::{MockWarehouse, MockWarehouseBuilder};
use tablerecon_core::{Config, OutputConfig, StreamKind};

pub const COLUMNS: &[&str] = &["ID", "VAL"];
pub const ROWS: &[&[&str]] = &[&["1", "alpha"], &["2", "beta"]];

/// Both containers also carry a `PUBLIC` table that the lister ignores
fn with_scratch(builder: MockWarehouseBuilder) -> MockWarehouseBuilder {
    builder
        .with_table("PROD", "PUBLIC", "SCRATCH", &["ID"], &[&["1"]])
        .with_table("DEV", "PUBLIC", "SCRATCH", &["ID"], &[&["2"]])
}

pub fn scenario_builder() -> MockWarehouseBuilder {
    with_scratch(MockWarehouse::builder())
        .with_table("PROD", "SALES", "A", COLUMNS, ROWS)
        .with_table("PROD", "SALES", "B", COLUMNS, ROWS)
        .with_table("DEV", "SALES", "B", COLUMNS, ROWS)
        .with_table("PROD", "SALES", "C", COLUMNS, ROWS)
        .with_table("DEV", "SALES", "C", COLUMNS, &[&["1", "alpha"], &["2", "beta"], &["3", "gamma"]])
        .with_view("DEV", "SALES", "D", COLUMNS, ROWS)
}

pub fn scenario_warehouse() -> MockWarehouse {
    scenario_builder().build()
}

/// `count` identical tables named `T00, T01, ...` in both containers
pub fn mirrored_warehouse(count: usize) -> MockWarehouseBuilder {
    (0..count).fold(MockWarehouse::builder(), |builder, i| {
        let name = format!("T{:02}", i);
        builder
            .with_table("PROD", "SALES", &name, COLUMNS, ROWS)
            .with_table("DEV", "SALES", &name, COLUMNS, ROWS)
    })
}

/// Default configuration writing artifacts into `dir`
pub fn config_in(dir: &Path) -> Config {
    Config {
        output: OutputConfig {
            directory: dir.to_path_buf(),
            ..OutputConfig::default()
        },
        ..Config::default()
    }
}

pub fn read_artifact(config: &Config, stream: StreamKind) -> String {
    std::fs::read_to_string(config.output.path_for(stream)).unwrap()
}

/// Data rows of an artifact, header checked and removed
pub fn data_rows(config: &Config, stream: StreamKind) -> Vec<String> {
    let contents = read_artifact(config, stream);
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some(stream.header().join(",").as_str()));
    lines.map(str::to_string).collect()
}

pub fn count_query(minuend: &str, subtrahend: &str, name: &str) -> String {
    format!(
        "select count(*) as CNT from (select * from {m}.SALES.{n} except select * from {s}.SALES.{n})",
        m = minuend,
        s = subtrahend,
        n = name
    )
}
