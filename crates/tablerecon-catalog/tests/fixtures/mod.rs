//! Test fixtures for catalog integration tests
//!
//! Reusable warehouse layouts shaped like a production database and its
//! development copy.

#![allow(dead_code)]

use tablerecon_catalog::{MockWarehouse, MockWarehouseBuilder};

pub const CUSTOMER_COLUMNS: &[&str] = &["ID", "EMAIL", "COUNTRY"];
pub const ORDER_COLUMNS: &[&str] = &["ID", "CUSTOMER_ID", "TOTAL_AMOUNT", "STATUS"];

pub const CUSTOMER_ROWS: &[&[&str]] = &[
    &["1", "ada@example.com", "GB"],
    &["2", "grace@example.com", "US"],
    &["3", "edsger@example.com", "NL"],
];

pub const ORDER_ROWS: &[&[&str]] = &[
    &["100", "1", "25.00", "SHIPPED"],
    &["101", "2", "13.50", "PENDING"],
];

/// Add a container shaped like a typical analytics database
///
/// - `CRM.CUSTOMERS` table
/// - `SALES.ORDERS` table and `SALES.ORDERS_SUMMARY` view
/// - administrative objects in `PUBLIC` and `INFORMATION_SCHEMA`
pub fn with_analytics_container(builder: MockWarehouseBuilder, container: &str) -> MockWarehouseBuilder {
    builder
        .with_table(container, "CRM", "CUSTOMERS", CUSTOMER_COLUMNS, CUSTOMER_ROWS)
        .with_table(container, "SALES", "ORDERS", ORDER_COLUMNS, ORDER_ROWS)
        .with_view(container, "SALES", "ORDERS_SUMMARY", &["STATUS", "CNT"], &[&["SHIPPED", "1"], &["PENDING", "1"]])
        .with_table(container, "PUBLIC", "SCRATCH", &["ID"], &[])
        .with_view(container, "INFORMATION_SCHEMA", "TABLES", &["TABLE_NAME"], &[])
}

/// Production and development databases with identical content
pub fn mirrored_warehouse() -> MockWarehouse {
    let builder = with_analytics_container(MockWarehouse::builder(), "PROD");
    with_analytics_container(builder, "DEV").build()
}
