//! Integration tests for catalog listing
//!
//! These tests exercise the lister against the mock warehouse. Tests
//! requiring actual warehouse credentials are marked with `#[ignore]` and
//! can be run with `cargo test -- --ignored`.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no credentials required)
//! cargo test -p tablerecon-catalog --test integration_tests
//!
//! # Run Snowflake integration tests
//! SNOWFLAKE_ACCOUNT=xy12345 \
//! SNOWFLAKE_USER=user \
//! SNOWFLAKE_PASSWORD=pass \
//! TABLERECON_DATABASE=ANALYTICS \
//! cargo test -p tablerecon-catalog --features snowflake --test integration_tests -- --ignored
//! ```

mod fixtures;

use pretty_assertions::assert_eq;
use tablerecon_catalog::{
    CatalogLister, MockWarehouse, Principal, QueryError, SessionError, SessionProvider,
};
use tablerecon_core::{CatalogConfig, ComparisonKey};

// =============================================================================
// Helper Functions
// =============================================================================

/// Check if Snowflake credentials are available
#[cfg(feature = "snowflake")]
fn has_snowflake_credentials() -> bool {
    std::env::var("SNOWFLAKE_ACCOUNT").is_ok() && std::env::var("SNOWFLAKE_USER").is_ok()
}

fn keys(names: &[&str]) -> Vec<ComparisonKey> {
    names.iter().map(|n| ComparisonKey::parse(n).unwrap()).collect()
}

// =============================================================================
// Mock Warehouse Tests (No credentials required)
// =============================================================================

#[tokio::test]
async fn test_list_excludes_administrative_namespaces() {
    let warehouse = fixtures::mirrored_warehouse();
    let session = warehouse.connect(&Principal::new("tester")).await.unwrap();

    let snapshot = CatalogLister::default().list("PROD", session.as_ref()).await.unwrap();

    assert_eq!(
        snapshot.keys().into_iter().collect::<Vec<_>>(),
        keys(&["CRM.CUSTOMERS", "SALES.ORDERS", "SALES.ORDERS_SUMMARY"])
    );
    assert!(snapshot.objects().all(|o| o.container == "PROD"));
}

#[tokio::test]
async fn test_custom_ignore_set() {
    let warehouse = fixtures::mirrored_warehouse();
    let session = warehouse.connect(&Principal::new("tester")).await.unwrap();

    let lister = CatalogLister::new(CatalogConfig {
        ignored_namespaces: vec!["information_schema".to_string(), "crm".to_string()],
        skip_objects: Vec::new(),
    });
    let snapshot = lister.list("DEV", session.as_ref()).await.unwrap();

    assert_eq!(
        snapshot.keys().into_iter().collect::<Vec<_>>(),
        keys(&["PUBLIC.SCRATCH", "SALES.ORDERS", "SALES.ORDERS_SUMMARY"])
    );
}

#[tokio::test]
async fn test_listing_issues_one_statement_per_kind() {
    let warehouse = fixtures::mirrored_warehouse();
    let session = warehouse.connect(&Principal::new("tester")).await.unwrap();

    CatalogLister::default().list("PROD", session.as_ref()).await.unwrap();

    assert_eq!(
        warehouse.executed_statements().await,
        vec!["SHOW TABLES IN DATABASE PROD", "SHOW VIEWS IN DATABASE PROD"]
    );
}

#[tokio::test]
async fn test_listing_view_failure_is_fatal() {
    let warehouse = fixtures::mirrored_warehouse();
    warehouse
        .fail_query(
            "SHOW VIEWS IN DATABASE DEV",
            QueryError::PermissionDenied("Insufficient privileges to operate on database 'DEV'".to_string()),
        )
        .await;
    let session = warehouse.connect(&Principal::new("tester")).await.unwrap();

    let err = CatalogLister::default().list("DEV", session.as_ref()).await.unwrap_err();

    assert_eq!(err.container, "DEV");
    assert!(matches!(err.source, QueryError::PermissionDenied(_)));
    assert!(err.to_string().contains("Failed to list views in DEV"));
}

#[tokio::test]
async fn test_empty_container_lists_nothing() {
    let warehouse = MockWarehouse::builder().with_container("EMPTY").build();
    let session = warehouse.connect(&Principal::new("tester")).await.unwrap();

    let snapshot = CatalogLister::default().list("EMPTY", session.as_ref()).await.unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_objects_added_later_are_listed() {
    let warehouse = fixtures::mirrored_warehouse();
    warehouse
        .add_table("DEV", "SALES", "REFUNDS", &["ID"], &[&["1"]])
        .await;
    let session = warehouse.connect(&Principal::new("tester")).await.unwrap();

    let snapshot = CatalogLister::default().list("DEV", session.as_ref()).await.unwrap();
    assert_eq!(snapshot.len(), 4);
    assert!(snapshot.contains(&ComparisonKey::new("SALES", "REFUNDS")));
}

#[tokio::test]
async fn test_connection_failure() {
    let warehouse = MockWarehouse::builder().with_connection_failure().build();
    let result = warehouse.connect(&Principal::new("tester")).await;
    assert!(matches!(result, Err(SessionError::Connection(_))));
}

#[tokio::test]
async fn test_latency_simulation() {
    let warehouse = MockWarehouse::builder().with_container("PROD").with_latency(50).build();
    let session = warehouse.connect(&Principal::new("tester")).await.unwrap();

    let start = std::time::Instant::now();
    session.ping().await.unwrap();
    assert!(start.elapsed().as_millis() >= 50);
}

// =============================================================================
// Snowflake Tests (credentials required)
// =============================================================================

#[cfg(feature = "snowflake")]
#[tokio::test]
#[ignore]
async fn test_snowflake_list_database() {
    use tablerecon_catalog::SnowflakeProvider;

    if !has_snowflake_credentials() {
        eprintln!("Skipping: Snowflake credentials not set");
        return;
    }

    let account = std::env::var("SNOWFLAKE_ACCOUNT").unwrap();
    let user = std::env::var("SNOWFLAKE_USER").unwrap();
    let password = std::env::var("SNOWFLAKE_PASSWORD").unwrap_or_default();
    let database = std::env::var("TABLERECON_DATABASE").unwrap_or_else(|_| "SNOWFLAKE_SAMPLE_DATA".to_string());

    let mut provider = SnowflakeProvider::with_password(account, password);
    if let Ok(warehouse) = std::env::var("SNOWFLAKE_WAREHOUSE") {
        provider = provider.with_warehouse(warehouse);
    }

    let session = provider.connect(&Principal::new(user)).await.unwrap();
    let snapshot = CatalogLister::default().list(&database, session.as_ref()).await.unwrap();
    session.close().await.unwrap();

    assert!(snapshot.objects().all(|o| !o.namespace.eq_ignore_ascii_case("INFORMATION_SCHEMA")));
}
