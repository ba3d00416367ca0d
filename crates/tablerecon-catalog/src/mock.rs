//! In-memory mock warehouse for testing
//!
//! This provider keeps containers of tables and views in memory and answers
//! the statements the reconciliation engine issues, without connecting to
//! any real warehouse. It's useful for:
//! - Unit testing listing and diffing logic
//! - End-to-end reconciliation tests that inspect the CSV artifacts
//! - Simulating connection failures and per-query errors
//!
//! Supported statements:
//! - `SHOW TABLES IN DATABASE <db>` / `SHOW VIEWS IN DATABASE <db>`
//! - `select count(*) as CNT from (select * from <a> except select * from <b>)`
//! - `SELECT 1`
//!
//! `EXCEPT` follows SQL set semantics: distinct rows of `a` absent from `b`.
//! Branches with different column counts fail like a compilation error.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tablerecon_catalog::{MockWarehouse, SessionProvider, Principal};
//!
//! let warehouse = MockWarehouse::builder()
//!     .with_table("PROD", "SALES", "ORDERS", &["ID", "AMOUNT"], &[&["1", "9.99"]])
//!     .with_table("DEV", "SALES", "ORDERS", &["ID", "AMOUNT"], &[])
//!     .build();
//!
//! let session = warehouse.connect(&Principal::new("tester")).await?;
//! ```

use crate::lister::ObjectKind;
use crate::session::{Principal, QueryError, ResultSet, SessionError, SessionProvider, WarehouseSession};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, RwLock};

/// A table or view stored by the mock warehouse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockObject {
    pub kind: ObjectKind,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MockObject {
    pub fn new(kind: ObjectKind, columns: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }
}

/// Objects keyed by `(SCHEMA, NAME)`, per container
type Containers = BTreeMap<String, BTreeMap<(String, String), MockObject>>;

#[derive(Default)]
struct Failures {
    /// Errors for exact statements (whitespace-normalized)
    queries: HashMap<String, QueryError>,

    /// Errors for any statement referencing a three-part name
    objects: HashMap<String, QueryError>,
}

/// Session bookkeeping shared between the provider and its sessions
#[derive(Default)]
struct SessionStats {
    opened: AtomicUsize,
    open: AtomicUsize,
    peak_open: AtomicUsize,
}

/// Mock warehouse provider
///
/// Cloning shares the stored data, failure rules and session statistics.
#[derive(Clone)]
pub struct MockWarehouse {
    containers: Arc<RwLock<Containers>>,
    failures: Arc<RwLock<Failures>>,
    statements: Arc<Mutex<Vec<String>>>,
    stats: Arc<SessionStats>,
    connection_failure: Option<SessionError>,
    latency_ms: u64,
}

impl MockWarehouse {
    /// Create an empty mock warehouse
    pub fn new() -> Self {
        MockWarehouseBuilder::new().build()
    }

    pub fn builder() -> MockWarehouseBuilder {
        MockWarehouseBuilder::new()
    }

    /// Add or replace a table
    pub async fn add_table(&self, container: &str, schema: &str, name: &str, columns: &[&str], rows: &[&[&str]]) {
        self.add_object(container, schema, name, MockObject::new(ObjectKind::Table, columns, rows))
            .await;
    }

    /// Add or replace a view
    pub async fn add_view(&self, container: &str, schema: &str, name: &str, columns: &[&str], rows: &[&[&str]]) {
        self.add_object(container, schema, name, MockObject::new(ObjectKind::View, columns, rows))
            .await;
    }

    pub async fn add_object(&self, container: &str, schema: &str, name: &str, object: MockObject) {
        self.containers
            .write()
            .await
            .entry(container.to_uppercase())
            .or_default()
            .insert((schema.to_uppercase(), name.to_uppercase()), object);
    }

    /// Append a row to an existing object; returns `false` if it doesn't exist
    pub async fn insert_row(&self, fqn: &str, row: &[&str]) -> bool {
        let Some((container, schema, name)) = split_fqn(fqn) else {
            return false;
        };

        let mut containers = self.containers.write().await;
        match containers
            .get_mut(&container)
            .and_then(|objects| objects.get_mut(&(schema, name)))
        {
            Some(object) => {
                object.rows.push(row.iter().map(|v| v.to_string()).collect());
                true
            }
            None => false,
        }
    }

    /// Fail one exact statement with the given error
    pub async fn fail_query(&self, sql: &str, error: QueryError) {
        self.failures.write().await.queries.insert(normalize_sql(sql), error);
    }

    /// Fail every statement referencing a three-part name
    pub async fn fail_object(&self, fqn: &str, error: QueryError) {
        self.failures.write().await.objects.insert(fqn.to_uppercase(), error);
    }

    pub async fn clear_failures(&self) {
        let mut failures = self.failures.write().await;
        failures.queries.clear();
        failures.objects.clear();
    }

    /// Every statement executed so far, in order
    pub async fn executed_statements(&self) -> Vec<String> {
        self.statements.lock().await.clone()
    }

    /// Number of sessions opened over the provider's lifetime
    pub fn sessions_opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions currently open
    pub fn open_sessions(&self) -> usize {
        self.stats.open.load(Ordering::SeqCst)
    }

    /// Highest number of sessions open at the same time
    pub fn peak_open_sessions(&self) -> usize {
        self.stats.peak_open.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }

    async fn run(&self, sql: &str) -> Result<ResultSet, QueryError> {
        self.statements.lock().await.push(sql.to_string());
        self.simulate_latency().await;

        self.check_failures(sql).await?;

        if select_one_re().is_match(sql) {
            return Ok(ResultSet::new(vec!["1".to_string()], vec![vec![Some("1".to_string())]]));
        }

        if let Some(caps) = show_re().captures(sql) {
            let kind = if caps[1].eq_ignore_ascii_case("tables") {
                ObjectKind::Table
            } else {
                ObjectKind::View
            };
            return self.show(kind, &caps[2]).await;
        }

        if let Some(caps) = except_count_re().captures(sql) {
            return self.except_count(&caps[1], &caps[2], &caps[3]).await;
        }

        Err(QueryError::Execution(format!(
            "SQL compilation error: unsupported statement: {}",
            normalize_sql(sql)
        )))
    }

    async fn check_failures(&self, sql: &str) -> Result<(), QueryError> {
        let failures = self.failures.read().await;

        if let Some(error) = failures.queries.get(&normalize_sql(sql)) {
            return Err(error.clone());
        }

        let upper = sql.to_uppercase();
        let referenced: HashSet<&str> = upper
            .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
            .collect();
        for (fqn, error) in &failures.objects {
            if referenced.contains(fqn.as_str()) {
                return Err(error.clone());
            }
        }

        Ok(())
    }

    async fn show(&self, kind: ObjectKind, container: &str) -> Result<ResultSet, QueryError> {
        let containers = self.containers.read().await;
        let container = container.to_uppercase();
        let objects = containers.get(&container).ok_or_else(|| {
            QueryError::ObjectNotFound(format!(
                "Database '{}' does not exist or not authorized.",
                container
            ))
        })?;

        let columns = ["created_on", "name", "database_name", "schema_name", "kind"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        let kind_label = match kind {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
        };

        let rows = objects
            .iter()
            .filter(|(_, object)| object.kind == kind)
            .map(|((schema, name), _)| {
                vec![
                    Some("2024-01-01 00:00:00.000 +0000".to_string()),
                    Some(name.clone()),
                    Some(container.clone()),
                    Some(schema.clone()),
                    Some(kind_label.to_string()),
                ]
            })
            .collect();

        Ok(ResultSet::new(columns, rows))
    }

    async fn except_count(&self, alias: &str, minuend: &str, subtrahend: &str) -> Result<ResultSet, QueryError> {
        let containers = self.containers.read().await;
        let left = lookup_object(&containers, minuend)?;
        let right = lookup_object(&containers, subtrahend)?;

        if left.columns.len() != right.columns.len() {
            return Err(QueryError::Execution(format!(
                "SQL compilation error: invalid number of result columns for set operator input branches, expected {}, got {} in branch {{2}}",
                left.columns.len(),
                right.columns.len()
            )));
        }

        let right_rows: HashSet<&Vec<String>> = right.rows.iter().collect();
        let count = left
            .rows
            .iter()
            .filter(|row| !right_rows.contains(row))
            .collect::<BTreeSet<_>>()
            .len();

        Ok(ResultSet::new(
            vec![alias.to_uppercase()],
            vec![vec![Some(count.to_string())]],
        ))
    }
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionProvider for MockWarehouse {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn connect(&self, principal: &Principal) -> Result<Box<dyn WarehouseSession>, SessionError> {
        self.simulate_latency().await;

        if let Some(error) = &self.connection_failure {
            return Err(error.clone());
        }

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_open.fetch_max(open, Ordering::SeqCst);

        tracing::debug!(principal = %principal, open, "Mock session opened");

        Ok(Box::new(MockSession {
            warehouse: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Session handed out by [`MockWarehouse`]
///
/// Closing or dropping the session releases it exactly once.
pub struct MockSession {
    warehouse: MockWarehouse,
    closed: AtomicBool,
}

impl MockSession {
    fn release(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.warehouse.stats.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl WarehouseSession for MockSession {
    async fn execute(&self, sql: &str) -> Result<ResultSet, QueryError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueryError::Network("Session is closed".to_string()));
        }
        self.warehouse.run(sql).await
    }

    async fn close(&self) -> Result<(), QueryError> {
        self.release();
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Builder for creating a MockWarehouse with predefined objects
///
/// # Example
///
/// ```rust,ignore
/// let warehouse = MockWarehouseBuilder::new()
///     .with_table("PROD", "SALES", "ORDERS", &["ID"], &[&["1"], &["2"]])
///     .with_view("PROD", "SALES", "ORDERS_V", &["ID"], &[&["1"]])
///     .with_latency(50)
///     .build();
/// ```
pub struct MockWarehouseBuilder {
    containers: Containers,
    failures: Failures,
    connection_failure: Option<SessionError>,
    latency_ms: u64,
}

impl MockWarehouseBuilder {
    pub fn new() -> Self {
        Self {
            containers: Containers::new(),
            failures: Failures::default(),
            connection_failure: None,
            latency_ms: 0,
        }
    }

    /// Register an empty container
    pub fn with_container(mut self, container: &str) -> Self {
        self.containers.entry(container.to_uppercase()).or_default();
        self
    }

    pub fn with_table(self, container: &str, schema: &str, name: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        self.with_object(container, schema, name, MockObject::new(ObjectKind::Table, columns, rows))
    }

    pub fn with_view(self, container: &str, schema: &str, name: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        self.with_object(container, schema, name, MockObject::new(ObjectKind::View, columns, rows))
    }

    pub fn with_object(mut self, container: &str, schema: &str, name: &str, object: MockObject) -> Self {
        self.containers
            .entry(container.to_uppercase())
            .or_default()
            .insert((schema.to_uppercase(), name.to_uppercase()), object);
        self
    }

    /// Fail one exact statement
    pub fn with_query_error(mut self, sql: &str, error: QueryError) -> Self {
        self.failures.queries.insert(normalize_sql(sql), error);
        self
    }

    /// Fail every statement referencing a three-part name
    pub fn with_object_error(mut self, fqn: &str, error: QueryError) -> Self {
        self.failures.objects.insert(fqn.to_uppercase(), error);
        self
    }

    /// Refuse every connection attempt
    pub fn with_connection_failure(mut self) -> Self {
        self.connection_failure = Some(SessionError::Connection("Simulated connection failure".to_string()));
        self
    }

    /// Reject every principal
    pub fn with_authentication_failure(mut self) -> Self {
        self.connection_failure = Some(SessionError::Authentication("Simulated authentication failure".to_string()));
        self
    }

    /// Delay every connection and statement
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn build(self) -> MockWarehouse {
        MockWarehouse {
            containers: Arc::new(RwLock::new(self.containers)),
            failures: Arc::new(RwLock::new(self.failures)),
            statements: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(SessionStats::default()),
            connection_failure: self.connection_failure,
            latency_ms: self.latency_ms,
        }
    }
}

impl Default for MockWarehouseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup_object<'a>(containers: &'a Containers, fqn: &str) -> Result<&'a MockObject, QueryError> {
    split_fqn(fqn)
        .and_then(|(container, schema, name)| {
            containers.get(&container).and_then(|objects| objects.get(&(schema, name)))
        })
        .ok_or_else(|| {
            QueryError::ObjectNotFound(format!(
                "Object '{}' does not exist or not authorized.",
                fqn.to_uppercase()
            ))
        })
}

fn split_fqn(fqn: &str) -> Option<(String, String, String)> {
    let mut parts = fqn.split('.');
    let container = parts.next()?.to_uppercase();
    let schema = parts.next()?.to_uppercase();
    let name = parts.next()?.to_uppercase();
    if parts.next().is_some() {
        return None;
    }
    Some((container, schema, name))
}

fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn show_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*show\s+(tables|views)\s+in\s+database\s+([A-Za-z0-9_$]+)\s*;?\s*$")
            .expect("valid regex")
    })
}

fn except_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)^\s*select\s+count\(\*\)\s+as\s+(\w+)\s+from\s*\(\s*select\s+\*\s+from\s+([\w$.]+)\s+except\s+select\s+\*\s+from\s+([\w$.]+)\s*\)\s*;?\s*$",
        )
        .expect("valid regex")
    })
}

fn select_one_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*select\s+1\s*;?\s*$").expect("valid regex"))
}
