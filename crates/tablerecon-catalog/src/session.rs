//! Warehouse session traits and tabular query results

use std::fmt;

/// Identity a session is opened for (user name or e-mail)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: String,
}

impl Principal {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user)
    }
}

/// Errors that can occur when opening a session
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that can occur when executing a statement
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    Execution(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl QueryError {
    /// Classify a raw warehouse error message
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("does not exist") || lower.contains("not found") {
            Self::ObjectNotFound(message)
        } else if lower.contains("insufficient privileges") || lower.contains("permission") {
            Self::PermissionDenied(message)
        } else {
            Self::Execution(message)
        }
    }
}

/// Rows returned by a statement, every cell rendered as text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Every value of one column
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<&str>>, QueryError> {
        let idx = self.column_index(name).ok_or_else(|| {
            QueryError::InvalidResponse(format!("Missing {} column", name))
        })?;

        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).and_then(|cell| cell.as_deref()))
            .collect())
    }

    /// First cell of the first row parsed as a non-negative count
    pub fn scalar_count(&self) -> Result<u64, QueryError> {
        let cell = self
            .rows
            .first()
            .and_then(|row| row.first())
            .ok_or_else(|| QueryError::InvalidResponse("Empty result, expected a count".to_string()))?;

        let text = cell
            .as_deref()
            .ok_or_else(|| QueryError::InvalidResponse("NULL count".to_string()))?;

        text.trim()
            .parse::<u64>()
            .map_err(|_| QueryError::InvalidResponse(format!("Non-numeric count: {}", text)))
    }
}

/// Something that opens authenticated sessions
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Get the provider name (e.g., "Snowflake")
    fn name(&self) -> &'static str;

    /// Open a ready-to-query session for a principal
    async fn connect(&self, principal: &Principal) -> Result<Box<dyn WarehouseSession>, SessionError>;
}

/// An open warehouse session able to run ad-hoc read statements
#[async_trait::async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Run one statement and return its rows
    async fn execute(&self, sql: &str) -> Result<ResultSet, QueryError>;

    /// Check that the session can still run statements
    async fn ping(&self) -> Result<(), QueryError> {
        self.execute("SELECT 1").await.map(|_| ())
    }

    /// Release server-side resources held by the session
    async fn close(&self) -> Result<(), QueryError> {
        Ok(())
    }
}
