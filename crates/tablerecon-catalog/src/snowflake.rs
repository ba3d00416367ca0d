//! Snowflake session provider
//!
//! Opens Snowflake sessions for a principal and runs the listing and diff
//! statements through the SQL API. Required privileges:
//! - USAGE on both databases and their schemas
//! - SELECT on every table and view being compared
//!
//! ## Authentication Methods
//!
//! 1. Password authentication (username/password)
//! 2. Key-pair authentication (private key PEM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let provider = SnowflakeProvider::with_password("xy12345.us-east-1", "password")
//!     .with_warehouse("COMPUTE_WH")
//!     .with_role("ANALYST");
//!
//! let session = provider.connect(&Principal::new("analyst@example.com")).await?;
//! ```
//!
//! Reference: https://docs.snowflake.com/en/sql-reference/sql/show-tables

use crate::session::{Principal, QueryError, ResultSet, SessionError, SessionProvider, WarehouseSession};

#[cfg(feature = "snowflake")]
use snowflake_api::{QueryResult, SnowflakeApi};

#[cfg(feature = "snowflake")]
use arrow_array::cast::AsArray;

#[cfg(feature = "snowflake")]
use arrow_array::types::{Decimal128Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type};

#[cfg(feature = "snowflake")]
use arrow_array::{Array, RecordBatch};

#[cfg(feature = "snowflake")]
use arrow_schema::DataType;

/// Snowflake authentication credentials
#[derive(Clone)]
pub enum SnowflakeCredentials {
    /// Password-based authentication
    Password(String),
    /// Key-pair authentication (PEM format private key)
    PrivateKey(String),
}

impl std::fmt::Debug for SnowflakeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => write!(f, "Password(***)"),
            Self::PrivateKey(_) => write!(f, "PrivateKey(***)"),
        }
    }
}

/// Opens Snowflake sessions
#[derive(Debug, Clone)]
pub struct SnowflakeProvider {
    account: String,
    credentials: SnowflakeCredentials,
    warehouse: Option<String>,
    role: Option<String>,
}

impl SnowflakeProvider {
    /// Create a provider with password authentication
    pub fn with_password(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            credentials: SnowflakeCredentials::Password(password.into()),
            warehouse: None,
            role: None,
        }
    }

    /// Create a provider with key-pair authentication
    pub fn with_key_pair(account: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            credentials: SnowflakeCredentials::PrivateKey(private_key_pem.into()),
            warehouse: None,
            role: None,
        }
    }

    /// Set the warehouse to use
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Set the role to use
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

#[async_trait::async_trait]
impl SessionProvider for SnowflakeProvider {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    #[cfg(feature = "snowflake")]
    async fn connect(&self, principal: &Principal) -> Result<Box<dyn WarehouseSession>, SessionError> {
        tracing::info!(account = %self.account, principal = %principal, "Connecting to Snowflake");

        let api = match &self.credentials {
            SnowflakeCredentials::Password(password) => SnowflakeApi::with_password_auth(
                &self.account,
                self.warehouse.as_deref(),
                None, // database
                None, // schema
                &principal.user,
                self.role.as_deref(),
                password,
            )
            .map_err(|e| SessionError::Authentication(format!(
                "Failed to authenticate with Snowflake: {}",
                e
            )))?,
            SnowflakeCredentials::PrivateKey(private_key_pem) => SnowflakeApi::with_certificate_auth(
                &self.account,
                self.warehouse.as_deref(),
                None, // database
                None, // schema
                &principal.user,
                self.role.as_deref(),
                private_key_pem,
            )
            .map_err(|e| SessionError::Authentication(format!(
                "Failed to authenticate with key-pair: {}",
                e
            )))?,
        };

        let session = SnowflakeSession {
            api: tokio::sync::Mutex::new(Some(api)),
        };

        session
            .ping()
            .await
            .map_err(|e| SessionError::Connection(format!("Connection test failed: {}", e)))?;

        Ok(Box::new(session))
    }

    #[cfg(not(feature = "snowflake"))]
    async fn connect(&self, _principal: &Principal) -> Result<Box<dyn WarehouseSession>, SessionError> {
        Err(SessionError::Config(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string()
        ))
    }
}

/// An authenticated Snowflake session
///
/// A session dropped without `close` is closed from a background task on
/// the current runtime.
#[cfg(feature = "snowflake")]
pub struct SnowflakeSession {
    api: tokio::sync::Mutex<Option<SnowflakeApi>>,
}

#[cfg(feature = "snowflake")]
#[async_trait::async_trait]
impl WarehouseSession for SnowflakeSession {
    async fn execute(&self, sql: &str) -> Result<ResultSet, QueryError> {
        tracing::debug!(sql, "Executing statement");

        let api = self.api.lock().await;
        let api = api
            .as_ref()
            .ok_or_else(|| QueryError::Network("Session is closed".to_string()))?;
        let result = api
            .exec(sql)
            .await
            .map_err(|e| QueryError::from_message(e.to_string()))?;

        match result {
            QueryResult::Arrow(batches) => arrow_to_result_set(&batches),
            QueryResult::Json(json) => {
                let columns = json.schema.iter().map(|field| field.name.clone()).collect();
                json_rows(columns, &json.value)
            }
            QueryResult::Empty => Ok(ResultSet::default()),
        }
    }

    async fn close(&self) -> Result<(), QueryError> {
        let Some(mut api) = self.api.lock().await.take() else {
            return Ok(());
        };
        api.close_session()
            .await
            .map_err(|e| QueryError::Network(format!("Failed to close session: {}", e)))
    }
}

#[cfg(feature = "snowflake")]
impl Drop for SnowflakeSession {
    fn drop(&mut self) {
        let Some(mut api) = self.api.get_mut().take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = api.close_session().await {
                        tracing::warn!(error = %e, "Failed to close abandoned Snowflake session");
                    }
                });
            }
            Err(_) => {
                tracing::warn!("Snowflake session dropped outside a runtime; it will expire server-side");
            }
        }
    }
}

/// Flatten Arrow record batches into text cells
#[cfg(feature = "snowflake")]
fn arrow_to_result_set(batches: &[RecordBatch]) -> Result<ResultSet, QueryError> {
    let Some(first) = batches.first() else {
        return Ok(ResultSet::default());
    };

    let columns = first
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();

    let mut rows = Vec::new();
    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let mut row = Vec::with_capacity(batch.num_columns());
            for column in batch.columns() {
                row.push(arrow_cell(column.as_ref(), row_idx)?);
            }
            rows.push(row);
        }
    }

    Ok(ResultSet::new(columns, rows))
}

#[cfg(feature = "snowflake")]
fn arrow_cell(array: &dyn Array, row: usize) -> Result<Option<String>, QueryError> {
    if array.is_null(row) {
        return Ok(None);
    }

    let value = match array.data_type() {
        DataType::Utf8 => array.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => array.as_string::<i64>().value(row).to_string(),
        DataType::Boolean => array.as_boolean().value(row).to_string(),
        DataType::Int8 => array.as_primitive::<Int8Type>().value(row).to_string(),
        DataType::Int16 => array.as_primitive::<Int16Type>().value(row).to_string(),
        DataType::Int32 => array.as_primitive::<Int32Type>().value(row).to_string(),
        DataType::Int64 => array.as_primitive::<Int64Type>().value(row).to_string(),
        DataType::Float64 => array.as_primitive::<Float64Type>().value(row).to_string(),
        DataType::Decimal128(_, scale) => {
            format_decimal(array.as_primitive::<Decimal128Type>().value(row), *scale)
        }
        other => {
            return Err(QueryError::InvalidResponse(format!(
                "Unsupported result column type: {}",
                other
            )))
        }
    };

    Ok(Some(value))
}

/// Render an unscaled decimal value with `scale` fractional digits
pub fn format_decimal(unscaled: i128, scale: i8) -> String {
    if scale <= 0 {
        return (unscaled * 10i128.pow(scale.unsigned_abs() as u32)).to_string();
    }

    let scale = scale as usize;
    let sign = if unscaled < 0 { "-" } else { "" };
    let digits = format!("{:0>width$}", unscaled.unsigned_abs(), width = scale + 1);
    let (int_part, frac_part) = digits.split_at(digits.len() - scale);
    format!("{}{}.{}", sign, int_part, frac_part)
}

/// Read a JSON rowset (array of arrays of strings or nulls)
pub fn json_rows(columns: Vec<String>, value: &serde_json::Value) -> Result<ResultSet, QueryError> {
    let rows = value
        .as_array()
        .ok_or_else(|| QueryError::InvalidResponse("Expected a JSON array of rows".to_string()))?;

    let mut parsed = Vec::with_capacity(rows.len());
    for row in rows {
        let cells = row
            .as_array()
            .ok_or_else(|| QueryError::InvalidResponse("Expected each row to be a JSON array".to_string()))?;

        parsed.push(
            cells
                .iter()
                .map(|cell| match cell {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect(),
        );
    }

    Ok(ResultSet::new(columns, parsed))
}
