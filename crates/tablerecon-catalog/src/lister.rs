//! Catalog lister
//!
//! Enumerates the tables and views of one container with `SHOW TABLES` and
//! `SHOW VIEWS`, dropping administrative namespaces and skipped objects.

use crate::session::{QueryError, WarehouseSession};
use tablerecon_core::{CatalogConfig, CatalogSnapshot, ObjectIdentity};

/// Kinds of objects enumerated for a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 2] = [ObjectKind::Table, ObjectKind::View];

    /// Enumeration statement for this kind
    pub fn show_statement(&self, container: &str) -> String {
        match self {
            Self::Table => format!("SHOW TABLES IN DATABASE {}", container),
            Self::View => format!("SHOW VIEWS IN DATABASE {}", container),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "tables"),
            Self::View => write!(f, "views"),
        }
    }
}

/// Listing a container failed; the run cannot continue without it
#[derive(Debug, thiserror::Error)]
#[error("Failed to list {kind} in {container}: {source}")]
pub struct CatalogListError {
    pub container: String,
    pub kind: ObjectKind,
    #[source]
    pub source: QueryError,
}

/// Builds catalog snapshots from a live session
#[derive(Debug, Clone, Default)]
pub struct CatalogLister {
    config: CatalogConfig,
}

impl CatalogLister {
    pub fn new(config: CatalogConfig) -> Self {
        Self { config }
    }

    /// List every table and view in `container`
    pub async fn list(
        &self,
        container: &str,
        session: &dyn WarehouseSession,
    ) -> Result<CatalogSnapshot, CatalogListError> {
        tracing::info!(container, "Fetching objects list");

        let mut snapshot = CatalogSnapshot::new(container);
        for kind in ObjectKind::ALL {
            let objects = self
                .list_kind(container, kind, session)
                .await
                .map_err(|source| CatalogListError {
                    container: container.to_string(),
                    kind,
                    source,
                })?;

            tracing::debug!(container, %kind, count = objects.len(), "Listed objects");

            for object in objects {
                if !snapshot.insert(object.clone()) {
                    tracing::debug!(object = %object, "Duplicate comparison key, keeping first");
                }
            }
        }

        tracing::info!(container, objects = snapshot.len(), "Catalog listed");
        Ok(snapshot)
    }

    async fn list_kind(
        &self,
        container: &str,
        kind: ObjectKind,
        session: &dyn WarehouseSession,
    ) -> Result<Vec<ObjectIdentity>, QueryError> {
        let result = session.execute(&kind.show_statement(container)).await?;

        let databases = result.column_values("database_name")?;
        let schemas = result.column_values("schema_name")?;
        let names = result.column_values("name")?;

        let mut objects = Vec::with_capacity(result.len());
        for ((database, schema), name) in databases.into_iter().zip(schemas).zip(names) {
            let (Some(database), Some(schema), Some(name)) = (database, schema, name) else {
                return Err(QueryError::InvalidResponse(format!(
                    "Incomplete {} row returned for {}",
                    kind, container
                )));
            };

            if self.config.is_namespace_ignored(schema) {
                continue;
            }

            let object = ObjectIdentity::new(database, schema, name);
            if self.config.is_object_skipped(&object.comparison_key().to_string()) {
                tracing::debug!(object = %object, "Skipping object");
                continue;
            }

            objects.push(object);
        }

        Ok(objects)
    }
}
