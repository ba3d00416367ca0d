//! Warehouse sessions and catalog listing
//!
//! This crate holds the seams to the warehouse: opening sessions for a
//! principal, running statements, and enumerating the tables and views of
//! a container into a [`CatalogSnapshot`](tablerecon_core::CatalogSnapshot).
//!
//! ## Features
//!
//! Enable warehouse support via Cargo features:
//! - `snowflake` - Snowflake support
//!
//! ## Example
//!
//! ```rust,ignore
//! use tablerecon_catalog::{CatalogLister, Principal, SessionProvider, SnowflakeProvider};
//!
//! let provider = SnowflakeProvider::with_password("xy12345.us-east-1", "password");
//! let session = provider.connect(&Principal::new("analyst@example.com")).await?;
//! let snapshot = CatalogLister::default().list("PROD", session.as_ref()).await?;
//! ```

pub mod session;
pub mod lister;
pub mod snowflake;
pub mod mock;

pub use session::{Principal, SessionProvider, WarehouseSession, ResultSet, SessionError, QueryError};
pub use lister::{CatalogLister, CatalogListError, ObjectKind};
pub use snowflake::{SnowflakeProvider, SnowflakeCredentials};
pub use mock::{MockWarehouse, MockWarehouseBuilder, MockObject};
