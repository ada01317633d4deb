//! pgextras - PostgreSQL health diagnostics.
//!
//! Runs a fixed catalog of read-only introspection queries (cache hit rate,
//! index usage, locks, bloat, sizes, vacuum statistics, slow queries) and
//! returns their results as uniform tables.
//!
//! - `catalog` — operation names, descriptions, column schemas, SQL templates
//! - `capabilities` — server version parsing and the per-session cache
//! - `resolver` — version-dependent template substitution
//! - `session` — execution engine, capability detection, degraded results
//! - `connection` — database seam (`postgres` client)
//! - `render` — text table output

pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod error;
pub mod render;
pub mod resolver;
pub mod session;
pub mod value;

pub use catalog::Operation;
pub use config::ConnectConfig;
pub use error::PgExtrasError;
pub use session::{Session, SessionOptions};
pub use value::{ResultRow, ResultSet, Value};
