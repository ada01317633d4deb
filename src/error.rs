//! Error type shared by the catalog, capability detection and execution.

/// Errors raised while resolving or running diagnostic operations.
///
/// A missing `pg_stat_statements` extension is not an error; it is reported
/// as a regular one-row result (see [`crate::session::missing_extension_result`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgExtrasError {
    /// Requested operation name is not in the catalog.
    UnknownOperation(String),
    /// Server version string does not look like `PostgreSQL <version> on <platform>`.
    VersionParse(String),
    /// Connection could not be established or was lost.
    ConnectionError(String),
    /// Query execution failed.
    QueryError(String),
    /// Missing or invalid connection settings.
    Config(String),
    /// A catalog template references a placeholder the resolver does not know.
    Template(String),
    /// A capability query returned rows of an unexpected shape.
    UnexpectedResult(String),
}

impl std::fmt::Display for PgExtrasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PgExtrasError::UnknownOperation(name) => {
                write!(f, "unknown operation '{}' (see --list)", name)
            }
            PgExtrasError::VersionParse(raw) => {
                write!(f, "cannot parse server version from '{}'", raw)
            }
            PgExtrasError::ConnectionError(msg) => write!(f, "PostgreSQL: {}", msg),
            PgExtrasError::QueryError(msg) => write!(f, "PostgreSQL query error: {}", msg),
            PgExtrasError::Config(msg) => write!(f, "configuration error: {}", msg),
            PgExtrasError::Template(msg) => write!(f, "template error: {}", msg),
            PgExtrasError::UnexpectedResult(msg) => write!(f, "unexpected result: {}", msg),
        }
    }
}

impl std::error::Error for PgExtrasError {}

/// Formats PostgreSQL error message for display.
pub fn format_postgres_error(e: &postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        format!("{}: {}", db_error.severity(), db_error.message())
    } else {
        let msg = e.to_string();
        if msg.contains("Connection refused") {
            "connection refused".to_string()
        } else if msg.contains("password authentication failed") {
            "password authentication failed".to_string()
        } else if msg.contains("does not exist") {
            msg.split("FATAL:")
                .last()
                .unwrap_or(&msg)
                .trim()
                .to_string()
        } else {
            msg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operation_message_names_the_operation() {
        let err = PgExtrasError::UnknownOperation("cache_miss".to_string());
        assert!(err.to_string().contains("'cache_miss'"));
    }

    #[test]
    fn version_parse_message_keeps_raw_input() {
        let err = PgExtrasError::VersionParse("CockroachDB CCL v23.1".to_string());
        assert_eq!(
            err.to_string(),
            "cannot parse server version from 'CockroachDB CCL v23.1'"
        );
    }
}
