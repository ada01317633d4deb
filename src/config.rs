//! Connection settings.

use crate::error::PgExtrasError;

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    connection_string: String,
    /// Negotiate TLS via the platform's native TLS library.
    pub tls: bool,
}

impl ConnectConfig {
    /// Uses an explicit DSN (URL or libpq `key=value` form) verbatim.
    pub fn from_dsn(dsn: impl Into<String>) -> Result<Self, PgExtrasError> {
        let connection_string = dsn.into();
        if connection_string.trim().is_empty() {
            return Err(PgExtrasError::Config("empty DSN".to_string()));
        }
        Ok(Self {
            connection_string,
            tls: false,
        })
    }

    /// Builds a connection string from standard environment variables:
    /// - PGHOST (default: localhost)
    /// - PGPORT (default: 5432)
    /// - PGUSER (default: $USER)
    /// - PGPASSWORD (default: empty)
    /// - PGDATABASE (default: same as PGUSER)
    pub fn from_env() -> Result<Self, PgExtrasError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PgExtrasError> {
        let user = lookup("PGUSER")
            .or_else(|| lookup("USER"))
            .ok_or_else(|| PgExtrasError::Config("PGUSER or USER not set".to_string()))?;

        let host = lookup("PGHOST").unwrap_or_else(|| "localhost".to_string());
        let port = lookup("PGPORT").unwrap_or_else(|| "5432".to_string());
        let password = lookup("PGPASSWORD").unwrap_or_default();
        let database = lookup("PGDATABASE").unwrap_or_else(|| user.clone());

        let connection_string = if password.is_empty() {
            format!(
                "host={} port={} user={} dbname={}",
                host, port, user, database
            )
        } else {
            format!(
                "host={} port={} user={} password={} dbname={}",
                host, port, user, password, database
            )
        };

        Ok(Self {
            connection_string,
            tls: false,
        })
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_defaults_fall_back_to_user() {
        let cfg = ConnectConfig::from_lookup(lookup(&[("USER", "alice")])).unwrap();
        assert_eq!(
            cfg.connection_string(),
            "host=localhost port=5432 user=alice dbname=alice"
        );
        assert!(!cfg.tls);
    }

    #[test]
    fn env_includes_password_when_set() {
        let cfg = ConnectConfig::from_lookup(lookup(&[
            ("PGUSER", "app"),
            ("PGHOST", "db.internal"),
            ("PGPORT", "6432"),
            ("PGPASSWORD", "secret"),
            ("PGDATABASE", "orders"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.connection_string(),
            "host=db.internal port=6432 user=app password=secret dbname=orders"
        );
    }

    #[test]
    fn env_without_user_is_an_error() {
        let err = ConnectConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, PgExtrasError::Config(_)));
    }

    #[test]
    fn dsn_is_used_verbatim() {
        let cfg = ConnectConfig::from_dsn("postgres://app@localhost/orders")
            .unwrap()
            .with_tls(true);
        assert_eq!(cfg.connection_string(), "postgres://app@localhost/orders");
        assert!(cfg.tls);
        assert!(ConnectConfig::from_dsn("  ").is_err());
    }
}
