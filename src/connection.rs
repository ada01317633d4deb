//! Database connection abstraction.
//!
//! The [`Connection`] trait lets the session run against a real PostgreSQL
//! server ([`PgConnection`]) or a scripted in-memory double in tests.

use postgres::{Client, NoTls};
use tracing::debug;

use crate::config::ConnectConfig;
use crate::error::{PgExtrasError, format_postgres_error};
use crate::value::{ResultRow, ResultSet, decode_cell};

/// A single blocking database connection.
pub trait Connection {
    /// Runs one statement and eagerly fetches every row, in server order.
    fn query(&mut self, statement: &str) -> Result<ResultSet, PgExtrasError>;

    /// Closes the connection. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), PgExtrasError>;

    /// Returns true once the connection has been closed or lost.
    fn is_closed(&self) -> bool;
}

/// Connection backed by the synchronous `postgres` client.
pub struct PgConnection {
    client: Option<Client>,
}

impl PgConnection {
    /// Connects using the given settings, with TLS when requested.
    pub fn connect(config: &ConnectConfig) -> Result<Self, PgExtrasError> {
        let connection_string = config.connection_string();

        let client = if config.tls {
            let connector = native_tls::TlsConnector::builder()
                .build()
                .map_err(|e| PgExtrasError::Config(format!("TLS setup failed: {}", e)))?;
            let connector = postgres_native_tls::MakeTlsConnector::new(connector);
            Client::connect(&connection_string, connector)
        } else {
            Client::connect(&connection_string, NoTls)
        }
        .map_err(|e| PgExtrasError::ConnectionError(format_postgres_error(&e)))?;

        debug!(tls = config.tls, "connected to PostgreSQL");
        Ok(Self {
            client: Some(client),
        })
    }
}

impl Connection for PgConnection {
    fn query(&mut self, statement: &str) -> Result<ResultSet, PgExtrasError> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| PgExtrasError::ConnectionError("connection is closed".to_string()))?;

        let map_err = |e: postgres::Error| {
            if e.is_closed() {
                PgExtrasError::ConnectionError(format_postgres_error(&e))
            } else {
                PgExtrasError::QueryError(format_postgres_error(&e))
            }
        };

        // Prepare first so the column names are known even when no rows come back.
        let prepared = client.prepare(statement).map_err(map_err)?;
        let columns: Vec<String> = prepared
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = client.query(&prepared, &[]).map_err(map_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(row.len());
            for idx in 0..row.len() {
                values.push(decode_cell(row, idx).map_err(map_err)?);
            }
            out.push(ResultRow::new(values));
        }

        Ok(ResultSet::new(columns, out))
    }

    fn close(&mut self) -> Result<(), PgExtrasError> {
        match self.client.take() {
            Some(client) => client
                .close()
                .map_err(|e| PgExtrasError::ConnectionError(format_postgres_error(&e))),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.client.as_ref().is_none_or(|c| c.is_closed())
    }
}
