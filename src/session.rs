//! Diagnostic session: capability detection, template resolution and execution.
//!
//! A [`Session`] owns exactly one connection and the capability cache for it.
//! Operations run strictly one after another. The connection is closed by
//! [`Session::close`] or, on any other exit path, when the session is dropped.

use tracing::{debug, info, trace, warn};

use crate::capabilities::{Capabilities, Dialect, ServerVersion};
use crate::catalog::{self, Operation, STAT_STATEMENTS_INSTALLED};
use crate::config::ConnectConfig;
use crate::connection::{Connection, PgConnection};
use crate::error::PgExtrasError;
use crate::resolver;
use crate::value::{ResultRow, ResultSet, Value};

/// Instructions shown instead of `calls`/`outliers` output when
/// `pg_stat_statements` is not installed.
pub const MISSING_EXTENSION_MESSAGE: &str = "pg_stat_statements extension needs to be installed \
     in the public schema first. This extension is only available on Postgres versions 9.2 or \
     greater. You can install it by adding pg_stat_statements to shared_preload_libraries in \
     postgresql.conf, restarting postgres and then running the following sql statement in your \
     database: CREATE EXTENSION pg_stat_statements;";

/// Per-session switches.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Cut long query text to 120 characters in `calls`, `outliers` and `ps`.
    pub truncate: bool,
    /// Log every normalized statement at debug level.
    pub log_queries: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            truncate: true,
            log_queries: false,
        }
    }
}

/// The single-row result returned when a required extension is missing.
pub fn missing_extension_result() -> ResultSet {
    ResultSet::new(
        vec!["error".to_string()],
        vec![ResultRow::new(vec![Value::from(MISSING_EXTENSION_MESSAGE)])],
    )
}

/// Collapses every whitespace run, newlines included, into a single space.
pub fn normalize_statement(statement: &str) -> String {
    statement.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct Session<C: Connection> {
    conn: C,
    caps: Capabilities,
    options: SessionOptions,
}

impl Session<PgConnection> {
    /// Opens a session on a new PostgreSQL connection.
    pub fn connect(config: &ConnectConfig, options: SessionOptions) -> Result<Self, PgExtrasError> {
        Ok(Self::new(PgConnection::connect(config)?, options))
    }
}

impl<C: Connection> Session<C> {
    pub fn new(conn: C, options: SessionOptions) -> Self {
        Self {
            conn,
            caps: Capabilities::new(),
            options,
        }
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Capabilities detected so far.
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Runs one statement after whitespace normalization.
    pub fn execute(&mut self, statement: &str) -> Result<ResultSet, PgExtrasError> {
        let sql = normalize_statement(statement);
        if self.options.log_queries {
            debug!(sql = %sql, "executing");
        } else {
            trace!(sql = %sql, "executing");
        }
        self.conn.query(&sql)
    }

    /// Server version, detected with `SELECT version()` on first use.
    pub fn server_version(&mut self) -> Result<ServerVersion, PgExtrasError> {
        if let Some(version) = self.caps.server_version {
            return Ok(version);
        }

        let result = self.execute(Operation::Version.template())?;
        let banner = result
            .first("version")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PgExtrasError::UnexpectedResult("version() returned no text".to_string())
            })?;
        let version = ServerVersion::parse_banner(banner)?;

        debug!(version = %version, "detected server version");
        self.caps.server_version = Some(version);
        Ok(version)
    }

    pub fn is_at_least_nine_two(&mut self) -> Result<bool, PgExtrasError> {
        Ok(self.dialect()?.at_least_nine_two)
    }

    pub fn is_at_least_thirteen(&mut self) -> Result<bool, PgExtrasError> {
        Ok(self.dialect()?.at_least_thirteen)
    }

    /// Version gates for the template resolver.
    pub fn dialect(&mut self) -> Result<Dialect, PgExtrasError> {
        Ok(Dialect::for_version(self.server_version()?))
    }

    /// Whether `pg_stat_statements` is installed, checked once per session.
    pub fn has_stat_statements_extension(&mut self) -> Result<bool, PgExtrasError> {
        if let Some(available) = self.caps.stat_statements {
            return Ok(available);
        }

        let result = self.execute(STAT_STATEMENTS_INSTALLED)?;
        let available = result
            .first("available")
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                PgExtrasError::UnexpectedResult(
                    "pg_stat_statements lookup returned no boolean".to_string(),
                )
            })?;

        debug!(available, "checked pg_stat_statements");
        self.caps.stat_statements = Some(available);
        Ok(available)
    }

    /// Produces the executable SQL for an operation, detecting only the
    /// capabilities its template actually needs.
    pub fn build_sql(&mut self, op: Operation) -> Result<String, PgExtrasError> {
        let template = op.template();
        if resolver::placeholders(template).is_empty() {
            return Ok(template.to_string());
        }
        let dialect = self.dialect()?;
        resolver::resolve(template, &dialect, self.options.truncate)
    }

    /// Runs one catalog operation.
    ///
    /// `calls` and `outliers` return [`missing_extension_result`] without
    /// issuing their query when `pg_stat_statements` is absent.
    pub fn run(&mut self, op: Operation) -> Result<ResultSet, PgExtrasError> {
        if op.requires_stat_statements() && !self.has_stat_statements_extension()? {
            warn!(operation = %op, "pg_stat_statements is not installed");
            return Ok(missing_extension_result());
        }

        let sql = self.build_sql(op)?;
        let result = self.execute(&sql)?;

        let expected = op.columns();
        if !result.columns.is_empty() && result.columns != expected {
            warn!(
                operation = %op,
                expected = ?expected,
                actual = ?result.columns,
                "server returned an unexpected column set"
            );
        }

        let columns = if result.columns.is_empty() {
            expected.iter().map(|c| c.to_string()).collect()
        } else {
            result.columns
        };
        Ok(ResultSet::new(columns, result.rows))
    }

    /// Runs the named operations in request order, handing each result to
    /// `on_result` before starting the next.
    ///
    /// `all` expands to the whole catalog. The first unknown name aborts the
    /// batch: operations before it have already run, none after it will.
    pub fn run_named<S, F>(&mut self, names: &[S], mut on_result: F) -> Result<(), PgExtrasError>
    where
        S: AsRef<str>,
        F: FnMut(Operation, &ResultSet),
    {
        for name in names {
            for op in catalog::expand(name.as_ref())? {
                let result = self.run(op)?;
                if result.is_empty() {
                    info!("No results found for {}.", op);
                    continue;
                }
                on_result(op, &result);
            }
        }
        Ok(())
    }

    /// Closes the connection, reporting any error from the server goodbye.
    pub fn close(mut self) -> Result<(), PgExtrasError> {
        self.conn.close()
    }

    /// True once the underlying connection is closed.
    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        if !self.conn.is_closed()
            && let Err(e) = self.conn.close()
        {
            warn!(error = %e, "failed to close connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockConnection;

    const PG_9_3: &str = "PostgreSQL 9.3.3 on x86_64-apple-darwin13.0.0";
    const PG_9_1: &str = "PostgreSQL 9.1.9 on x86_64-unknown-linux-gnu";
    const PG_13: &str = "PostgreSQL 13.4 on x86_64-pc-linux-gnu, compiled by gcc, 64-bit";

    fn session(conn: MockConnection) -> Session<MockConnection> {
        Session::new(conn, SessionOptions::default())
    }

    #[test]
    fn version_detection_is_memoized() {
        let (conn, state) = MockConnection::new();
        let mut s = session(conn.with_version(PG_9_3));

        assert!(s.is_at_least_nine_two().unwrap());
        assert!(s.is_at_least_nine_two().unwrap());
        assert!(!s.is_at_least_thirteen().unwrap());
        assert_eq!(s.server_version().unwrap().to_string(), "9.3.3");

        assert_eq!(state.count_containing("version()"), 1);
        assert_eq!(state.executed().len(), 1);
    }

    #[test]
    fn thirteen_passes_both_gates() {
        let (conn, _state) = MockConnection::new();
        let mut s = session(conn.with_version(PG_13));
        assert!(s.is_at_least_nine_two().unwrap());
        assert!(s.is_at_least_thirteen().unwrap());
    }

    #[test]
    fn unparsable_version_is_fatal_for_dependent_operations() {
        let (conn, _state) = MockConnection::new();
        let mut s = session(conn.with_version("EnterpriseDB 11 on linux"));

        let err = s.run(Operation::Ps).unwrap_err();
        assert!(matches!(err, PgExtrasError::VersionParse(_)));
        assert!(s.capabilities().server_version().is_none());
    }

    #[test]
    fn extension_check_is_memoized() {
        let (conn, state) = MockConnection::new();
        let mut s = session(conn.with_stat_statements(true));

        assert!(s.has_stat_statements_extension().unwrap());
        assert!(s.has_stat_statements_extension().unwrap());
        assert_eq!(state.count_containing("pg_extension"), 1);
    }

    #[test]
    fn calls_without_extension_degrades_to_single_error_row() {
        for op in [Operation::Calls, Operation::Outliers] {
            let (conn, state) = MockConnection::new();
            let mut s = session(conn.with_version(PG_13).with_stat_statements(false));

            let result = s.run(op).unwrap();
            assert_eq!(result.columns, vec!["error".to_string()]);
            assert_eq!(result.len(), 1);
            let message = result.first("error").and_then(Value::as_str).unwrap();
            assert!(message.contains("CREATE EXTENSION pg_stat_statements"));

            // Only the extension lookup ran.
            assert_eq!(state.executed().len(), 1);
            assert_eq!(state.count_containing("pg_extension"), 1);
        }
    }

    #[test]
    fn calls_with_extension_queries_pg_stat_statements() {
        let (conn, state) = MockConnection::new();
        let conn = conn
            .with_version(PG_13)
            .with_stat_statements(true)
            .on(
                "FROM pg_stat_statements",
                Operation::Calls.columns(),
                vec![vec![
                    Value::from("SELECT 1"),
                    Value::Null,
                    Value::from("100.0%"),
                    Value::from("3"),
                    Value::Null,
                ]],
            );
        let mut s = session(conn);

        let result = s.run(Operation::Calls).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.first("qry"), Some(&Value::from("SELECT 1")));

        let executed = state.executed();
        assert_eq!(executed.len(), 3);
        assert!(executed[2].contains("total_exec_time"));
        assert!(executed[2].contains("substr(query, 1, 120)"));
    }

    #[test]
    fn ps_on_pre_nine_two_sends_legacy_sql() {
        let (conn, state) = MockConnection::new();
        let mut s = session(conn.with_version(PG_9_1));
        s.run(Operation::Ps).unwrap();

        let sql = state.executed().pop().unwrap();
        assert!(sql.contains("procpid AS pid"));
        assert!(sql.contains("current_query <> '<IDLE>'"));
    }

    #[test]
    fn version_independent_operations_skip_detection() {
        let (conn, state) = MockConnection::new();
        let mut s = session(conn);
        s.run(Operation::CacheHit).unwrap();
        s.run(Operation::SeqScans).unwrap();

        assert_eq!(state.count_containing("version()"), 0);
        assert_eq!(state.executed().len(), 2);
    }

    #[test]
    fn empty_result_keeps_catalog_columns() {
        let (conn, _state) = MockConnection::new();
        let mut s = session(conn);
        let result = s.run(Operation::UnusedIndexes).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns, Operation::UnusedIndexes.columns());
    }

    #[test]
    fn statements_are_sent_single_spaced() {
        let (conn, state) = MockConnection::new();
        let mut s = session(conn);
        s.execute("SELECT\n    relname,\t\tseq_scan\n  FROM   pg_stat_user_tables\n")
            .unwrap();
        assert_eq!(
            state.executed(),
            vec!["SELECT relname, seq_scan FROM pg_stat_user_tables".to_string()]
        );
    }

    #[test]
    fn normalize_keeps_token_order() {
        let raw = Operation::SeqScans.template();
        let normalized = normalize_statement(raw);
        assert!(!normalized.contains('\n'));
        assert!(!normalized.contains("  "));
        assert_eq!(
            normalized.split(' ').collect::<Vec<_>>(),
            raw.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn run_named_executes_in_request_order() {
        let (conn, state) = MockConnection::new();
        let conn = conn.with_version(PG_13).on(
            "pg_stat_user_tables",
            &["name", "count"],
            vec![vec![Value::from("orders"), Value::Int(42)]],
        );
        let mut s = session(conn);

        let mut seen = Vec::new();
        s.run_named(&["version", "seq_scans"], |op, rs| seen.push((op, rs.len())))
            .unwrap();

        assert_eq!(seen, vec![(Operation::Version, 1), (Operation::SeqScans, 1)]);
        let executed = state.executed();
        assert!(executed[0].contains("version()"));
        assert!(executed[1].contains("pg_stat_user_tables"));
    }

    #[test]
    fn run_named_skips_empty_results() {
        let (conn, _state) = MockConnection::new();
        let mut s = session(conn);
        let mut seen = Vec::new();
        s.run_named(&["total_index_size"], |op, _| seen.push(op))
            .unwrap();
        assert!(seen.is_empty());
    }

    #[test]
    fn unknown_name_aborts_batch_and_closes_connection() {
        let (conn, state) = MockConnection::new();
        let mut s = session(conn.with_version(PG_13));

        let mut seen = Vec::new();
        let err = s
            .run_named(&["version", "nope", "seq_scans"], |op, _| seen.push(op))
            .unwrap_err();
        assert_eq!(err, PgExtrasError::UnknownOperation("nope".to_string()));

        // Earlier operations ran, later ones never did.
        assert_eq!(seen, vec![Operation::Version]);
        assert_eq!(state.count_containing("pg_stat_user_tables"), 0);

        assert!(!state.closed.get());
        drop(s);
        assert!(state.closed.get());
    }

    #[test]
    fn all_runs_every_operation() {
        let (conn, state) = MockConnection::new();
        let mut s = session(conn.with_version(PG_13).with_stat_statements(true));
        s.run_named(&["all"], |_, _| {}).unwrap();

        // One version lookup, one extension lookup, then one query per operation.
        assert_eq!(state.count_containing("version()"), 2);
        assert_eq!(state.count_containing("pg_extension"), 1);
        assert_eq!(state.executed().len(), Operation::ALL.len() + 2);
    }

    #[test]
    fn query_error_propagates_and_session_still_closes() {
        let (conn, state) = MockConnection::new();
        let conn = conn.fail_on(
            "pg_statio_user_indexes",
            PgExtrasError::QueryError("ERROR: permission denied".to_string()),
        );
        let mut s = session(conn);

        let err = s.run_named(&["cache_hit"], |_, _| {}).unwrap_err();
        assert!(matches!(err, PgExtrasError::QueryError(_)));
        drop(s);
        assert!(state.closed.get());
    }

    #[test]
    fn explicit_close_closes_connection() {
        let (conn, state) = MockConnection::new();
        let s = session(conn);
        assert!(!s.is_closed());
        s.close().unwrap();
        assert!(state.closed.get());
    }

    #[test]
    fn missing_extension_result_shape() {
        let rs = missing_extension_result();
        assert_eq!(rs.columns, vec!["error".to_string()]);
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.rows[0].len(), 1);
        assert!(!MISSING_EXTENSION_MESSAGE.is_empty());
    }
}
