//! Checks against a real PostgreSQL server.
//!
//! Skipped unless `PGEXTRAS_TEST_DSN` points at a reachable database, e.g.
//! `PGEXTRAS_TEST_DSN=postgres://postgres@localhost/postgres cargo test`.

use pgextras::capabilities::ServerVersion;
use pgextras::connection::{Connection, PgConnection};
use pgextras::resolver::truncate_expr;
use pgextras::{ConnectConfig, Operation, Session, SessionOptions, Value};

fn open_session(options: SessionOptions) -> Option<Session<PgConnection>> {
    let dsn = std::env::var("PGEXTRAS_TEST_DSN").ok()?;
    let config = ConnectConfig::from_dsn(dsn).expect("valid DSN");
    Some(Session::connect(&config, options).expect("connect to PGEXTRAS_TEST_DSN"))
}

#[test]
fn version_returns_banner() {
    let Some(mut session) = open_session(SessionOptions::default()) else {
        return;
    };

    let result = session.run(Operation::Version).unwrap();
    assert_eq!(result.columns, vec!["version".to_string()]);
    assert_eq!(result.len(), 1);

    let banner = result.first("version").and_then(Value::as_str).unwrap();
    assert!(ServerVersion::parse_banner(banner).is_ok(), "{}", banner);

    session.close().unwrap();
}

#[test]
fn truncation_cuts_long_query_text() {
    let Some(mut session) = open_session(SessionOptions::default()) else {
        return;
    };

    let long = "x".repeat(150);
    let sql = |truncate: bool| {
        format!(
            "SELECT {} AS query FROM (SELECT '{}'::text AS query) s",
            truncate_expr("query", truncate),
            long
        )
    };

    let cut = session.execute(&sql(true)).unwrap();
    let expected = format!("{}...", "x".repeat(120));
    assert_eq!(cut.first("query").and_then(Value::as_str), Some(expected.as_str()));

    let full = session.execute(&sql(false)).unwrap();
    assert_eq!(full.first("query").and_then(Value::as_str), Some(long.as_str()));

    let short = session
        .execute(&format!(
            "SELECT {} AS query FROM (SELECT 'SELECT 1'::text AS query) s",
            truncate_expr("query", true)
        ))
        .unwrap();
    assert_eq!(short.first("query").and_then(Value::as_str), Some("SELECT 1"));
}

#[test]
fn every_operation_runs_with_its_schema() {
    let Some(mut session) = open_session(SessionOptions::default()) else {
        return;
    };

    for op in Operation::ALL {
        let result = session.run(*op).unwrap();
        if op.requires_stat_statements() && result.columns == ["error"] {
            continue;
        }
        assert_eq!(result.columns, op.columns(), "{}", op);
        for row in &result.rows {
            assert_eq!(row.len(), op.columns().len(), "{}", op);
        }
    }
}

#[test]
fn connection_reports_closed_after_close() {
    let Ok(dsn) = std::env::var("PGEXTRAS_TEST_DSN") else {
        return;
    };
    let config = ConnectConfig::from_dsn(dsn).unwrap();

    let mut conn = PgConnection::connect(&config).unwrap();
    assert!(!conn.is_closed());
    conn.close().unwrap();
    assert!(conn.is_closed());
    assert!(conn.query("SELECT 1").is_err());
}
