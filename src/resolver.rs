//! Fills version-dependent identifiers into catalog templates.
//!
//! Substituted values come from a fixed vocabulary below, never from user
//! input, so plain string interpolation is safe here.

use crate::capabilities::Dialect;
use crate::error::PgExtrasError;

/// Query text this long or longer is cut when truncation is enabled.
pub const TRUNCATE_AT: usize = 120;

/// Appended to truncated query text.
pub const ELLIPSIS: &str = "...";

/// Column holding the statement text in `pg_stat_activity`.
pub fn query_column(dialect: &Dialect) -> &'static str {
    if dialect.at_least_nine_two {
        "query"
    } else {
        "current_query"
    }
}

/// Backend pid column in `pg_stat_activity`.
pub fn pid_column(dialect: &Dialect) -> &'static str {
    if dialect.at_least_nine_two {
        "pid"
    } else {
        "procpid"
    }
}

/// Cumulative execution time column in `pg_stat_statements`.
pub fn total_time_column(dialect: &Dialect) -> &'static str {
    if dialect.at_least_thirteen {
        "total_exec_time"
    } else {
        "total_time"
    }
}

/// Predicate excluding idle sessions from `pg_stat_activity`.
pub fn idle_filter(dialect: &Dialect) -> &'static str {
    if dialect.at_least_nine_two {
        "state <> 'idle'"
    } else {
        "current_query <> '<IDLE>'"
    }
}

/// Whether the backend waits on a lock (or any event since 9.6).
pub fn waiting_expr(dialect: &Dialect) -> &'static str {
    if dialect.at_least_nine_six {
        "wait_event IS NOT NULL"
    } else {
        "waiting"
    }
}

/// Block I/O time in `pg_stat_statements`, milliseconds.
pub fn io_time_expr(dialect: &Dialect) -> &'static str {
    if dialect.at_least_seventeen {
        "shared_blk_read_time + shared_blk_write_time"
    } else {
        "blk_read_time + blk_write_time"
    }
}

/// Wraps `column` so long values are cut to [`TRUNCATE_AT`] characters plus
/// [`ELLIPSIS`]; passes it through unchanged when `truncate` is off.
pub fn truncate_expr(column: &str, truncate: bool) -> String {
    if !truncate {
        return column.to_string();
    }
    format!(
        "CASE WHEN length({col}) < {n} THEN {col} ELSE substr({col}, 1, {n}) || '{ellipsis}' END",
        col = column,
        n = TRUNCATE_AT,
        ellipsis = ELLIPSIS
    )
}

/// Names of the `{placeholder}`s used by a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                found.push(&after[..close]);
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    found
}

/// Substitutes every placeholder in `template` for the given server dialect.
pub fn resolve(template: &str, dialect: &Dialect, truncate: bool) -> Result<String, PgExtrasError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| PgExtrasError::Template("unterminated placeholder".to_string()))?;
        let name = &after[..close];

        match name {
            "query_column" => out.push_str(query_column(dialect)),
            "pid_column" => out.push_str(pid_column(dialect)),
            "total_time" => out.push_str(total_time_column(dialect)),
            "idle_filter" => out.push_str(idle_filter(dialect)),
            "waiting" => out.push_str(waiting_expr(dialect)),
            "io_time" => out.push_str(io_time_expr(dialect)),
            "query_text" => out.push_str(&truncate_expr(query_column(dialect), truncate)),
            other => {
                return Err(PgExtrasError::Template(format!(
                    "unknown placeholder '{{{}}}'",
                    other
                )));
            }
        }

        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
