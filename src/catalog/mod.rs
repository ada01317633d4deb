//! Catalog of diagnostic operations.
//!
//! Each [`Operation`] has a name, a one-line description, a fixed output
//! column schema and an SQL template. The set is closed: names that are not
//! listed here are rejected with [`PgExtrasError::UnknownOperation`].

mod queries;

use std::fmt;
use std::str::FromStr;

use crate::error::PgExtrasError;

pub(crate) use queries::STAT_STATEMENTS_INSTALLED;

/// Name that expands to every catalog entry.
pub const ALL: &str = "all";

/// A registered diagnostic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Bloat,
    Blocking,
    CacheHit,
    Calls,
    IndexSize,
    IndexUsage,
    Locks,
    LongRunningQueries,
    Outliers,
    Ps,
    SeqScans,
    TableIndexesSize,
    TableSize,
    TotalIndexSize,
    TotalIndexesSize,
    TotalTableSize,
    UnusedIndexes,
    VacuumStats,
    Version,
}

impl Operation {
    /// Every operation, in listing order.
    pub const ALL: &'static [Operation] = &[
        Operation::Bloat,
        Operation::Blocking,
        Operation::CacheHit,
        Operation::Calls,
        Operation::IndexSize,
        Operation::IndexUsage,
        Operation::Locks,
        Operation::LongRunningQueries,
        Operation::Outliers,
        Operation::Ps,
        Operation::SeqScans,
        Operation::TableIndexesSize,
        Operation::TableSize,
        Operation::TotalIndexSize,
        Operation::TotalIndexesSize,
        Operation::TotalTableSize,
        Operation::UnusedIndexes,
        Operation::VacuumStats,
        Operation::Version,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Bloat => "bloat",
            Operation::Blocking => "blocking",
            Operation::CacheHit => "cache_hit",
            Operation::Calls => "calls",
            Operation::IndexSize => "index_size",
            Operation::IndexUsage => "index_usage",
            Operation::Locks => "locks",
            Operation::LongRunningQueries => "long_running_queries",
            Operation::Outliers => "outliers",
            Operation::Ps => "ps",
            Operation::SeqScans => "seq_scans",
            Operation::TableIndexesSize => "table_indexes_size",
            Operation::TableSize => "table_size",
            Operation::TotalIndexSize => "total_index_size",
            Operation::TotalIndexesSize => "total_indexes_size",
            Operation::TotalTableSize => "total_table_size",
            Operation::UnusedIndexes => "unused_indexes",
            Operation::VacuumStats => "vacuum_stats",
            Operation::Version => "version",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operation::Bloat => "Table and index bloat in your database ordered by most wasteful.",
            Operation::Blocking => {
                "Queries holding locks other queries are waiting to be released."
            }
            Operation::CacheHit => {
                "Calculates your cache hit rate (effective databases are at 99% and up)."
            }
            Operation::Calls => {
                "Show 10 most frequently called queries. Requires pg_stat_statements."
            }
            Operation::IndexSize => "Show the size of indexes, descending by size.",
            Operation::IndexUsage => {
                "Calculates your index hit rate (effective databases are at 99% and up)."
            }
            Operation::Locks => "Display queries with active locks.",
            Operation::LongRunningQueries => {
                "Show all queries longer than five minutes by descending duration."
            }
            Operation::Outliers => {
                "Show 10 queries that have longest execution time in aggregate. \
                 Requires pg_stat_statements."
            }
            Operation::Ps => "View active queries with execution time.",
            Operation::SeqScans => "Show the count of sequential scans by table descending by order.",
            Operation::TableIndexesSize => {
                "Show the total size of all the indexes on each table, descending by size."
            }
            Operation::TableSize => {
                "Show the size of the tables (excluding indexes), descending by size."
            }
            Operation::TotalIndexSize => "Show the total size of all indexes.",
            Operation::TotalIndexesSize => {
                "Show the total size of all the indexes on each table, descending by size."
            }
            Operation::TotalTableSize => {
                "Show the size of the tables (including indexes), descending by size."
            }
            Operation::UnusedIndexes => {
                "Show unused and almost unused indexes, ordered by their size relative \
                 to the number of index scans."
            }
            Operation::VacuumStats => {
                "Show dead rows and whether an automatic vacuum is expected to be triggered."
            }
            Operation::Version => "Get the Postgres server version.",
        }
    }

    /// Output columns, in order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Operation::Bloat => &["type", "schemaname", "object_name", "bloat", "waste"],
            Operation::Blocking => &[
                "blocked_pid",
                "blocking_statement",
                "blocking_duration",
                "blocking_pid",
                "blocked_statement",
                "blocked_duration",
            ],
            Operation::CacheHit => &["name", "ratio"],
            Operation::Calls | Operation::Outliers => &[
                "qry",
                "exec_time",
                "prop_exec_time",
                "ncalls",
                "sync_io_time",
            ],
            Operation::IndexSize | Operation::TableSize | Operation::TotalTableSize => {
                &["name", "size"]
            }
            Operation::IndexUsage => &["relname", "percent_of_times_index_used", "rows_in_table"],
            Operation::Locks => &[
                "pid",
                "relname",
                "transactionid",
                "granted",
                "query_snippet",
                "age",
            ],
            Operation::LongRunningQueries => &["pid", "duration", "query"],
            Operation::Ps => &["pid", "source", "running_for", "waiting", "query"],
            Operation::SeqScans => &["name", "count"],
            Operation::TableIndexesSize | Operation::TotalIndexesSize => &["table", "index_size"],
            Operation::TotalIndexSize => &["size"],
            Operation::UnusedIndexes => &["table", "index", "index_size", "index_scans"],
            Operation::VacuumStats => &[
                "schema",
                "table",
                "last_vacuum",
                "last_autovacuum",
                "rowcount",
                "dead_rowcount",
                "autovacuum_threshold",
                "expect_autovacuum",
            ],
            Operation::Version => &["version"],
        }
    }

    /// Raw SQL template, possibly containing `{placeholder}`s.
    pub fn template(&self) -> &'static str {
        match self {
            Operation::Bloat => queries::BLOAT,
            Operation::Blocking => queries::BLOCKING,
            Operation::CacheHit => queries::CACHE_HIT,
            Operation::Calls => queries::CALLS,
            Operation::IndexSize => queries::INDEX_SIZE,
            Operation::IndexUsage => queries::INDEX_USAGE,
            Operation::Locks => queries::LOCKS,
            Operation::LongRunningQueries => queries::LONG_RUNNING_QUERIES,
            Operation::Outliers => queries::OUTLIERS,
            Operation::Ps => queries::PS,
            Operation::SeqScans => queries::SEQ_SCANS,
            Operation::TableIndexesSize => queries::TABLE_INDEXES_SIZE,
            Operation::TableSize => queries::TABLE_SIZE,
            Operation::TotalIndexSize => queries::TOTAL_INDEX_SIZE,
            Operation::TotalIndexesSize => queries::TOTAL_INDEXES_SIZE,
            Operation::TotalTableSize => queries::TOTAL_TABLE_SIZE,
            Operation::UnusedIndexes => queries::UNUSED_INDEXES,
            Operation::VacuumStats => queries::VACUUM_STATS,
            Operation::Version => queries::VERSION,
        }
    }

    /// Operations that read `pg_stat_statements` and degrade when it is missing.
    pub fn requires_stat_statements(&self) -> bool {
        matches!(self, Operation::Calls | Operation::Outliers)
    }
}

impl FromStr for Operation {
    type Err = PgExtrasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| PgExtrasError::UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Looks up an operation by name, returning its template and column schema.
pub fn resolve_template(
    name: &str,
) -> Result<(&'static str, &'static [&'static str]), PgExtrasError> {
    let op: Operation = name.parse()?;
    Ok((op.template(), op.columns()))
}

/// Expands a single requested name: `all` yields every operation.
pub fn expand(name: &str) -> Result<Vec<Operation>, PgExtrasError> {
    if name == ALL {
        return Ok(Operation::ALL.to_vec());
    }
    Ok(vec![name.parse()?])
}

/// Help text listing every operation with its description.
pub fn listing() -> String {
    const LEFT_COLUMN: usize = 22;

    let mut out = String::from("Operations:\n");
    for op in Operation::ALL {
        out.push_str(&format!(
            "  {:<width$}{}\n",
            op.name(),
            op.description(),
            width = LEFT_COLUMN
        ));
    }
    out.push_str(&format!(
        "  {:<width$}Run all the operations.\n",
        ALL,
        width = LEFT_COLUMN
    ));
    out
}
