//! Server version parsing and per-session capability cache.
//!
//! The session fills the cache lazily: the first question about the server
//! version issues `SELECT version()`, the first question about
//! `pg_stat_statements` issues one lookup in `pg_extension`. Answers are never
//! re-validated for the lifetime of the session.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::PgExtrasError;

/// Query-text and pid columns in `pg_stat_activity` were renamed in 9.2.
pub const PG_9_2: ServerVersion = ServerVersion::from_parts(9, 2, 0);
/// `pg_stat_activity.waiting` was replaced by `wait_event` in 9.6.
pub const PG_9_6: ServerVersion = ServerVersion::from_parts(9, 6, 0);
/// `pg_stat_statements.total_time` became `total_exec_time` in 13.
pub const PG_13: ServerVersion = ServerVersion::from_parts(13, 0, 0);
/// `pg_stat_statements.blk_*_time` became `shared_blk_*_time` in 17.
pub const PG_17: ServerVersion = ServerVersion::from_parts(17, 0, 0);

/// Dotted numeric server version, e.g. `9.3.3` or `13.4`.
///
/// Ordering is component-wise with missing components treated as zero,
/// so `9.2` == `9.2.0` and `13` > `9.2.0`.
#[derive(Debug, Clone, Copy)]
pub struct ServerVersion {
    parts: [u32; 3],
    len: usize,
}

impl ServerVersion {
    pub const fn from_parts(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            parts: [major, minor, patch],
            len: 3,
        }
    }

    pub fn major(&self) -> u32 {
        self.parts[0]
    }

    pub fn at_least(&self, other: &ServerVersion) -> bool {
        *self >= *other
    }

    /// Extracts the version from `PostgreSQL <version> on <platform>`,
    /// the format of `SELECT version()`.
    pub fn parse_banner(banner: &str) -> Result<Self, PgExtrasError> {
        let err = || PgExtrasError::VersionParse(banner.to_string());

        let rest = banner.trim().strip_prefix("PostgreSQL ").ok_or_else(err)?;
        let (token, platform) = rest.split_once(" on ").ok_or_else(err)?;
        if platform.trim().is_empty() {
            return Err(err());
        }
        token.parse().map_err(|_| err())
    }
}

impl FromStr for ServerVersion {
    type Err = PgExtrasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PgExtrasError::VersionParse(s.to_string());

        let mut parts = [0u32; 3];
        let mut len = 0;
        for component in s.split('.') {
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            let n = component.parse::<u32>().map_err(|_| err())?;
            // Components past the third never decide a comparison we make.
            if len < parts.len() {
                parts[len] = n;
            }
            len += 1;
        }
        if len == 0 {
            return Err(err());
        }

        Ok(Self {
            parts,
            len: len.min(parts.len()),
        })
    }
}

impl PartialEq for ServerVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for ServerVersion {}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: Vec<String> = self.parts[..self.len].iter().map(|p| p.to_string()).collect();
        f.write_str(&shown.join("."))
    }
}

/// Lazily detected facts about the connected server.
///
/// `None` means "not asked yet". Once a field is `Some` it never changes.
#[derive(Debug, Default, Clone)]
pub struct Capabilities {
    pub(crate) server_version: Option<ServerVersion>,
    pub(crate) stat_statements: Option<bool>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_version(&self) -> Option<ServerVersion> {
        self.server_version
    }

    pub fn stat_statements(&self) -> Option<bool> {
        self.stat_statements
    }

    /// Version gates derived from the cached version, if it is known.
    pub fn dialect(&self) -> Option<Dialect> {
        self.server_version.map(Dialect::for_version)
    }
}

/// Boolean version gates used by the template resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub at_least_nine_two: bool,
    pub at_least_nine_six: bool,
    pub at_least_thirteen: bool,
    pub at_least_seventeen: bool,
}

impl Dialect {
    pub fn for_version(version: ServerVersion) -> Self {
        Self {
            at_least_nine_two: version.at_least(&PG_9_2),
            at_least_nine_six: version.at_least(&PG_9_6),
            at_least_thirteen: version.at_least(&PG_13),
            at_least_seventeen: version.at_least(&PG_17),
        }
    }
}
