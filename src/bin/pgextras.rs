//! pgextras - PostgreSQL health diagnostics from the command line.
//!
//! Usage:
//!   pgextras --dsn postgres://app@localhost/orders              # server version
//!   pgextras --dsn ... -m cache_hit index_usage                 # selected checks
//!   pgextras -m all                                             # every check, PG* env vars
//!   pgextras --list                                             # list checks

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;

use clap::{CommandFactory, FromArgMatches, Parser};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use pgextras::catalog;
use pgextras::render::render_table;
use pgextras::{ConnectConfig, PgExtrasError, Session, SessionOptions};

/// PostgreSQL health diagnostics.
#[derive(Parser)]
#[command(name = "pgextras", about = "PostgreSQL health diagnostics", version)]
struct Args {
    /// Connection string (URL or libpq key=value form).
    /// When absent, PGHOST, PGPORT, PGUSER, PGPASSWORD and PGDATABASE are used.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    dsn: Option<String>,

    /// Operations to run, in order. Use "all" to run every operation.
    #[arg(short, long, num_args = 1.., default_value = "version")]
    methods: Vec<String>,

    /// Show full query text instead of cutting it at 120 characters.
    #[arg(long)]
    no_truncate: bool,

    /// Log every SQL statement sent to the server (debug level).
    #[arg(long)]
    log_queries: bool,

    /// Connect over TLS.
    #[arg(long)]
    tls: bool,

    /// Print the list of operations and exit.
    #[arg(long)]
    list: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// `--log-queries` raises the level to DEBUG so statements are visible.
fn init_logging(verbose: u8, quiet: bool, log_queries: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 if log_queries => Level::DEBUG,
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("pgextras={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_args() -> Args {
    let matches = Args::command().after_help(catalog::listing()).get_matches();
    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn run(args: &Args) -> Result<(), PgExtrasError> {
    let config = match &args.dsn {
        Some(dsn) => ConnectConfig::from_dsn(dsn.as_str())?,
        None => ConnectConfig::from_env()?,
    }
    .with_tls(args.tls);

    let options = SessionOptions {
        truncate: !args.no_truncate,
        log_queries: args.log_queries,
    };

    let mut session = Session::connect(&config, options)?;
    session.run_named(args.methods.as_slice(), |op, result| {
        info!("{}", op);
        println!("{}", render_table(result));
    })?;
    session.close()
}

fn main() -> ExitCode {
    let args = parse_args();

    if args.list {
        print!("{}", catalog::listing());
        return ExitCode::SUCCESS;
    }

    init_logging(args.verbose, args.quiet, args.log_queries);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
