//! Command-line host for the time capsule store.
//!
//! # Responsibility
//! - Resolve caller identity and database location for one invocation.
//! - Forward to `timecapsule_api` and print results.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use timecapsule_api::{init_logging, resolve_db_path, TimeCapsuleApi};
use timecapsule_core::{default_log_level, Clock, SystemClock};

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Parser)]
#[command(name = "timecapsule")]
#[command(about = "Seal messages until a future date, readable only by their creator")]
#[command(version)]
struct Cli {
    /// Database file (defaults to $TIMECAPSULE_DB_PATH or the temp dir)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long, env = "TIMECAPSULE_LOG_DIR")]
    log_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "TIMECAPSULE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check core linkage
    Ping,
    /// Seal a new capsule and print its id
    Create {
        #[arg(short, long)]
        caller: String,
        /// Open date in nanoseconds since the Unix epoch
        #[arg(long, conflicts_with = "open_in", required_unless_present = "open_in")]
        open_date: Option<u64>,
        /// Open date relative to now, in seconds
        #[arg(long)]
        open_in: Option<u64>,
        /// Messages to seal
        contents: Vec<String>,
    },
    /// Open a capsule and print its contents
    Open {
        #[arg(short, long)]
        caller: String,
        id: String,
    },
    /// Print all capsules as JSON
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String, String> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let error = init_logging(level, log_dir);
        if !error.is_empty() {
            return Err(error);
        }
    }

    let db_path = cli.db.unwrap_or_else(resolve_db_path);
    let open_store = || TimeCapsuleApi::open(&db_path);

    match cli.command {
        Command::Ping => Ok(format!(
            "timecapsule_core ping={} version={}",
            timecapsule_api::ping(),
            timecapsule_api::core_version()
        )),
        Command::Create {
            caller,
            open_date,
            open_in,
            contents,
        } => {
            let open_date = match (open_date, open_in) {
                (Some(at), _) => at,
                (None, Some(secs)) => SystemClock
                    .now()
                    .saturating_add(secs.saturating_mul(NANOS_PER_SEC)),
                (None, None) => return Err("either --open-date or --open-in is required".into()),
            };
            open_store()?.create_time_capsule(&caller, contents, open_date)
        }
        Command::Open { caller, id } => open_store()?.open_time_capsule(&caller, &id),
        Command::List => {
            let capsules = open_store()?.get_all_time_capsules()?;
            serde_json::to_string_pretty(&capsules).map_err(|err| err.to_string())
        }
    }
}
