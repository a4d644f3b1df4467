//! Runs a script of statements against a fresh in-memory database.
//!
//! ```bash
//! minidb -f sample.sql
//! echo 'CREATE TABLE t (a INT); INSERT INTO t VALUES (1); SELECT * FROM t;' | minidb
//! RUST_LOG=minidb=debug minidb -f sample.sql
//! ```

use std::{
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use minidb::{
    Database,
    database::{Config, DuplicateTablePolicy},
    parser::split_statements,
};

#[derive(Parser, Debug)]
#[command(name = "minidb", version, about = "In-memory relational engine")]
struct Args {
    /// Script to execute; standard input when omitted
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Let CREATE TABLE replace an existing table instead of failing
    #[arg(long)]
    overwrite_tables: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    let script = match read_script(args.file.as_ref()) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut db = Database::with_config(Config {
        duplicate_tables: if args.overwrite_tables {
            DuplicateTablePolicy::Overwrite
        } else {
            DuplicateTablePolicy::Reject
        },
    });

    let mut failures = 0usize;
    for statement in split_statements(&script) {
        match db.run(&statement) {
            Ok(Some(result)) if !result.rows.is_empty() => println!("{result}"),
            Ok(_) => {}
            Err(e) => {
                failures += 1;
                error!(%statement, "{e}");
            }
        }
    }

    info!(
        tables = db.table_count(),
        heap_bytes = db.heap_size(),
        failures,
        "script finished"
    );
    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();
}

fn read_script(file: Option<&PathBuf>) -> io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut script = String::new();
            io::stdin().read_to_string(&mut script)?;
            Ok(script)
        }
    }
}
