//! # caskctl - command-line front end for the cask engine
//!
//! Runs in one of two modes:
//!
//! - **One-shot**: `caskctl <command> [args]` executes a single command and
//!   exits. Errors go to stderr with a non-zero exit status.
//! - **Shell**: `caskctl` with no arguments reads commands from stdin, one
//!   per line, until `EXIT`, `QUIT` or end of input. Errors are printed as
//!   `ERR ...` and the shell keeps going, so it can be driven from a pipe.
//!
//! ## Commands
//!
//! ```text
//! PUT key value   Insert or update a key (alias: SET)
//! GET key         Print the value, "(nil)" in the shell, "Not Found" one-shot
//! DEL key         Delete a key (writes a tombstone)
//! HAS key         Print true or false
//! LIST            Print every live key
//! MERGE           Compact immutable segments
//! SYNC            Flush the active segment to disk
//! STATS           Print engine counters
//! HELP            Show the command list
//! EXIT / QUIT     Shut down gracefully (shell only)
//! ```
//!
//! ## Configuration
//!
//! ```text
//! CASK_DB_PATH              database directory           (default: "data")
//! CASK_MAX_SEGMENT_KB       rotation threshold in KiB    (default: 10240)
//! CASK_MAX_MERGE_SEGMENT_KB merged segment size in KiB   (default: 102400)
//! CASK_SYNC                 fsync after every put        (default: "false")
//! RUST_LOG                  log filter                   (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ caskctl put name Alice
//! OK
//! $ caskctl
//! cask opened (path=data, keys=1, active_segment=0, max_segment=10240KiB)
//! > GET name
//! Alice
//! > LIST
//! name
//! (1 keys)
//! > EXIT
//! bye
//! ```

mod commands;

use anyhow::{Context, Result};
use commands::{Command, Mode};
use config::Options;
use engine::Db;
use log::{debug, warn};
use std::io::{self, BufRead, Write};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let db_path = env_or("CASK_DB_PATH", "data");
    let options = Options::from_env();
    let db = Db::open(&db_path, options).with_context(|| format!("cannot open {}", db_path))?;

    debug!("opened {} with {:?}", db_path, db.options());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        shell(&db, &db_path)?;
    } else {
        one_shot(&db, &args)?;
    }

    db.close().context("close failed")
}

fn one_shot(db: &Db, args: &[String]) -> Result<()> {
    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    let cmd = commands::parse(&words)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::execute(db, &cmd, Mode::OneShot, &mut out)?;
    out.flush()?;
    Ok(())
}

fn shell(db: &Db, db_path: &str) -> Result<()> {
    let stats = db.stats()?;
    println!(
        "cask opened (path={}, keys={}, active_segment={}, max_segment={}KiB)",
        db_path,
        stats.keys,
        stats.active_segment_id,
        db.options().max_segment_size / 1024
    );
    println!("Commands: PUT key value | GET key | DEL key | HAS key | LIST");
    println!("          MERGE | SYNC | STATS | HELP | EXIT");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write!(out, "> ")?;
    out.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if !words.is_empty() {
            match commands::parse(&words) {
                Ok(Command::Exit) => {
                    writeln!(out, "bye")?;
                    return Ok(());
                }
                Ok(cmd) => {
                    if let Err(e) = commands::execute(db, &cmd, Mode::Shell, &mut out) {
                        warn!("{:?} failed: {:#}", cmd, e);
                        writeln!(out, "ERR {:#}", e)?;
                    }
                }
                Err(e) => writeln!(out, "ERR {}", e)?,
            }
        }

        write!(out, "> ")?;
        out.flush()?;
    }

    writeln!(out)?;
    Ok(())
}
