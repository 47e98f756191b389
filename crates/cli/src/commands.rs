//! Command parsing and execution shared by the one-shot and interactive
//! front ends.

use anyhow::{bail, Context, Result};
use engine::Db;
use std::io::Write;

pub const HELP: &str = "\
Commands:
  PUT key value   Store a value (alias: SET)
  GET key         Print the value of a key
  DEL key         Delete a key
  HAS key         Print true or false
  LIST            Print every key
  MERGE           Compact immutable segments
  SYNC            Flush the active segment to disk
  STATS           Print engine counters
  HELP            Show this text
  EXIT / QUIT     Leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Del { key: String },
    Has { key: String },
    List,
    Merge,
    Sync,
    Stats,
    Help,
    Exit,
}

/// How results are rendered. The shell uses redis-style markers, the
/// one-shot tool plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Shell,
    OneShot,
}

/// Parses one command from its words. The command name is case-insensitive;
/// everything after the key of a PUT is the value, joined by single spaces.
pub fn parse(words: &[&str]) -> Result<Command> {
    let Some((name, rest)) = words.split_first() else {
        bail!("empty command");
    };

    let key = |usage: &str| -> Result<String> {
        match rest {
            [k] => Ok((*k).to_string()),
            _ => bail!("usage: {}", usage),
        }
    };
    let bare = |cmd: Command, usage: &str| -> Result<Command> {
        if rest.is_empty() {
            Ok(cmd)
        } else {
            bail!("usage: {}", usage)
        }
    };

    match name.to_uppercase().as_str() {
        "PUT" | "SET" => match rest {
            [k, v @ ..] if !v.is_empty() => Ok(Command::Put {
                key: (*k).to_string(),
                value: v.join(" "),
            }),
            _ => bail!("usage: PUT key value"),
        },
        "GET" => Ok(Command::Get { key: key("GET key")? }),
        "DEL" | "DELETE" => Ok(Command::Del { key: key("DEL key")? }),
        "HAS" => Ok(Command::Has { key: key("HAS key")? }),
        "LIST" => bare(Command::List, "LIST"),
        "MERGE" => bare(Command::Merge, "MERGE"),
        "SYNC" => bare(Command::Sync, "SYNC"),
        "STATS" => bare(Command::Stats, "STATS"),
        "HELP" => Ok(Command::Help),
        "EXIT" | "QUIT" => Ok(Command::Exit),
        other => bail!("unknown command: {}", other),
    }
}

/// Runs `cmd` against `db`, writing its output to `out`.
///
/// A missing key is not an error: it prints `(nil)` in the shell and
/// `Not Found` in one-shot mode. `Exit` is a no-op here; the caller decides
/// what leaving means.
pub fn execute<W: Write>(db: &Db, cmd: &Command, mode: Mode, out: &mut W) -> Result<()> {
    match cmd {
        Command::Put { key, value } => {
            db.put(key.as_bytes(), value.as_bytes())
                .context("put failed")?;
            writeln!(out, "OK")?;
        }
        Command::Get { key } => match db.get(key.as_bytes()) {
            Ok(v) => writeln!(out, "{}", String::from_utf8_lossy(&v))?,
            Err(e) if e.is_not_found() => match mode {
                Mode::Shell => writeln!(out, "(nil)")?,
                Mode::OneShot => writeln!(out, "Not Found")?,
            },
            Err(e) => return Err(e).context("get failed"),
        },
        Command::Del { key } => {
            db.delete(key.as_bytes()).context("del failed")?;
            writeln!(out, "OK")?;
        }
        Command::Has { key } => {
            let present = db.has(key.as_bytes()).context("has failed")?;
            writeln!(out, "{}", present)?;
        }
        Command::List => {
            let mut n = 0usize;
            db.fold(|k| -> Result<()> {
                writeln!(out, "{}", String::from_utf8_lossy(k))?;
                n += 1;
                Ok(())
            })
            .context("list failed")?;
            if mode == Mode::Shell {
                if n == 0 {
                    writeln!(out, "(empty)")?;
                } else {
                    writeln!(out, "({} keys)", n)?;
                }
            }
        }
        Command::Merge => {
            let s = db.merge().context("merge failed")?;
            writeln!(
                out,
                "OK (compacted={}, written={}, kept={}, dropped={})",
                s.segments_compacted, s.segments_written, s.records_kept, s.records_dropped
            )?;
        }
        Command::Sync => {
            db.sync().context("sync failed")?;
            writeln!(out, "OK")?;
        }
        Command::Stats => {
            let s = db.stats().context("stats failed")?;
            writeln!(out, "{:?}", s)?;
        }
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Exit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::Options;

    fn run(db: &Db, line: &str, mode: Mode) -> String {
        let words: Vec<&str> = line.split_whitespace().collect();
        let cmd = parse(&words).unwrap();
        let mut out = Vec::new();
        execute(db, &cmd, mode, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    // -------------------- Parsing --------------------

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            parse(&["set", "k", "v"]).unwrap(),
            Command::Put {
                key: "k".into(),
                value: "v".into()
            }
        );
        assert_eq!(parse(&["Get", "k"]).unwrap(), Command::Get { key: "k".into() });
        assert_eq!(parse(&["quit"]).unwrap(), Command::Exit);
    }

    #[test]
    fn put_value_keeps_spaces_between_words() {
        assert_eq!(
            parse(&["PUT", "greeting", "hello", "big", "world"]).unwrap(),
            Command::Put {
                key: "greeting".into(),
                value: "hello big world".into()
            }
        );
    }

    #[test]
    fn usage_errors() {
        for words in [
            &["PUT"][..],
            &["PUT", "k"],
            &["GET"],
            &["GET", "a", "b"],
            &["DEL"],
            &["LIST", "extra"],
        ] {
            let err = parse(words).unwrap_err().to_string();
            assert!(err.starts_with("usage:"), "{words:?}: {err}");
        }
    }

    #[test]
    fn unknown_and_empty_commands() {
        assert_eq!(
            parse(&["FROB"]).unwrap_err().to_string(),
            "unknown command: FROB"
        );
        assert!(parse(&[]).is_err());
    }

    // -------------------- Execution --------------------

    #[test]
    fn put_get_del_in_shell_mode() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path(), Options::default()).unwrap();

        assert_eq!(run(&db, "PUT k hello world", Mode::Shell), "OK\n");
        assert_eq!(run(&db, "GET k", Mode::Shell), "hello world\n");
        assert_eq!(run(&db, "HAS k", Mode::Shell), "true\n");
        assert_eq!(run(&db, "DEL k", Mode::Shell), "OK\n");
        assert_eq!(run(&db, "GET k", Mode::Shell), "(nil)\n");
        assert_eq!(run(&db, "HAS k", Mode::Shell), "false\n");
    }

    #[test]
    fn missing_key_in_one_shot_mode() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path(), Options::default()).unwrap();
        assert_eq!(run(&db, "get nothing", Mode::OneShot), "Not Found\n");
    }

    #[test]
    fn list_prints_keys_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path(), Options::default()).unwrap();
        assert_eq!(run(&db, "LIST", Mode::Shell), "(empty)\n");

        run(&db, "PUT a 1", Mode::Shell);
        run(&db, "PUT b 2", Mode::Shell);

        let shell = run(&db, "LIST", Mode::Shell);
        let mut lines: Vec<&str> = shell.lines().collect();
        assert_eq!(lines.pop(), Some("(2 keys)"));
        lines.sort();
        assert_eq!(lines, vec!["a", "b"]);

        let plain = run(&db, "list", Mode::OneShot);
        assert_eq!(plain.lines().count(), 2);
    }

    #[test]
    fn engine_errors_carry_command_context() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path(), Options::default()).unwrap();
        let long_key = "k".repeat(engine::MAX_KEY_SIZE + 1);
        let cmd = Command::Put {
            key: long_key,
            value: "v".into(),
        };

        let err = execute(&db, &cmd, Mode::Shell, &mut Vec::new()).unwrap_err();
        assert!(format!("{:#}", err).starts_with("put failed: key too large"));
    }

    #[test]
    fn merge_and_stats_report() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path(), Options::default().with_max_segment_size(1)).unwrap();
        run(&db, "PUT a 1", Mode::Shell);
        run(&db, "PUT a 2", Mode::Shell);
        run(&db, "PUT b 3", Mode::Shell);

        let merged = run(&db, "MERGE", Mode::Shell);
        assert!(merged.starts_with("OK (compacted=2"), "{merged}");
        assert_eq!(run(&db, "GET a", Mode::Shell), "2\n");

        let stats = run(&db, "STATS", Mode::Shell);
        assert!(stats.contains("keys: 2"), "{stats}");
        assert_eq!(run(&db, "SYNC", Mode::Shell), "OK\n");
    }
}
