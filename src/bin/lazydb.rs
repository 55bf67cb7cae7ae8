use lazydb::config::{default_config_path, load_config};
use lazydb::{ConnectionConfig, DbError, QueryHandle, QueryResult, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::debug;

const USAGE: &str = "usage: lazydb [--config PATH] <exec SQL | scalar SQL | count TABLE>";

/// What the user asked for on the command line.
#[derive(Debug, PartialEq)]
enum Command {
    Exec(String),
    Scalar(String),
    Count(String),
    Help,
}

fn main() {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("lazydb: {}", e);
        std::process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<(Option<PathBuf>, Command)> {
    let mut config_path = None;
    let mut rest = args;

    if let Some(flag) = rest.first() {
        if flag == "--config" {
            let path = rest
                .get(1)
                .ok_or_else(|| DbError::InvalidArgument("--config needs a path".to_string()))?;
            config_path = Some(PathBuf::from(path));
            rest = &rest[2..];
        }
    }

    let command = match rest {
        [cmd] if cmd == "-h" || cmd == "--help" => Command::Help,
        [cmd, arg] if cmd == "exec" => Command::Exec(arg.clone()),
        [cmd, arg] if cmd == "scalar" => Command::Scalar(arg.clone()),
        [cmd, arg] if cmd == "count" => Command::Count(arg.clone()),
        _ => return Err(DbError::InvalidArgument(USAGE.to_string())),
    };

    Ok((config_path, command))
}

/// Explicit `--config` first, then the default config file, then the environment.
fn connection_config(path: Option<PathBuf>) -> Result<ConnectionConfig> {
    if let Some(path) = path {
        return load_config(path)?.connection_config();
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            debug!("Using config file {:?}", path);
            load_config(path)?.connection_config()
        }
        _ => ConnectionConfig::from_env(),
    }
}

fn run(args: &[String]) -> Result<()> {
    let (config_path, command) = parse_args(args)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if command == Command::Help {
        writeln!(out, "{}", USAGE)?;
        return Ok(());
    }

    let mut db = QueryHandle::new(connection_config(config_path)?);

    match command {
        Command::Exec(sql) => {
            let ack = match db.execute(&sql)? {
                QueryResult::Ack(ack) => Some(*ack),
                QueryResult::Rows(_) => None,
            };
            match ack {
                Some(ack) => writeln!(out, "ok: {} row(s) affected", ack.affected_rows)?,
                None => {
                    for row in db.rows()? {
                        writeln!(out, "{}", serde_json::to_string(&row)?)?;
                    }
                }
            }
        }
        Command::Scalar(sql) => match db.scalar(&sql)? {
            Some(value) => writeln!(out, "{}", value)?,
            None => writeln!(out, "(no value)")?,
        },
        Command::Count(table) => writeln!(out, "{}", db.count(&table)?)?,
        Command::Help => {}
    }

    Ok(())
}
