use fluentdb::{default_config_path, load_config, Config, Database, Result, Value};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};

const USAGE: &str = "usage: fluentdb [config.toml] <sql> [params...]";

fn main() {
    // Logs go to stderr so stdout carries only the JSON result
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("fluentdb: {e}");
            process::exit(1);
        }
    }
}

fn run(mut args: Vec<String>) -> std::result::Result<String, String> {
    let explicit_config = match args.first() {
        Some(first) if first.ends_with(".toml") => Some(PathBuf::from(args.remove(0))),
        _ => None,
    };
    if args.is_empty() {
        return Err(USAGE.to_string());
    }
    let sql = args.remove(0);
    let params: Vec<Value> = args.iter().map(|arg| parse_param(arg)).collect();

    let config = resolve_config(explicit_config).map_err(|e| e.to_string())?;
    let mut db = Database::from_config(&config).map_err(|e| e.to_string())?;
    info!(connection = db.connection_name(), "running statement");

    let output = db
        .as_json()
        .raw_query(&sql, &params)
        .map_err(|e| e.to_string())?;
    debug!(rows = db.count(), "statement finished");
    Ok(output.into_json().unwrap_or_default())
}

/// The explicit file, else the per-user config file, else one in-memory database.
fn resolve_config(explicit: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_path() {
        Some(path) if path.exists() => load_config(path),
        _ => Ok(Config {
            connections: vec![fluentdb::ConnectionConfig::memory("default")],
            ..Config::default()
        }),
    }
}

/// Integers and floats bind as numbers, `NULL` as null, anything else as text.
fn parse_param(arg: &str) -> Value {
    if arg == "NULL" {
        Value::Null
    } else if let Ok(i) = arg.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = arg.parse::<f64>() {
        Value::Real(f)
    } else {
        Value::from(arg)
    }
}
