//! List the backend database tables usable as run sources.

use std::time::Duration;

use parcelscope::config::{self, AppConfig};
use parcelscope::logging;
use parcelscope::service::ComputeClient;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let config = match config::load_or_default() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Using default settings: {err}");
            AppConfig::default()
        }
    };
    let base_url = options
        .base_url
        .unwrap_or_else(|| config.service.base_url.clone());
    let timeout = Duration::from_secs(config.service.timeout_secs);
    let client = ComputeClient::new(&base_url, timeout).map_err(|err| err.to_string())?;

    match options.fields_of {
        Some(table) => {
            let fields = client.table_fields(&table).map_err(|err| err.to_string())?;
            if fields.is_empty() {
                println!("Table {table} has no fields.");
                return Ok(());
            }
            for field in fields {
                println!("{field}");
            }
        }
        None => {
            let tables = client.list_tables().map_err(|err| err.to_string())?;
            if tables.is_empty() {
                println!("No tables available at {}", client.base_url());
                return Ok(());
            }
            for table in tables {
                println!("{table}");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct Options {
    base_url: Option<String>,
    fields_of: Option<String>,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut base_url: Option<String> = None;
    let mut fields_of: Option<String> = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--base-url" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--base-url requires a value".to_string())?;
                base_url = Some(value.clone());
            }
            "--fields" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--fields requires a table name".to_string())?;
                fields_of = Some(value.clone());
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(Some(Options { base_url, fields_of }))
}

fn help_text() -> String {
    [
        "parcelscope-tables",
        "",
        "Usage:",
        "  parcelscope-tables [--base-url <url>]          list available tables",
        "  parcelscope-tables --fields <table>            list one table's fields",
    ]
    .join("\n")
}
