//! groom CLI
//!
//! Usage:
//!   groom [OPTIONS] [FILES]...
//!
//! Options:
//!   -s, --set <KEY=VALUE>  Add a string value to the template data
//!   -d, --data <FILE>      Merge a JSON or TOML object into the template data
//!       --html             Escape printed values for HTML
//!   -c, --config <FILE>    Configuration file (TOML format)
//!       --ext <EXT>        Default extension for imports
//!   -e, --entry <NAME>     Execute only this template
//!   -o, --output <FILE>    Write output here instead of stdout
//!   -h, --help             Print help

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use groom::{helpers, source, Composer, Config, FlavorKind};

#[derive(Parser)]
#[command(name = "groom")]
#[command(about = "Render text templates that import other templates", version)]
struct Cli {
    /// Template files (reads stdin if none are given)
    files: Vec<PathBuf>,

    /// Add a string value to the template data
    #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// Merge a JSON or TOML object into the template data
    #[arg(short, long, value_name = "FILE")]
    data: Vec<PathBuf>,

    /// Escape printed values for HTML
    #[arg(long)]
    html: bool,

    /// Configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Default extension for imports
    #[arg(long, value_name = "EXT")]
    ext: Option<String>,

    /// Execute only this template instead of every root
    #[arg(short, long, value_name = "NAME")]
    entry: Option<String>,

    /// Write output here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {arg:?}")),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GROOM_LOG").unwrap_or_else(|_| EnvFilter::new("groom=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(message) = run(cli) {
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .map_err(|e| format!("loading config '{}': {}", path.display(), e))?,
        None => Config::default(),
    };
    if cli.html {
        config = config.with_flavor(FlavorKind::Html);
    }
    if let Some(ext) = &cli.ext {
        config = config.with_extension(ext.trim_start_matches('.'));
    }

    let data = build_data(&cli.data, &cli.set)?;

    let timeout = config.read_timeout();
    let roots = if cli.files.is_empty() {
        vec![source::read_stdin(timeout).map_err(|e| e.report())?]
    } else {
        source::read_files(&cli.files, timeout).map_err(|e| e.report())?
    };

    let composer = Composer::new(config).with_funcs(helpers::standard());
    let set = composer.compose_all(&roots).map_err(|e| e.report())?;

    let entries: Vec<&str> = match &cli.entry {
        Some(entry) => vec![entry.as_str()],
        None => roots.iter().map(|root| root.name.as_str()).collect(),
    };

    // Nothing is written unless every entry executes
    let mut buf = Vec::new();
    for entry in entries {
        composer
            .execute(&set, entry, &data, &mut buf)
            .map_err(|e| e.report())?;
    }

    match &cli.output {
        Some(path) => fs::write(path, &buf)
            .map_err(|e| format!("writing '{}': {}", path.display(), e)),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&buf)
                .and_then(|_| stdout.flush())
                .map_err(|e| format!("writing output: {}", e))
        }
    }
}

/// Build the data object from data files and `--set` pairs, later values winning
fn build_data(files: &[PathBuf], pairs: &[(String, String)]) -> Result<Value, String> {
    let mut data = Map::new();
    for path in files {
        match read_data_file(path)? {
            Value::Object(map) => data.extend(map),
            other => {
                return Err(format!(
                    "data file '{}' must hold an object, found {}",
                    path.display(),
                    groom::exec::value::kind(&other)
                ))
            }
        }
    }
    for (key, value) in pairs {
        data.insert(key.clone(), Value::String(value.clone()));
    }
    Ok(Value::Object(data))
}

fn read_data_file(path: &Path) -> Result<Value, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("reading data file '{}': {}", path.display(), e))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        let value: toml::Value = toml::from_str(&text)
            .map_err(|e| format!("parsing data file '{}': {}", path.display(), e))?;
        serde_json::to_value(value)
            .map_err(|e| format!("converting data file '{}': {}", path.display(), e))
    } else {
        serde_json::from_str(&text)
            .map_err(|e| format!("parsing data file '{}': {}", path.display(), e))
    }
}
