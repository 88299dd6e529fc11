use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde_json::Value as JsonValue;
use stagedb::{DatasetRegistry, StagingConfig};
use std::io::Read;
use std::path::PathBuf;

/// Stage a JSON document as relational tables and query it with SQL.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON document to stage, or `-` for stdin
    input: String,

    /// Statement to run against the staged tables (repeatable)
    #[arg(short, long = "query")]
    queries: Vec<String>,

    /// Staging configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the columns and row counts of every staged table
    #[arg(long)]
    describe: bool,
}

fn read_document(input: &str) -> Result<JsonValue> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read document from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?
    };
    serde_json::from_str(&text).context("input is not valid JSON")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => StagingConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => StagingConfig::default(),
    };

    let registry = DatasetRegistry::new(config)?;
    let document = read_document(&cli.input)?;

    let summary = registry.stage(&document).context("staging failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if cli.describe {
        let tables = registry.describe(&summary.access_id)?;
        println!("{}", serde_json::to_string_pretty(&tables)?);
    }

    for sql in &cli.queries {
        info!("Running: {}", sql);
        let result = registry
            .query(&summary.access_id, sql)
            .with_context(|| format!("query failed: {}", sql))?;
        for warning in &result.warnings {
            eprintln!("warning: {}", warning);
        }
        result.into_query_result().print();
    }

    Ok(())
}
