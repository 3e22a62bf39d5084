use clap::{Parser, ValueEnum};
use std::io::Read;
use thiserror::Error;
use treepath::{compile, EvalOptions, QueryResult, Value, ValueError, DEFAULT_MAX_DEPTH};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Yaml,
    Toml,
}

#[derive(Parser)]
#[command(name = "treepath")]
#[command(about = "Query JSON, YAML or TOML documents with JSONPath expressions")]
#[command(version)]
struct Cli {
    /// Path expression, e.g. "$.Cars[?(@.Brand == 'Honda')]"
    path: String,

    /// Document to query (reads stdin when omitted)
    file: Option<String>,

    /// Input format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Print only the matched values, as one compact JSON array
    #[arg(long = "values")]
    values: bool,

    /// Print {"values": [...], "paths": [...]} as JSON
    #[arg(long = "json", conflicts_with = "values")]
    json: bool,

    /// Longest path evaluation may produce
    #[arg(long = "max-depth", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Query(#[from] treepath::Error),
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_document(file: Option<&str>) -> Result<String, CliError> {
    match file {
        Some(file) => std::fs::read_to_string(file).map_err(|e| CliError::Read(file.to_string(), e)),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| CliError::Read("stdin".to_string(), e))?;
            Ok(buf)
        }
    }
}

fn parse_document(text: &str, format: Format) -> Result<Value, CliError> {
    let json: serde_json::Value = match format {
        Format::Json => serde_json::from_str(text)?,
        Format::Yaml => serde_yaml::from_str(text)?,
        Format::Toml => toml::from_str(text)?,
    };
    Ok(Value::from_serde_json(json)?)
}

fn render(result: &QueryResult, cli: &Cli) -> Result<String, CliError> {
    if cli.values {
        Ok(format!("{}\n", result.to_tuple().to_json()?))
    } else if cli.json {
        let values = result
            .values()
            .iter()
            .map(Value::to_serde_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("{}\n", serde_json::json!({"values": values, "paths": result.paths()})))
    } else {
        Ok(result.render()?)
    }
}

fn run(cli: &Cli) -> Result<String, CliError> {
    let path = compile(&cli.path)?;
    let text = read_document(cli.file.as_deref())?;
    let root = parse_document(&text, cli.format)?;
    let options = EvalOptions::default().with_max_depth(cli.max_depth);
    let result = path
        .evaluate_with(&root, &options)
        .map_err(treepath::Error::from)?;
    render(&result, cli)
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
