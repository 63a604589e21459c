//! CLI binary for running the Rohr reference pipeline.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rohr_pipeline::{CastKind, Pipeline, RohrError, Value};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "rohr", version, about = "Fluent validation pipelines over JSON records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference pipeline and print its input, output and errors
    Example {
        /// JSON record to run the pipeline on (default: built-in sample)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSON lookup table for `testId` (default: built-in sample)
        #[arg(short, long)]
        lookup: Option<PathBuf>,

        /// Print the record even if validation fails
        #[arg(long)]
        lenient: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Example {
            input,
            lookup,
            lenient,
        } => {
            let valid = cmd_example(input.as_deref(), lookup.as_deref(), lenient).await?;
            if !valid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_record(path: &Path) -> anyhow::Result<Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&source)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Value::from(json))
}

fn sample_input() -> Value {
    Value::from(serde_json::json!({
        "foo": "4",
        "bar": {
            "yolo": 420,
            "trolo": { "bolo": 4 }
        },
        "testId": 1
    }))
}

fn sample_lookup() -> Value {
    Value::from(serde_json::json!([
        { "id": 0, "data": "stuff" },
        { "id": 1, "data": "more stuff" },
        { "id": 2, "data": "even more stuff" }
    ]))
}

fn reference_pipeline(input: Value, table: Value) -> Pipeline {
    Pipeline::new(input)
        .prop("foo")
        .is_string()
        .cast_to(CastKind::Integer)
        .transform(|v, _, _| Value::from(v.as_f64().unwrap_or(f64::NAN) * 2.0).into())
        .prop("bar")
        .is_object()
        .scope()
        .prop("yolo")
        .is_number()
        .cast_to(CastKind::String)
        .transform(|v, _, _| Value::from(format!("xxxNoScope{v}xxx")).into())
        .prop("trolo")
        .scope()
        .prop("bolo")
        .is_number()
        .root_scope()
        .prop("testId")
        .is_number()
        .lookup(table, "id")
        .rescope("more.nested.stuff")
        .scope()
        .prop("data")
        .is_string()
        .rename("DATA")
        .root_scope()
}

fn print_json(label: &str, value: &impl Serialize) -> anyhow::Result<()> {
    println!("{label}: {}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Returns whether the record passed validation.
async fn cmd_example(
    input: Option<&Path>,
    lookup: Option<&Path>,
    lenient: bool,
) -> anyhow::Result<bool> {
    let record = match input {
        Some(path) => load_record(path)?,
        None => sample_input(),
    };
    let table = match lookup {
        Some(path) => load_record(path)?,
        None => sample_lookup(),
    };
    tracing::info!(lenient, "running reference pipeline");
    print_json("IN", &record)?;

    let pipeline = reference_pipeline(record, table);
    if lenient {
        let resolution = pipeline.settle().await?;
        print_json("OUT", &resolution.record)?;
        if !resolution.is_valid() {
            print_json("ERR", &resolution.errors)?;
        }
        return Ok(resolution.is_valid());
    }

    match pipeline.into_result().await {
        Ok(out) => {
            print_json("OUT", &out)?;
            Ok(true)
        }
        Err(RohrError::Rejected(errors)) => {
            print_json("ERR", &errors)?;
            Ok(false)
        }
        Err(other) => Err(other.into()),
    }
}
