use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vdb_common::Config;
use vdb_core::snapshot::SnapshotInfo;
use vdb_core::{
    filter_batch, load_batch, parse_filter, read_snapshot_info, ChunkWriter, ChunkWriterOptions,
};

/// `name:type` pair for `check --column`
fn parse_column(s: &str) -> Result<Field, String> {
    let (name, ty) = s.split_once(':').ok_or_else(|| format!("expected name:type, got '{s}'"))?;
    if name.is_empty() {
        return Err(format!("empty column name in '{s}'"));
    }
    let data_type = match ty.to_ascii_lowercase().as_str() {
        "int8" => DataType::Int8,
        "int16" => DataType::Int16,
        "int32" | "int" => DataType::Int32,
        "int64" | "long" => DataType::Int64,
        "uint8" => DataType::UInt8,
        "uint16" => DataType::UInt16,
        "uint32" => DataType::UInt32,
        "uint64" => DataType::UInt64,
        "float32" | "float" => DataType::Float32,
        "float64" | "double" => DataType::Float64,
        "utf8" | "string" => DataType::Utf8,
        "bool" | "boolean" => DataType::Boolean,
        other => return Err(format!("unknown column type '{other}'")),
    };
    Ok(Field::new(name, data_type, true))
}

#[derive(Parser)]
#[command(name = "vdb", version, about = "Filter compiler and snapshot tool for vector tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a filter and print its canonical form
    Check {
        filter: String,
        #[arg(long = "column", value_parser = parse_column, required = true)]
        columns: Vec<Field>,
    },
    /// Print the header and chunk directory of a snapshot
    Inspect {
        path: PathBuf,
        #[arg(long)] json: bool,
    },
    /// Load a snapshot, optionally filtering it
    Load {
        path: PathBuf,
        #[arg(long)] filter: Option<String>,
        #[arg(long, default_value_t = 0)] preview: usize,
    },
    /// Write a synthetic snapshot (id, label, score); a path without an
    /// extension gets the configured snapshot extension
    Demo {
        path: PathBuf,
        #[arg(long, default_value_t = 100_000)] rows: usize,
        #[arg(long)] max_chunk_bytes: Option<u64>,
    },
    /// Print shell completions
    Completions { shell: clap_complete::Shell },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    match cli.command {
        Commands::Check { filter, columns } => run_check(&filter, columns)?,
        Commands::Inspect { path, json } => run_inspect(&path, json)?,
        Commands::Load { path, filter, preview } => run_load(&path, filter.as_deref(), preview)?,
        Commands::Demo { path, rows, max_chunk_bytes } => run_demo(&path, rows, max_chunk_bytes, &config)?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vdb", &mut std::io::stdout());
        }
    }
    Ok(())
}

fn run_check(filter: &str, columns: Vec<Field>) -> anyhow::Result<()> {
    let schema = Schema::new(columns);
    match parse_filter(&schema, filter) {
        Ok(expr) => {
            println!("{expr}");
            Ok(())
        }
        Err(e) => {
            // caret under the offending byte
            eprintln!("{filter}");
            eprintln!("{}^", " ".repeat(e.position().min(filter.len())));
            anyhow::bail!("{e}")
        }
    }
}

fn print_info(info: &SnapshotInfo) {
    println!("{:<16} {}", "Version:", info.version);
    println!("{:<16} {} bytes", "Size:", info.file_size);
    println!("{:<16} {}", "Rows:", info.total_rows);
    println!("{:<16} {}", "Chunks:", info.chunk_count);
    println!("{:<16} {} bytes", "Largest chunk:", info.largest_chunk_bytes());
    for col in &info.columns {
        let null = if col.nullable { "null" } else { "not null" };
        println!("  {:<24} {:<20} {}", col.name, col.data_type, null);
    }
    for c in &info.chunks {
        println!("  chunk {:<6} rows={:<10} bytes={:<12} xxh3={:016x}", c.index, c.row_count, c.byte_len, c.checksum);
    }
}

fn run_inspect(path: &Path, json: bool) -> anyhow::Result<()> {
    let info = read_snapshot_info(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_info(&info);
    }
    Ok(())
}

fn run_load(path: &Path, filter: Option<&str>, preview: usize) -> anyhow::Result<()> {
    let info = read_snapshot_info(path)?;
    let batch = load_batch(path, &info.schema)?;
    let batch = match filter {
        Some(text) => {
            let expr = parse_filter(&batch.schema(), text)?;
            info!(filter = %expr, columns = ?expr.columns(), "applying filter");
            filter_batch(&batch, &expr)?
        }
        None => batch,
    };
    println!("{:<16} {}", "Rows:", batch.num_rows());
    if preview > 0 {
        let head = batch.slice(0, preview.min(batch.num_rows()));
        println!("{}", pretty_format_batches(&[head])?);
    }
    Ok(())
}

fn snapshot_path(path: &Path, config: &Config) -> PathBuf {
    if path.extension().is_some() {
        return path.to_path_buf();
    }
    path.with_extension(&config.snapshot.file_extension)
}

fn run_demo(path: &Path, rows: usize, max_chunk_bytes: Option<u64>, config: &Config) -> anyhow::Result<()> {
    let path = snapshot_path(path, config);
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Utf8, true),
        Field::new("score", DataType::Float64, true),
    ]));
    let labels: StringArray = (0..rows)
        .map(|i| if i % 10 == 0 { None } else { Some(format!("item-{}", i % 1000)) })
        .collect();
    let scores: Float64Array = (0..rows).map(|i| Some((i % 997) as f64 / 10.0)).collect();
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from_iter_values(0..rows as i64)),
            Arc::new(labels),
            Arc::new(scores),
        ],
    )?;
    let mut options = ChunkWriterOptions::from(&config.snapshot);
    if let Some(limit) = max_chunk_bytes {
        options.max_chunk_bytes = limit;
    }
    let summary = ChunkWriter::new(options).write(&path, &batch)?;
    println!("{}: {}", path.display(), serde_json::to_string_pretty(&summary)?);
    Ok(())
}
