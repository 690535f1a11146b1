use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rustmemodoc::snapshot::snapshot_file_name;
use rustmemodoc::{FsSnapshotStorage, SnapshotFile, SnapshotStorage, StoreConfig, compile};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docstore-tool")]
#[command(about = "Developer tooling for RustMemoDoc collections and snapshots")]
struct Cli {
    /// JSON store configuration; `DOCSTORE_*` variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a where clause and print the condition tree as JSON
    Where { expression: String },
    /// Summarize the snapshot file of a collection
    Inspect {
        #[arg(long)]
        dir: Option<PathBuf>,
        collection: String,
    },
    /// Print the snapshot file name derived from a collection name
    FileName { collection: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Where { expression } => print_condition(&expression),
        Command::Inspect { dir, collection } => {
            let dir = match dir {
                Some(dir) => dir,
                None => load_config(cli.config)?.data_dir,
            };
            inspect(dir, &collection).await
        }
        Command::FileName { collection } => {
            println!("{}", snapshot_file_name(&collection));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<StoreConfig> {
    let base = match path {
        Some(path) => StoreConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => StoreConfig::default(),
    };
    base.with_env_overrides()
        .context("Invalid DOCSTORE_* environment override")
}

fn print_condition(expression: &str) -> Result<()> {
    let condition = compile(expression).map_err(|err| {
        anyhow!(
            "{} ({})\n  {}\n  {}^",
            err,
            err.code(),
            expression,
            " ".repeat(err.position().unwrap_or(0))
        )
    })?;
    let json = serde_json::to_string_pretty(&condition).context("Failed to render condition")?;
    println!("{json}");
    println!("-- {condition}");
    Ok(())
}

async fn inspect(dir: PathBuf, collection: &str) -> Result<()> {
    let storage = FsSnapshotStorage::new(&dir);
    let file_name = snapshot_file_name(collection);
    let bytes = storage
        .read(&file_name)
        .await
        .with_context(|| format!("Failed to read '{}'", storage.path_for(&file_name).display()))?
        .ok_or_else(|| {
            anyhow!(
                "No snapshot for '{}' at '{}'",
                collection,
                storage.path_for(&file_name).display()
            )
        })?;

    let file: SnapshotFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("Snapshot '{}' is not valid JSON", file_name))?;
    let records = file.item.as_object().map_or(0, |records| records.len());
    let created = chrono::DateTime::from_timestamp_millis(file.created_at)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| file.created_at.to_string());

    println!("File:       {}", storage.path_for(&file_name).display());
    println!("Collection: {}", file.collection);
    println!("Records:    {}", records);
    println!("Bytes:      {}", bytes.len());
    println!("Created:    {}", created);
    if file.collection != collection {
        println!("Warning: file holds '{}', not '{}'", file.collection, collection);
    }
    Ok(())
}
