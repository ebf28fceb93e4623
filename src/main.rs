// src/main.rs
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use uuid::Uuid;

mod catalog;
mod config;
mod db;
mod lifecycle;
mod logging;
mod reconcile;
mod s3;
#[cfg(test)]
mod test_utils;
mod version;

use crate::catalog::CatalogService;
use crate::config::Config;
use crate::db::PostgresDatabase;
use crate::lifecycle::{ArtifactManager, UploadFile};
use crate::reconcile::{ReconciliationLog, SqliteReconciliationLog};
use crate::s3::S3Storage;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.toml",
        global = true
    )]
    config: String,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload model files; the model name is the filename without its extension
    Upload {
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,

        /// Version token applied to every file
        #[arg(long)]
        version: Option<String>,
    },
    /// List stored versions, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },
    /// Download one version by record id
    Download {
        id: i64,

        /// Where to write the file; defaults to the artifact's filename
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete one version by record id
    Delete { id: i64 },
    /// Keep the newest versions of a model and delete the rest
    Cleanup {
        model_name: String,

        #[arg(long)]
        keep: i64,
    },
    /// Compare object store and metadata, optionally repairing differences
    Reconcile {
        #[arg(long, default_value = "")]
        prefix: String,

        #[arg(long)]
        repair: bool,
    },
    /// Show unresolved reconciliation items
    Pending,
    /// Mark a reconciliation item resolved after fixing it by hand
    Resolve { item_id: Uuid },
}

#[derive(Serialize)]
struct DownloadOutput<'a> {
    #[serde(flatten)]
    record: &'a db::ArtifactRecord,
    path: String,
}

type Manager = ArtifactManager<PostgresDatabase, S3Storage, SqliteReconciliationLog>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", cli.config, e);
            process::exit(1);
        }
    };

    let _log_guard = logging::init_logging(config.logging.as_ref(), cli.verbose)?;

    info!("Model Vault v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config);

    let result = match cli.command {
        Commands::Upload { files, version } => upload(config, files, version).await,
        Commands::List { page, page_size } => list(config, page, page_size).await,
        Commands::Download { id, output } => download(config, id, output).await,
        Commands::Delete { id } => delete(config, id).await,
        Commands::Cleanup { model_name, keep } => cleanup(config, &model_name, keep).await,
        Commands::Reconcile { prefix, repair } => reconcile(config, &prefix, repair).await,
        Commands::Pending => pending(config).await,
        Commands::Resolve { item_id } => resolve(config, item_id).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn upload(config: Config, paths: Vec<PathBuf>, version: Option<String>) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("Invalid file path: {}", path.display()))?
            .to_string();
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(UploadFile {
            filename,
            content: Bytes::from(content),
            version: version.clone(),
        });
    }

    let manager = initialize_manager(config).await?;
    let summary = manager.upload_batch(files).await;
    print_json(&summary)?;

    if summary.failed_count > 0 {
        bail!("{} of {} files failed to upload", summary.failed_count, paths.len());
    }
    Ok(())
}

async fn list(config: Config, page: u32, page_size: i64) -> Result<()> {
    let database = PostgresDatabase::new(&config.database)
        .await
        .context("Failed to connect to the metadata database")?;
    let catalog = CatalogService::new(database);

    let page = catalog.list_page(page, page_size).await?;
    print_json(&page)
}

async fn download(config: Config, id: i64, output: Option<PathBuf>) -> Result<()> {
    let manager = initialize_manager(config).await?;
    let artifact = manager.download(id).await?;

    let path = output.unwrap_or_else(|| Path::new(&artifact.filename).to_path_buf());
    tokio::fs::write(&path, &artifact.content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    print_json(&DownloadOutput {
        record: &artifact.record,
        path: path.display().to_string(),
    })
}

async fn delete(config: Config, id: i64) -> Result<()> {
    let manager = initialize_manager(config).await?;
    let record = manager.delete_version(id).await?;
    print_json(&record)
}

async fn cleanup(config: Config, model_name: &str, keep: i64) -> Result<()> {
    let manager = initialize_manager(config).await?;
    let summary = manager.cleanup_old_versions(model_name, keep).await?;
    print_json(&summary)?;

    if !summary.failed.is_empty() {
        bail!("{} versions could not be evicted", summary.failed.len());
    }
    Ok(())
}

async fn reconcile(config: Config, prefix: &str, repair: bool) -> Result<()> {
    let manager = initialize_manager(config).await?;
    let report = manager.reconcile(prefix, repair).await?;
    print_json(&report)
}

async fn pending(config: Config) -> Result<()> {
    let log = SqliteReconciliationLog::new(&config.reconciliation.db_path)?;
    let items = log.get_unresolved().await?;
    print_json(&items)
}

async fn resolve(config: Config, item_id: Uuid) -> Result<()> {
    let log = SqliteReconciliationLog::new(&config.reconciliation.db_path)?;
    log.mark_resolved(item_id, Utc::now())
        .await
        .with_context(|| format!("Failed to resolve reconciliation item {}", item_id))?;
    info!("Marked reconciliation item {} resolved", item_id);
    Ok(())
}

async fn initialize_manager(config: Config) -> Result<Manager> {
    let database = PostgresDatabase::new(&config.database)
        .await
        .context("Failed to connect to the metadata database")?;
    let storage = S3Storage::new(&config.s3)
        .await
        .context("Failed to configure the object store")?;
    let reconciliation_log = SqliteReconciliationLog::new(&config.reconciliation.db_path)
        .context("Failed to open the reconciliation log")?;

    let manager = ArtifactManager::new(database, storage, reconciliation_log, &config.lifecycle);

    info!("Artifact manager initialized successfully");

    Ok(manager)
}
