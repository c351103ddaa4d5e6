use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stacks::library::Library;
use stacks::logging;
use stacks::vault::DiskVault;
use stacks::watch::WatchRuntime;
use stacks::LibraryConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "stacks", version, about = "Canonical library-tree management with filename healing")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error, off).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the configured log format (text, json).
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the tree from the vault, heal drifted filenames, and
    /// regenerate every codex.
    Scan {
        /// Path to the vault root.
        vault: PathBuf,
    },
    /// Watch the vault and heal out-of-band changes as they happen.
    Watch {
        /// Path to the vault root.
        vault: PathBuf,
    },
    /// Print the library's shape and any undecodable files.
    Status {
        /// Path to the vault root.
        vault: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LibraryConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => LibraryConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    logging::init_logging(Some(&config.logging))?;

    match cli.command {
        Command::Scan { vault } => scan(vault, config).await,
        Command::Watch { vault } => watch(vault, config).await,
        Command::Status { vault } => status(vault, config).await,
    }
}

fn open_library(vault: PathBuf, config: LibraryConfig) -> Result<Arc<Library>> {
    let disk = DiskVault::new(&vault)
        .with_context(|| format!("opening vault at {}", vault.display()))?;
    Ok(Arc::new(Library::new(Arc::new(disk), config)))
}

async fn scan(vault: PathBuf, config: LibraryConfig) -> Result<()> {
    let library = open_library(vault, config)?;
    let report = library.init_scan().await.context("scanning the library")?;
    println!(
        "{} section(s), {} leaf/leaves, {} drifted, {} undecodable",
        report.sections,
        report.leaves,
        report.drifted.len(),
        report.undecodable.len()
    );

    library
        .heal_drift(&report)
        .await
        .context("healing drifted filenames")?;
    for (observed, canonical) in &report.drifted {
        println!("healed: {} -> {}", observed, canonical);
    }
    for path in &report.undecodable {
        println!("quarantined: {}", path);
    }

    let codexes = library
        .rebuild_codexes()
        .await
        .context("regenerating codexes")?;
    println!("regenerated {} codex(es)", codexes);
    Ok(())
}

async fn watch(vault: PathBuf, config: LibraryConfig) -> Result<()> {
    let library = open_library(vault, config)?;
    let report = library.init_scan().await.context("scanning the library")?;
    info!(
        sections = report.sections,
        leaves = report.leaves,
        "Initial scan complete; watching for changes"
    );
    library
        .heal_drift(&report)
        .await
        .context("healing drift found by the initial scan")?;

    let events = library.subscribe_raw().context("subscribing to vault events")?;
    let runtime = WatchRuntime::new(library);
    tokio::select! {
        result = runtime.run(events) => result.context("watch loop failed")?,
        _ = tokio::signal::ctrl_c() => {
            runtime.stop();
            info!("Interrupted; shutting down");
        }
    }
    Ok(())
}

async fn status(vault: PathBuf, config: LibraryConfig) -> Result<()> {
    let library = open_library(vault, config)?;
    let report = library.init_scan().await.context("scanning the library")?;
    println!(
        "{} section(s), {} leaf/leaves",
        report.sections, report.leaves
    );
    if !report.drifted.is_empty() {
        println!("drifted ({}):", report.drifted.len());
        for (observed, canonical) in &report.drifted {
            println!("  {} -> {}", observed, canonical);
        }
    }
    if !report.undecodable.is_empty() {
        println!("undecodable ({}):", report.undecodable.len());
        for path in &report.undecodable {
            println!("  {}", path);
        }
    }
    Ok(())
}
