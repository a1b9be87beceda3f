#![forbid(unsafe_code)]
//! TokenChain ledger node - import blocks and inspect the trusted ledger

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenchain::blockchain::{BlockStatus, ChainManager};
use tokenchain::config::load_config;
use tokenchain::crypto::Secp256k1Provider;
use tokenchain::node::{LedgerHandle, LedgerNode};
use tokenchain::persistence::{Database, Persistence};
use tokenchain::sync::ChannelFetcher;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "tokenchain.toml")]
    config: PathBuf,
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Offers encoded block files to the ledger in the given order
    Import {
        /// Files containing one encoded block each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Shows bedrock and the trusted token ownership
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = load_config(&cli.config)?;

    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir {:?}: {}", parent, e))?;
        }
    }
    let database = Arc::new(Database::open(&config.database.path)?);

    let (fetcher, mut requests) = ChannelFetcher::new();
    tokio::spawn(async move {
        while let Some(hash) = requests.recv().await {
            warn!("Missing block {} requested; no peer transport attached", hex::encode(&hash));
        }
    });

    let mut manager = ChainManager::new(
        config.chain_params()?,
        config.genesis()?,
        Arc::new(Secp256k1Provider),
        Arc::new(fetcher),
    );
    if let Some(snapshot) = database.load_snapshot()? {
        manager.restore(snapshot)?;
    }

    let persistence: Arc<dyn Persistence> = database;
    let (handle, worker) = LedgerNode::spawn(manager, config.node.command_buffer, Some(persistence));

    let outcome = match &cli.command {
        Commands::Import { files } => import(&handle, files).await,
        Commands::Status => status(&handle).await,
    };

    handle.shutdown().await?;
    worker.await?;
    info!("Ledger node stopped");
    outcome
}

async fn import(handle: &LedgerHandle, files: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    for path in files {
        let bytes = std::fs::read(path)
            .map_err(|e| format!("Failed to read block file {}: {}", path.display(), e))?;
        let status = handle.submit_block(bytes).await?;
        let label = match status {
            BlockStatus::Received | BlockStatus::Valid => status.to_string().bright_green(),
            BlockStatus::AlreadyKnown | BlockStatus::TooOld => status.to_string().yellow(),
            BlockStatus::Unverifiable => status.to_string().bright_yellow(),
            BlockStatus::Invalid => status.to_string().red().bold(),
        };
        println!("{} {}", path.display(), label);
    }

    let bedrock = handle.bedrock().await?;
    println!();
    println!("{} {}", "Bedrock height:".bright_cyan(), bedrock.block_number);
    Ok(())
}

async fn status(handle: &LedgerHandle) -> Result<(), Box<dyn std::error::Error>> {
    let bedrock = handle.bedrock().await?;

    println!("{} {}", "Bedrock height:".bright_cyan(), bedrock.block_number);
    println!("{} {}", "Bedrock hash:  ".bright_cyan(), hex::encode(&bedrock.hash));
    println!();

    if bedrock.ownership.is_empty() {
        println!("{}", "No tokens have been issued yet.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Token").add_attribute(Attribute::Bold),
            Cell::new("Owner").add_attribute(Attribute::Bold),
        ]);
    for (token, owner) in &bedrock.ownership {
        table.add_row(vec![Cell::new(token.as_str()), Cell::new(owner.to_hex())]);
    }
    println!("{table}");
    println!("{} token(s) owned", bedrock.ownership.len());
    Ok(())
}
