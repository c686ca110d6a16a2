//! Relay CLI
//!
//! Backlink queries plus rename and delete propagation over a JSON document
//! collection, as one-shot commands or as JSON-RPC tools on stdio.

mod config;
mod mcp;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::error;
use tracing_subscriber::EnvFilter;

use config::Config;
use server::Server;

/// Relay - backlinks for a linked document collection
#[derive(Parser)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Document collection snapshot (JSON)
    #[arg(long, global = true, env = "RELAY_COLLECTION")]
    collection: Option<PathBuf>,

    /// Do not write changes back to the collection
    #[arg(long, global = true)]
    no_write_back: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List linked and unlinked backlinks of a document
    Backlinks {
        document_id: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List backlinks and forward links of a document
    Links { document_id: String },

    /// Rename a document and retitle links pointing at it
    Rename {
        document_id: String,
        new_title: String,
    },

    /// Delete a document and unwrap links pointing at it
    Delete { document_id: String },

    /// Serve JSON-RPC tools on stdin/stdout
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path).await {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return ExitCode::from(2);
            }
        },
        None => Config::default(),
    };

    // Initialize logging: RUST_LOG wins, then --verbose, then the config
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(&config.log_level)
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns `Ok(false)` when the command itself reported a failure.
async fn run(cli: Cli, config: Config) -> Result<bool> {
    let collection = cli
        .collection
        .or(config.collection)
        .context("No collection given: pass --collection or set it in the config file")?;
    let write_back = config.write_back && !cli.no_write_back;
    let server = Server::load(&collection, write_back).await?;

    let (tool, arguments) = match cli.command {
        Commands::Serve => {
            mcp::serve_stdio(server).await?;
            return Ok(true);
        }
        Commands::Backlinks {
            document_id,
            json: true,
        } => {
            let backlinks = server.backlinks().get_backlinks(&document_id).await?;
            println!("{}", serde_json::to_string_pretty(&backlinks)?);
            return Ok(true);
        }
        Commands::Backlinks { document_id, .. } => {
            ("get_backlinks", json!({ "document_id": document_id }))
        }
        Commands::Links { document_id } => ("get_links", json!({ "document_id": document_id })),
        Commands::Rename {
            document_id,
            new_title,
        } => (
            "rename_document",
            json!({ "document_id": document_id, "new_title": new_title }),
        ),
        Commands::Delete { document_id } => {
            ("delete_document", json!({ "document_id": document_id }))
        }
    };

    Ok(report(&server, tool, &arguments).await)
}

async fn report(server: &Arc<Server>, tool: &str, arguments: &serde_json::Value) -> bool {
    match mcp::tools::call(server, tool, arguments).await {
        Ok(text) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            true
        }
        Err(message) => {
            eprintln!("{}", message);
            false
        }
    }
}
