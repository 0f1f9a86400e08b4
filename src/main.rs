//! # petcare CLI
//!
//! The `petcare` binary builds and maintains the knowledge-base index,
//! answers questions from the terminal, and serves the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! petcare --config ./config/petcare.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `petcare build` | Rebuild the index from every knowledge-base file |
//! | `petcare sync` | Index knowledge-base files not yet in the index |
//! | `petcare ask "<question>"` | Answer one question |
//! | `petcare status` | Show index backend, size, model, and sources |
//! | `petcare serve` | Start the HTTP server |
//!
//! Edited files are not picked up by `sync`, which matches on file path
//! only. Run `petcare build` after changing existing files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use petcare_rag::config::{self, Config};
use petcare_rag::pipeline::{RagPipeline, Startup};
use petcare_rag::{flatfile_store, logging, server, sqlite_store, store};

/// petcare: answers pet-care questions from a local knowledge base.
#[derive(Parser)]
#[command(
    name = "petcare",
    about = "Retrieval-augmented pet-care assistant over a local text knowledge base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/petcare.toml`. A missing file means all
    /// defaults.
    #[arg(long, global = true, default_value = "./config/petcare.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from scratch.
    ///
    /// Discards every stored record and re-embeds all knowledge-base files.
    /// Required after editing existing files or switching embedding models.
    Build,

    /// Index knowledge-base files that are not in the index yet.
    Sync,

    /// Answer a single question.
    Ask {
        /// The question, e.g. "How often should I walk my dog?"
        question: String,
    },

    /// Show what the index holds.
    Status,

    /// Start the HTTP server.
    ///
    /// Prepares the index (build or sync, per configuration) before binding
    /// to `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build => {
            let pipeline = RagPipeline::from_config(&cfg, Startup::Reuse).await?;
            let report = pipeline.rebuild().await.context("index build failed")?;
            println!("Build complete: {}", report);
        }
        Commands::Sync => {
            let pipeline = RagPipeline::from_config(&cfg, Startup::Reuse).await?;
            let report = pipeline
                .sync_knowledge_base()
                .await
                .context("index sync failed")?;
            println!("Sync complete: {}", report);
        }
        Commands::Ask { question } => {
            let pipeline = RagPipeline::from_config(&cfg, Startup::Prepare).await?;
            let answer = pipeline
                .answer(question.trim())
                .await
                .context("no answer available")?;
            println!("{}", answer);
        }
        Commands::Status => {
            run_status(&cfg).await?;
        }
        Commands::Serve => {
            let pipeline = RagPipeline::from_config(&cfg, Startup::Prepare).await?;
            server::run_server(&cfg, Arc::new(pipeline)).await?;
        }
    }

    Ok(())
}

async fn run_status(cfg: &Config) -> anyhow::Result<()> {
    let dir = &cfg.index.path;
    let present = match cfg.index.backend.as_str() {
        "sqlite" => sqlite_store::db_path(dir).exists(),
        "flatfile" => flatfile_store::snapshot_path(dir).exists(),
        _ => false,
    };
    println!("Index backend: {}", cfg.index.backend);
    println!("Index path:    {}", dir.display());
    if !present {
        println!("No index yet. Run `petcare build` to create it.");
        return Ok(());
    }

    let opened = store::open_index(&cfg.index).await?;
    let index = opened.index;
    println!("Records:       {}", index.count().await?);
    match index.meta().await? {
        Some(meta) => println!("Model:         {} ({} dims)", meta.model, meta.dims),
        None => println!("Model:         (none, index is empty)"),
    }
    let sources = index.sources().await?;
    println!("Sources:       {}", sources.len());
    for source in sources {
        println!("  {}", source);
    }
    Ok(())
}
