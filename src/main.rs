use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod context;
mod corpus;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use context::RetrievalContext;
use semantic::{EmbeddingModel, Strategy};

/// Resolve the base directory: CLI flag, then $DEMO_RETRIEVER_BASE_PATH,
/// then ~/.local/share/demo-retriever.
fn base_path(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }

    if let Ok(path) = std::env::var("DEMO_RETRIEVER_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("Could not determine home directory")?
        .context("Home directory path is empty")?;
    Ok(home.join(".local/share/demo-retriever"))
}

fn build_context(config: &Config) -> anyhow::Result<RetrievalContext> {
    let model = EmbeddingModel::new(&config.model, config.base_path().to_path_buf())
        .context("failed to load embedding model")?;

    RetrievalContext::from_config(config, Arc::new(model)).context("failed to build indexes")
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let base_path = base_path(args.base_path)?;
    let config = Config::load_with(&base_path)
        .with_context(|| format!("failed to load config from {}", base_path.display()))?;

    match args.command {
        cli::Command::Serve { listen } => {
            let ctx = build_context(&config)?;
            let addr = listen.unwrap_or_else(|| config.listen_addr.clone());
            web::start_daemon(ctx, &addr)
        }

        cli::Command::Similarity { query, partial, k } => {
            let ctx = build_context(&config)?;
            let strategy = if partial {
                Strategy::Embedding
            } else {
                Strategy::TokenOverlap
            };
            let response = ctx.search(&query, strategy, k.unwrap_or(ctx.top_k()))?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }

        cli::Command::Mask { text, explain } => {
            let ctx = build_context(&config)?;
            println!("{}", ctx.mask(&text)?);

            if explain {
                for candidate in ctx.explain(&text)?.iter().filter(|c| c.is_tagged()) {
                    println!(
                        "  {:?} -> {} [{}] ({:.3})",
                        candidate.span,
                        candidate.placeholder.as_deref().unwrap_or_default(),
                        candidate.category.as_deref().unwrap_or_default(),
                        candidate.score
                    );
                }
            }
            Ok(())
        }
    }
}
