use crate::chapter_file::{chapter_ref, find_chapter_files, read_blocks};
use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use storyloom_sync::InMemoryStore;
use tracing::warn;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the configured host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the configured port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Start empty instead of loading the chapters directory
    #[arg(long)]
    pub empty: bool,
}

/// Load every chapter file into the store; returns how many were loaded
fn seed(store: &InMemoryStore, config: &Config, cwd: &str) -> usize {
    let dir = config.get_chapters_dir(cwd);
    let files = match find_chapter_files(&dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "No chapters to seed");
            return 0;
        }
    };

    let mut loaded = 0;
    for file in files {
        match read_blocks(&file) {
            Ok(blocks) => {
                store.load_chapter(&chapter_ref(&config.story_id, &file), blocks);
                loaded += 1;
            }
            Err(e) => warn!(file = %file.display(), error = %e, "Skipping chapter file"),
        }
    }
    loaded
}

pub fn serve(args: ServeArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);

    let store = Arc::new(InMemoryStore::new());
    if !args.empty {
        let loaded = seed(&store, &config, cwd);
        println!("  {} Loaded {} chapter(s) for story {}", "✓".green(), loaded, config.story_id);
    }

    println!("{} http://{}", "🚀 Store listening on".bright_blue().bold(), addr);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(storyloom_sync::server::serve(addr.as_str(), store))
        .with_context(|| format!("store server on {} stopped", addr))
}
