use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use storyloom_sync::server::serve;
use storyloom_sync::InMemoryStore;
use tracing_subscriber::EnvFilter;

/// Development remote store for the Storyloom editor
#[derive(Parser, Debug)]
#[command(name = "storyloom-server")]
#[command(version, about)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 4010)]
    port: u16,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = format!("{}:{}", args.host, args.port);
    serve(addr.as_str(), Arc::new(InMemoryStore::new()))
        .await
        .with_context(|| format!("store server on {} stopped", addr))?;
    Ok(())
}
