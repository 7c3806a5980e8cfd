mod chapter_file;
mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    fingerprint, init, order, scan, serve, FingerprintArgs, InitArgs, OrderArgs, ScanArgs, ServeArgs,
};
use config::Config;
use tracing_subscriber::EnvFilter;

/// Storyloom CLI - chapter files, entity decorations and the dev store
#[derive(Parser, Debug)]
#[command(name = "storyloom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new Storyloom project
    Init(InitArgs),

    /// Decorate entity references in chapter files
    Scan(ScanArgs),

    /// Print chapter and paragraph fingerprints
    Fingerprint(FingerprintArgs),

    /// Recompute paragraph places
    Order(OrderArgs),

    /// Run the development remote store
    Serve(ServeArgs),
}

fn init_logging(cwd: &str) {
    let level = Config::load(cwd)
        .map(|config| config.log_level)
        .unwrap_or_else(|_| Config::default().log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.display().to_string(),
        Err(e) => {
            eprintln!("{} Cannot get current directory: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    init_logging(&cwd);

    let result = match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Scan(args) => scan(args, &cwd),
        Command::Fingerprint(args) => fingerprint(args, &cwd),
        Command::Order(args) => order(args, &cwd),
        Command::Serve(args) => serve(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
