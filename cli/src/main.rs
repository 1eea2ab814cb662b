mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{buffers, download_blocks, enrich, serve};
use tracing_subscriber::EnvFilter;

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Enrich(args) => enrich::run(&cli, args),
        Commands::Buffers(args) => buffers::run(&cli, args),
        Commands::DownloadBlocks(args) => download_blocks::run(&cli, args),
        Commands::Serve(args) => serve::run(&cli, args),
    }
}

/// `RUST_LOG` wins; otherwise `-v` picks the level.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> { run() }
