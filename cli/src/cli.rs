use std::{net::SocketAddr, path::PathBuf};

/// Block accessibility scoring CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "blockscore", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Fetch remote layers and merge their counts and scores into the master table
    Enrich(EnrichArgs),

    /// Write the per-block buffer polygons as GeoJSON
    Buffers(BuffersArgs),

    /// Download the cadastral block layer into a GeoJSON block source
    DownloadBlocks(DownloadBlocksArgs),

    /// Serve the master table over HTTP
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct EnrichArgs {
    /// Only run these layers (repeatable); all configured layers by default
    #[arg(short, long = "layer")]
    pub layers: Vec<String>,

    /// Master table file, overrides the configuration
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub table: Option<PathBuf>,

    /// Block source file, overrides the configuration
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub blocks: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct BuffersArgs {
    /// Output GeoJSON file, defaults to "./manzanas_buffer.geojson"
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Block source file, overrides the configuration
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub blocks: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct DownloadBlocksArgs {
    /// Output GeoJSON file, defaults to the configured block source path
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Block layer endpoint
    #[arg(long, default_value = blockscore::BLOCKS_URL)]
    pub url: String,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: SocketAddr,

    /// Master table file, overrides the configuration
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub table: Option<PathBuf>,
}
