pub mod buffers;
pub mod download_blocks;
pub mod enrich;
pub mod serve;

use anyhow::Result;
use blockscore::Config;

/// Load the `--config` file (or defaults).
pub(crate) fn load_config(cli: &crate::cli::Cli) -> Result<Config> {
    Config::load(cli.config.as_deref())
}
