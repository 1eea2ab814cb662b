use anyhow::Result;
use blockscore::{download_blocks, Crs, FeatureFetcher, HttpTransport, LayerQuery};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::DownloadBlocksArgs) -> Result<()> {
    let config = super::load_config(cli)?;
    let out_path = &args.output.clone().unwrap_or_else(|| config.blocks.path.clone());

    let mut query = LayerQuery::new(&args.url, config.fetch.page_size);
    query.out_fields = config.blocks.id_field.clone();

    let fetcher = FeatureFetcher::with_config(HttpTransport::new(&config.fetch.user_agent)?, &config.fetch);
    let metric = Crs::from_epsg(config.metric_epsg)?;
    let written = download_blocks(&fetcher, &query, &config.blocks.id_field, metric, out_path)?;

    println!("{written} blocks written to {} ({metric})", out_path.display());
    Ok(())
}
