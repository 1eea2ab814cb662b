use anyhow::Result;
use blockscore::{HttpTransport, Pipeline};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::EnrichArgs) -> Result<()> {
    let mut config = super::load_config(cli)?;
    if let Some(table) = &args.table { config.table_path = table.clone() }
    if let Some(blocks) = &args.blocks { config.blocks.path = blocks.clone() }
    let layers = config.select_layers(&args.layers)?;

    let transport = HttpTransport::new(&config.fetch.user_agent)?;
    let pipeline = Pipeline::with_transport(config, transport);
    let report = pipeline.run(&layers)?;

    for layer in &report.layers {
        println!(
            "{}: fetched {} (dropped {}), {} of {} blocks matched, {} hits",
            layer.name, layer.fetched, layer.dropped, layer.matched_blocks, report.blocks, layer.total_hits,
        );
    }
    println!("table written to {}", pipeline.config().table_path.display());

    Ok(())
}
