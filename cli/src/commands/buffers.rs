use anyhow::Result;
use blockscore::{build_buffers, write_buffers, BlockSet, Crs};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::BuffersArgs) -> Result<()> {
    let mut config = super::load_config(cli)?;
    if let Some(blocks) = &args.blocks { config.blocks.path = blocks.clone() }
    let out_path = &args.output.clone().unwrap_or("./manzanas_buffer.geojson".into());

    let blocks = BlockSet::load(&config.blocks)?;
    let metric = Crs::from_epsg(config.metric_epsg)?;
    let buffers = build_buffers(&blocks, metric, config.buffer_radius_m)?;
    write_buffers(&buffers, config.buffer_radius_m, out_path)?;

    println!("{} buffers of {} m written to {}", buffers.len(), config.buffer_radius_m, out_path.display());
    Ok(())
}
