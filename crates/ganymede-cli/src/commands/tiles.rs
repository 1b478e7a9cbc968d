use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use ganymede_core::consts::{DEFAULT_MAX_DECODE_SIZE, TILE_EDGE_DIVISOR};
use ganymede_core::decoder::read_dimensions;
use ganymede_core::tile::grid::build_tile_grid;

use crate::summary::print_tile_grid;

#[derive(Args)]
pub struct TilesArgs {
    /// Input image file
    pub file: PathBuf,

    /// Sample factor of the level (power of two)
    #[arg(short, long, default_value_t = 1)]
    pub sample: u32,

    /// Largest bitmap edge the display can draw
    #[arg(long, default_value_t = DEFAULT_MAX_DECODE_SIZE)]
    pub max_decode: u32,
}

pub fn run(args: &TilesArgs) -> Result<()> {
    if !args.sample.is_power_of_two() {
        bail!("sample must be a power of two, got {}", args.sample);
    }
    let tile_edge = args.max_decode / TILE_EDGE_DIVISOR;
    if tile_edge == 0 {
        bail!("max decode size {} is too small", args.max_decode);
    }

    let (width, height) = read_dimensions(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let tiles = build_tile_grid(width, height, args.sample, tile_edge);
    print_tile_grid(args.sample, tile_edge, &tiles);

    Ok(())
}
