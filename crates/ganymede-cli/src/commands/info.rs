use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ganymede_core::config::ScaleLimits;
use ganymede_core::consts::{
    BITMAP_LIMIT_DIVISOR, DEFAULT_MAX_DECODE_SIZE, DEFAULT_MAX_IMAGE_MEMORY_MB, TILE_EDGE_DIVISOR,
};
use ganymede_core::decoder::{is_pnm_path, read_dimensions};
use ganymede_core::tile::grid::{ceil_div, full_sample};
use ganymede_core::viewport::Viewport;

use crate::commands::parse_size;
use crate::summary::{print_image_summary, ImageSummary};

#[derive(Args)]
pub struct InfoArgs {
    /// Input image file
    pub file: PathBuf,

    /// Window size the image is fitted into
    #[arg(long, default_value = "800x600", value_parser = parse_size)]
    pub window: (u32, u32),

    /// Largest bitmap edge the display can draw
    #[arg(long, default_value_t = DEFAULT_MAX_DECODE_SIZE)]
    pub max_decode: u32,

    /// Allocation ceiling in MiB for whole-image decodes (0 = none)
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_MEMORY_MB)]
    pub max_memory: u64,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let (width, height) = read_dimensions(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut viewport = Viewport::new(ScaleLimits::default());
    viewport.resize(args.window.0, args.window.1);
    viewport.image_ready(width, height);

    let limit = args.max_decode / BITMAP_LIMIT_DIVISOR;
    let tiled = width > limit || height > limit;
    let tile_edge = args.max_decode / TILE_EDGE_DIVISOR;
    let full = full_sample(width, height, args.window.0, args.window.1);

    let mut levels = Vec::new();
    let mut sample = full;
    while sample >= 1 && tile_edge > 0 {
        let step = tile_edge.saturating_mul(sample);
        levels.push((sample, ceil_div(width, step), ceil_div(height, step)));
        sample /= 2;
    }

    let ceiling = match args.max_memory {
        0 => "no memory ceiling".to_string(),
        mb => format!("up to {mb} MiB"),
    };
    let decoder = if is_pnm_path(&args.file) && tiled {
        "streaming PNM regions".to_string()
    } else if tiled {
        format!("in-memory regions, {ceiling}")
    } else {
        format!("whole-image decode, {ceiling}")
    };

    print_image_summary(&ImageSummary {
        path: &args.file,
        width,
        height,
        decoder: &decoder,
        window: args.window,
        fit_scale: viewport.fit_scale(),
        full_sample: full,
        tiled,
        tile_edge,
        levels,
    });

    Ok(())
}
