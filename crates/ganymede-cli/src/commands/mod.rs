pub mod config;
pub mod info;
pub mod render;
pub mod tiles;

use anyhow::{bail, Context, Result};

/// Parse `800x600`.
pub fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().with_context(|| format!("bad width in '{s}'"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("bad height in '{s}'"))?;
    if w == 0 || h == 0 {
        bail!("window size must be non-zero, got '{s}'");
    }
    Ok((w, h))
}

/// Parse `X,Y`.
pub fn parse_point(s: &str) -> Result<(f32, f32)> {
    let (x, y) = s
        .split_once(',')
        .with_context(|| format!("expected X,Y, got '{s}'"))?;
    let x: f32 = x.trim().parse().with_context(|| format!("bad x in '{s}'"))?;
    let y: f32 = y.trim().parse().with_context(|| format!("bad y in '{s}'"))?;
    Ok((x, y))
}
