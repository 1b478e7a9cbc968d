mod cache;
pub mod grid;
mod level;

pub use cache::{DrawStats, PollSummary, TileCache};
pub use grid::{build_tile_grid, calculate_sample, ceil_div, draw_sample, full_sample, prev_pow2};
pub use level::{Tile, TileKey, TileLevel};
