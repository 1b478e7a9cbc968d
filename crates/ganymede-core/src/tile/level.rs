use crate::geometry::Rect;
use crate::pixels::PixelBuffer;

use super::grid::build_tile_grid;

/// Identifies one tile: its level's sample factor and its row-major index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub sample: u32,
    pub index: usize,
}

/// One cell of a tile grid.
#[derive(Debug)]
pub struct Tile {
    pub(crate) rect: Rect,
    pub(crate) sample: u32,
    pub(crate) pixels: Option<PixelBuffer>,
    pub(crate) loading: bool,
    pub(crate) failed: bool,
    pub(crate) visible: bool,
}

impl Tile {
    fn new(rect: Rect, sample: u32) -> Self {
        Self {
            rect,
            sample,
            pixels: None,
            loading: false,
            failed: false,
            visible: false,
        }
    }

    /// Full-resolution image rectangle covered by this tile.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn sample(&self) -> u32 {
        self.sample
    }

    pub fn pixels(&self) -> Option<&PixelBuffer> {
        self.pixels.as_ref()
    }

    pub fn is_resident(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Drop the pixels. Returns true if anything was freed.
    pub(crate) fn evict(&mut self) -> bool {
        self.pixels.take().is_some()
    }
}

/// All tiles of one sample factor, covering the image without gaps or overlaps.
#[derive(Debug)]
pub struct TileLevel {
    sample: u32,
    pub(crate) tiles: Vec<Tile>,
}

impl TileLevel {
    pub fn build(image_width: u32, image_height: u32, sample: u32, max_tile_edge: u32) -> Self {
        let tiles = build_tile_grid(image_width, image_height, sample, max_tile_edge)
            .into_iter()
            .map(|rect| Tile::new(rect, sample))
            .collect();
        Self { sample, tiles }
    }

    pub fn sample(&self) -> u32 {
        self.sample
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn resident_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_resident()).count()
    }

    pub fn loading_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.loading).count()
    }

    pub fn resident_bytes(&self) -> usize {
        self.tiles
            .iter()
            .filter_map(|t| t.pixels.as_ref())
            .map(PixelBuffer::byte_size)
            .sum()
    }

    pub(crate) fn clear_visible(&mut self) {
        for tile in &mut self.tiles {
            tile.visible = false;
        }
    }

    /// Free every tile. Returns the number of buffers freed.
    pub(crate) fn evict_all(&mut self) -> usize {
        let mut freed = 0;
        for tile in &mut self.tiles {
            if tile.evict() {
                freed += 1;
            }
        }
        freed
    }

    /// Free the tiles not marked visible by the last draw.
    pub(crate) fn evict_invisible(&mut self) -> usize {
        let mut freed = 0;
        for tile in self.tiles.iter_mut().filter(|t| !t.visible) {
            if tile.evict() {
                freed += 1;
            }
        }
        freed
    }
}
