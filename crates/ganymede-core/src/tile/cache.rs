use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::decoder::SharedDecoder;
use crate::geometry::{map_rect, RectF};
use crate::render::Canvas;
use crate::scheduler::{DecodePool, DecodeResult, DecodeScheduler};

use super::grid::{draw_sample, full_sample};
use super::level::{Tile, TileKey, TileLevel};

/// What [`TileCache::poll`] applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// A result landed on the level currently on screen.
    pub invalidate: bool,
    /// The full level finished decoding during this poll.
    pub full_ready: bool,
    pub applied: usize,
    pub failed: usize,
}

/// What one [`TileCache::draw`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub sample: u32,
    /// Tiles drawn at the requested sample (or from the full level when it is the requested one).
    pub drawn: usize,
    /// Full-level tiles drawn scaled up behind missing tiles.
    pub fallback: usize,
    /// Decodes scheduled by this draw.
    pub scheduled: usize,
}

/// Multi-resolution tile cache over one region decoder.
///
/// Holds an always-resident full level, whose sample makes the whole image
/// just fill the window, and lazily built on-demand levels keyed by sample.
/// All methods run on the control thread.
#[derive(Debug)]
pub struct TileCache {
    scheduler: DecodeScheduler,
    image_width: u32,
    image_height: u32,
    max_tile_edge: u32,
    full_sample: u32,
    full: Option<TileLevel>,
    full_ready: bool,
    levels: BTreeMap<u32, TileLevel>,
    current_sample: Option<u32>,
}

impl TileCache {
    pub fn new(decoder: SharedDecoder, pool: DecodePool) -> Self {
        let image_width = decoder.width();
        let image_height = decoder.height();
        Self {
            scheduler: DecodeScheduler::new(pool, decoder),
            image_width,
            image_height,
            max_tile_edge: 0,
            full_sample: 1,
            full: None,
            full_ready: false,
            levels: BTreeMap::new(),
            current_sample: None,
        }
    }

    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    pub fn full_sample(&self) -> u32 {
        self.full_sample
    }

    /// Sample of the most recent draw.
    pub fn current_sample(&self) -> Option<u32> {
        self.current_sample
    }

    pub fn max_tile_edge(&self) -> u32 {
        self.max_tile_edge
    }

    pub fn is_full_ready(&self) -> bool {
        self.full_ready
    }

    pub fn full_level(&self) -> Option<&TileLevel> {
        self.full.as_ref()
    }

    pub fn level(&self, sample: u32) -> Option<&TileLevel> {
        self.levels.get(&sample)
    }

    /// Samples of the on-demand levels built so far.
    pub fn level_samples(&self) -> Vec<u32> {
        self.levels.keys().copied().collect()
    }

    /// Decodes still occupying a worker, including cancelled ones that have
    /// not returned yet.
    pub fn pending_decodes(&self) -> usize {
        self.scheduler.pending_count() + self.scheduler.cancelled_in_flight()
    }

    pub fn is_torn_down(&self) -> bool {
        self.scheduler.decoder().is_none()
    }

    pub fn resident_bytes(&self) -> usize {
        self.full.as_ref().map_or(0, TileLevel::resident_bytes)
            + self.levels.values().map(TileLevel::resident_bytes).sum::<usize>()
    }

    /// Rebuild the full level if the window or tile edge changes its layout.
    ///
    /// A rebuild evicts every resident tile, cancels every outstanding decode
    /// and schedules one batched decode of the new full level. Returns true if
    /// it rebuilt.
    pub fn ensure_full_level(&mut self, window_width: u32, window_height: u32, max_tile_edge: u32) -> bool {
        if window_width == 0 || window_height == 0 || max_tile_edge == 0 || self.is_torn_down() {
            return false;
        }
        let sample = full_sample(self.image_width, self.image_height, window_width, window_height);
        if self.full.is_some() && sample == self.full_sample && max_tile_edge == self.max_tile_edge {
            return false;
        }

        let freed = self.evict_everything();
        let cancelled = self.scheduler.cancel_all();
        self.levels.clear();
        self.current_sample = None;
        self.full_ready = false;
        self.full_sample = sample;
        self.max_tile_edge = max_tile_edge;

        let mut level = TileLevel::build(self.image_width, self.image_height, sample, max_tile_edge);
        let rects = level.tiles.iter().map(Tile::rect).collect();
        if self.scheduler.schedule_full_level(sample, rects) {
            for tile in &mut level.tiles {
                tile.loading = true;
            }
        }
        info!(
            sample,
            tiles = level.len(),
            window_width,
            window_height,
            freed,
            cancelled,
            "Full level rebuilt"
        );
        self.full = Some(level);
        true
    }

    /// Apply finished decodes.
    ///
    /// Also invalidates when cancelled decodes return, since their tiles can
    /// be requested again.
    pub fn poll(&mut self) -> PollSummary {
        let mut summary = PollSummary::default();
        let settled = self.scheduler.settle_cancelled();
        if settled > 0 {
            debug!(settled, "Cancelled decodes returned");
            summary.invalidate = true;
        }
        for result in self.scheduler.drain() {
            match result {
                DecodeResult::Tile { key, result } => {
                    let Some(tile) = self
                        .levels
                        .get_mut(&key.sample)
                        .and_then(|l| l.tiles.get_mut(key.index))
                    else {
                        continue;
                    };
                    tile.loading = false;
                    match result {
                        Ok(pixels) => tile.pixels = Some(pixels),
                        Err(e) => {
                            warn!(sample = key.sample, index = key.index, error = %e, "Tile decode failed");
                            tile.failed = true;
                            summary.failed += 1;
                        }
                    }
                    summary.applied += 1;
                    if Some(key.sample) == self.current_sample {
                        summary.invalidate = true;
                    }
                }
                DecodeResult::FullLevel { sample, results } => {
                    let Some(level) = self.full.as_mut().filter(|l| l.sample() == sample) else {
                        continue;
                    };
                    let mut failed = 0;
                    for (tile, result) in level.tiles.iter_mut().zip(results) {
                        match result {
                            Ok(pixels) => tile.pixels = Some(pixels),
                            Err(e) => {
                                warn!(sample, rect = %tile.rect, error = %e, "Full level tile failed");
                                tile.failed = true;
                                failed += 1;
                            }
                        }
                    }
                    for tile in &mut level.tiles {
                        tile.loading = false;
                    }
                    info!(sample, tiles = level.len(), failed, "Full level ready");
                    self.full_ready = true;
                    summary.full_ready = true;
                    summary.invalidate = true;
                    summary.applied += level.len();
                    summary.failed += failed;
                }
            }
        }
        summary
    }

    /// Draw image rectangle `src` into viewport rectangle `dst`.
    ///
    /// Tiles missing at the needed sample are backfilled from the full level
    /// and, unless `animating`, get one decode scheduled each. Ends with [`TileCache::gc`].
    pub fn draw(&mut self, canvas: &mut dyn Canvas, src: &RectF, dst: &RectF, animating: bool) -> DrawStats {
        let mut stats = DrawStats::default();
        // Nothing to draw or fall back on until the full level lands.
        let Some(full) = self.full.as_ref().filter(|_| self.full_ready) else {
            return stats;
        };
        if src.is_empty() || dst.is_empty() {
            return stats;
        }

        let sample = draw_sample(src, dst, self.full_sample);
        stats.sample = sample;

        if sample == self.full_sample {
            for tile in &full.tiles {
                if draw_tile(canvas, tile, src, dst, None) {
                    stats.drawn += 1;
                }
            }
        } else {
            let (width, height, edge) = (self.image_width, self.image_height, self.max_tile_edge);
            let level = self.levels.entry(sample).or_insert_with(|| {
                debug!(sample, "On-demand level built");
                TileLevel::build(width, height, sample, edge)
            });
            level.clear_visible();

            let mut missing: Option<RectF> = None;
            let mut ready = Vec::new();
            for (index, tile) in level.tiles.iter_mut().enumerate() {
                let Some(part) = tile.rect.to_f32().intersect(src) else {
                    continue;
                };
                tile.visible = true;
                if tile.pixels.is_some() {
                    ready.push(index);
                    continue;
                }
                missing = Some(missing.map_or(part, |m| m.union(&part)));
                if animating || tile.loading || tile.failed {
                    continue;
                }
                // Refused while a cancelled decode of this tile is still running.
                if self.scheduler.schedule_tile(TileKey { sample, index }, tile.rect) {
                    tile.loading = true;
                    stats.scheduled += 1;
                }
            }

            if let Some(missing) = missing {
                for tile in &full.tiles {
                    if draw_tile(canvas, tile, src, dst, Some(&missing)) {
                        stats.fallback += 1;
                    }
                }
            }
            for index in ready {
                if draw_tile(canvas, &level.tiles[index], src, dst, None) {
                    stats.drawn += 1;
                }
            }
        }

        self.current_sample = Some(sample);
        self.gc();
        stats
    }

    /// Free on-demand tiles that the last draw did not need.
    ///
    /// Levels other than the current sample lose every tile and their decodes;
    /// the current level loses tiles not visible this frame. The full level is
    /// untouched.
    pub fn gc(&mut self) -> usize {
        let current = self.current_sample;
        let cancelled = self
            .scheduler
            .cancel_tiles_where(|key| Some(key.sample) != current);

        let mut freed = 0;
        for (sample, level) in &mut self.levels {
            if Some(*sample) == current {
                freed += level.evict_invisible();
            } else {
                freed += level.evict_all();
                for tile in &mut level.tiles {
                    tile.loading = false;
                }
            }
        }
        if freed > 0 || cancelled > 0 {
            debug!(freed, cancelled, "Tile gc");
        }
        freed
    }

    /// Returns true when the caller should invalidate: after an animation ends
    /// the tiles it skipped must be requested again.
    pub fn on_animation_state_change(&mut self, running: bool) -> bool {
        debug!(running, "Animation state changed");
        !running
    }

    /// Free every on-demand level, keeping the full level.
    pub fn evict_on_demand(&mut self) -> usize {
        let cancelled = self.scheduler.cancel_tiles_where(|_| true);
        let mut freed = 0;
        for level in self.levels.values_mut() {
            freed += level.evict_all();
            for tile in &mut level.tiles {
                tile.loading = false;
            }
        }
        debug!(freed, cancelled, "On-demand levels evicted");
        freed
    }

    /// Cancel all decodes, free all tiles and hand off the decoder.
    ///
    /// The decoder is released now if no decode is in flight, otherwise by the
    /// last in-flight task when it finishes.
    pub fn teardown(&mut self) {
        let released_now = self.scheduler.shutdown();
        let freed = self.evict_everything();
        self.levels.clear();
        self.full = None;
        self.full_ready = false;
        self.current_sample = None;
        info!(freed, released_now, "Tile cache torn down");
    }

    fn evict_everything(&mut self) -> usize {
        let mut freed = self.full.as_mut().map_or(0, TileLevel::evict_all);
        for level in self.levels.values_mut() {
            freed += level.evict_all();
        }
        freed
    }
}

/// Draw the part of `tile` inside `src` (and `clip`, if given), mapping image
/// space `src` onto viewport space `dst`.
fn draw_tile(canvas: &mut dyn Canvas, tile: &Tile, src: &RectF, dst: &RectF, clip: Option<&RectF>) -> bool {
    let Some(pixels) = tile.pixels.as_ref() else {
        return false;
    };
    let tile_rect = tile.rect.to_f32();
    let Some(mut part) = tile_rect.intersect(src) else {
        return false;
    };
    if let Some(clip) = clip {
        match part.intersect(clip) {
            Some(p) => part = p,
            None => return false,
        }
    }
    let buffer_rect = RectF::from_size(pixels.width() as f32, pixels.height() as f32);
    let in_buffer = map_rect(&tile_rect, &buffer_rect, &part);
    let on_screen = map_rect(src, dst, &part);
    canvas.draw_pixels(pixels, in_buffer, on_screen);
    true
}
