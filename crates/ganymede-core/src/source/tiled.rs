use std::rc::Weak;

use tracing::{debug, trace};

use crate::consts::{DECODE_POLL_INTERVAL_MS, TILE_EDGE_DIVISOR};
use crate::decoder::SharedDecoder;
use crate::geometry::RectF;
use crate::render::Canvas;
use crate::scheduler::DecodePool;
use crate::tile::TileCache;

use super::{CallbackLink, ImageSource, SourceCallback, SourceId, SourceTask};

/// Source backed by a region decoder and a multi-resolution tile cache.
///
/// Ready as soon as it exists, since the decoder knows the dimensions. While
/// decodes are outstanding it keeps a [`SourceTask::PollDecodes`] scheduled
/// with its owner so results land even when nothing else redraws.
#[derive(Debug)]
pub struct TiledSource {
    id: SourceId,
    cache: TileCache,
    callback: CallbackLink,
    window: (u32, u32),
    max_decode_size: u32,
    animating: bool,
    poll_scheduled: bool,
    disposed: bool,
}

impl TiledSource {
    pub fn new(decoder: SharedDecoder, pool: DecodePool) -> Self {
        Self {
            id: SourceId::next(),
            cache: TileCache::new(decoder, pool),
            callback: CallbackLink::default(),
            window: (0, 0),
            max_decode_size: 0,
            animating: false,
            poll_scheduled: false,
            disposed: false,
        }
    }

    pub fn with_id(mut self, id: SourceId) -> Self {
        self.id = id;
        self
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    fn ensure_full_level(&mut self) {
        let edge = self.max_decode_size / TILE_EDGE_DIVISOR;
        let (w, h) = self.window;
        if self.cache.ensure_full_level(w, h, edge) {
            self.keep_polling();
        }
    }

    fn keep_polling(&mut self) {
        if self.poll_scheduled || self.cache.pending_decodes() == 0 {
            return;
        }
        self.poll_scheduled = true;
        self.callback
            .schedule(self.id, SourceTask::PollDecodes, DECODE_POLL_INTERVAL_MS);
    }

    fn teardown(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if self.poll_scheduled {
            self.callback.unschedule(self.id, SourceTask::PollDecodes);
            self.poll_scheduled = false;
        }
        self.callback.detach();
        self.cache.teardown();
    }
}

impl ImageSource for TiledSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn set_callback(&mut self, callback: Option<Weak<dyn SourceCallback>>) {
        self.callback.set(callback);
    }

    fn init(&mut self) {}

    fn is_ready(&self) -> bool {
        !self.disposed
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window = (width, height);
        self.ensure_full_level();
    }

    fn set_max_decode_size(&mut self, size: u32) {
        self.max_decode_size = size;
        self.ensure_full_level();
    }

    fn on_animation_start(&mut self) {
        self.animating = true;
        self.cache.on_animation_state_change(true);
    }

    fn on_animation_end(&mut self) {
        self.animating = false;
        if self.cache.on_animation_state_change(false) {
            self.callback.invalidate(self.id);
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if visible {
            self.callback.invalidate(self.id);
        } else {
            self.cache.evict_on_demand();
        }
    }

    fn width(&self) -> u32 {
        self.cache.image_width()
    }

    fn height(&self) -> u32 {
        self.cache.image_height()
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, src: &RectF, dst: &RectF) {
        if self.disposed {
            return;
        }
        let stats = self.cache.draw(canvas, src, dst, self.animating);
        trace!(
            sample = stats.sample,
            drawn = stats.drawn,
            fallback = stats.fallback,
            scheduled = stats.scheduled,
            "Tiles drawn"
        );
        self.keep_polling();
    }

    fn run_scheduled(&mut self, task: SourceTask) {
        if task != SourceTask::PollDecodes || self.disposed {
            return;
        }
        self.poll_scheduled = false;
        let summary = self.cache.poll();
        if summary.applied > 0 {
            debug!(
                applied = summary.applied,
                failed = summary.failed,
                pending = self.cache.pending_decodes(),
                "Decodes applied"
            );
        }
        if summary.invalidate {
            self.callback.invalidate(self.id);
        }
        self.keep_polling();
    }

    fn is_idle(&self) -> bool {
        self.cache.pending_decodes() == 0
    }

    fn dispose(&mut self) {
        self.teardown();
    }

    fn current_sample(&self) -> Option<u32> {
        self.cache.current_sample()
    }

    fn pending_decodes(&self) -> usize {
        self.cache.pending_decodes()
    }
}

impl Drop for TiledSource {
    fn drop(&mut self) {
        self.teardown();
    }
}
