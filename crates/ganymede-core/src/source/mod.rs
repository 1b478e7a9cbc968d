//! Image sources: what the viewer draws.
//!
//! A source reports back to its owner through a [`SourceCallback`] held as a
//! weak reference. The owner keeps the source alive; the source never keeps
//! the owner alive.

mod auto;
mod bitmap;
mod tiled;

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::RectF;
use crate::render::Canvas;

pub use auto::{AutoSource, DetectedSource};
pub use bitmap::BitmapSource;
pub use tiled::TiledSource;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Deferred work a source asks its owner to run on the control thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceTask {
    /// Drain finished tile decodes.
    PollDecodes,
    /// Check whether the background detection finished.
    PollInit,
}

/// Implemented by whoever displays a source. Signals from a source other than
/// the one currently displayed must be ignored.
pub trait SourceCallback {
    fn on_ready(&self, who: SourceId);

    fn on_failed(&self, who: SourceId);

    fn invalidate(&self, who: SourceId);

    /// Run `task` on the source after `delay_ms`, replacing an earlier request
    /// for the same task.
    fn schedule_delayed(&self, who: SourceId, task: SourceTask, delay_ms: u64);

    fn cancel_scheduled(&self, who: SourceId, task: SourceTask);
}

/// A source's weak back-reference to its callback.
#[derive(Clone, Default)]
pub struct CallbackLink(Option<Weak<dyn SourceCallback>>);

impl CallbackLink {
    pub fn set(&mut self, callback: Option<Weak<dyn SourceCallback>>) {
        self.0 = callback;
    }

    /// Drop the back-reference so no further signal reaches the owner.
    pub fn detach(&mut self) {
        self.0 = None;
    }

    pub fn weak(&self) -> Option<Weak<dyn SourceCallback>> {
        self.0.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.get().is_some()
    }

    fn get(&self) -> Option<Rc<dyn SourceCallback>> {
        self.0.as_ref().and_then(Weak::upgrade)
    }

    pub fn ready(&self, who: SourceId) {
        if let Some(cb) = self.get() {
            cb.on_ready(who);
        }
    }

    pub fn failed(&self, who: SourceId) {
        if let Some(cb) = self.get() {
            cb.on_failed(who);
        }
    }

    pub fn invalidate(&self, who: SourceId) {
        if let Some(cb) = self.get() {
            cb.invalidate(who);
        }
    }

    pub fn schedule(&self, who: SourceId, task: SourceTask, delay_ms: u64) {
        if let Some(cb) = self.get() {
            cb.schedule_delayed(who, task, delay_ms);
        }
    }

    pub fn unschedule(&self, who: SourceId, task: SourceTask) {
        if let Some(cb) = self.get() {
            cb.cancel_scheduled(who, task);
        }
    }
}

impl fmt::Debug for CallbackLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallbackLink")
            .field(&self.is_attached())
            .finish()
    }
}

/// Something the viewer can show.
///
/// `draw` takes `src` in image pixels and `dst` in unrotated viewport
/// coordinates, both as computed by the viewport.
pub trait ImageSource {
    fn id(&self) -> SourceId;

    fn set_callback(&mut self, callback: Option<Weak<dyn SourceCallback>>);

    /// Start any background preparation. Sources that are ready up front do nothing.
    fn init(&mut self);

    /// Dimensions are known and the source can draw.
    fn is_ready(&self) -> bool;

    /// Effective (unrotated) window size.
    fn set_window_size(&mut self, width: u32, height: u32);

    fn set_max_decode_size(&mut self, size: u32);

    fn on_animation_start(&mut self);

    fn on_animation_end(&mut self);

    fn set_visible(&mut self, visible: bool);

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn draw(&mut self, canvas: &mut dyn Canvas, src: &RectF, dst: &RectF);

    /// Run work previously requested through [`SourceCallback::schedule_delayed`].
    fn run_scheduled(&mut self, task: SourceTask);

    /// No background work is outstanding.
    fn is_idle(&self) -> bool;

    /// Release everything. The source must not be used afterwards.
    fn dispose(&mut self);

    /// Sample factor of the last draw, if the source decodes at several.
    fn current_sample(&self) -> Option<u32> {
        None
    }

    fn pending_decodes(&self) -> usize {
        0
    }
}
