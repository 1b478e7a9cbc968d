//! The control-thread façade a host embeds: one displayed source, its
//! viewport, the gesture adapter and the decode pool.
//!
//! The host feeds view size, orientation and gestures in, calls
//! [`Viewer::advance`] with its clock every frame and [`Viewer::draw`] when
//! [`Viewer::needs_redraw`] says so.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use crate::ballistic::SplineBallistic;
use crate::config::ViewerConfig;
use crate::error::Result;
use crate::geometry::Orientation;
use crate::gesture::{GestureAdapter, GestureEvent, GestureOutcome};
use crate::render::Canvas;
use crate::scheduler::DecodePool;
use crate::source::{AutoSource, ImageSource, SourceCallback, SourceId, SourceTask};
use crate::viewport::Viewport;

/// Something the host may want to react to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewerEvent {
    ImageReady { width: u32, height: u32 },
    ImageFailed,
    SingleTap { x: f32, y: f32 },
    LongPress { x: f32, y: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Signal {
    Ready,
    Failed,
    Invalidate,
    Schedule(SourceTask, u64),
    Cancel(SourceTask),
}

/// Collects source signals until the viewer processes them. Signals from any
/// source but the current one are dropped here.
#[derive(Debug, Default)]
struct HostSignals {
    current: Cell<Option<SourceId>>,
    queue: RefCell<Vec<Signal>>,
}

impl HostSignals {
    fn push(&self, who: SourceId, signal: Signal) {
        if self.current.get() == Some(who) {
            self.queue.borrow_mut().push(signal);
        } else {
            debug!(source = %who, ?signal, "Ignoring signal from stale source");
        }
    }

    fn take(&self) -> Vec<Signal> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }
}

impl SourceCallback for HostSignals {
    fn on_ready(&self, who: SourceId) {
        self.push(who, Signal::Ready);
    }

    fn on_failed(&self, who: SourceId) {
        self.push(who, Signal::Failed);
    }

    fn invalidate(&self, who: SourceId) {
        self.push(who, Signal::Invalidate);
    }

    fn schedule_delayed(&self, who: SourceId, task: SourceTask, delay_ms: u64) {
        self.push(who, Signal::Schedule(task, delay_ms));
    }

    fn cancel_scheduled(&self, who: SourceId, task: SourceTask) {
        self.push(who, Signal::Cancel(task));
    }
}

#[derive(Clone, Copy, Debug)]
struct Scheduled {
    task: SourceTask,
    due_ms: u64,
}

pub struct Viewer {
    config: ViewerConfig,
    pool: DecodePool,
    viewport: Viewport,
    gestures: GestureAdapter,
    source: Option<Box<dyn ImageSource>>,
    signals: Rc<HostSignals>,
    scheduled: Vec<Scheduled>,
    events: Vec<ViewerEvent>,
    needs_redraw: bool,
    visible: bool,
    now_ms: u64,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Result<Self> {
        let pool = DecodePool::new(config.decode_threads)?;
        Self::with_pool(config, pool)
    }

    /// Use an existing pool, e.g. one whose waker requests a repaint.
    pub fn with_pool(config: ViewerConfig, pool: DecodePool) -> Result<Self> {
        config.validate()?;
        let gestures = GestureAdapter::new(Box::new(SplineBallistic::new(&config.fling)))
            .with_smooth_zoom_ms(config.smooth_zoom_ms);
        Ok(Self {
            viewport: Viewport::new(config.scale),
            gestures,
            config,
            pool,
            source: None,
            signals: Rc::new(HostSignals::default()),
            scheduled: Vec::new(),
            events: Vec::new(),
            needs_redraw: false,
            visible: true,
            now_ms: 0,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn pool(&self) -> &DecodePool {
        &self.pool
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn source(&self) -> Option<&dyn ImageSource> {
        self.source.as_deref()
    }

    pub fn is_animating(&self) -> bool {
        self.gestures.is_animating()
    }

    /// Display a file, picking bitmap or tiled decoding from its size.
    pub fn open(&mut self, path: &Path) {
        info!(path = %path.display(), "Opening image");
        let source = AutoSource::new(path, self.pool.clone())
            .with_memory_limit(self.config.image_memory_limit());
        self.set_image(Some(Box::new(source)));
    }

    /// Replace the displayed source. The previous one is detached and
    /// disposed first; nothing it signals afterwards reaches this viewer.
    pub fn set_image(&mut self, source: Option<Box<dyn ImageSource>>) {
        if self.gestures.cancel() {
            self.needs_redraw = true;
        }
        if let Some(mut old) = self.source.take() {
            old.set_callback(None);
            old.set_visible(false);
            old.dispose();
            debug!(source = %old.id(), "Source disposed");
        }
        self.scheduled.clear();
        self.signals.take();
        self.viewport.reset();
        self.needs_redraw = true;

        let Some(mut source) = source else {
            self.signals.current.set(None);
            return;
        };
        self.signals.current.set(Some(source.id()));
        let callback: Weak<dyn SourceCallback> = Rc::downgrade(&self.signals) as Weak<dyn SourceCallback>;
        source.set_callback(Some(callback));
        source.set_visible(self.visible);
        let (w, h) = self.viewport.window_size();
        source.set_window_size(w, h);
        source.set_max_decode_size(self.config.max_decode_size);
        let ready = source.is_ready();
        self.source = Some(source);
        if ready {
            self.on_image_ready();
        } else if let Some(source) = self.source.as_mut() {
            source.init();
        }
        self.process_signals();
    }

    /// The view was resized. Running animations stop.
    pub fn resize(&mut self, width: u32, height: u32) {
        let ended = self.gestures.cancel();
        self.viewport.resize(width, height);
        if let Some(source) = self.source.as_mut() {
            if ended {
                source.on_animation_end();
            }
            let (w, h) = self.viewport.window_size();
            source.set_window_size(w, h);
        }
        self.needs_redraw = true;
        self.process_signals();
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        if !self.viewport.set_orientation(orientation) {
            return;
        }
        let ended = self.gestures.cancel();
        if let Some(source) = self.source.as_mut() {
            if ended {
                source.on_animation_end();
            }
            let (w, h) = self.viewport.window_size();
            source.set_window_size(w, h);
        }
        self.needs_redraw = true;
        self.process_signals();
    }

    pub fn set_max_decode_size(&mut self, size: u32) {
        self.config.max_decode_size = size;
        if let Some(source) = self.source.as_mut() {
            source.set_max_decode_size(size);
        }
        self.process_signals();
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        if let Some(source) = self.source.as_mut() {
            source.set_visible(visible);
        }
        self.process_signals();
    }

    pub fn on_gesture(&mut self, event: GestureEvent, now_ms: u64) -> GestureOutcome {
        self.now_ms = self.now_ms.max(now_ms);
        match event {
            GestureEvent::SingleTap { x, y } => self.events.push(ViewerEvent::SingleTap { x, y }),
            GestureEvent::LongPress { x, y } => self.events.push(ViewerEvent::LongPress { x, y }),
            _ => {}
        }
        let out = self.gestures.handle(&mut self.viewport, event, now_ms);
        self.apply_outcome(&out);
        out
    }

    /// Step animations and run due source tasks. Returns whether a redraw is needed.
    pub fn advance(&mut self, now_ms: u64) -> bool {
        self.now_ms = self.now_ms.max(now_ms);
        let out = self.gestures.step(&mut self.viewport, now_ms);
        self.apply_outcome(&out);

        // Tasks scheduled while running due tasks wait for the next call.
        let now = self.now_ms;
        let (due, later): (Vec<_>, Vec<_>) = self
            .scheduled
            .drain(..)
            .partition(|s| s.due_ms <= now);
        self.scheduled = later;
        for task in due {
            if let Some(source) = self.source.as_mut() {
                source.run_scheduled(task.task);
            }
            self.process_signals();
        }
        self.needs_redraw
    }

    pub fn draw(&mut self, canvas: &mut dyn Canvas) {
        self.needs_redraw = false;
        if !self.viewport.is_ready() {
            return;
        }
        let Some((src, dst)) = self.viewport.visible_rects() else {
            return;
        };
        let Some(source) = self.source.as_mut() else {
            return;
        };
        canvas.set_transform(self.viewport.view_transform());
        source.draw(canvas, &src, &dst);
        self.process_signals();
    }

    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Earliest time a scheduled source task becomes due.
    pub fn next_wakeup(&self) -> Option<u64> {
        self.scheduled.iter().map(|s| s.due_ms).min()
    }

    /// Nothing is animating, scheduled or decoding.
    pub fn is_idle(&self) -> bool {
        !self.gestures.is_animating()
            && self.scheduled.is_empty()
            && self.source.as_ref().map_or(true, |s| s.is_idle())
    }

    fn apply_outcome(&mut self, out: &GestureOutcome) {
        if let Some(source) = self.source.as_mut() {
            if out.animation_ended {
                source.on_animation_end();
            }
            if out.animation_started {
                source.on_animation_start();
            }
        }
        if out.invalidate {
            self.needs_redraw = true;
        }
        self.process_signals();
    }

    fn on_image_ready(&mut self) {
        let Some(source) = self.source.as_ref() else {
            return;
        };
        let (width, height) = (source.width(), source.height());
        self.viewport.image_ready(width, height);
        info!(
            width,
            height,
            fit_scale = self.viewport.fit_scale(),
            "Image ready"
        );
        self.events.push(ViewerEvent::ImageReady { width, height });
        self.needs_redraw = true;
    }

    fn process_signals(&mut self) {
        loop {
            let signals = self.signals.take();
            if signals.is_empty() {
                return;
            }
            for signal in signals {
                match signal {
                    Signal::Ready => self.on_image_ready(),
                    Signal::Failed => {
                        warn!("Image source failed");
                        self.events.push(ViewerEvent::ImageFailed);
                    }
                    Signal::Invalidate => self.needs_redraw = true,
                    Signal::Schedule(task, delay_ms) => {
                        let due_ms = self.now_ms + delay_ms;
                        match self.scheduled.iter_mut().find(|s| s.task == task) {
                            Some(existing) => existing.due_ms = due_ms,
                            None => self.scheduled.push(Scheduled { task, due_ms }),
                        }
                    }
                    Signal::Cancel(task) => self.scheduled.retain(|s| s.task != task),
                }
            }
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.set_callback(None);
            source.dispose();
        }
    }
}
