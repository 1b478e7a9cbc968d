use std::path::{Path, PathBuf};
use std::rc::Weak;
use std::sync::mpsc;

use tracing::{debug, info, warn};

use crate::consts::{BITMAP_LIMIT_DIVISOR, DECODE_POLL_INTERVAL_MS, DEFAULT_MAX_IMAGE_MEMORY_MB};
use crate::decoder::{
    load_rgba, memory_limit_bytes, open_region_decoder_with_limit, read_dimensions, SharedDecoder,
};
use crate::error::{GanymedeError, Result};
use crate::geometry::RectF;
use crate::pixels::PixelBuffer;
use crate::render::Canvas;
use crate::scheduler::{spawn_task, DecodePool, TaskControl};

use super::{
    BitmapSource, CallbackLink, ImageSource, SourceCallback, SourceId, SourceTask, TiledSource,
};

/// What detection found on disk.
#[derive(Debug)]
enum Opened {
    Bitmap(PixelBuffer),
    Tiled(SharedDecoder),
}

/// The concrete source an [`AutoSource`] settled on.
#[derive(Debug)]
pub enum DetectedSource {
    Bitmap(BitmapSource),
    Tiled(TiledSource),
}

impl DetectedSource {
    fn as_source(&self) -> &dyn ImageSource {
        match self {
            Self::Bitmap(s) => s,
            Self::Tiled(s) => s,
        }
    }

    fn as_source_mut(&mut self) -> &mut dyn ImageSource {
        match self {
            Self::Bitmap(s) => s,
            Self::Tiled(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bitmap(_) => "bitmap",
            Self::Tiled(_) => "tiled",
        }
    }
}

#[derive(Debug)]
struct Detection {
    control: TaskControl,
    rx: mpsc::Receiver<Result<Opened>>,
}

/// Picks a bitmap or tiled source for a file once its dimensions are known.
///
/// Images whose sides both fit in half the max decode size are decoded
/// whole; anything larger goes through a region decoder. Probing runs on the
/// decode pool and only starts once `init` was called and a max decode size
/// is set.
#[derive(Debug)]
pub struct AutoSource {
    id: SourceId,
    path: PathBuf,
    pool: DecodePool,
    callback: CallbackLink,
    initialized: bool,
    max_decode_size: u32,
    bitmap_limit: u32,
    memory_limit: Option<u64>,
    window: (u32, u32),
    visible: bool,
    animating: bool,
    detection: Option<Detection>,
    delegate: Option<DetectedSource>,
    failed: bool,
}

impl AutoSource {
    pub fn new(path: impl Into<PathBuf>, pool: DecodePool) -> Self {
        Self {
            id: SourceId::next(),
            path: path.into(),
            pool,
            callback: CallbackLink::default(),
            initialized: false,
            max_decode_size: 0,
            bitmap_limit: 0,
            memory_limit: memory_limit_bytes(DEFAULT_MAX_IMAGE_MEMORY_MB),
            window: (0, 0),
            visible: true,
            animating: false,
            detection: None,
            delegate: None,
            failed: false,
        }
    }

    /// Allocation ceiling in bytes for whole-image decodes (`None` = none).
    pub fn with_memory_limit(mut self, max_alloc: Option<u64>) -> Self {
        self.memory_limit = max_alloc;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delegate(&self) -> Option<&DetectedSource> {
        self.delegate.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn bitmap_limit(&self) -> u32 {
        self.bitmap_limit
    }

    /// Install the concrete source.
    ///
    /// # Errors
    ///
    /// [`GanymedeError::DoubleInit`] if a delegate is already attached. That
    /// is a programming error and callers must treat it as fatal: the
    /// attached delegate stays in place and `delegate` is dropped unused.
    /// Size detection panics on it.
    pub fn attach(&mut self, mut delegate: DetectedSource) -> Result<()> {
        if self.delegate.is_some() {
            return Err(GanymedeError::DoubleInit);
        }
        let inner = delegate.as_source_mut();
        inner.set_callback(self.callback.weak());
        inner.set_max_decode_size(self.max_decode_size);
        inner.set_window_size(self.window.0, self.window.1);
        inner.set_visible(self.visible);
        if self.animating {
            inner.on_animation_start();
        }
        info!(
            path = %self.path.display(),
            kind = delegate.kind(),
            width = delegate.as_source().width(),
            height = delegate.as_source().height(),
            "Image source ready"
        );
        self.delegate = Some(delegate);
        Ok(())
    }

    fn start_detection(&mut self) {
        if !self.initialized
            || self.bitmap_limit == 0
            || self.detection.is_some()
            || self.delegate.is_some()
            || self.failed
        {
            return;
        }
        let (tx, rx) = mpsc::channel();
        let path = self.path.clone();
        let limit = self.bitmap_limit;
        let max_alloc = self.memory_limit;
        let control = spawn_task(&self.pool, tx, move |_| detect(&path, limit, max_alloc));
        debug!(path = %self.path.display(), limit, "Detecting image size");
        self.detection = Some(Detection { control, rx });
        self.callback
            .schedule(self.id, SourceTask::PollInit, DECODE_POLL_INTERVAL_MS);
    }

    fn poll_detection(&mut self) {
        let Some(detection) = &self.detection else {
            return;
        };
        let outcome = match detection.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(mpsc::TryRecvError::Empty) => {
                self.callback
                    .schedule(self.id, SourceTask::PollInit, DECODE_POLL_INTERVAL_MS);
                return;
            }
            Err(mpsc::TryRecvError::Disconnected) => Err(GanymedeError::DecodeBounds(format!(
                "{}: detection task ended without a result",
                self.path.display()
            ))),
        };
        self.detection = None;

        match outcome {
            Ok(opened) => {
                let delegate = match opened {
                    Opened::Bitmap(pixels) => {
                        DetectedSource::Bitmap(BitmapSource::new(pixels).with_id(self.id))
                    }
                    Opened::Tiled(decoder) => DetectedSource::Tiled(
                        TiledSource::new(decoder, self.pool.clone()).with_id(self.id),
                    ),
                };
                if let Err(e) = self.attach(delegate) {
                    panic!("{e}");
                }
                self.callback.ready(self.id);
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to open image");
                self.failed = true;
                self.callback.failed(self.id);
            }
        }
    }
}

fn detect(path: &Path, bitmap_limit: u32, max_alloc: Option<u64>) -> Result<Opened> {
    let (width, height) = read_dimensions(path)?;
    if width <= bitmap_limit && height <= bitmap_limit {
        Ok(Opened::Bitmap(PixelBuffer::new(load_rgba(path, max_alloc)?)))
    } else {
        Ok(Opened::Tiled(open_region_decoder_with_limit(path, max_alloc)?))
    }
}

impl ImageSource for AutoSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn set_callback(&mut self, callback: Option<Weak<dyn SourceCallback>>) {
        self.callback.set(callback.clone());
        if let Some(delegate) = &mut self.delegate {
            delegate.as_source_mut().set_callback(callback);
        }
    }

    fn init(&mut self) {
        self.initialized = true;
        self.start_detection();
    }

    fn is_ready(&self) -> bool {
        self.delegate.is_some()
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window = (width, height);
        if let Some(delegate) = &mut self.delegate {
            delegate.as_source_mut().set_window_size(width, height);
        }
    }

    fn set_max_decode_size(&mut self, size: u32) {
        self.max_decode_size = size;
        self.bitmap_limit = size / BITMAP_LIMIT_DIVISOR;
        if let Some(delegate) = &mut self.delegate {
            delegate.as_source_mut().set_max_decode_size(size);
        }
        self.start_detection();
    }

    fn on_animation_start(&mut self) {
        self.animating = true;
        if let Some(delegate) = &mut self.delegate {
            delegate.as_source_mut().on_animation_start();
        }
    }

    fn on_animation_end(&mut self) {
        self.animating = false;
        if let Some(delegate) = &mut self.delegate {
            delegate.as_source_mut().on_animation_end();
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if let Some(delegate) = &mut self.delegate {
            delegate.as_source_mut().set_visible(visible);
        }
    }

    fn width(&self) -> u32 {
        self.delegate.as_ref().map_or(0, |d| d.as_source().width())
    }

    fn height(&self) -> u32 {
        self.delegate.as_ref().map_or(0, |d| d.as_source().height())
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, src: &RectF, dst: &RectF) {
        if let Some(delegate) = &mut self.delegate {
            delegate.as_source_mut().draw(canvas, src, dst);
        }
    }

    fn run_scheduled(&mut self, task: SourceTask) {
        match task {
            SourceTask::PollInit => self.poll_detection(),
            _ => {
                if let Some(delegate) = &mut self.delegate {
                    delegate.as_source_mut().run_scheduled(task);
                }
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.detection.is_none() && self.delegate.as_ref().map_or(true, |d| d.as_source().is_idle())
    }

    fn dispose(&mut self) {
        if let Some(detection) = self.detection.take() {
            detection.control.cancel();
            self.callback.unschedule(self.id, SourceTask::PollInit);
        }
        if let Some(delegate) = &mut self.delegate {
            delegate.as_source_mut().dispose();
        }
        self.callback.detach();
    }

    fn current_sample(&self) -> Option<u32> {
        self.delegate.as_ref().and_then(|d| d.as_source().current_sample())
    }

    fn pending_decodes(&self) -> usize {
        self.delegate.as_ref().map_or(0, |d| d.as_source().pending_decodes())
    }
}
