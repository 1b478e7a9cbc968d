use std::rc::Weak;

use tracing::debug;

use crate::geometry::RectF;
use crate::pixels::PixelBuffer;
use crate::render::Canvas;

use super::{CallbackLink, ImageSource, SourceCallback, SourceId, SourceTask};

/// A whole image decoded into one buffer.
#[derive(Debug)]
pub struct BitmapSource {
    id: SourceId,
    pixels: Option<PixelBuffer>,
    width: u32,
    height: u32,
    callback: CallbackLink,
}

impl BitmapSource {
    pub fn new(pixels: PixelBuffer) -> Self {
        Self {
            id: SourceId::next(),
            width: pixels.width(),
            height: pixels.height(),
            pixels: Some(pixels),
            callback: CallbackLink::default(),
        }
    }

    /// Report as `id`, for use behind a wrapping source.
    pub fn with_id(mut self, id: SourceId) -> Self {
        self.id = id;
        self
    }

    pub fn pixels(&self) -> Option<&PixelBuffer> {
        self.pixels.as_ref()
    }
}

impl ImageSource for BitmapSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn set_callback(&mut self, callback: Option<Weak<dyn SourceCallback>>) {
        self.callback.set(callback);
    }

    fn init(&mut self) {}

    fn is_ready(&self) -> bool {
        self.pixels.is_some()
    }

    fn set_window_size(&mut self, _width: u32, _height: u32) {}

    fn set_max_decode_size(&mut self, _size: u32) {}

    fn on_animation_start(&mut self) {}

    fn on_animation_end(&mut self) {}

    fn set_visible(&mut self, _visible: bool) {}

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, src: &RectF, dst: &RectF) {
        if let Some(pixels) = &self.pixels {
            canvas.draw_pixels(pixels, *src, *dst);
        }
    }

    fn run_scheduled(&mut self, _task: SourceTask) {}

    fn is_idle(&self) -> bool {
        true
    }

    fn dispose(&mut self) {
        self.callback.detach();
        if let Some(pixels) = self.pixels.take() {
            debug!(id = %self.id, bytes = pixels.byte_size(), "Bitmap source disposed");
        }
    }

    fn current_sample(&self) -> Option<u32> {
        self.pixels.as_ref().map(|_| 1)
    }
}
