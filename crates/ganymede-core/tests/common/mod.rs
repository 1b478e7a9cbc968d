use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};

use ganymede_core::decoder::{sampled_size, RegionDecoder, SharedDecoder};
use ganymede_core::error::{GanymedeError, Result};
use ganymede_core::geometry::{Rect, RectF};
use ganymede_core::pixels::PixelBuffer;
use ganymede_core::render::{Canvas, ViewTransform};
use ganymede_core::scheduler::DecodePool;

/// Counters shared between a [`MockDecoder`] and the test that owns it.
#[derive(Debug, Default)]
pub struct DecoderStats {
    pub decodes: AtomicUsize,
    pub releases: AtomicUsize,
    /// Decodes running per (rect, sample).
    running: Mutex<HashMap<(Rect, u32), usize>>,
    max_overlap: AtomicUsize,
}

impl DecoderStats {
    /// Most decodes of one region at one sample ever running together.
    pub fn max_overlap(&self) -> usize {
        self.max_overlap.load(Ordering::SeqCst)
    }

    fn enter(&self, rect: Rect, sample: u32) {
        let mut running = self.running.lock().unwrap();
        let n = running.entry((rect, sample)).or_insert(0);
        *n += 1;
        self.max_overlap.fetch_max(*n, Ordering::SeqCst);
    }

    fn leave(&self, rect: Rect, sample: u32) {
        let mut running = self.running.lock().unwrap();
        if let Some(n) = running.get_mut(&(rect, sample)) {
            *n -= 1;
        }
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Blocks decodes until opened.
#[derive(Debug, Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
    entered: AtomicUsize,
}

impl Gate {
    /// Decodes that reached the gate so far.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    /// Block until the gate opens.
    pub fn pass(&self) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }
}

/// Region decoder producing solid gray tiles, with optional gating and
/// per-rect failures.
pub struct MockDecoder {
    pub width: u32,
    pub height: u32,
    pub stats: Arc<DecoderStats>,
    pub gate: Option<Arc<Gate>>,
    /// Only decodes at this sample wait on the gate.
    pub gated_sample: Option<u32>,
    pub failing: Vec<Rect>,
}

impl MockDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stats: Arc::new(DecoderStats::default()),
            gate: None,
            gated_sample: None,
            failing: Vec::new(),
        }
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn gated_at(mut self, gate: Arc<Gate>, sample: u32) -> Self {
        self.gate = Some(gate);
        self.gated_sample = Some(sample);
        self
    }

    pub fn failing(mut self, rect: Rect) -> Self {
        self.failing.push(rect);
        self
    }

    /// Wrap into a shared decoder, keeping a handle on the counters.
    pub fn shared(self) -> (SharedDecoder, Arc<DecoderStats>) {
        let stats = self.stats.clone();
        (SharedDecoder::new(self), stats)
    }
}

impl RegionDecoder for MockDecoder {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn decode_region(&self, rect: Rect, sample: u32) -> Result<PixelBuffer> {
        self.stats.enter(rect, sample);
        if let Some(gate) = &self.gate {
            if self.gated_sample.map_or(true, |s| s == sample) {
                gate.pass();
            }
        }
        self.stats.decodes.fetch_add(1, Ordering::SeqCst);
        let result = if self.failing.contains(&rect) {
            Err(GanymedeError::RegionDecode {
                rect: rect.to_string(),
                sample,
                reason: "mock failure".into(),
            })
        } else {
            let (w, h) = sampled_size(&rect, sample);
            PixelBuffer::from_raw(w, h, vec![128; (w * h * 4) as usize])
        };
        self.stats.leave(rect, sample);
        result
    }

    fn release(&self) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub buffer: u64,
    pub src: RectF,
    pub dst: RectF,
}

/// Canvas that only records what was drawn.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub transform: Option<ViewTransform>,
    pub calls: Vec<DrawCall>,
}

impl Canvas for RecordingCanvas {
    fn set_transform(&mut self, transform: ViewTransform) {
        self.transform = Some(transform);
    }

    fn draw_pixels(&mut self, pixels: &PixelBuffer, src: RectF, dst: RectF) {
        self.calls.push(DrawCall {
            buffer: pixels.id(),
            src,
            dst,
        });
    }
}

pub fn pool(threads: usize) -> DecodePool {
    DecodePool::new(threads).unwrap()
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Horizontal red-to-blue gradient, handy for checking sampling.
pub fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        let t = (x * 255 / width.max(1)) as u8;
        Rgba([255 - t, 0, t, 255])
    })
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    gradient_image(width, height).save(&path).unwrap();
    path
}

/// Binary P6 file with 8-bit samples.
pub fn write_ppm(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let mut data = format!("P6\n# test\n{width} {height}\n255\n").into_bytes();
    for _y in 0..height {
        for x in 0..width {
            let t = (x * 255 / width.max(1)) as u8;
            data.extend_from_slice(&[255 - t, 0, t]);
        }
    }
    std::fs::write(&path, data).unwrap();
    path
}
