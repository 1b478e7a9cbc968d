mod memory;
mod pnm;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use crate::consts::DEFAULT_MAX_IMAGE_MEMORY_MB;
use crate::error::{GanymedeError, Result};
use crate::geometry::Rect;
use crate::pixels::PixelBuffer;

pub use memory::MemoryRegionDecoder;
pub use pnm::PnmRegionDecoder;

/// Random-access decoder for rectangular regions of one image.
///
/// Called from decode worker threads.
pub trait RegionDecoder: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Decode `rect` (full-resolution coordinates) downsampled by `sample`.
    fn decode_region(&self, rect: Rect, sample: u32) -> Result<PixelBuffer>;

    /// Free the decoder's resources. Called exactly once, by the last holder
    /// of the [`SharedDecoder`] wrapping it.
    fn release(&self) {}
}

struct DecoderCell {
    inner: Box<dyn RegionDecoder>,
}

impl Drop for DecoderCell {
    fn drop(&mut self) {
        debug!(
            width = self.inner.width(),
            height = self.inner.height(),
            "Releasing region decoder"
        );
        self.inner.release();
    }
}

/// Reference-counted handle to a region decoder.
///
/// The source and every in-flight decode task hold one; whichever drops last
/// releases the decoder.
#[derive(Clone)]
pub struct SharedDecoder(Arc<DecoderCell>);

impl SharedDecoder {
    pub fn new(decoder: impl RegionDecoder + 'static) -> Self {
        Self::from_boxed(Box::new(decoder))
    }

    pub fn from_boxed(decoder: Box<dyn RegionDecoder>) -> Self {
        Self(Arc::new(DecoderCell { inner: decoder }))
    }

    pub fn width(&self) -> u32 {
        self.0.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.0.inner.height()
    }

    pub fn decode_region(&self, rect: Rect, sample: u32) -> Result<PixelBuffer> {
        self.0.inner.decode_region(rect, sample)
    }

    /// Number of live handles, including this one.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for SharedDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDecoder")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("holders", &self.holders())
            .finish()
    }
}

/// Output size of a region decoded at `sample`: each edge divided, rounded up.
pub fn sampled_size(rect: &Rect, sample: u32) -> (u32, u32) {
    let sample = sample.max(1);
    let w = (rect.width().max(0) as u32).div_ceil(sample).max(1);
    let h = (rect.height().max(0) as u32).div_ceil(sample).max(1);
    (w, h)
}

/// Validate a region request against image bounds.
pub(crate) fn check_region(rect: &Rect, sample: u32, width: u32, height: u32) -> Result<()> {
    let bounds = Rect::new(0, 0, width as i32, height as i32);
    if sample == 0 || rect.is_empty() || rect.intersect(&bounds) != Some(*rect) {
        return Err(GanymedeError::RegionDecode {
            rect: rect.to_string(),
            sample,
            reason: format!("region outside image bounds {width}x{height}"),
        });
    }
    Ok(())
}

/// Read image dimensions without decoding pixels.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    let reader = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| GanymedeError::DecodeBounds(format!("{}: {e}", path.display())))?;
    let (w, h) = reader
        .into_dimensions()
        .map_err(|e| GanymedeError::DecodeBounds(format!("{}: {e}", path.display())))?;
    if w == 0 || h == 0 {
        return Err(GanymedeError::DecodeBounds(format!(
            "{}: empty image",
            path.display()
        )));
    }
    Ok((w, h))
}

/// Whether the path names a binary PNM file that can be region-decoded in place.
pub fn is_pnm_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ppm" | "pgm" | "pnm")
    )
}

/// Convert a MiB ceiling to bytes. Zero means no ceiling.
pub fn memory_limit_bytes(mb: u64) -> Option<u64> {
    (mb > 0).then(|| mb.saturating_mul(1024 * 1024))
}

/// Decode a whole file to RGBA8 with `max_alloc` as the decoder's
/// allocation ceiling (`None` for none).
///
/// This replaces the `image` crate's 512 MiB default. The ceiling covers the
/// decoder's own buffers; the RGBA copy made afterwards is not counted.
pub fn load_rgba(path: &Path, max_alloc: Option<u64>) -> Result<RgbaImage> {
    let mut reader = image::ImageReader::open(path)?.with_guessed_format()?;
    let mut limits = image::Limits::no_limits();
    limits.max_alloc = max_alloc;
    reader.limits(limits);
    Ok(reader.decode()?.to_rgba8())
}

/// Open the best region decoder for `path` with the default memory ceiling.
pub fn open_region_decoder(path: &Path) -> Result<SharedDecoder> {
    open_region_decoder_with_limit(path, memory_limit_bytes(DEFAULT_MAX_IMAGE_MEMORY_MB))
}

/// Open the best region decoder for `path`. PNM files are streamed from a
/// memory map and ignore `max_alloc`; other formats are decoded whole under it.
pub fn open_region_decoder_with_limit(
    path: &Path,
    max_alloc: Option<u64>,
) -> Result<SharedDecoder> {
    if is_pnm_path(path) {
        Ok(SharedDecoder::new(PnmRegionDecoder::open(path)?))
    } else {
        Ok(SharedDecoder::new(MemoryRegionDecoder::open_with_limit(
            path, max_alloc,
        )?))
    }
}
