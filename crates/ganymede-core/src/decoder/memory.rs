use std::path::Path;

use image::RgbaImage;
use rayon::prelude::*;
use tracing::info;

use crate::consts::{DEFAULT_MAX_IMAGE_MEMORY_MB, PARALLEL_PIXEL_THRESHOLD, RGBA_CHANNELS};
use crate::error::{GanymedeError, Result};
use crate::geometry::Rect;
use crate::pixels::{alloc_rgba, PixelBuffer};

use super::{check_region, load_rgba, memory_limit_bytes, sampled_size, RegionDecoder};

/// Region decoder over an image decoded once into memory.
///
/// Works for every format the `image` crate reads. Regions are box-filtered
/// down by the sample factor.
pub struct MemoryRegionDecoder {
    image: RgbaImage,
}

impl MemoryRegionDecoder {
    pub fn new(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(GanymedeError::InvalidDimensions { width, height });
        }
        Ok(Self { image })
    }

    /// Decode `path` under the default ceiling of
    /// [`DEFAULT_MAX_IMAGE_MEMORY_MB`] MiB.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_limit(path, memory_limit_bytes(DEFAULT_MAX_IMAGE_MEMORY_MB))
    }

    /// Decode `path` with `max_alloc` bytes as the allocation ceiling
    /// (`None` for no ceiling). Exceeding it fails with an image limit error.
    pub fn open_with_limit(path: &Path, max_alloc: Option<u64>) -> Result<Self> {
        let image = load_rgba(path, max_alloc)?;
        info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "Image loaded for region decoding"
        );
        Self::new(image)
    }
}

impl RegionDecoder for MemoryRegionDecoder {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn decode_region(&self, rect: Rect, sample: u32) -> Result<PixelBuffer> {
        check_region(&rect, sample, self.width(), self.height())?;
        let (out_w, out_h) = sampled_size(&rect, sample);
        let mut data = alloc_rgba(out_w, out_h)?;
        let row_bytes = out_w as usize * RGBA_CHANNELS;

        let fill_row = |(oy, row): (usize, &mut [u8])| {
            let y0 = rect.top as u32 + oy as u32 * sample;
            let y1 = (y0 + sample).min(rect.bottom as u32);
            for ox in 0..out_w as usize {
                let x0 = rect.left as u32 + ox as u32 * sample;
                let x1 = (x0 + sample).min(rect.right as u32);
                let mut sum = [0u32; RGBA_CHANNELS];
                for y in y0..y1 {
                    for x in x0..x1 {
                        let p = self.image.get_pixel(x, y).0;
                        for c in 0..RGBA_CHANNELS {
                            sum[c] += p[c] as u32;
                        }
                    }
                }
                let count = ((y1 - y0) * (x1 - x0)).max(1);
                let dst = &mut row[ox * RGBA_CHANNELS..(ox + 1) * RGBA_CHANNELS];
                for c in 0..RGBA_CHANNELS {
                    dst[c] = (sum[c] / count) as u8;
                }
            }
        };

        if (out_w as usize) * (out_h as usize) >= PARALLEL_PIXEL_THRESHOLD {
            data.par_chunks_mut(row_bytes).enumerate().for_each(fill_row);
        } else {
            data.chunks_mut(row_bytes).enumerate().for_each(fill_row);
        }

        PixelBuffer::from_raw(out_w, out_h, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_full_resolution_region_copies_pixels() {
        let dec = MemoryRegionDecoder::new(checker(8, 8)).unwrap();
        let buf = dec.decode_region(Rect::new(1, 0, 3, 1), 1).unwrap();
        assert_eq!(buf.width(), 2);
        assert_eq!(buf.image().get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(buf.image().get_pixel(1, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_sampled_region_box_filters() {
        let dec = MemoryRegionDecoder::new(checker(8, 8)).unwrap();
        let buf = dec.decode_region(Rect::new(0, 0, 8, 8), 2).unwrap();
        assert_eq!((buf.width(), buf.height()), (4, 4));
        // Each 2x2 block holds two white and two black pixels.
        assert_eq!(buf.image().get_pixel(2, 3).0, [127, 127, 127, 255]);
    }

    #[test]
    fn test_region_outside_bounds_fails() {
        let dec = MemoryRegionDecoder::new(checker(4, 4)).unwrap();
        let err = dec.decode_region(Rect::new(2, 2, 6, 6), 1).unwrap_err();
        assert!(err.is_tile_failure());
    }
}
