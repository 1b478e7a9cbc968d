use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::consts::{PARALLEL_PIXEL_THRESHOLD, RGBA_CHANNELS};
use crate::geometry::{PointF, RectF};
use crate::pixels::PixelBuffer;

use super::{Canvas, ViewTransform};

/// CPU canvas rasterizing into an RGBA image with nearest sampling.
pub struct SoftwareCanvas {
    target: RgbaImage,
    transform: ViewTransform,
    draw_calls: usize,
}

impl SoftwareCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            target: RgbaImage::new(width, height),
            transform: ViewTransform::new(Default::default(), width as f32, height as f32),
            draw_calls: 0,
        }
    }

    pub fn clear(&mut self, color: Rgba<u8>) {
        for p in self.target.pixels_mut() {
            *p = color;
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.target
    }

    pub fn into_image(self) -> RgbaImage {
        self.target
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }
}

impl Canvas for SoftwareCanvas {
    fn set_transform(&mut self, transform: ViewTransform) {
        self.transform = transform;
    }

    fn draw_pixels(&mut self, pixels: &PixelBuffer, src: RectF, dst: RectF) {
        if src.is_empty() || dst.is_empty() {
            return;
        }
        self.draw_calls += 1;

        let (tw, th) = self.target.dimensions();
        let bounds = self.transform.map_rect(&dst);
        let x0 = bounds.left.max(0.0).floor() as u32;
        let y0 = bounds.top.max(0.0).floor() as u32;
        let x1 = (bounds.right.ceil().max(0.0) as u32).min(tw);
        let y1 = (bounds.bottom.ceil().max(0.0) as u32).min(th);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let transform = self.transform;
        let source = pixels.image();
        let (sw, sh) = source.dimensions();
        if sw == 0 || sh == 0 {
            return;
        }
        let scale_x = src.width() / dst.width();
        let scale_y = src.height() / dst.height();
        let row_bytes = tw as usize * RGBA_CHANNELS;

        let blend_row = |(y, row): (usize, &mut [u8])| {
            let y = y as u32 + y0;
            for x in x0..x1 {
                let u = transform.unmap_point(PointF::new(x as f32 + 0.5, y as f32 + 0.5));
                if u.x < dst.left || u.x >= dst.right || u.y < dst.top || u.y >= dst.bottom {
                    continue;
                }
                let sx = (src.left + (u.x - dst.left) * scale_x).floor();
                let sy = (src.top + (u.y - dst.top) * scale_y).floor();
                let sx = (sx.max(0.0) as u32).min(sw - 1);
                let sy = (sy.max(0.0) as u32).min(sh - 1);
                let s = source.get_pixel(sx, sy).0;
                let i = x as usize * RGBA_CHANNELS;
                blend_over(&mut row[i..i + RGBA_CHANNELS], s);
            }
        };

        let rows: &mut [u8] = &mut self.target;
        let rows = &mut rows[y0 as usize * row_bytes..y1 as usize * row_bytes];
        if ((x1 - x0) as usize) * ((y1 - y0) as usize) >= PARALLEL_PIXEL_THRESHOLD {
            rows.par_chunks_mut(row_bytes).enumerate().for_each(blend_row);
        } else {
            rows.chunks_mut(row_bytes).enumerate().for_each(blend_row);
        }
    }
}

fn blend_over(dst: &mut [u8], src: [u8; 4]) {
    let a = src[3] as u32;
    if a == 255 {
        dst.copy_from_slice(&src);
        return;
    }
    if a == 0 {
        return;
    }
    let inv = 255 - a;
    for c in 0..3 {
        dst[c] = ((src[c] as u32 * a + dst[c] as u32 * inv) / 255) as u8;
    }
    dst[3] = (a + dst[3] as u32 * inv / 255).min(255) as u8;
}
