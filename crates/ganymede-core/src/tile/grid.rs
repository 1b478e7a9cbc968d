use crate::consts::SAMPLE_RATIO_EPSILON;
use crate::geometry::{Rect, RectF};

/// Largest power of two not exceeding `n`. Zero maps to 1.
pub fn prev_pow2(n: u32) -> u32 {
    if n <= 1 {
        1
    } else {
        1 << (31 - n.leading_zeros())
    }
}

/// Integer division rounding up. Zero divisor yields 0.
pub fn ceil_div(a: u32, b: u32) -> u32 {
    if b == 0 {
        0
    } else {
        a.div_ceil(b)
    }
}

/// Sample factor needed to draw `src_w x src_h` image pixels into
/// `dst_w x dst_h` screen pixels without upsampling a coarser level.
pub fn calculate_sample(src_w: f32, src_h: f32, dst_w: f32, dst_h: f32) -> u32 {
    let ratio = |s: f32, d: f32| -> u32 {
        if d <= 0.0 || !s.is_finite() || !d.is_finite() {
            1
        } else {
            (s / d - SAMPLE_RATIO_EPSILON).ceil().max(1.0) as u32
        }
    };
    prev_pow2(ratio(src_w, dst_w).max(ratio(src_h, dst_h)))
}

/// Sample factor of the always-resident full level: the coarsest power of two
/// at which the whole image still fills the window.
///
/// Integer division on purpose: 8000x6000 in 800x600 gives `prev_pow2(10) = 8`.
pub fn full_sample(image_w: u32, image_h: u32, window_w: u32, window_h: u32) -> u32 {
    if window_w == 0 || window_h == 0 {
        return 1;
    }
    prev_pow2((image_w / window_w).max(image_h / window_h).max(1))
}

/// Sample factor for one draw, never coarser than the full level.
pub fn draw_sample(src: &RectF, dst: &RectF, full: u32) -> u32 {
    calculate_sample(src.width(), src.height(), dst.width(), dst.height()).min(full.max(1))
}

/// Partition a `width x height` image into tiles, row-major.
///
/// Each tile covers at most `max_tile_edge` sampled pixels per edge, so the
/// step in full-resolution pixels is `max_tile_edge * sample`. The last row
/// and column are clipped to the image.
pub fn build_tile_grid(width: u32, height: u32, sample: u32, max_tile_edge: u32) -> Vec<Rect> {
    if width == 0 || height == 0 || sample == 0 || max_tile_edge == 0 {
        return Vec::new();
    }
    let step = max_tile_edge.saturating_mul(sample);
    let cols = ceil_div(width, step);
    let rows = ceil_div(height, step);

    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        let top = row * step;
        let bottom = (top + step).min(height);
        for col in 0..cols {
            let left = col * step;
            let right = (left + step).min(width);
            tiles.push(Rect::new(
                left as i32,
                top as i32,
                right as i32,
                bottom as i32,
            ));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prev_pow2() {
        assert_eq!(prev_pow2(0), 1);
        assert_eq!(prev_pow2(1), 1);
        assert_eq!(prev_pow2(5), 4);
        assert_eq!(prev_pow2(1024), 1024);
        assert_eq!(prev_pow2(1025), 1024);
    }

    #[test]
    fn test_calculate_sample_tolerates_float_noise() {
        assert_eq!(calculate_sample(800.0001, 600.0, 400.0, 300.0), 2);
        assert_eq!(calculate_sample(801.0, 600.0, 400.0, 300.0), 2);
        assert_eq!(calculate_sample(100.0, 100.0, 400.0, 300.0), 1);
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(10, 3), 4);
        assert_eq!(ceil_div(9, 3), 3);
        assert_eq!(ceil_div(1, 0), 0);
    }
}
