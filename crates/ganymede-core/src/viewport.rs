//! Viewport state: scale bounds, pan clamping and the per-frame
//! source/destination rectangles.
//!
//! All coordinates here are in the unrotated frame: the view with its axes
//! swapped for 90 and 270 degree orientations. Use
//! [`Viewport::transform_point`] and [`Viewport::transform_distance`] to bring
//! view-space input into it.

use tracing::debug;

use crate::config::ScaleLimits;
use crate::consts::SCALE_LEVEL_TOLERANCE;
use crate::geometry::{lerp, norm, Orientation, PointF, RectF};
use crate::render::ViewTransform;

/// How far a fling may move the image per axis before hitting the pan clamp.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlingBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

#[derive(Clone, Debug)]
pub struct Viewport {
    limits: ScaleLimits,
    view_width: u32,
    view_height: u32,
    window_width: u32,
    window_height: u32,
    image_width: u32,
    image_height: u32,
    orientation: Orientation,
    scale: f32,
    /// The whole image's on-screen rectangle.
    dst: RectF,
    fit_scale: f32,
    min_scale: f32,
    max_scale: f32,
    scale_levels: [f32; 3],
    rect_dirty: bool,
    visible: Option<(RectF, RectF)>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ScaleLimits::default())
    }
}

impl Viewport {
    pub fn new(limits: ScaleLimits) -> Self {
        Self {
            limits,
            view_width: 0,
            view_height: 0,
            window_width: 0,
            window_height: 0,
            image_width: 0,
            image_height: 0,
            orientation: Orientation::Deg0,
            scale: 1.0,
            dst: RectF::EMPTY,
            fit_scale: 1.0,
            min_scale: limits.min,
            max_scale: limits.max,
            scale_levels: [1.0; 3],
            rect_dirty: true,
            visible: None,
        }
    }

    /// An image is attached and positioned.
    pub fn is_ready(&self) -> bool {
        !self.dst.is_empty()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn fit_scale(&self) -> f32 {
        self.fit_scale
    }

    pub fn min_scale(&self) -> f32 {
        self.min_scale
    }

    pub fn max_scale(&self) -> f32 {
        self.max_scale
    }

    /// Sorted `[fit width, fit height, 1.0]`, each clamped to the scale range.
    pub fn scale_levels(&self) -> [f32; 3] {
        self.scale_levels
    }

    pub fn dst_rect(&self) -> RectF {
        self.dst
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Effective window size (axes swapped for 90/270).
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn view_size(&self) -> (u32, u32) {
        (self.view_width, self.view_height)
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn view_transform(&self) -> ViewTransform {
        ViewTransform::new(
            self.orientation,
            self.view_width as f32,
            self.view_height as f32,
        )
    }

    /// View-space point to the unrotated frame.
    pub fn transform_point(&self, p: PointF) -> PointF {
        self.orientation
            .transform_point(p, self.view_width as f32, self.view_height as f32)
    }

    /// View-space vector to the unrotated frame.
    pub fn transform_distance(&self, v: PointF) -> PointF {
        self.orientation.transform_distance(v)
    }

    /// The view was resized to `width x height`.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.view_width = width;
        self.view_height = height;
        self.update_window_size();
        self.refit();
    }

    /// Returns false if the orientation was already `orientation`.
    pub fn set_orientation(&mut self, orientation: Orientation) -> bool {
        if self.orientation == orientation {
            return false;
        }
        self.orientation = orientation;
        let old = self.window_size();
        self.update_window_size();
        if old != self.window_size() {
            self.refit();
        }
        self.rect_dirty = true;
        true
    }

    /// An image of `width x height` is attached: fit and center it.
    pub fn image_ready(&mut self, width: u32, height: u32) {
        self.image_width = width;
        self.image_height = height;
        self.dst = RectF::EMPTY;
        self.update_scale();
        self.init_position();
    }

    /// Forget the image.
    pub fn reset(&mut self) {
        self.image_width = 0;
        self.image_height = 0;
        self.dst = RectF::EMPTY;
        self.visible = None;
        self.rect_dirty = true;
    }

    /// Move the image by `(dx, dy)`; positive dx moves it right.
    ///
    /// Returns the part of the delta the image could not absorb per axis. An
    /// axis where the image fits the window absorbs nothing.
    pub fn translate(&mut self, dx: f32, dy: f32) -> PointF {
        if !self.has_window() || self.dst.is_empty() {
            return PointF::new(dx, dy);
        }
        let (ww, wh) = (self.window_width as f32, self.window_height as f32);

        let remain_x = if self.dst.width() > ww {
            self.dst.offset(dx, 0.0);
            if self.dst.left > 0.0 {
                let fix = self.dst.left;
                self.dst.offset(-fix, 0.0);
                fix
            } else if ww - self.dst.right > 0.0 {
                let fix = ww - self.dst.right;
                self.dst.offset(fix, 0.0);
                -fix
            } else {
                0.0
            }
        } else {
            dx
        };

        let remain_y = if self.dst.height() > wh {
            self.dst.offset(0.0, dy);
            if self.dst.top > 0.0 {
                let fix = self.dst.top;
                self.dst.offset(0.0, -fix);
                fix
            } else if wh - self.dst.bottom > 0.0 {
                let fix = wh - self.dst.bottom;
                self.dst.offset(0.0, fix);
                -fix
            } else {
                0.0
            }
        } else {
            dy
        };

        if remain_x != dx || remain_y != dy {
            self.rect_dirty = true;
        }
        PointF::new(remain_x, remain_y)
    }

    /// Scale to `scale` about focal point `(x, y)`. Returns true if the scale changed.
    pub fn set_scale(&mut self, x: f32, y: f32, scale: f32) -> bool {
        if self.image_width == 0 || self.image_height == 0 || self.dst.is_empty() {
            return false;
        }
        let scale = scale.clamp(self.min_scale, self.max_scale);
        if scale == self.scale {
            return false;
        }
        let ratio = scale / self.scale;
        self.scale = scale;
        let left = x - (x - self.dst.left) * ratio;
        let top = y - (y - self.dst.top) * ratio;
        self.dst = RectF::new(
            left,
            top,
            left + self.image_width as f32 * scale,
            top + self.image_height as f32 * scale,
        );
        self.adjust_position();
        self.rect_dirty = true;
        true
    }

    /// Multiply the scale by `factor` about `(x, y)`.
    pub fn scale_by(&mut self, x: f32, y: f32, factor: f32) -> bool {
        self.set_scale(x, y, self.scale * factor)
    }

    /// The scale a double tap moves to: the smallest level above the current
    /// scale, wrapping to the smallest level.
    pub fn next_scale_level(&self) -> Option<f32> {
        if !self.is_ready() {
            return None;
        }
        let next = self
            .scale_levels
            .iter()
            .copied()
            .find(|&level| self.scale < level - SCALE_LEVEL_TOLERANCE)
            .unwrap_or(self.scale_levels[0]);
        Some(next)
    }

    /// Travel allowed before a fling hits the pan clamp, per axis.
    pub fn fling_bounds(&self) -> Option<FlingBounds> {
        if !self.has_window() || self.dst.is_empty() {
            return None;
        }
        let (ww, wh) = (self.window_width as f32, self.window_height as f32);
        let d = &self.dst;
        Some(FlingBounds {
            min_x: if d.right > ww { ww - d.right } else { 0.0 },
            max_x: if d.left < 0.0 { -d.left } else { 0.0 },
            min_y: if d.bottom > wh { wh - d.bottom } else { 0.0 },
            max_y: if d.top < 0.0 { -d.top } else { 0.0 },
        })
    }

    /// `(src, dst)` for the next frame: the visible part of the image in image
    /// pixels and where it lands in the window. `None` when nothing is visible.
    pub fn visible_rects(&mut self) -> Option<(RectF, RectF)> {
        if self.rect_dirty {
            self.visible = self.compute_visible();
            self.rect_dirty = false;
        }
        self.visible
    }

    fn compute_visible(&self) -> Option<(RectF, RectF)> {
        if self.dst.is_empty() {
            return None;
        }
        let window = RectF::from_size(self.window_width as f32, self.window_height as f32);
        let shown = self.dst.intersect(&window)?;
        let (iw, ih) = (self.image_width as f32, self.image_height as f32);
        if shown == self.dst {
            return Some((RectF::from_size(iw, ih), shown));
        }
        let d = &self.dst;
        let src = RectF::new(
            lerp(0.0, iw, norm(d.left, d.right, shown.left)),
            lerp(0.0, ih, norm(d.top, d.bottom, shown.top)),
            lerp(0.0, iw, norm(d.left, d.right, shown.right)),
            lerp(0.0, ih, norm(d.top, d.bottom, shown.bottom)),
        );
        (!src.is_empty()).then_some((src, shown))
    }

    fn has_window(&self) -> bool {
        self.window_width > 0 && self.window_height > 0
    }

    fn has_image(&self) -> bool {
        self.image_width > 0 && self.image_height > 0
    }

    fn update_window_size(&mut self) {
        let (w, h) = self.orientation.window_size(self.view_width, self.view_height);
        self.window_width = w;
        self.window_height = h;
        self.rect_dirty = true;
    }

    fn refit(&mut self) {
        if !self.has_image() {
            return;
        }
        self.update_scale();
        if self.dst.is_empty() {
            self.init_position();
        } else {
            self.adjust_scale();
            self.adjust_position();
        }
    }

    fn update_scale(&mut self) {
        if !self.has_window() || !self.has_image() {
            return;
        }
        let width_scale = self.window_width as f32 / self.image_width as f32;
        let height_scale = self.window_height as f32 / self.image_height as f32;
        let fit = width_scale.min(height_scale);

        self.fit_scale = fit;
        self.max_scale = self.limits.max.max(fit);
        self.min_scale = self.limits.min.min(fit);

        let mut levels = [
            width_scale.clamp(self.min_scale, self.max_scale),
            height_scale.clamp(self.min_scale, self.max_scale),
            1.0,
        ];
        levels.sort_by(f32::total_cmp);
        self.scale_levels = levels;
    }

    fn init_position(&mut self) {
        if !self.has_window() || !self.has_image() {
            return;
        }
        let (ww, wh) = (self.window_width as f32, self.window_height as f32);
        self.scale = self.fit_scale;
        let dw = self.image_width as f32 * self.scale;
        let dh = self.image_height as f32 * self.scale;
        let left = (ww - dw) / 2.0;
        let top = (wh - dh) / 2.0;
        self.dst = RectF::new(left, top, left + dw, top + dh);
        self.adjust_position();
        self.rect_dirty = true;
        debug!(scale = self.scale, dst = ?self.dst, "Image positioned");
    }

    /// Clamp the scale into range, keeping the top-left corner.
    fn adjust_scale(&mut self) {
        if !self.has_image() || self.dst.is_empty() {
            return;
        }
        let clamped = self.scale.clamp(self.min_scale, self.max_scale);
        if clamped == self.scale {
            return;
        }
        self.scale = clamped;
        self.dst.right = self.dst.left + clamped * self.image_width as f32;
        self.dst.bottom = self.dst.top + clamped * self.image_height as f32;
        self.rect_dirty = true;
    }

    /// Per axis: an image larger than the window may not leave a gap at either
    /// edge; a smaller one is centered.
    fn adjust_position(&mut self) {
        if !self.has_window() {
            return;
        }
        let (ww, wh) = (self.window_width as f32, self.window_height as f32);
        let (dw, dh) = (self.dst.width(), self.dst.height());
        if dw <= 0.0 || dh <= 0.0 {
            return;
        }

        if dw > ww {
            if self.dst.left > 0.0 {
                let fix = self.dst.left;
                self.dst.offset(-fix, 0.0);
            } else if ww - self.dst.right > 0.0 {
                let fix = ww - self.dst.right;
                self.dst.offset(fix, 0.0);
            }
        } else {
            let top = self.dst.top;
            self.dst.offset_to((ww - dw) / 2.0, top);
        }

        if dh > wh {
            if self.dst.top > 0.0 {
                let fix = self.dst.top;
                self.dst.offset(0.0, -fix);
            } else if wh - self.dst.bottom > 0.0 {
                let fix = wh - self.dst.bottom;
                self.dst.offset(0.0, fix);
            }
        } else {
            let left = self.dst.left;
            self.dst.offset_to(left, (wh - dh) / 2.0);
        }
        self.rect_dirty = true;
    }
}
