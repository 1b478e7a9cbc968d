mod software;

use crate::geometry::{Orientation, PointF, RectF};
use crate::pixels::PixelBuffer;

pub use software::SoftwareCanvas;

/// Maps the unrotated viewport frame onto the view.
///
/// Everything the viewport and the tile cache compute lives in the unrotated
/// frame, whose size is the view size with axes swapped for 90 and 270 degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewTransform {
    pub orientation: Orientation,
    pub view_width: f32,
    pub view_height: f32,
}

impl ViewTransform {
    pub fn new(orientation: Orientation, view_width: f32, view_height: f32) -> Self {
        Self {
            orientation,
            view_width,
            view_height,
        }
    }

    pub fn map_point(&self, p: PointF) -> PointF {
        self.orientation
            .untransform_point(p, self.view_width, self.view_height)
    }

    /// View point to the unrotated frame.
    pub fn unmap_point(&self, p: PointF) -> PointF {
        self.orientation
            .transform_point(p, self.view_width, self.view_height)
    }

    /// Axis-aligned view rectangle covered by an unrotated rectangle.
    pub fn map_rect(&self, r: &RectF) -> RectF {
        let a = self.map_point(PointF::new(r.left, r.top));
        let b = self.map_point(PointF::new(r.right, r.bottom));
        RectF::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }
}

/// Rendering surface the sources draw into.
pub trait Canvas {
    /// Set the orientation transform for subsequent draws.
    fn set_transform(&mut self, transform: ViewTransform);

    /// Draw the `src` part of `pixels` (buffer pixel coordinates) stretched
    /// over `dst` (unrotated viewport coordinates).
    fn draw_pixels(&mut self, pixels: &PixelBuffer, src: RectF, dst: RectF);
}
