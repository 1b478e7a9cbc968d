use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer rectangle, right/bottom exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width() as i64 * self.height() as i64
        }
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn to_f32(&self) -> RectF {
        RectF::new(
            self.left as f32,
            self.top as f32,
            self.right as f32,
            self.bottom as f32,
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{} {}x{})",
            self.left,
            self.top,
            self.width(),
            self.height()
        )
    }
}

/// Float rectangle, right/bottom exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub const EMPTY: RectF = RectF::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        !(self.left < self.right && self.top < self.bottom)
    }

    pub fn intersect(&self, other: &RectF) -> Option<RectF> {
        let r = RectF::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn union(&self, other: &RectF) -> RectF {
        RectF::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn offset(&mut self, dx: f32, dy: f32) {
        self.left += dx;
        self.right += dx;
        self.top += dy;
        self.bottom += dy;
    }

    /// Move the rectangle so its top-left corner sits at (x, y), keeping its size.
    pub fn offset_to(&mut self, x: f32, y: f32) {
        self.offset(x - self.left, y - self.top);
    }

    /// Scale all edges by `1 / divisor`.
    pub fn divided(&self, divisor: f32) -> RectF {
        RectF::new(
            self.left / divisor,
            self.top / divisor,
            self.right / divisor,
            self.bottom / divisor,
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const ZERO: PointF = PointF { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Map `s`, given in the space of `src`, into the space of `dst` by matching corners.
pub fn map_rect(src: &RectF, dst: &RectF, s: &RectF) -> RectF {
    let scale_x = dst.width() / src.width();
    let scale_y = dst.height() / src.height();
    RectF::new(
        dst.left + (s.left - src.left) * scale_x,
        dst.top + (s.top - src.top) * scale_y,
        dst.left + (s.right - src.left) * scale_x,
        dst.top + (s.bottom - src.top) * scale_y,
    )
}

pub fn lerp(start: f32, stop: f32, amount: f32) -> f32 {
    start + (stop - start) * amount
}

/// Inverse of [`lerp`]. A zero-length range yields 1.0 at its end and NaN elsewhere.
pub fn norm(start: f32, stop: f32, value: f32) -> f32 {
    if stop == start {
        if stop == value {
            1.0
        } else {
            f32::NAN
        }
    } else {
        (value - start) / (stop - start)
    }
}

/// Rotation of the displayed image relative to the view, clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Orientation::Deg0),
            90 => Some(Orientation::Deg90),
            180 => Some(Orientation::Deg180),
            270 => Some(Orientation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }

    /// The next orientation, rotating a further 90 degrees clockwise.
    pub fn rotated_cw(self) -> Self {
        match self {
            Orientation::Deg0 => Orientation::Deg90,
            Orientation::Deg90 => Orientation::Deg180,
            Orientation::Deg180 => Orientation::Deg270,
            Orientation::Deg270 => Orientation::Deg0,
        }
    }

    pub fn swaps_axes(self) -> bool {
        matches!(self, Orientation::Deg90 | Orientation::Deg270)
    }

    /// Effective (unrotated) window size for a view of `w` x `h`.
    pub fn window_size(self, w: u32, h: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Rotate a view-space point into the unrotated viewport frame.
    pub fn transform_point(self, p: PointF, view_width: f32, view_height: f32) -> PointF {
        match self {
            Orientation::Deg0 => p,
            Orientation::Deg90 => PointF::new(p.y, view_width - p.x),
            Orientation::Deg180 => PointF::new(view_width - p.x, view_height - p.y),
            Orientation::Deg270 => PointF::new(view_height - p.y, p.x),
        }
    }

    /// Rotate a view-space vector (distance or velocity) into the unrotated frame.
    pub fn transform_distance(self, v: PointF) -> PointF {
        match self {
            Orientation::Deg0 => v,
            Orientation::Deg90 => PointF::new(v.y, -v.x),
            Orientation::Deg180 => PointF::new(-v.x, -v.y),
            Orientation::Deg270 => PointF::new(-v.y, v.x),
        }
    }

    /// Inverse of [`Orientation::transform_point`].
    pub fn untransform_point(self, p: PointF, view_width: f32, view_height: f32) -> PointF {
        match self {
            Orientation::Deg0 => p,
            Orientation::Deg90 => PointF::new(view_width - p.y, p.x),
            Orientation::Deg180 => PointF::new(view_width - p.x, view_height - p.y),
            Orientation::Deg270 => PointF::new(p.y, view_height - p.x),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
