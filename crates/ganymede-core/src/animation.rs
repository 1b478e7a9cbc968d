//! Time-driven animations of the viewport: smooth zoom and fling.
//!
//! Animations are stepped by the host clock (milliseconds); nothing here owns
//! a timer.

use std::fmt;
use std::sync::Arc;

use crate::ballistic::Ballistic;
use crate::geometry::{lerp, PointF};
use crate::viewport::{FlingBounds, Viewport};

/// Maps normalized time in `[0, 1]` to animation progress.
pub trait Interpolator: Send + Sync {
    fn interpolate(&self, t: f32) -> f32;
}

/// CSS-style cubic bezier easing through (0,0), (x1,y1), (x2,y2), (1,1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicBezier {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

/// Fast out, slow in.
pub const LINEAR_OUT_SLOW_IN: CubicBezier = CubicBezier::new(0.0, 0.0, 0.2, 1.0);

impl CubicBezier {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    fn curve(p1: f32, p2: f32, s: f32) -> f32 {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
    }

    fn curve_slope(p1: f32, p2: f32, s: f32) -> f32 {
        let inv = 1.0 - s;
        3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
    }

    /// Curve parameter whose x equals `x`.
    fn solve_x(&self, x: f32) -> f32 {
        let mut s = x;
        for _ in 0..8 {
            let err = Self::curve(self.x1, self.x2, s) - x;
            if err.abs() < 1e-6 {
                return s;
            }
            let slope = Self::curve_slope(self.x1, self.x2, s);
            if slope.abs() < 1e-6 {
                break;
            }
            s -= err / slope;
            if !(0.0..=1.0).contains(&s) {
                break;
            }
        }

        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        s = x;
        for _ in 0..32 {
            let v = Self::curve(self.x1, self.x2, s);
            if (v - x).abs() < 1e-6 {
                break;
            }
            if v < x {
                lo = s;
            } else {
                hi = s;
            }
            s = (lo + hi) / 2.0;
        }
        s
    }
}

impl Interpolator for CubicBezier {
    fn interpolate(&self, t: f32) -> f32 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        Self::curve(self.y1, self.y2, self.solve_x(t))
    }
}

/// Animates a value from 0 to 1 over a fixed duration.
#[derive(Clone)]
pub struct ValueAnimator {
    start_ms: u64,
    duration_ms: u64,
    interpolator: Arc<dyn Interpolator>,
}

impl ValueAnimator {
    pub fn new(start_ms: u64, duration_ms: u64, interpolator: Arc<dyn Interpolator>) -> Self {
        Self {
            start_ms,
            duration_ms,
            interpolator,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Elapsed fraction of the duration, linear.
    pub fn fraction(&self, now_ms: u64) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.start_ms);
        (elapsed as f32 / self.duration_ms as f32).min(1.0)
    }

    /// Interpolated progress. Exactly 1.0 once finished.
    pub fn value(&self, now_ms: u64) -> f32 {
        let f = self.fraction(now_ms);
        if f >= 1.0 {
            1.0
        } else {
            self.interpolator.interpolate(f)
        }
    }

    pub fn is_finished(&self, now_ms: u64) -> bool {
        self.fraction(now_ms) >= 1.0
    }
}

impl fmt::Debug for ValueAnimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueAnimator")
            .field("start_ms", &self.start_ms)
            .field("duration_ms", &self.duration_ms)
            .finish()
    }
}

/// Eased zoom to a target scale about a fixed focal point.
#[derive(Debug, Clone)]
pub struct SmoothScaler {
    focus: PointF,
    start_scale: f32,
    end_scale: f32,
    animator: ValueAnimator,
}

impl SmoothScaler {
    pub fn new(focus: PointF, start_scale: f32, end_scale: f32, duration_ms: u64, now_ms: u64) -> Self {
        Self {
            focus,
            start_scale,
            end_scale,
            animator: ValueAnimator::new(now_ms, duration_ms, Arc::new(LINEAR_OUT_SLOW_IN)),
        }
    }

    pub fn end_scale(&self) -> f32 {
        self.end_scale
    }

    /// Apply the scale for `now_ms`. Returns false once finished.
    pub fn step(&mut self, viewport: &mut Viewport, now_ms: u64) -> bool {
        let v = self.animator.value(now_ms);
        viewport.set_scale(
            self.focus.x,
            self.focus.y,
            lerp(self.start_scale, self.end_scale, v),
        );
        !self.animator.is_finished(now_ms)
    }
}

/// Inertial pan: travels a fixed distance per axis along the fling curve.
#[derive(Debug, Clone)]
pub struct ImageFling {
    distance: PointF,
    last: PointF,
    animator: ValueAnimator,
}

impl ImageFling {
    /// Plan a fling at `velocity` (px/s, unrotated frame), clamped to `bounds`.
    /// Returns `None` when neither axis can travel.
    pub fn start(ballistic: &dyn Ballistic, velocity: PointF, bounds: FlingBounds, now_ms: u64) -> Option<Self> {
        let (dx, duration_x) = plan_axis(ballistic, velocity.x, bounds.min_x, bounds.max_x);
        let (dy, duration_y) = plan_axis(ballistic, velocity.y, bounds.min_y, bounds.max_y);
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        Some(Self {
            distance: PointF::new(dx, dy),
            last: PointF::ZERO,
            animator: ValueAnimator::new(now_ms, duration_x.max(duration_y), ballistic.interpolator()),
        })
    }

    pub fn distance(&self) -> PointF {
        self.distance
    }

    pub fn duration_ms(&self) -> u64 {
        self.animator.duration_ms()
    }

    /// Translate by the progress since the previous step. Returns false once finished.
    pub fn step(&mut self, viewport: &mut Viewport, now_ms: u64) -> bool {
        let v = self.animator.value(now_ms);
        let x = self.distance.x * v;
        let y = self.distance.y * v;
        viewport.translate(x - self.last.x, y - self.last.y);
        self.last = PointF::new(x, y);
        !self.animator.is_finished(now_ms)
    }
}

fn plan_axis(ballistic: &dyn Ballistic, velocity: f32, min: f32, max: f32) -> (f32, u64) {
    let mut distance = ballistic.travel_distance(velocity);
    let mut duration = ballistic.travel_duration(velocity);
    if distance < min {
        duration = ballistic.adjusted_duration(0.0, distance, min, duration);
        distance = min;
    }
    if distance > max {
        duration = ballistic.adjusted_duration(0.0, distance, max, duration);
        distance = max;
    }
    (distance, duration)
}

/// The single running viewport animation.
#[derive(Debug, Clone)]
pub enum Animation {
    SmoothZoom(SmoothScaler),
    Fling(ImageFling),
}

impl Animation {
    pub fn step(&mut self, viewport: &mut Viewport, now_ms: u64) -> bool {
        match self {
            Animation::SmoothZoom(s) => s.step(viewport, now_ms),
            Animation::Fling(f) => f.step(viewport, now_ms),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Animation::SmoothZoom(_) => "smooth-zoom",
            Animation::Fling(_) => "fling",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bezier_endpoints_and_shape() {
        let c = LINEAR_OUT_SLOW_IN;
        assert_eq!(c.interpolate(0.0), 0.0);
        assert_eq!(c.interpolate(1.0), 1.0);
        // Fast out: well past halfway at half time.
        assert!(c.interpolate(0.5) > 0.75);
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let a = ValueAnimator::new(10, 0, Arc::new(LINEAR_OUT_SLOW_IN));
        assert!(a.is_finished(10));
        assert_eq!(a.value(10), 1.0);
    }
}
