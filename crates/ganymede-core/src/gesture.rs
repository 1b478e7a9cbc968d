//! Turns recognized gestures into viewport mutations and runs the animation
//! they start. At most one animation runs; starting one cancels the other.

use tracing::debug;

use crate::animation::{Animation, ImageFling, SmoothScaler};
use crate::ballistic::Ballistic;
use crate::consts::DEFAULT_SMOOTH_ZOOM_MS;
use crate::geometry::PointF;
use crate::viewport::Viewport;

/// Gestures in view coordinates, before the orientation transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureEvent {
    Down,
    Up,
    Cancel,
    SingleTap { x: f32, y: f32 },
    DoubleTap { x: f32, y: f32 },
    LongPress { x: f32, y: f32 },
    /// Pointer movement since the previous scroll event.
    Scroll { dx: f32, dy: f32 },
    /// Pointer velocity at release, px/s.
    Fling { vx: f32, vy: f32 },
    Scale { focus_x: f32, focus_y: f32, factor: f32 },
}

/// What handling a gesture or stepping an animation did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GestureOutcome {
    /// Scroll delta the image could not absorb (unrotated frame).
    pub unconsumed: PointF,
    /// No animation runs and the image could not move horizontally, so an
    /// enclosing scroller may take over.
    pub allow_parent_intercept: bool,
    pub invalidate: bool,
    pub animation_started: bool,
    pub animation_ended: bool,
}

pub struct GestureAdapter {
    ballistic: Box<dyn Ballistic>,
    smooth_zoom_ms: u64,
    animation: Option<Animation>,
    animating: u32,
}

impl GestureAdapter {
    pub fn new(ballistic: Box<dyn Ballistic>) -> Self {
        Self {
            ballistic,
            smooth_zoom_ms: DEFAULT_SMOOTH_ZOOM_MS,
            animation: None,
            animating: 0,
        }
    }

    pub fn with_smooth_zoom_ms(mut self, ms: u64) -> Self {
        self.smooth_zoom_ms = ms;
        self
    }

    /// Number of running animations, passed on to the tile cache.
    pub fn animating(&self) -> u32 {
        self.animating
    }

    pub fn is_animating(&self) -> bool {
        self.animating > 0
    }

    pub fn animation(&self) -> Option<&Animation> {
        self.animation.as_ref()
    }

    pub fn handle(&mut self, viewport: &mut Viewport, event: GestureEvent, now_ms: u64) -> GestureOutcome {
        let mut out = GestureOutcome::default();
        match event {
            GestureEvent::Down => {
                out.animation_ended = self.cancel();
            }
            GestureEvent::Up
            | GestureEvent::Cancel
            | GestureEvent::SingleTap { .. }
            | GestureEvent::LongPress { .. } => {}
            GestureEvent::DoubleTap { x, y } => {
                let focus = viewport.transform_point(PointF::new(x, y));
                if let Some(target) = viewport.next_scale_level() {
                    let scaler = SmoothScaler::new(
                        focus,
                        viewport.scale(),
                        target,
                        self.smooth_zoom_ms,
                        now_ms,
                    );
                    debug!(from = viewport.scale(), to = target, "Smooth zoom");
                    self.start(Animation::SmoothZoom(scaler), &mut out);
                }
            }
            GestureEvent::Scroll { dx, dy } => {
                let d = viewport.transform_distance(PointF::new(dx, dy));
                let remain = viewport.translate(d.x, d.y);
                out.unconsumed = remain;
                out.invalidate = remain != d;
                out.allow_parent_intercept = self.animating == 0 && remain.x == d.x;
            }
            GestureEvent::Fling { vx, vy } => {
                let v = viewport.transform_distance(PointF::new(vx, vy));
                let fling = viewport
                    .fling_bounds()
                    .and_then(|bounds| ImageFling::start(self.ballistic.as_ref(), v, bounds, now_ms));
                if let Some(fling) = fling {
                    debug!(distance = ?fling.distance(), duration_ms = fling.duration_ms(), "Fling");
                    self.start(Animation::Fling(fling), &mut out);
                }
            }
            GestureEvent::Scale {
                focus_x,
                focus_y,
                factor,
            } => {
                let focus = viewport.transform_point(PointF::new(focus_x, focus_y));
                out.invalidate = viewport.scale_by(focus.x, focus.y, factor);
            }
        }
        out
    }

    /// Advance the running animation to `now_ms`.
    pub fn step(&mut self, viewport: &mut Viewport, now_ms: u64) -> GestureOutcome {
        let mut out = GestureOutcome::default();
        let Some(animation) = self.animation.as_mut() else {
            return out;
        };
        let running = animation.step(viewport, now_ms);
        out.invalidate = true;
        if !running {
            debug!(animation = animation.name(), "Animation finished");
            self.animation = None;
            self.animating = self.animating.saturating_sub(1);
            out.animation_ended = true;
        }
        out
    }

    /// Stop the running animation where it is. Returns true if one was running.
    pub fn cancel(&mut self) -> bool {
        match self.animation.take() {
            Some(animation) => {
                debug!(animation = animation.name(), "Animation cancelled");
                self.animating = self.animating.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    fn start(&mut self, animation: Animation, out: &mut GestureOutcome) {
        out.animation_ended |= self.cancel();
        self.animation = Some(animation);
        self.animating += 1;
        out.animation_started = true;
        out.invalidate = true;
    }
}
