use approx::assert_relative_eq;

use ganymede_core::ballistic::SplineBallistic;
use ganymede_core::config::ScaleLimits;
use ganymede_core::geometry::{Orientation, PointF, RectF};
use ganymede_core::gesture::{GestureAdapter, GestureEvent};
use ganymede_core::viewport::Viewport;

fn viewport(view: (u32, u32), image: (u32, u32)) -> Viewport {
    let mut vp = Viewport::default();
    vp.resize(view.0, view.1);
    vp.image_ready(image.0, image.1);
    vp
}

fn adapter() -> GestureAdapter {
    GestureAdapter::new(Box::new(SplineBallistic::default())).with_smooth_zoom_ms(300)
}

#[test]
fn test_fit_and_center() {
    let mut vp = viewport((800, 600), (8000, 6000));
    assert!(vp.is_ready());
    assert_relative_eq!(vp.fit_scale(), 0.1);
    assert_relative_eq!(vp.scale(), 0.1);
    let (src, dst) = vp.visible_rects().unwrap();
    assert_eq!(src, RectF::from_size(8000.0, 6000.0));
    assert_relative_eq!(dst.right, 800.0, epsilon = 1e-3);
    assert_relative_eq!(dst.bottom, 600.0, epsilon = 1e-3);
}

#[test]
fn test_small_image_fits_and_centers() {
    let vp = viewport((800, 600), (200, 100));
    // Fit is 4x; the max scale widens to include it.
    assert_relative_eq!(vp.fit_scale(), 4.0);
    assert!(vp.max_scale() >= 4.0);
    let dst = vp.dst_rect();
    assert_relative_eq!(dst.left, 0.0);
    assert_relative_eq!(dst.top, 100.0);
}

#[test]
fn test_translate_at_fit_is_unconsumed() {
    let mut vp = viewport((800, 600), (8000, 6000));
    let remain = vp.translate(50.0, 0.0);
    assert_eq!(remain, PointF::new(50.0, 0.0));
}

#[test]
fn test_translate_clamps_at_edges() {
    let mut vp = viewport((800, 600), (8000, 6000));
    assert!(vp.set_scale(0.0, 0.0, 1.0));
    assert_relative_eq!(vp.dst_rect().left, 0.0);

    // Already at the left edge: moving right is refused entirely.
    assert_eq!(vp.translate(50.0, 0.0), PointF::new(50.0, 0.0));

    assert_eq!(vp.translate(-100.0, -40.0), PointF::ZERO);
    assert_relative_eq!(vp.dst_rect().left, -100.0);
    assert_relative_eq!(vp.dst_rect().top, -40.0);

    let remain = vp.translate(150.0, 0.0);
    assert_relative_eq!(remain.x, 50.0);
    assert_relative_eq!(vp.dst_rect().left, 0.0);
}

#[test]
fn test_scale_clamped_to_limits() {
    let mut vp = viewport((800, 600), (8000, 6000));
    vp.set_scale(400.0, 300.0, 100.0);
    assert_relative_eq!(vp.scale(), 8.0);
    vp.set_scale(400.0, 300.0, 0.0001);
    assert_relative_eq!(vp.scale(), 0.1);
    assert!(!vp.set_scale(400.0, 300.0, 0.05));
}

#[test]
fn test_custom_limits_widen_to_fit() {
    let mut vp = Viewport::new(ScaleLimits { min: 0.5, max: 2.0 });
    vp.resize(100, 100);
    vp.image_ready(1000, 1000);
    assert_relative_eq!(vp.min_scale(), 0.1);
    assert_relative_eq!(vp.max_scale(), 2.0);
}

#[test]
fn test_scale_keeps_focus_fixed() {
    let mut vp = viewport((800, 600), (8000, 6000));
    vp.set_scale(200.0, 150.0, 0.2);
    // Image point under the focus before: (2000, 1500). After: same spot.
    let dst = vp.dst_rect();
    assert_relative_eq!(dst.left + 2000.0 * 0.2, 200.0, epsilon = 1e-2);
    assert_relative_eq!(dst.top + 1500.0 * 0.2, 150.0, epsilon = 1e-2);
}

#[test]
fn test_scale_levels_cycle() {
    let mut vp = viewport((800, 600), (8000, 4800));
    let [a, b, c] = vp.scale_levels();
    assert_relative_eq!(a, 0.1);
    assert_relative_eq!(b, 0.125);
    assert_relative_eq!(c, 1.0);

    assert_relative_eq!(vp.next_scale_level().unwrap(), 0.125);
    vp.set_scale(0.0, 0.0, 0.125);
    assert_relative_eq!(vp.next_scale_level().unwrap(), 1.0);
    vp.set_scale(0.0, 0.0, 1.0);
    assert_relative_eq!(vp.next_scale_level().unwrap(), 0.1);
}

#[test]
fn test_visible_rects_when_zoomed() {
    let mut vp = viewport((800, 600), (8000, 6000));
    vp.set_scale(0.0, 0.0, 1.0);
    vp.translate(-1000.0, -500.0);
    let (src, dst) = vp.visible_rects().unwrap();
    assert_eq!(dst, RectF::from_size(800.0, 600.0));
    assert_relative_eq!(src.left, 1000.0, epsilon = 1e-2);
    assert_relative_eq!(src.top, 500.0, epsilon = 1e-2);
    assert_relative_eq!(src.width(), 800.0, epsilon = 1e-2);
}

#[test]
fn test_rotation_swaps_window() {
    let mut vp = viewport((800, 600), (600, 800));
    assert_relative_eq!(vp.fit_scale(), 0.75);
    assert!(vp.set_orientation(Orientation::Deg90));
    assert_eq!(vp.window_size(), (600, 800));
    assert!(!vp.set_orientation(Orientation::Deg90));
    // Dimensions now match the rotated window exactly.
    assert_relative_eq!(vp.fit_scale(), 1.0);
    assert_relative_eq!(vp.scale(), 0.75);
}

#[test]
fn test_scroll_reports_parent_intercept() {
    let mut vp = viewport((800, 600), (8000, 6000));
    let mut gestures = adapter();
    let out = gestures.handle(&mut vp, GestureEvent::Scroll { dx: 30.0, dy: 0.0 }, 0);
    assert!(out.allow_parent_intercept);
    assert!(!out.invalidate);
    assert_eq!(out.unconsumed, PointF::new(30.0, 0.0));

    vp.set_scale(0.0, 0.0, 1.0);
    let out = gestures.handle(&mut vp, GestureEvent::Scroll { dx: -30.0, dy: 0.0 }, 0);
    assert!(!out.allow_parent_intercept);
    assert!(out.invalidate);
    assert_relative_eq!(vp.dst_rect().left, -30.0);
}

#[test]
fn test_double_tap_zooms_to_next_level() {
    let mut vp = viewport((800, 600), (8000, 4800));
    let mut gestures = adapter();
    let out = gestures.handle(&mut vp, GestureEvent::DoubleTap { x: 400.0, y: 300.0 }, 1000);
    assert!(out.animation_started);
    assert!(gestures.is_animating());

    let mid = gestures.step(&mut vp, 1150);
    assert!(mid.invalidate);
    assert!(!mid.animation_ended);
    assert!(vp.scale() > 0.1 && vp.scale() < 0.125);

    let end = gestures.step(&mut vp, 1300);
    assert!(end.animation_ended);
    assert!(!gestures.is_animating());
    assert_relative_eq!(vp.scale(), 0.125);
}

#[test]
fn test_down_cancels_animation() {
    let mut vp = viewport((800, 600), (8000, 4800));
    let mut gestures = adapter();
    gestures.handle(&mut vp, GestureEvent::DoubleTap { x: 400.0, y: 300.0 }, 0);
    let out = gestures.handle(&mut vp, GestureEvent::Down, 10);
    assert!(out.animation_ended);
    assert_eq!(gestures.animating(), 0);
    assert!(gestures.step(&mut vp, 20) == Default::default());
}

#[test]
fn test_fling_stops_at_edge() {
    let mut vp = viewport((800, 600), (8000, 6000));
    vp.set_scale(0.0, 0.0, 1.0);
    let mut gestures = adapter();

    // Pointer moving left at speed: the image follows left.
    let out = gestures.handle(&mut vp, GestureEvent::Fling { vx: -100_000.0, vy: 0.0 }, 0);
    assert!(out.animation_started);
    let mut now = 0;
    while gestures.is_animating() {
        now += 16;
        gestures.step(&mut vp, now);
        assert!(now < 60_000);
    }
    assert_relative_eq!(vp.dst_rect().right, 800.0, epsilon = 0.5);
}

#[test]
fn test_fling_without_room_does_nothing() {
    let mut vp = viewport((800, 600), (8000, 6000));
    let mut gestures = adapter();
    let out = gestures.handle(&mut vp, GestureEvent::Fling { vx: 3000.0, vy: 3000.0 }, 0);
    assert!(!out.animation_started);
    assert!(!gestures.is_animating());
}

#[test]
fn test_pinch_scales_about_focus() {
    let mut vp = viewport((800, 600), (8000, 6000));
    let mut gestures = adapter();
    let out = gestures.handle(
        &mut vp,
        GestureEvent::Scale {
            focus_x: 400.0,
            focus_y: 300.0,
            factor: 2.0,
        },
        0,
    );
    assert!(out.invalidate);
    assert_relative_eq!(vp.scale(), 0.2);
    assert_relative_eq!(vp.dst_rect().left, -400.0, epsilon = 1e-2);
}

/// Scale within limits, no gap on an overflowing axis, centered otherwise.
fn assert_positioned(vp: &Viewport, label: &str) {
    let eps = 1e-3 * vp.scale().max(1.0) * 100.0;
    assert!(
        vp.min_scale() - 1e-5 <= vp.scale() && vp.scale() <= vp.max_scale() + 1e-5,
        "{label}: scale {} outside [{}, {}]",
        vp.scale(),
        vp.min_scale(),
        vp.max_scale()
    );
    let (ww, wh) = vp.window_size();
    let dst = vp.dst_rect();
    for (lo, hi, window, axis) in [(dst.left, dst.right, ww as f32, "x"), (dst.top, dst.bottom, wh as f32, "y")] {
        let len = hi - lo;
        if len > window + eps {
            assert!(lo <= eps && hi >= window - eps, "{label}: gap on {axis} ({lo}..{hi} in {window})");
        } else {
            let centered = (window - len) / 2.0;
            assert!((lo - centered).abs() <= eps, "{label}: {axis} not centered ({lo} vs {centered})");
        }
    }
}

#[test]
fn test_resize_keeps_image_positioned() {
    let edges = [1u32, 3, 50, 199, 200, 201, 640, 799, 800, 1024, 3000, 8000, 20_000];
    let windows = [(800u32, 600u32), (600, 800), (1, 1), (1920, 1080)];
    let orientations = [Orientation::Deg0, Orientation::Deg90];

    for &iw in &edges {
        for &ih in &edges {
            for &(vw, vh) in &windows {
                for &orientation in &orientations {
                    let mut vp = Viewport::default();
                    vp.set_orientation(orientation);
                    vp.resize(vw, vh);
                    vp.image_ready(iw, ih);
                    let label = format!("{iw}x{ih} in {vw}x{vh} at {orientation}");
                    assert_positioned(&vp, &label);

                    // Zoomed and panned, then resized to the transposed view.
                    vp.scale_by(0.0, 0.0, 3.0);
                    vp.translate(-37.0, 21.0);
                    vp.resize(vh, vw);
                    assert_positioned(&vp, &format!("{label}, resized"));
                }
            }
        }
    }
}
