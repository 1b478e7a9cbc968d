use approx::assert_abs_diff_eq;

use ganymede_core::animation::Interpolator;
use ganymede_core::ballistic::{Ballistic, SplineBallistic};
use ganymede_core::config::FlingConfig;

#[test]
fn test_distance_is_signed_and_grows_with_speed() {
    let b = SplineBallistic::default();
    let slow = b.travel_distance(1000.0);
    let fast = b.travel_distance(4000.0);
    assert!(slow > 0.0);
    assert!(fast > slow);
    assert_abs_diff_eq!(b.travel_distance(-1000.0), -slow, epsilon = 1e-3);
    assert_eq!(b.travel_distance(0.0), 0.0);
    assert_eq!(b.travel_duration(f32::NAN), 0);
}

#[test]
fn test_more_friction_stops_sooner() {
    let loose = SplineBallistic::default();
    let tight = SplineBallistic::new(&FlingConfig {
        friction: 0.05,
        ..Default::default()
    });
    assert!(tight.travel_distance(2000.0) < loose.travel_distance(2000.0));
    assert!(tight.travel_duration(2000.0) < loose.travel_duration(2000.0));
}

#[test]
fn test_clamped_fling_finishes_early() {
    let b = SplineBallistic::default();
    let distance = b.travel_distance(3000.0);
    let duration = b.travel_duration(3000.0);
    assert!(duration > 0);

    let half = b.adjusted_duration(0.0, distance, distance / 2.0, duration);
    assert!(half > 0 && half < duration);
    assert_eq!(b.adjusted_duration(0.0, distance, distance, duration), duration);
    assert_eq!(b.adjusted_duration(0.0, 0.0, 0.0, duration), 0);
}

#[test]
fn test_interpolator_spans_zero_to_one() {
    let curve = SplineBallistic::default().interpolator();
    assert_abs_diff_eq!(curve.interpolate(0.0), 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(curve.interpolate(1.0), 1.0, epsilon = 1e-6);
    let mut last = 0.0;
    for i in 1..=20 {
        let v = curve.interpolate(i as f32 / 20.0);
        assert!(v >= last);
        last = v;
    }
}
