//! Fling physics: how far and how long a flung image travels.

use std::sync::Arc;

use crate::animation::Interpolator;
use crate::config::FlingConfig;
use crate::consts::{FLING_INFLEXION, FLING_SPLINE_SAMPLES, FLING_TUNING, GRAVITY_EARTH, INCHES_PER_METER};

/// Converts a fling velocity into travel distance and duration.
pub trait Ballistic {
    /// Signed distance in pixels travelled by a fling at `velocity` px/s.
    fn travel_distance(&self, velocity: f32) -> f32;

    /// Duration in milliseconds of a fling at `velocity` px/s.
    fn travel_duration(&self, velocity: f32) -> u64;

    /// Duration for a fling that was meant to end at `computed_end` but is
    /// cut short at `clamped_end`.
    fn adjusted_duration(&self, start: f32, computed_end: f32, clamped_end: f32, duration_ms: u64) -> u64;

    /// Progress curve of the fling over normalized time.
    fn interpolator(&self) -> Arc<dyn Interpolator>;
}

const START_TENSION: f64 = 0.5;
const END_TENSION: f64 = 1.0;
const BISECTION_TOLERANCE: f64 = 1e-5;
const BISECTION_MAX_STEPS: usize = 64;

fn deceleration_rate() -> f64 {
    0.78f64.ln() / 0.9f64.ln()
}

/// Precomputed position and time curves of the deceleration spline.
#[derive(Debug)]
struct SplineTables {
    position: Vec<f64>,
    time: Vec<f64>,
}

impl SplineTables {
    fn build() -> Self {
        let n = FLING_SPLINE_SAMPLES;
        let inflexion = FLING_INFLEXION as f64;
        let p1 = START_TENSION * inflexion;
        let p2 = 1.0 - END_TENSION * (1.0 - inflexion);

        let mut position = vec![0.0; n + 1];
        let mut time = vec![0.0; n + 1];
        let (mut x_min, mut y_min) = (0.0f64, 0.0f64);

        for i in 0..n {
            let alpha = i as f64 / n as f64;

            let mut x_max = 1.0;
            let mut x = x_min;
            for _ in 0..BISECTION_MAX_STEPS {
                x = x_min + (x_max - x_min) / 2.0;
                let coef = 3.0 * x * (1.0 - x);
                let tx = coef * ((1.0 - x) * p1 + x * p2) + x * x * x;
                if (tx - alpha).abs() < BISECTION_TOLERANCE {
                    break;
                }
                if tx > alpha {
                    x_max = x;
                } else {
                    x_min = x;
                }
            }
            let coef = 3.0 * x * (1.0 - x);
            position[i] = coef * ((1.0 - x) * START_TENSION + x) + x * x * x;

            let mut y_max = 1.0;
            let mut y = y_min;
            for _ in 0..BISECTION_MAX_STEPS {
                y = y_min + (y_max - y_min) / 2.0;
                let coef = 3.0 * y * (1.0 - y);
                let dy = coef * ((1.0 - y) * START_TENSION + y) + y * y * y;
                if (dy - alpha).abs() < BISECTION_TOLERANCE {
                    break;
                }
                if dy > alpha {
                    y_max = y;
                } else {
                    y_min = y;
                }
            }
            let coef = 3.0 * y * (1.0 - y);
            time[i] = coef * ((1.0 - y) * p1 + y * p2) + y * y * y;
        }
        position[n] = 1.0;
        time[n] = 1.0;

        Self { position, time }
    }

    fn sample(table: &[f64], t: f64) -> f64 {
        let n = table.len() - 1;
        let t = t.clamp(0.0, 1.0);
        let index = (n as f64 * t) as usize;
        if index >= n {
            return table[n];
        }
        let t_inf = index as f64 / n as f64;
        let t_sup = (index + 1) as f64 / n as f64;
        table[index] + (t - t_inf) / (t_sup - t_inf) * (table[index + 1] - table[index])
    }
}

/// Distance covered over normalized fling time, from the position spline.
#[derive(Debug, Clone)]
pub struct FlingInterpolator {
    tables: Arc<SplineTables>,
}

impl Interpolator for FlingInterpolator {
    fn interpolate(&self, t: f32) -> f32 {
        SplineTables::sample(&self.tables.position, t as f64) as f32
    }
}

/// The classic scroller deceleration spline.
///
/// A fling starts fast and decelerates along a spline with an inflexion at
/// 35% of its travel. Distance and duration scale with friction and the
/// physical size of a pixel.
#[derive(Debug, Clone)]
pub struct SplineBallistic {
    friction: f64,
    physical_coeff: f64,
    tables: Arc<SplineTables>,
}

impl SplineBallistic {
    pub fn new(config: &FlingConfig) -> Self {
        let physical_coeff = GRAVITY_EARTH as f64
            * INCHES_PER_METER as f64
            * config.pixels_per_inch as f64
            * FLING_TUNING as f64;
        Self {
            friction: config.friction as f64,
            physical_coeff,
            tables: Arc::new(SplineTables::build()),
        }
    }

    fn spline_deceleration(&self, velocity: f32) -> f64 {
        (FLING_INFLEXION as f64 * velocity.abs() as f64 / (self.friction * self.physical_coeff)).ln()
    }
}

impl Default for SplineBallistic {
    fn default() -> Self {
        Self::new(&FlingConfig::default())
    }
}

impl Ballistic for SplineBallistic {
    fn travel_distance(&self, velocity: f32) -> f32 {
        if velocity == 0.0 || !velocity.is_finite() {
            return 0.0;
        }
        let rate = deceleration_rate();
        let l = self.spline_deceleration(velocity);
        let distance = self.friction * self.physical_coeff * (rate / (rate - 1.0) * l).exp();
        (distance as f32).copysign(velocity)
    }

    fn travel_duration(&self, velocity: f32) -> u64 {
        if velocity == 0.0 || !velocity.is_finite() {
            return 0;
        }
        let l = self.spline_deceleration(velocity);
        (1000.0 * (l / (deceleration_rate() - 1.0)).exp()) as u64
    }

    fn adjusted_duration(&self, start: f32, computed_end: f32, clamped_end: f32, duration_ms: u64) -> u64 {
        let computed = (computed_end - start) as f64;
        if computed == 0.0 {
            return 0;
        }
        let fraction = ((clamped_end - start) as f64 / computed).abs();
        if fraction >= 1.0 {
            return duration_ms;
        }
        (duration_ms as f64 * SplineTables::sample(&self.tables.time, fraction)) as u64
    }

    fn interpolator(&self) -> Arc<dyn Interpolator> {
        Arc::new(FlingInterpolator {
            tables: Arc::clone(&self.tables),
        })
    }
}
