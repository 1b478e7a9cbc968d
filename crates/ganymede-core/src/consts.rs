/// Upper bound of the scale range (the range widens if the fit scale is larger).
pub const DEFAULT_MAX_SCALE: f32 = 8.0;

/// Lower bound of the scale range (the range widens if the fit scale is smaller).
pub const DEFAULT_MIN_SCALE: f32 = 1.0 / 8.0;

/// Duration of the double-tap zoom animation in milliseconds.
pub const DEFAULT_SMOOTH_ZOOM_MS: u64 = 300;

/// Decode budget used when the host cannot report its maximum texture size.
pub const DEFAULT_MAX_DECODE_SIZE: u32 = 2048;

/// Allocation ceiling in MiB for images decoded whole into memory.
pub const DEFAULT_MAX_IMAGE_MEMORY_MB: u64 = 4096;

/// Max tile edge = max decode size / this divisor.
pub const TILE_EDGE_DIVISOR: u32 = 4;

/// Images whose edges both fit in max decode size / this divisor are decoded
/// as a single bitmap instead of being tiled.
pub const BITMAP_LIMIT_DIVISOR: u32 = 2;

/// A double tap only advances to a scale level that exceeds the current
/// scale by more than this.
pub const SCALE_LEVEL_TOLERANCE: f32 = 0.01;

/// Slack subtracted from src/dst ratios before rounding up, so float noise
/// around an exact ratio does not pick the next coarser sample.
pub const SAMPLE_RATIO_EPSILON: f32 = 1e-3;

/// Interval at which a source with outstanding decodes asks to be polled.
pub const DECODE_POLL_INTERVAL_MS: u64 = 16;

/// Minimum pixel count of a decoded region to split row conversion across rayon.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Bytes per RGBA8 pixel.
pub const RGBA_CHANNELS: usize = 4;

/// Default scroll friction of the fling model.
pub const DEFAULT_FLING_FRICTION: f32 = 0.015;

/// Default screen density used by the fling model (pixels per inch).
pub const DEFAULT_PIXELS_PER_INCH: f32 = 160.0;

/// Standard gravity in m/s^2, used to derive the fling deceleration.
pub const GRAVITY_EARTH: f32 = 9.80665;

/// Inches per meter.
pub const INCHES_PER_METER: f32 = 39.37;

/// Empirical tuning factor of the fling deceleration.
pub const FLING_TUNING: f32 = 0.84;

/// Point in the fling curve where deceleration starts to dominate.
pub const FLING_INFLEXION: f32 = 0.35;

/// Sample count of the precomputed fling spline tables.
pub const FLING_SPLINE_SAMPLES: usize = 100;
