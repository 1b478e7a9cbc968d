use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_FLING_FRICTION, DEFAULT_MAX_DECODE_SIZE, DEFAULT_MAX_IMAGE_MEMORY_MB,
    DEFAULT_MAX_SCALE, DEFAULT_MIN_SCALE, DEFAULT_PIXELS_PER_INCH, DEFAULT_SMOOTH_ZOOM_MS,
};
use crate::decoder::memory_limit_bytes;
use crate::error::{GanymedeError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Largest bitmap edge the host can draw. Tiles are a quarter of this.
    pub max_decode_size: u32,
    /// Decode worker threads (0 = one per core).
    pub decode_threads: usize,
    /// Double-tap zoom animation length in milliseconds.
    pub smooth_zoom_ms: u64,
    /// Allocation ceiling in MiB when a non-PNM image is decoded whole
    /// (0 = no ceiling).
    pub max_image_memory_mb: u64,
    pub scale: ScaleLimits,
    pub fling: FlingConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_decode_size: DEFAULT_MAX_DECODE_SIZE,
            decode_threads: 0,
            smooth_zoom_ms: DEFAULT_SMOOTH_ZOOM_MS,
            max_image_memory_mb: DEFAULT_MAX_IMAGE_MEMORY_MB,
            scale: ScaleLimits::default(),
            fling: FlingConfig::default(),
        }
    }
}

/// Scale range. The effective range always widens to include the fit scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleLimits {
    pub min: f32,
    pub max: f32,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_SCALE,
            max: DEFAULT_MAX_SCALE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlingConfig {
    /// Scroll friction; higher stops sooner.
    pub friction: f32,
    /// Screen density the deceleration is computed for.
    pub pixels_per_inch: f32,
}

impl Default for FlingConfig {
    fn default() -> Self {
        Self {
            friction: DEFAULT_FLING_FRICTION,
            pixels_per_inch: DEFAULT_PIXELS_PER_INCH,
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| GanymedeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GanymedeError::Config(e.to_string()))
    }

    /// `max_image_memory_mb` in bytes, `None` when unlimited.
    pub fn image_memory_limit(&self) -> Option<u64> {
        memory_limit_bytes(self.max_image_memory_mb)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_decode_size < 4 {
            return Err(GanymedeError::Config(format!(
                "max_decode_size must be at least 4, got {}",
                self.max_decode_size
            )));
        }
        if !(self.scale.min > 0.0 && self.scale.min <= self.scale.max) {
            return Err(GanymedeError::Config(format!(
                "scale limits must satisfy 0 < min <= max, got {}..{}",
                self.scale.min, self.scale.max
            )));
        }
        if !(self.fling.friction > 0.0 && self.fling.pixels_per_inch > 0.0) {
            return Err(GanymedeError::Config(
                "fling friction and pixels_per_inch must be positive".into(),
            ));
        }
        Ok(())
    }
}
