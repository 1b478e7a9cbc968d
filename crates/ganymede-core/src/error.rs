use thiserror::Error;

#[derive(Error, Debug)]
pub enum GanymedeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Cannot read image bounds: {0}")]
    DecodeBounds(String),

    #[error("Failed to decode region {rect} at sample {sample}: {reason}")]
    RegionDecode {
        rect: String,
        sample: u32,
        reason: String,
    },

    #[error("Out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("Image source already has a base source attached")]
    DoubleInit,

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl GanymedeError {
    /// Failures that leave a tile blank rather than failing the whole source.
    pub fn is_tile_failure(&self) -> bool {
        matches!(
            self,
            GanymedeError::RegionDecode { .. } | GanymedeError::OutOfMemory { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GanymedeError>;
