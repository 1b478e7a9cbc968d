use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

use crate::consts::RGBA_CHANNELS;
use crate::error::{GanymedeError, Result};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Decoded RGBA8 pixels owned by exactly one tile or source.
///
/// The id is unique for the lifetime of the process so hosts can key
/// uploaded textures by it.
#[derive(Debug)]
pub struct PixelBuffer {
    id: u64,
    image: RgbaImage,
}

impl PixelBuffer {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            image,
        }
    }

    /// Wrap raw RGBA8 bytes, which must hold exactly `width * height * 4` bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        RgbaImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or(GanymedeError::InvalidDimensions { width, height })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn byte_size(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// Allocate a zeroed RGBA8 buffer, reporting allocation failure instead of aborting.
pub fn alloc_rgba(width: u32, height: u32) -> Result<Vec<u8>> {
    let bytes = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(RGBA_CHANNELS))
        .ok_or(GanymedeError::InvalidDimensions { width, height })?;
    let mut data = Vec::new();
    data.try_reserve_exact(bytes)
        .map_err(|_| GanymedeError::OutOfMemory { bytes })?;
    data.resize(bytes, 0);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = PixelBuffer::new(RgbaImage::new(1, 1));
        let b = PixelBuffer::new(RgbaImage::new(1, 1));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_from_raw_rejects_short_buffer() {
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 3]).is_err());
    }

    #[test]
    fn test_alloc_rgba_size() {
        let data = alloc_rgba(3, 2).unwrap();
        assert_eq!(data.len(), 24);
    }
}
