use std::fs::File;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;
use rayon::prelude::*;
use tracing::info;

use crate::consts::{PARALLEL_PIXEL_THRESHOLD, RGBA_CHANNELS};
use crate::error::{GanymedeError, Result};
use crate::geometry::Rect;
use crate::pixels::{alloc_rgba, PixelBuffer};

use super::{check_region, sampled_size, RegionDecoder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PnmHeader {
    width: u32,
    height: u32,
    channels: usize,
    maxval: u32,
    data_offset: usize,
}

impl PnmHeader {
    fn bytes_per_sample(&self) -> usize {
        if self.maxval > 255 {
            2
        } else {
            1
        }
    }

    fn row_stride(&self) -> usize {
        self.width as usize * self.channels * self.bytes_per_sample()
    }
}

/// Region decoder reading binary PGM (P5) and PPM (P6) files in place.
///
/// The file is memory-mapped; only the rows a region touches are read.
/// Subsampling picks the top-left pixel of each `sample x sample` block.
pub struct PnmRegionDecoder {
    mmap: Mmap,
    header: PnmHeader,
}

impl PnmRegionDecoder {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and the file is not expected to be
        // truncated while the viewer holds it open.
        let mmap = unsafe { Mmap::map(&file)? };
        let header = parse_header(&mmap)?;

        let expected = header.data_offset + header.row_stride() * header.height as usize;
        if mmap.len() < expected {
            return Err(GanymedeError::DecodeBounds(format!(
                "{}: truncated pixel data ({} of {expected} bytes)",
                path.display(),
                mmap.len()
            )));
        }

        info!(
            path = %path.display(),
            width = header.width,
            height = header.height,
            channels = header.channels,
            maxval = header.maxval,
            "PNM file mapped"
        );
        Ok(Self { mmap, header })
    }

    fn read_sample(&self, offset: usize) -> u8 {
        let h = &self.header;
        if h.bytes_per_sample() == 2 {
            let v = BigEndian::read_u16(&self.mmap[offset..offset + 2]) as u32;
            (v * 255 / h.maxval) as u8
        } else if h.maxval == 255 {
            self.mmap[offset]
        } else {
            (self.mmap[offset] as u32 * 255 / h.maxval) as u8
        }
    }
}

impl RegionDecoder for PnmRegionDecoder {
    fn width(&self) -> u32 {
        self.header.width
    }

    fn height(&self) -> u32 {
        self.header.height
    }

    fn decode_region(&self, rect: Rect, sample: u32) -> Result<PixelBuffer> {
        check_region(&rect, sample, self.width(), self.height())?;
        let (out_w, out_h) = sampled_size(&rect, sample);
        let mut data = alloc_rgba(out_w, out_h)?;
        let row_bytes = out_w as usize * RGBA_CHANNELS;

        let h = self.header;
        let bps = h.bytes_per_sample();
        let pixel_bytes = h.channels * bps;

        let fill_row = |(oy, row): (usize, &mut [u8])| {
            let y = rect.top as usize + oy * sample as usize;
            let row_start = h.data_offset + y * h.row_stride();
            for ox in 0..out_w as usize {
                let x = rect.left as usize + ox * sample as usize;
                let src = row_start + x * pixel_bytes;
                let dst = &mut row[ox * RGBA_CHANNELS..(ox + 1) * RGBA_CHANNELS];
                if h.channels == 1 {
                    let v = self.read_sample(src);
                    dst.copy_from_slice(&[v, v, v, 255]);
                } else {
                    dst[0] = self.read_sample(src);
                    dst[1] = self.read_sample(src + bps);
                    dst[2] = self.read_sample(src + 2 * bps);
                    dst[3] = 255;
                }
            }
        };

        if (out_w as usize) * (out_h as usize) >= PARALLEL_PIXEL_THRESHOLD {
            data.par_chunks_mut(row_bytes).enumerate().for_each(fill_row);
        } else {
            data.chunks_mut(row_bytes).enumerate().for_each(fill_row);
        }

        PixelBuffer::from_raw(out_w, out_h, data)
    }
}

fn parse_header(bytes: &[u8]) -> Result<PnmHeader> {
    let channels = match bytes.get(..2) {
        Some(b"P5") => 1,
        Some(b"P6") => 3,
        _ => {
            return Err(GanymedeError::UnsupportedFormat(
                "only binary PGM (P5) and PPM (P6) are supported".into(),
            ))
        }
    };

    let mut pos = 2;
    let width = next_header_number(bytes, &mut pos)?;
    let height = next_header_number(bytes, &mut pos)?;
    let maxval = next_header_number(bytes, &mut pos)?;

    if width == 0 || height == 0 {
        return Err(GanymedeError::InvalidDimensions { width, height });
    }
    if maxval == 0 || maxval > u16::MAX as u32 {
        return Err(GanymedeError::DecodeBounds(format!("invalid maxval {maxval}")));
    }
    // Exactly one whitespace byte separates the header from the raster.
    match bytes.get(pos) {
        Some(b) if b.is_ascii_whitespace() => pos += 1,
        _ => return Err(GanymedeError::DecodeBounds("missing raster separator".into())),
    }

    Ok(PnmHeader {
        width,
        height,
        channels,
        maxval,
        data_offset: pos,
    })
}

fn next_header_number(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    loop {
        match bytes.get(*pos) {
            Some(b) if b.is_ascii_whitespace() => *pos += 1,
            Some(b'#') => {
                while !matches!(bytes.get(*pos), None | Some(b'\n')) {
                    *pos += 1;
                }
            }
            Some(_) => break,
            None => return Err(GanymedeError::DecodeBounds("truncated PNM header".into())),
        }
    }

    let start = *pos;
    while matches!(bytes.get(*pos), Some(b) if b.is_ascii_digit()) {
        *pos += 1;
    }
    std::str::from_utf8(&bytes[start..*pos])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| GanymedeError::DecodeBounds(format!("bad PNM header field at byte {start}")))
}
