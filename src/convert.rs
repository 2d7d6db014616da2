//! Conversion of native bitmap bits into canonical RGBA.
//!
//! Native device-independent bits are stored as B,G,R(,X) with every row
//! padded to a 4-byte boundary, in either row order. The output is always
//! top-down, unpadded RGBA with an opaque alpha channel.
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::ParallelSliceMut;

/// Errors that can occur while converting raw bitmap bits.
#[derive(thiserror::Error, Eq, PartialEq, Clone, Copy, Debug)]
pub enum Error {
    /// Only 24 and 32 bits per pixel are supported.
    #[error("Unsupported bit depth: {0} bits per pixel")]
    UnsupportedBitDepth(u16),
    /// The raw buffer is shorter than the layout requires.
    #[error("Raw buffer is too small: expected {expected} bytes, got {actual}")]
    RawBufferTooSmall { expected: usize, actual: usize },
}

/// Bytes per row of a native bitmap, rounded up to a 4-byte boundary.
#[inline]
#[must_use]
pub const fn row_stride(width: u32, bits_per_pixel: u16) -> usize {
    (width as usize * bits_per_pixel as usize).div_ceil(32) * 4
}

/// Size in bytes of a native bitmap with the given dimensions.
#[inline]
#[must_use]
pub const fn raw_size(width: u32, height: u32, bits_per_pixel: u16) -> usize {
    row_stride(width, bits_per_pixel) * height as usize
}

/// Returns `true` if the converter understands this bit depth.
#[inline]
#[must_use]
pub const fn is_supported(bits_per_pixel: u16) -> bool {
    matches!(bits_per_pixel, 24 | 32)
}

/// Describes a raw native bitmap buffer.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct RawLayout {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u16,
    pub top_down: bool,
}

impl RawLayout {
    /// Bytes per padded source row.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        row_stride(self.width, self.bits_per_pixel)
    }

    /// Total size of the raw buffer.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        raw_size(self.width, self.height, self.bits_per_pixel)
    }
}

/// Converts `raw` into top-down RGBA in `out`.
///
/// `out` is resized to exactly `width * height * 4` bytes only when its length differs,
/// so a buffer reused across frames of the same size is never reallocated. Bytes past
/// [`RawLayout::size`] in `raw` are never read.
///
/// # Errors
///
/// Returns [`Error::UnsupportedBitDepth`] for anything but 24 or 32 bits per pixel and
/// [`Error::RawBufferTooSmall`] if `raw` does not hold a full bitmap.
pub fn to_rgba(raw: &[u8], layout: RawLayout, out: &mut Vec<u8>, parallel: bool) -> Result<(), Error> {
    if !is_supported(layout.bits_per_pixel) {
        return Err(Error::UnsupportedBitDepth(layout.bits_per_pixel));
    }

    let expected = layout.size();
    if raw.len() < expected {
        return Err(Error::RawBufferTooSmall { expected, actual: raw.len() });
    }

    let out_stride = layout.width as usize * 4;
    let out_size = out_stride * layout.height as usize;
    if out.len() != out_size {
        out.resize(out_size, 0);
    }
    if out_size == 0 {
        return Ok(());
    }

    let raw = &raw[..expected];
    let in_stride = layout.stride();
    let bytes_per_pixel = layout.bits_per_pixel as usize / 8;
    let convert_row = |y: usize, dest: &mut [u8]| {
        let source_row = if layout.top_down { y } else { layout.height as usize - 1 - y };
        let start = source_row * in_stride;
        let source = &raw[start..start + layout.width as usize * bytes_per_pixel];

        for (pixel, bgr) in dest.chunks_exact_mut(4).zip(source.chunks_exact(bytes_per_pixel)) {
            pixel.copy_from_slice(&[bgr[2], bgr[1], bgr[0], 0xFF]);
        }
    };

    if parallel {
        out.par_chunks_exact_mut(out_stride).enumerate().for_each(|(y, dest)| convert_row(y, dest));
    } else {
        out.chunks_exact_mut(out_stride).enumerate().for_each(|(y, dest)| convert_row(y, dest));
    }

    Ok(())
}
