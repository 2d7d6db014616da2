use crate::surface::Rect;

/// Pixel color representation.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
#[repr(C)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// A captured frame: top-down RGBA with a stride of `4 * width`.
///
/// The frame borrows the persistent buffer of the
/// [`crate::capture::CaptureSession`] that produced it, so it is only valid
/// until the next capture.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct Frame<'a> {
    buffer: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> Frame<'a> {
    /// Creates a new frame over an RGBA buffer of exactly `width * height * 4` bytes.
    #[inline]
    #[must_use]
    pub const fn new(buffer: &'a [u8], width: u32, height: u32) -> Self {
        Self { buffer, width, height }
    }

    /// Frame width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Bounds of the frame, from the origin to `(width, height)`.
    #[inline]
    #[must_use]
    pub const fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// The raw RGBA bytes.
    #[inline]
    #[must_use]
    pub const fn as_raw_buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// The buffer as pixels.
    #[inline]
    #[must_use]
    pub const fn pixels(&self) -> &'a [Rgba] {
        // SAFETY: `Rgba` is four `u8`s with `repr(C)`, so it has the size of four bytes and an
        // alignment of one.
        unsafe {
            std::slice::from_raw_parts(
                self.buffer.as_ptr().cast::<Rgba>(),
                self.buffer.len() / std::mem::size_of::<Rgba>(),
            )
        }
    }

    /// The pixel at `(x, y)`, or `None` outside the frame.
    #[inline]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }

        self.pixels().get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Copies the frame out of the session buffer.
    #[inline]
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}
