//! The display surface service the capture pipeline is written against.
//!
//! [`SurfaceService`] is the set of native graphics calls a
//! [`crate::capture::CaptureSession`] and the [`crate::window`] enumerator
//! need. On Windows it is implemented by [`crate::gdi::Gdi`]. Every resource the
//! service hands out is a typed, non-zero handle so an absent resource is
//! always `None` rather than a zero sentinel.
use std::io;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Eq, PartialEq, Hash, Clone, Copy, Debug)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// Wraps a raw handle value, returning `None` for the null handle.
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: usize) -> Option<Self> {
                match NonZeroUsize::new(raw) {
                    Some(raw) => Some(Self(raw)),
                    None => None,
                }
            }

            /// Returns the raw handle value.
            #[inline]
            #[must_use]
            pub const fn as_raw(self) -> usize {
                self.0.get()
            }
        }
    };
}

native_handle!(
    /// A top-level window.
    WindowHandle
);
native_handle!(
    /// A device context, either acquired for a surface or created off-screen.
    DcHandle
);
native_handle!(
    /// A bitmap compatible with some device context.
    BitmapHandle
);
native_handle!(
    /// Any object that can be selected into a device context.
    ObjectHandle
);
native_handle!(
    /// A movable native memory block.
    MemoryHandle
);

impl From<BitmapHandle> for ObjectHandle {
    #[inline]
    fn from(value: BitmapHandle) -> Self {
        Self(value.0)
    }
}

/// A failed native call.
#[derive(thiserror::Error, Eq, PartialEq, Clone, Copy, Debug)]
#[error("{call} failed (os error {code})")]
pub struct ServiceError {
    /// Name of the native call.
    pub call: &'static str,
    /// The OS error code reported for the calling thread.
    pub code: i32,
}

impl ServiceError {
    /// Creates an error carrying an explicit code.
    #[inline]
    #[must_use]
    pub const fn new(call: &'static str, code: i32) -> Self {
        Self { call, code }
    }

    /// Creates an error from the calling thread's last OS error.
    #[inline]
    #[must_use]
    pub fn last_os_error(call: &'static str) -> Self {
        Self { call, code: io::Error::last_os_error().raw_os_error().unwrap_or_default() }
    }
}

/// Device capability that can be queried from a device context.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum DeviceCap {
    /// Width of the display in pixels.
    HorizontalResolution,
    /// Height of the display in pixels.
    VerticalResolution,
}

/// Raster operation used when copying between device contexts.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub enum RasterOp {
    /// Copy the source rectangle directly.
    #[default]
    SourceCopy,
    /// Copy the source rectangle directly, including layered windows on top of it.
    SourceCopyWithLayered,
}

/// A rectangle in surface coordinates.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Creates a new rectangle.
    #[inline]
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Width of the rectangle, zero when inverted.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        let width = self.right - self.left;
        if width > 0 { width.unsigned_abs() } else { 0 }
    }

    /// Height of the rectangle, zero when inverted.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        let height = self.bottom - self.top;
        if height > 0 { height.unsigned_abs() } else { 0 }
    }
}

/// Native metadata of a bitmap object.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct BitmapInfo {
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
}

/// Layout requested from [`SurfaceService::dib_bits`].
///
/// A negative `height` asks for top-down rows. The encoding is always
/// uncompressed.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct DibLayout {
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
}

impl DibLayout {
    /// Builds a top-down layout for the given bitmap.
    #[inline]
    #[must_use]
    pub const fn top_down(info: &BitmapInfo) -> Self {
        Self {
            width: info.width,
            height: -info.height,
            planes: info.planes,
            bits_per_pixel: info.bits_per_pixel,
        }
    }

    /// Returns `true` if rows are ordered top to bottom.
    #[inline]
    #[must_use]
    pub const fn is_top_down(&self) -> bool {
        self.height < 0
    }

    /// Number of rows regardless of orientation.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.height.unsigned_abs()
    }
}

/// Native graphics calls needed to enumerate and capture display surfaces.
///
/// # Safety
///
/// Implementors must guarantee that a pointer returned by
/// [`SurfaceService::lock_memory`] is valid for reads and writes of the full
/// size the block was allocated with, until the matching
/// [`SurfaceService::unlock_memory`] call.
pub unsafe trait SurfaceService {
    /// Acquires the device context of a window, or of the whole display for `None`.
    fn acquire_dc(&self, window: Option<WindowHandle>) -> Result<DcHandle, ServiceError>;

    /// Releases a device context obtained from [`SurfaceService::acquire_dc`].
    fn release_dc(&self, window: Option<WindowHandle>, dc: DcHandle) -> Result<(), ServiceError>;

    /// Creates an off-screen device context compatible with `dc`.
    fn create_compatible_dc(&self, dc: DcHandle) -> Result<DcHandle, ServiceError>;

    /// Deletes a device context created by [`SurfaceService::create_compatible_dc`].
    fn delete_dc(&self, dc: DcHandle) -> Result<(), ServiceError>;

    /// Queries a device capability. A zero value is reported as an error.
    fn device_caps(&self, dc: DcHandle, cap: DeviceCap) -> Result<u32, ServiceError>;

    /// Creates a bitmap compatible with `dc`.
    fn create_compatible_bitmap(
        &self,
        dc: DcHandle,
        width: u32,
        height: u32,
    ) -> Result<BitmapHandle, ServiceError>;

    /// Deletes a bitmap or any other selectable object.
    fn delete_object(&self, object: ObjectHandle) -> Result<(), ServiceError>;

    /// Selects `object` into `dc`, returning the previously selected object.
    fn select_object(&self, dc: DcHandle, object: ObjectHandle) -> Result<ObjectHandle, ServiceError>;

    /// Copies a `width`×`height` rectangle at the origin of `source` to the origin of `dest`.
    fn bit_blt(
        &self,
        dest: DcHandle,
        width: u32,
        height: u32,
        source: DcHandle,
        op: RasterOp,
    ) -> Result<(), ServiceError>;

    /// Reads the native metadata of a bitmap.
    fn bitmap_info(&self, bitmap: BitmapHandle) -> Result<BitmapInfo, ServiceError>;

    /// Extracts the device-independent bits of `bitmap` into `dest` using `layout`.
    ///
    /// Returns the number of scan lines copied.
    fn dib_bits(
        &self,
        dc: DcHandle,
        bitmap: BitmapHandle,
        layout: &DibLayout,
        dest: &mut [u8],
    ) -> Result<u32, ServiceError>;

    /// Allocates a zero-initialized movable memory block.
    fn alloc_memory(&self, size: usize) -> Result<MemoryHandle, ServiceError>;

    /// Locks a memory block for direct access.
    fn lock_memory(&self, memory: MemoryHandle) -> Result<NonNull<u8>, ServiceError>;

    /// Unlocks a memory block locked by [`SurfaceService::lock_memory`].
    fn unlock_memory(&self, memory: MemoryHandle) -> Result<(), ServiceError>;

    /// Frees a memory block allocated by [`SurfaceService::alloc_memory`].
    fn free_memory(&self, memory: MemoryHandle) -> Result<(), ServiceError>;

    /// Visits every top-level window until `visitor` returns `false`.
    ///
    /// A visitor that stops the enumeration is not an error.
    fn enum_windows(&self, visitor: &mut dyn FnMut(WindowHandle) -> bool) -> Result<(), ServiceError>;

    /// Reads the title of a window.
    fn window_text(&self, window: WindowHandle) -> Result<String, ServiceError>;

    /// Returns `true` if the window is visible.
    fn is_window_visible(&self, window: WindowHandle) -> bool;

    /// Reads the client rectangle of a window.
    fn client_rect(&self, window: WindowHandle) -> Result<Rect, ServiceError>;
}
