//! Repeated capture of the whole display or a single window into RGBA frames.
//!
//! A [`CaptureSession`] acquires its device contexts and bitmap once and reuses
//! them, along with its RGBA buffer, for every [`CaptureSession::capture`]
//! call. Dropping the session releases everything; [`CaptureSession::destroy`]
//! does the same eagerly and may be called any number of times.
//!
//! # Example
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use gdi_capture::capture::CaptureSession;
//!
//! let mut session = CaptureSession::new()?;
//! println!("Display is {}x{}", session.width(), session.height());
//!
//! for _ in 0..60 {
//!     let frame = session.capture()?;
//!     println!("Top-left pixel: {:?}", frame.pixel(0, 0));
//! }
//!
//! session.destroy();
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
use log::{debug, trace, warn};

use crate::buffer::NativeBlock;
use crate::convert::{self, RawLayout};
use crate::frame::Frame;
use crate::settings::CaptureSettings;
use crate::surface::{
    BitmapHandle, DcHandle, DeviceCap, DibLayout, ObjectHandle, ServiceError, SurfaceService,
    WindowHandle,
};
use crate::window::{self, Window};

/// Errors that can occur while creating or using a [`CaptureSession`].
#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum Error {
    #[error("Failed to acquire the target device context: {0}")]
    AcquireFailed(ServiceError),
    #[error("Failed to create a compatible device context: {0}")]
    CompatibleContextFailed(ServiceError),
    #[error("Failed to query the display resolution: {0}")]
    CapabilityQueryFailed(ServiceError),
    #[error("Failed to create a compatible bitmap: {0}")]
    BitmapAllocFailed(ServiceError),
    #[error("Failed to read the window client rectangle: {0}")]
    RectQueryFailed(ServiceError),
    #[error(transparent)]
    Window(#[from] window::Error),
    #[error("The target window is no longer valid: {0}")]
    TargetInvalid(ServiceError),
    #[error("The target window was resized from {expected:?} to {actual:?}; recreate the session")]
    TargetResized { expected: (u32, u32), actual: (u32, u32) },
    #[error("Failed to select the session bitmap: {0}")]
    SelectFailed(ServiceError),
    #[error("Failed to copy the target surface: {0}")]
    BlitFailed(ServiceError),
    #[error("Failed to restore the previous selection: {0}")]
    SelectRestoreFailed(ServiceError),
    #[error("Failed to describe the session bitmap: {0}")]
    DescribeFailed(ServiceError),
    #[error("Unsupported bitmap depth: {0} bits per pixel")]
    UnsupportedBitDepth(u16),
    #[error("Failed to allocate the extraction buffer: {0}")]
    AllocFailed(ServiceError),
    #[error("Failed to lock the extraction buffer: {0}")]
    LockFailed(ServiceError),
    #[error("Failed to extract the bitmap bits: {0}")]
    ExtractFailed(ServiceError),
    #[error("Failed to convert the bitmap bits: {0}")]
    Convert(#[from] convert::Error),
    #[error("The capture session has been destroyed")]
    Destroyed,
}

/// The bitmap selected into an off-screen context for the duration of one blit.
///
/// Dropping the guard puts the previous object back.
struct Selection<'a, S: SurfaceService + ?Sized> {
    service: &'a S,
    dc: DcHandle,
    previous: Option<ObjectHandle>,
}

impl<'a, S: SurfaceService + ?Sized> Selection<'a, S> {
    fn select(service: &'a S, dc: DcHandle, bitmap: BitmapHandle) -> Result<Self, ServiceError> {
        let previous = service.select_object(dc, bitmap.into())?;
        Ok(Self { service, dc, previous: Some(previous) })
    }

    fn restore(mut self) -> Result<(), ServiceError> {
        match self.previous.take() {
            Some(previous) => self.service.select_object(self.dc, previous).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl<S: SurfaceService + ?Sized> Drop for Selection<'_, S> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take()
            && let Err(e) = self.service.select_object(self.dc, previous)
        {
            warn!("Failed to restore the previous selection: {e}");
        }
    }
}

/// Owns every resource needed to capture one target repeatedly.
///
/// The reference context, off-screen context and bitmap are either all held
/// or all released. A session is not meant to be shared between threads
/// without external synchronization.
pub struct CaptureSession<S: SurfaceService> {
    service: S,
    settings: CaptureSettings,
    target: Option<WindowHandle>,
    reference_dc: Option<DcHandle>,
    memory_dc: Option<DcHandle>,
    bitmap: Option<BitmapHandle>,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

#[cfg(windows)]
impl CaptureSession<crate::gdi::Gdi> {
    /// Creates a session capturing the whole display.
    ///
    /// # Errors
    ///
    /// See [`CaptureSession::with_settings`].
    pub fn new() -> Result<Self, Error> {
        Self::with_settings(crate::gdi::Gdi, CaptureSettings::default())
    }

    /// Creates a session capturing the client area of the window titled `title`.
    ///
    /// # Errors
    ///
    /// See [`CaptureSession::for_window_with`].
    pub fn for_window(title: &str) -> Result<Self, Error> {
        Self::for_window_with(crate::gdi::Gdi, title, CaptureSettings::default())
    }
}

impl<S: SurfaceService> CaptureSession<S> {
    fn empty(service: S, settings: CaptureSettings, target: Option<WindowHandle>) -> Self {
        Self {
            service,
            settings,
            target,
            reference_dc: None,
            memory_dc: None,
            bitmap: None,
            width: 0,
            height: 0,
            buffer: Vec::new(),
        }
    }

    /// Creates a display session with default settings.
    ///
    /// # Errors
    ///
    /// See [`CaptureSession::with_settings`].
    pub fn with_service(service: S) -> Result<Self, Error> {
        Self::with_settings(service, CaptureSettings::default())
    }

    /// Creates a session capturing the whole display.
    ///
    /// The session is sized from the display resolution at creation time and keeps that size;
    /// display sessions do not notice later resolution changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AcquireFailed`], [`Error::CompatibleContextFailed`],
    /// [`Error::CapabilityQueryFailed`] or [`Error::BitmapAllocFailed`] for the step that
    /// failed. Anything acquired before the failure is released first.
    pub fn with_settings(service: S, settings: CaptureSettings) -> Result<Self, Error> {
        trace!("Creating display capture session");
        let mut session = Self::empty(service, settings, None);

        let reference_dc = session.service.acquire_dc(None).map_err(Error::AcquireFailed)?;
        session.reference_dc = Some(reference_dc);

        session.memory_dc =
            Some(session.service.create_compatible_dc(reference_dc).map_err(Error::CompatibleContextFailed)?);

        session.width = session
            .service
            .device_caps(reference_dc, DeviceCap::HorizontalResolution)
            .map_err(Error::CapabilityQueryFailed)?;
        session.height = session
            .service
            .device_caps(reference_dc, DeviceCap::VerticalResolution)
            .map_err(Error::CapabilityQueryFailed)?;

        session.allocate_bitmap()?;

        debug!("Display capture session created ({}x{})", session.width, session.height);
        Ok(session)
    }

    /// Creates a session capturing the client area of the window titled `title`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if no window has that title, otherwise
    /// [`Error::AcquireFailed`], [`Error::CompatibleContextFailed`],
    /// [`Error::RectQueryFailed`] or [`Error::BitmapAllocFailed`] for the step that failed.
    /// Anything acquired before the failure is released first.
    pub fn for_window_with(service: S, title: &str, settings: CaptureSettings) -> Result<Self, Error> {
        trace!("Creating window capture session for {title:?}");
        let target = Window::from_name_with(&service, title)?;
        let mut session = Self::empty(service, settings, Some(target));

        let reference_dc = session.service.acquire_dc(Some(target)).map_err(Error::AcquireFailed)?;
        session.reference_dc = Some(reference_dc);

        session.memory_dc =
            Some(session.service.create_compatible_dc(reference_dc).map_err(Error::CompatibleContextFailed)?);

        (session.width, session.height) =
            window::client_size(&session.service, target).map_err(Error::RectQueryFailed)?;

        session.allocate_bitmap()?;

        debug!("Window capture session created for {title:?} ({}x{})", session.width, session.height);
        Ok(session)
    }

    fn allocate_bitmap(&mut self) -> Result<(), Error> {
        let reference_dc = self.reference_dc.ok_or(Error::Destroyed)?;
        self.bitmap = Some(
            self.service
                .create_compatible_bitmap(reference_dc, self.width, self.height)
                .map_err(Error::BitmapAllocFailed)?,
        );
        Ok(())
    }

    /// Captures the target into the session buffer.
    ///
    /// The returned frame is top-down RGBA, fully opaque, with a stride of `4 * width`. It
    /// borrows the session buffer, which is reused by the next capture.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TargetResized`] if a window target changed size since creation; the
    /// session must then be recreated. Every other error leaves the session usable for another
    /// attempt.
    pub fn capture(&mut self) -> Result<Frame<'_>, Error> {
        let (Some(reference_dc), Some(memory_dc), Some(bitmap)) =
            (self.reference_dc, self.memory_dc, self.bitmap)
        else {
            return Err(Error::Destroyed);
        };

        if let Some(target) = self.target {
            let actual = window::client_size(&self.service, target).map_err(Error::TargetInvalid)?;
            let expected = (self.width, self.height);
            if actual != expected {
                return Err(Error::TargetResized { expected, actual });
            }
        }

        let selection = Selection::select(&self.service, memory_dc, bitmap).map_err(Error::SelectFailed)?;
        let blit = self.service.bit_blt(
            memory_dc,
            self.width,
            self.height,
            reference_dc,
            self.settings.raster_mode.into(),
        );
        if let Err(e) = blit {
            drop(selection);
            return Err(Error::BlitFailed(e));
        }
        selection.restore().map_err(Error::SelectRestoreFailed)?;

        let info = self.service.bitmap_info(bitmap).map_err(Error::DescribeFailed)?;
        if !convert::is_supported(info.bits_per_pixel) {
            return Err(Error::UnsupportedBitDepth(info.bits_per_pixel));
        }

        let dib_layout = DibLayout::top_down(&info);
        let raw_layout = RawLayout {
            width: info.width.unsigned_abs(),
            height: dib_layout.rows(),
            bits_per_pixel: info.bits_per_pixel,
            top_down: dib_layout.is_top_down(),
        };

        let mut block = NativeBlock::alloc(&self.service, raw_layout.size()).map_err(Error::AllocFailed)?;
        let mut locked = block.lock().map_err(Error::LockFailed)?;

        self.service
            .dib_bits(reference_dc, bitmap, &dib_layout, locked.as_mut_slice())
            .map_err(Error::ExtractFailed)?;

        convert::to_rgba(locked.as_slice(), raw_layout, &mut self.buffer, self.settings.parallel_conversion)?;

        drop(locked);
        drop(block);

        Ok(Frame::new(&self.buffer, raw_layout.width, dib_layout.height.unsigned_abs()))
    }

    /// Releases the bitmap, the off-screen context and the reference context, and empties
    /// the buffer.
    ///
    /// Safe to call more than once; release failures are logged, never returned.
    pub fn destroy(&mut self) {
        if let Some(bitmap) = self.bitmap.take()
            && let Err(e) = self.service.delete_object(bitmap.into())
        {
            warn!("Failed to delete capture bitmap: {e}");
        }

        if let Some(memory_dc) = self.memory_dc.take()
            && let Err(e) = self.service.delete_dc(memory_dc)
        {
            warn!("Failed to delete off-screen device context: {e}");
        }

        if let Some(reference_dc) = self.reference_dc.take() {
            if let Err(e) = self.service.release_dc(self.target, reference_dc) {
                warn!("Failed to release device context: {e}");
            }
            trace!("Capture session destroyed");
        }

        self.buffer = Vec::new();
    }

    /// Width of the target in pixels, fixed at creation.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the target in pixels, fixed at creation.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The window being captured, or `None` for the whole display.
    #[inline]
    #[must_use]
    pub const fn target(&self) -> Option<WindowHandle> {
        self.target
    }

    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Returns `true` once [`CaptureSession::destroy`] has run.
    #[inline]
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.reference_dc.is_none()
    }
}

impl<S: SurfaceService> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}
