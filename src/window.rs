//! Enumeration of visible top-level windows and lookup by title.
//!
//! # Example
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use gdi_capture::window::Window;
//!
//! for window in Window::enumerate() {
//!     println!("{:?}: {}", window.handle(), window.title());
//! }
//!
//! let notepad = Window::from_name("Untitled - Notepad")?;
//! println!("Found: {notepad:?}");
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
use log::{trace, warn};

use crate::surface::{ServiceError, SurfaceService, WindowHandle};

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum Error {
    #[error("Failed to find window with title {0:?}")]
    NotFound(String),
    #[error("Failed to enumerate windows: {0}")]
    EnumerationFailed(ServiceError),
}

/// A snapshot of a visible top-level window and its title.
///
/// The handle may become stale as soon as the window closes.
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct Window {
    handle: WindowHandle,
    title: String,
}

impl Window {
    /// Returns every visible top-level window with a non-empty title.
    ///
    /// Order follows the window manager. An enumeration failure yields whatever was
    /// collected before it, usually nothing.
    #[must_use]
    pub fn enumerate_with<S: SurfaceService + ?Sized>(service: &S) -> Vec<Self> {
        let mut windows = Vec::new();

        let result = service.enum_windows(&mut |handle| {
            let Ok(title) = service.window_text(handle) else {
                return true;
            };

            if !title.is_empty() && service.is_window_visible(handle) {
                windows.push(Self { handle, title });
            }

            true
        });

        if let Err(e) = result {
            warn!("Window enumeration failed: {e}");
        }

        windows
    }

    /// Finds the first top-level window whose title is exactly `title`.
    ///
    /// Windows with an empty title are never matched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnumerationFailed`] if the enumeration itself failed without a match
    /// and [`Error::NotFound`] if no window has that title.
    pub fn from_name_with<S: SurfaceService + ?Sized>(
        service: &S,
        title: &str,
    ) -> Result<WindowHandle, Error> {
        let mut found = None;

        let result = service.enum_windows(&mut |handle| match service.window_text(handle) {
            Ok(text) if !text.is_empty() && text == title => {
                found = Some(handle);
                false
            }
            _ => true,
        });

        match (found, result) {
            (Some(handle), _) => {
                trace!("Resolved window {title:?} to {handle:?}");
                Ok(handle)
            }
            (None, Err(e)) => Err(Error::EnumerationFailed(e)),
            (None, Ok(())) => Err(Error::NotFound(title.to_owned())),
        }
    }

    /// The window handle.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> WindowHandle {
        self.handle
    }

    /// The window title at enumeration time.
    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

#[cfg(windows)]
impl Window {
    /// Returns every visible top-level window with a non-empty title.
    #[must_use]
    pub fn enumerate() -> Vec<Self> {
        Self::enumerate_with(&crate::gdi::Gdi)
    }

    /// Finds the first top-level window whose title is exactly `title`.
    ///
    /// # Errors
    ///
    /// See [`Window::from_name_with`].
    pub fn from_name(title: &str) -> Result<WindowHandle, Error> {
        Self::from_name_with(&crate::gdi::Gdi, title)
    }
}

/// Reads the client area size of a window.
pub fn client_size<S: SurfaceService + ?Sized>(
    service: &S,
    window: WindowHandle,
) -> Result<(u32, u32), ServiceError> {
    let rect = service.client_rect(window)?;
    Ok((rect.width(), rect.height()))
}
