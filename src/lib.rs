//! # GDI Capture
//!
//! **GDI Capture** copies the pixels of the whole display, or of the client
//! area of a single window, into an in-memory RGBA frame. A capture session
//! keeps its device contexts, its bitmap and its output buffer alive between
//! captures, so it is suited to recording many frames in a row.
//!
//! ## Features
//!
//! - Top-down, unpadded, fully opaque RGBA output with a stride of `4 * width`.
//! - No allocation of the output buffer after the first frame.
//! - Every native resource is released on every error path.
//! - Enumeration of visible windows and lookup by exact title.
//! - The whole pipeline is written against [`surface::SurfaceService`], so it
//!   can run against something other than GDI.
//!
//! ## Usage
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use gdi_capture::capture::CaptureSession;
//! use gdi_capture::window::Window;
//!
//! // List what can be captured
//! for window in Window::enumerate() {
//!     println!("{}", window.title());
//! }
//!
//! // Capture a window by its title
//! let mut session = CaptureSession::for_window("Untitled - Notepad")?;
//! let frame = session.capture()?;
//! println!("Captured {}x{} with stride {}", frame.width(), frame.height(), frame.stride());
//!
//! // Release the device contexts now instead of on drop
//! session.destroy();
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::inconsistent_struct_constructor)]
#![warn(clippy::must_use_candidate)]
#![warn(clippy::ptr_as_ptr)]
#![warn(clippy::borrow_as_ptr)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]

/// Scoped native memory blocks.
pub mod buffer;
/// Capture sessions.
pub mod capture;
/// Native bitmap to RGBA conversion.
pub mod convert;
/// Captured frames.
pub mod frame;
/// GDI implementation of the surface service.
#[cfg(windows)]
pub mod gdi;
/// Capture settings.
pub mod settings;
/// The abstract display surface service.
pub mod surface;
/// Window enumeration.
pub mod window;

#[cfg(test)]
mod testing;
