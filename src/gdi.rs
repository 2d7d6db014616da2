//! [`SurfaceService`] backed by GDI, user32 and kernel32 global memory.
use std::ffi::c_void;
use std::mem;
use std::ptr::NonNull;

use windows::Win32::Foundation::{GlobalFree, HGLOBAL, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAP, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CAPTUREBLT, CreateCompatibleBitmap,
    CreateCompatibleDC, DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, GetDeviceCaps,
    GetObjectW, HBITMAP, HDC, HGDIOBJ, HORZRES, ROP_CODE, ReleaseDC, SRCCOPY, SelectObject, VERTRES,
};
use windows::Win32::System::Memory::{GHND, GlobalAlloc, GlobalLock, GlobalUnlock};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowTextLengthW, GetWindowTextW, IsWindowVisible,
};
use windows::core::BOOL;

use crate::surface::{
    BitmapHandle, BitmapInfo, DcHandle, DeviceCap, DibLayout, MemoryHandle, ObjectHandle,
    RasterOp, Rect, ServiceError, SurfaceService, WindowHandle,
};

/// The native Windows display surface service.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub struct Gdi;

#[inline]
fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.as_raw() as *mut c_void)
}

#[inline]
fn hdc(dc: DcHandle) -> HDC {
    HDC(dc.as_raw() as *mut c_void)
}

#[inline]
fn hgdiobj(object: ObjectHandle) -> HGDIOBJ {
    HGDIOBJ(object.as_raw() as *mut c_void)
}

#[inline]
fn hglobal(memory: MemoryHandle) -> HGLOBAL {
    HGLOBAL(memory.as_raw() as *mut c_void)
}

#[inline]
fn check(result: BOOL, call: &'static str) -> Result<(), ServiceError> {
    if result.as_bool() { Ok(()) } else { Err(ServiceError::last_os_error(call)) }
}

#[inline]
fn windows_error(error: &windows::core::Error, call: &'static str) -> ServiceError {
    ServiceError::new(call, error.code().0)
}

struct EnumContext<'a> {
    visitor: &'a mut dyn FnMut(WindowHandle) -> bool,
    stopped: bool,
}

unsafe extern "system" fn enum_windows_callback(window: HWND, context: LPARAM) -> BOOL {
    let context = unsafe { &mut *(context.0 as *mut EnumContext<'_>) };

    let Some(window) = WindowHandle::from_raw(window.0 as usize) else {
        return BOOL::from(true);
    };

    if (context.visitor)(window) {
        BOOL::from(true)
    } else {
        context.stopped = true;
        BOOL::from(false)
    }
}

unsafe impl SurfaceService for Gdi {
    fn acquire_dc(&self, window: Option<WindowHandle>) -> Result<DcHandle, ServiceError> {
        let dc = unsafe { GetDC(window.map(hwnd)) };
        DcHandle::from_raw(dc.0 as usize).ok_or_else(|| ServiceError::last_os_error("GetDC"))
    }

    fn release_dc(&self, window: Option<WindowHandle>, dc: DcHandle) -> Result<(), ServiceError> {
        if unsafe { ReleaseDC(window.map(hwnd), hdc(dc)) } == 1 {
            Ok(())
        } else {
            Err(ServiceError::last_os_error("ReleaseDC"))
        }
    }

    fn create_compatible_dc(&self, dc: DcHandle) -> Result<DcHandle, ServiceError> {
        let memory_dc = unsafe { CreateCompatibleDC(Some(hdc(dc))) };
        DcHandle::from_raw(memory_dc.0 as usize)
            .ok_or_else(|| ServiceError::last_os_error("CreateCompatibleDC"))
    }

    fn delete_dc(&self, dc: DcHandle) -> Result<(), ServiceError> {
        check(unsafe { DeleteDC(hdc(dc)) }, "DeleteDC")
    }

    fn device_caps(&self, dc: DcHandle, cap: DeviceCap) -> Result<u32, ServiceError> {
        let index = match cap {
            DeviceCap::HorizontalResolution => HORZRES,
            DeviceCap::VerticalResolution => VERTRES,
        };

        let value = unsafe { GetDeviceCaps(Some(hdc(dc)), index) };
        match u32::try_from(value) {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ServiceError::last_os_error("GetDeviceCaps")),
        }
    }

    fn create_compatible_bitmap(
        &self,
        dc: DcHandle,
        width: u32,
        height: u32,
    ) -> Result<BitmapHandle, ServiceError> {
        let width = i32::try_from(width).map_err(|_| ServiceError::new("CreateCompatibleBitmap", 87))?;
        let height = i32::try_from(height).map_err(|_| ServiceError::new("CreateCompatibleBitmap", 87))?;

        let bitmap = unsafe { CreateCompatibleBitmap(hdc(dc), width, height) };
        BitmapHandle::from_raw(bitmap.0 as usize)
            .ok_or_else(|| ServiceError::last_os_error("CreateCompatibleBitmap"))
    }

    fn delete_object(&self, object: ObjectHandle) -> Result<(), ServiceError> {
        check(unsafe { DeleteObject(hgdiobj(object)) }, "DeleteObject")
    }

    fn select_object(&self, dc: DcHandle, object: ObjectHandle) -> Result<ObjectHandle, ServiceError> {
        let previous = unsafe { SelectObject(hdc(dc), hgdiobj(object)) };
        ObjectHandle::from_raw(previous.0 as usize).ok_or_else(|| ServiceError::last_os_error("SelectObject"))
    }

    fn bit_blt(
        &self,
        dest: DcHandle,
        width: u32,
        height: u32,
        source: DcHandle,
        op: RasterOp,
    ) -> Result<(), ServiceError> {
        let rop = match op {
            RasterOp::SourceCopy => SRCCOPY,
            RasterOp::SourceCopyWithLayered => ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
        };
        let width = i32::try_from(width).map_err(|_| ServiceError::new("BitBlt", 87))?;
        let height = i32::try_from(height).map_err(|_| ServiceError::new("BitBlt", 87))?;

        unsafe { BitBlt(hdc(dest), 0, 0, width, height, Some(hdc(source)), 0, 0, rop) }
            .map_err(|e| windows_error(&e, "BitBlt"))
    }

    fn bitmap_info(&self, bitmap: BitmapHandle) -> Result<BitmapInfo, ServiceError> {
        let mut native = BITMAP::default();
        let written = unsafe {
            GetObjectW(
                hgdiobj(bitmap.into()),
                mem::size_of::<BITMAP>() as i32,
                Some(std::ptr::addr_of_mut!(native).cast()),
            )
        };
        if written == 0 {
            return Err(ServiceError::last_os_error("GetObjectW"));
        }

        Ok(BitmapInfo {
            width: native.bmWidth,
            height: native.bmHeight,
            planes: native.bmPlanes,
            bits_per_pixel: native.bmBitsPixel,
        })
    }

    fn dib_bits(
        &self,
        dc: DcHandle,
        bitmap: BitmapHandle,
        layout: &DibLayout,
        dest: &mut [u8],
    ) -> Result<u32, ServiceError> {
        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: layout.width,
                biHeight: layout.height,
                biPlanes: layout.planes,
                biBitCount: layout.bits_per_pixel,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let expected = crate::convert::raw_size(layout.width.unsigned_abs(), layout.rows(), layout.bits_per_pixel);
        if dest.len() < expected {
            return Err(ServiceError::new("GetDIBits", 122));
        }

        let lines = unsafe {
            GetDIBits(
                hdc(dc),
                HBITMAP(bitmap.as_raw() as *mut c_void),
                0,
                layout.rows(),
                Some(dest.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            )
        };

        match u32::try_from(lines) {
            Ok(lines) if lines > 0 => Ok(lines),
            _ => Err(ServiceError::last_os_error("GetDIBits")),
        }
    }

    fn alloc_memory(&self, size: usize) -> Result<MemoryHandle, ServiceError> {
        let memory = unsafe { GlobalAlloc(GHND, size) }.map_err(|e| windows_error(&e, "GlobalAlloc"))?;
        MemoryHandle::from_raw(memory.0 as usize).ok_or_else(|| ServiceError::last_os_error("GlobalAlloc"))
    }

    fn lock_memory(&self, memory: MemoryHandle) -> Result<NonNull<u8>, ServiceError> {
        let ptr = unsafe { GlobalLock(hglobal(memory)) };
        NonNull::new(ptr.cast::<u8>()).ok_or_else(|| ServiceError::last_os_error("GlobalLock"))
    }

    fn unlock_memory(&self, memory: MemoryHandle) -> Result<(), ServiceError> {
        match unsafe { GlobalUnlock(hglobal(memory)) } {
            Ok(()) => Ok(()),
            // The lock count reaching zero is reported as a failure with no error code.
            Err(e) if e.code().is_ok() => Ok(()),
            Err(e) => Err(windows_error(&e, "GlobalUnlock")),
        }
    }

    fn free_memory(&self, memory: MemoryHandle) -> Result<(), ServiceError> {
        unsafe { GlobalFree(Some(hglobal(memory))) }
            .map(|_| ())
            .map_err(|e| windows_error(&e, "GlobalFree"))
    }

    fn enum_windows(&self, visitor: &mut dyn FnMut(WindowHandle) -> bool) -> Result<(), ServiceError> {
        let mut context = EnumContext { visitor, stopped: false };

        let result = unsafe {
            EnumWindows(
                Some(enum_windows_callback),
                LPARAM(std::ptr::addr_of_mut!(context) as isize),
            )
        };

        match result {
            Ok(()) => Ok(()),
            Err(_) if context.stopped => Ok(()),
            Err(e) => Err(windows_error(&e, "EnumWindows")),
        }
    }

    fn window_text(&self, window: WindowHandle) -> Result<String, ServiceError> {
        let len = unsafe { GetWindowTextLengthW(hwnd(window)) };
        if len <= 0 {
            return Ok(String::new());
        }

        let mut name = vec![0u16; len as usize + 1];
        let copied = unsafe { GetWindowTextW(hwnd(window), &mut name) };
        if copied == 0 {
            return Err(ServiceError::last_os_error("GetWindowTextW"));
        }

        Ok(String::from_utf16_lossy(&name[..copied as usize]))
    }

    fn is_window_visible(&self, window: WindowHandle) -> bool {
        unsafe { IsWindowVisible(hwnd(window)) }.as_bool()
    }

    fn client_rect(&self, window: WindowHandle) -> Result<Rect, ServiceError> {
        let mut rect = RECT::default();
        unsafe { GetClientRect(hwnd(window), &mut rect) }.map_err(|e| windows_error(&e, "GetClientRect"))?;

        Ok(Rect::new(rect.left, rect.top, rect.right, rect.bottom))
    }
}
