//! An in-memory [`SurfaceService`] that records handle lifecycles.
use std::collections::{HashMap, HashSet};
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::surface::{
    BitmapHandle, BitmapInfo, DcHandle, DeviceCap, DibLayout, MemoryHandle, ObjectHandle,
    RasterOp, Rect, ServiceError, SurfaceService, WindowHandle,
};

/// Native calls that can be made to fail.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug)]
pub enum Call {
    AcquireDc,
    CompatibleDc,
    DeviceCaps,
    CompatibleBitmap,
    SelectBitmap,
    RestoreSelection,
    BitBlt,
    BitmapInfo,
    AllocMemory,
    LockMemory,
    DibBits,
    EnumWindows,
    ClientRect,
}

pub struct MockWindow {
    pub handle: WindowHandle,
    pub title: String,
    pub visible: bool,
    pub client: Option<Rect>,
}

#[derive(Default)]
pub struct MockState {
    next_handle: usize,
    pub display: (u32, u32),
    pub bits_per_pixel: u16,
    pub windows: Vec<MockWindow>,
    pub failing: HashSet<Call>,
    pub acquired_dcs: HashSet<DcHandle>,
    pub memory_dcs: HashSet<DcHandle>,
    pub bitmaps: HashMap<BitmapHandle, (u32, u32)>,
    pub stock_objects: HashMap<DcHandle, ObjectHandle>,
    pub selections: HashMap<DcHandle, ObjectHandle>,
    pub blocks: HashMap<MemoryHandle, Box<[u8]>>,
    pub locked: HashSet<MemoryHandle>,
    pub double_releases: Vec<String>,
    pub blits: Vec<RasterOp>,
    pub allocations: usize,
    pub windows_visited: usize,
    pub frame_seed: u8,
}

impl MockState {
    fn next(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn check(&self, call: Call, name: &'static str) -> Result<(), ServiceError> {
        if self.failing.contains(&call) { Err(ServiceError::new(name, 5)) } else { Ok(()) }
    }

    fn window(&self, handle: WindowHandle) -> Option<&MockWindow> {
        self.windows.iter().find(|window| window.handle == handle)
    }

    pub fn live_dcs(&self) -> usize {
        self.acquired_dcs.len() + self.memory_dcs.len()
    }

    pub fn live_bitmaps(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn live_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn locked_blocks(&self) -> usize {
        self.locked.len()
    }

    pub fn is_leak_free(&self) -> bool {
        self.live_dcs() == 0
            && self.live_bitmaps() == 0
            && self.live_blocks() == 0
            && self.double_releases.is_empty()
    }
}

/// Mock display surface. Clones share state.
#[derive(Clone)]
pub struct MockSurface {
    state: Arc<Mutex<MockState>>,
}

impl MockSurface {
    /// A 32-bit 1920×1080 display with no windows.
    pub fn new() -> Self {
        Self::with_display(1920, 1080)
    }

    pub fn with_display(width: u32, height: u32) -> Self {
        let state = MockState { display: (width, height), bits_per_pixel: 32, ..MockState::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock()
    }

    pub fn fail(&self, call: Call) {
        self.state.lock().failing.insert(call);
    }

    pub fn recover(&self, call: Call) {
        self.state.lock().failing.remove(&call);
    }

    pub fn add_window(&self, title: &str, visible: bool, width: i32, height: i32) -> WindowHandle {
        let mut state = self.state.lock();
        let handle = WindowHandle::from_raw(state.next()).unwrap();
        state.windows.push(MockWindow {
            handle,
            title: title.to_owned(),
            visible,
            client: Some(Rect::new(0, 0, width, height)),
        });
        handle
    }

    pub fn resize_window(&self, handle: WindowHandle, width: i32, height: i32) {
        let mut state = self.state.lock();
        if let Some(window) = state.windows.iter_mut().find(|window| window.handle == handle) {
            window.client = Some(Rect::new(0, 0, width, height));
        }
    }

    pub fn close_window(&self, handle: WindowHandle) {
        self.state.lock().windows.retain(|window| window.handle != handle);
    }

    /// The B,G,R,X quadruple the mock renders at `(x, y)`.
    pub fn native_pixel(seed: u8, x: u32, y: u32) -> [u8; 4] {
        [x as u8, y as u8, seed, 0x00]
    }
}

unsafe impl SurfaceService for MockSurface {
    fn acquire_dc(&self, window: Option<WindowHandle>) -> Result<DcHandle, ServiceError> {
        let mut state = self.state.lock();
        state.check(Call::AcquireDc, "GetDC")?;
        if let Some(window) = window
            && state.window(window).is_none()
        {
            return Err(ServiceError::new("GetDC", 1400));
        }

        let dc = DcHandle::from_raw(state.next()).unwrap();
        state.acquired_dcs.insert(dc);
        Ok(dc)
    }

    fn release_dc(&self, _window: Option<WindowHandle>, dc: DcHandle) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        if !state.acquired_dcs.remove(&dc) {
            state.double_releases.push(format!("dc {dc:?}"));
            return Err(ServiceError::new("ReleaseDC", 6));
        }
        Ok(())
    }

    fn create_compatible_dc(&self, dc: DcHandle) -> Result<DcHandle, ServiceError> {
        let mut state = self.state.lock();
        state.check(Call::CompatibleDc, "CreateCompatibleDC")?;
        if !state.acquired_dcs.contains(&dc) {
            return Err(ServiceError::new("CreateCompatibleDC", 6));
        }

        let memory_dc = DcHandle::from_raw(state.next()).unwrap();
        let stock = ObjectHandle::from_raw(state.next()).unwrap();
        state.memory_dcs.insert(memory_dc);
        state.stock_objects.insert(memory_dc, stock);
        state.selections.insert(memory_dc, stock);
        Ok(memory_dc)
    }

    fn delete_dc(&self, dc: DcHandle) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        if !state.memory_dcs.remove(&dc) {
            state.double_releases.push(format!("memory dc {dc:?}"));
            return Err(ServiceError::new("DeleteDC", 6));
        }
        state.selections.remove(&dc);
        state.stock_objects.remove(&dc);
        Ok(())
    }

    fn device_caps(&self, _dc: DcHandle, cap: DeviceCap) -> Result<u32, ServiceError> {
        let state = self.state.lock();
        state.check(Call::DeviceCaps, "GetDeviceCaps")?;
        Ok(match cap {
            DeviceCap::HorizontalResolution => state.display.0,
            DeviceCap::VerticalResolution => state.display.1,
        })
    }

    fn create_compatible_bitmap(
        &self,
        _dc: DcHandle,
        width: u32,
        height: u32,
    ) -> Result<BitmapHandle, ServiceError> {
        let mut state = self.state.lock();
        state.check(Call::CompatibleBitmap, "CreateCompatibleBitmap")?;
        let bitmap = BitmapHandle::from_raw(state.next()).unwrap();
        state.bitmaps.insert(bitmap, (width, height));
        Ok(bitmap)
    }

    fn delete_object(&self, object: ObjectHandle) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let bitmap = BitmapHandle::from_raw(object.as_raw()).unwrap();
        if state.selections.values().any(|selected| *selected == object) {
            state.double_releases.push(format!("selected object {object:?}"));
        }
        if state.bitmaps.remove(&bitmap).is_none() {
            state.double_releases.push(format!("object {object:?}"));
            return Err(ServiceError::new("DeleteObject", 6));
        }
        Ok(())
    }

    fn select_object(&self, dc: DcHandle, object: ObjectHandle) -> Result<ObjectHandle, ServiceError> {
        let mut state = self.state.lock();
        let is_stock = state.stock_objects.get(&dc) == Some(&object);
        if is_stock {
            state.check(Call::RestoreSelection, "SelectObject")?;
        } else {
            state.check(Call::SelectBitmap, "SelectObject")?;
        }

        match state.selections.get_mut(&dc) {
            Some(selected) => Ok(std::mem::replace(selected, object)),
            None => Err(ServiceError::new("SelectObject", 6)),
        }
    }

    fn bit_blt(
        &self,
        dest: DcHandle,
        width: u32,
        height: u32,
        source: DcHandle,
        op: RasterOp,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        state.check(Call::BitBlt, "BitBlt")?;
        if !state.acquired_dcs.contains(&source) {
            return Err(ServiceError::new("BitBlt", 6));
        }

        let selected = state.selections.get(&dest).copied();
        let bitmap = selected.and_then(|object| BitmapHandle::from_raw(object.as_raw()));
        match bitmap.and_then(|bitmap| state.bitmaps.get(&bitmap)) {
            Some(size) if *size == (width, height) => {
                state.blits.push(op);
                Ok(())
            }
            _ => Err(ServiceError::new("BitBlt", 87)),
        }
    }

    fn bitmap_info(&self, bitmap: BitmapHandle) -> Result<BitmapInfo, ServiceError> {
        let state = self.state.lock();
        state.check(Call::BitmapInfo, "GetObjectW")?;
        let (width, height) = state.bitmaps.get(&bitmap).copied().ok_or(ServiceError::new("GetObjectW", 6))?;

        Ok(BitmapInfo {
            width: width as i32,
            height: height as i32,
            planes: 1,
            bits_per_pixel: state.bits_per_pixel,
        })
    }

    fn dib_bits(
        &self,
        _dc: DcHandle,
        bitmap: BitmapHandle,
        layout: &DibLayout,
        dest: &mut [u8],
    ) -> Result<u32, ServiceError> {
        let state = self.state.lock();
        state.check(Call::DibBits, "GetDIBits")?;
        if !state.bitmaps.contains_key(&bitmap) {
            return Err(ServiceError::new("GetDIBits", 6));
        }

        let width = layout.width.unsigned_abs();
        let rows = layout.rows();
        let bytes_per_pixel = usize::from(layout.bits_per_pixel / 8);
        let stride = crate::convert::row_stride(width, layout.bits_per_pixel);
        for row in 0..rows {
            let y = if layout.is_top_down() { row } else { rows - 1 - row };
            for x in 0..width {
                let at = row as usize * stride + x as usize * bytes_per_pixel;
                let pixel = Self::native_pixel(state.frame_seed, x, y);
                dest[at..at + bytes_per_pixel].copy_from_slice(&pixel[..bytes_per_pixel]);
            }
        }
        Ok(rows)
    }

    fn alloc_memory(&self, size: usize) -> Result<MemoryHandle, ServiceError> {
        let mut state = self.state.lock();
        state.check(Call::AllocMemory, "GlobalAlloc")?;
        let memory = MemoryHandle::from_raw(state.next()).unwrap();
        state.blocks.insert(memory, vec![0; size].into_boxed_slice());
        state.allocations += 1;
        Ok(memory)
    }

    fn lock_memory(&self, memory: MemoryHandle) -> Result<NonNull<u8>, ServiceError> {
        let mut state = self.state.lock();
        state.check(Call::LockMemory, "GlobalLock")?;
        state.locked.insert(memory);
        let block = state.blocks.get_mut(&memory).ok_or(ServiceError::new("GlobalLock", 6))?;
        Ok(NonNull::new(block.as_mut_ptr()).unwrap_or(NonNull::dangling()))
    }

    fn unlock_memory(&self, memory: MemoryHandle) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        if !state.locked.remove(&memory) {
            state.double_releases.push(format!("unlock {memory:?}"));
            return Err(ServiceError::new("GlobalUnlock", 158));
        }
        Ok(())
    }

    fn free_memory(&self, memory: MemoryHandle) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        if state.locked.contains(&memory) {
            state.double_releases.push(format!("free while locked {memory:?}"));
        }
        if state.blocks.remove(&memory).is_none() {
            state.double_releases.push(format!("free {memory:?}"));
            return Err(ServiceError::new("GlobalFree", 6));
        }
        Ok(())
    }

    fn enum_windows(&self, visitor: &mut dyn FnMut(WindowHandle) -> bool) -> Result<(), ServiceError> {
        let handles: Vec<_> = {
            let state = self.state.lock();
            state.check(Call::EnumWindows, "EnumWindows")?;
            state.windows.iter().map(|window| window.handle).collect()
        };

        for handle in handles {
            self.state.lock().windows_visited += 1;
            if !visitor(handle) {
                break;
            }
        }
        Ok(())
    }

    fn window_text(&self, window: WindowHandle) -> Result<String, ServiceError> {
        let state = self.state.lock();
        state
            .window(window)
            .map(|window| window.title.clone())
            .ok_or(ServiceError::new("GetWindowTextW", 1400))
    }

    fn is_window_visible(&self, window: WindowHandle) -> bool {
        self.state.lock().window(window).is_some_and(|window| window.visible)
    }

    fn client_rect(&self, window: WindowHandle) -> Result<Rect, ServiceError> {
        let state = self.state.lock();
        state.check(Call::ClientRect, "GetClientRect")?;
        state
            .window(window)
            .and_then(|window| window.client)
            .ok_or(ServiceError::new("GetClientRect", 1400))
    }
}
