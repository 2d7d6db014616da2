use std::ptr::NonNull;
use std::slice;

use log::warn;

use crate::surface::{MemoryHandle, ServiceError, SurfaceService};

/// A movable native memory block that is freed when dropped.
pub struct NativeBlock<'a, S: SurfaceService + ?Sized> {
    service: &'a S,
    memory: MemoryHandle,
    size: usize,
}

impl<'a, S: SurfaceService + ?Sized> NativeBlock<'a, S> {
    /// Allocates a zero-initialized block of `size` bytes.
    pub fn alloc(service: &'a S, size: usize) -> Result<Self, ServiceError> {
        let memory = service.alloc_memory(size)?;
        Ok(Self { service, memory, size })
    }

    /// Locks the block for direct access. The lock is released when the returned guard drops.
    pub fn lock(&mut self) -> Result<LockedBlock<'_, S>, ServiceError> {
        let ptr = self.service.lock_memory(self.memory)?;
        Ok(LockedBlock { service: self.service, memory: self.memory, ptr, size: self.size })
    }

    /// Size of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
}

impl<S: SurfaceService + ?Sized> Drop for NativeBlock<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.service.free_memory(self.memory) {
            warn!("Failed to free native memory block: {e}");
        }
    }
}

/// A locked view of a [`NativeBlock`], bounded to the block's size.
pub struct LockedBlock<'a, S: SurfaceService + ?Sized> {
    service: &'a S,
    memory: MemoryHandle,
    ptr: NonNull<u8>,
    size: usize,
}

impl<S: SurfaceService + ?Sized> LockedBlock<'_, S> {
    /// The locked bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `SurfaceService` guarantees the locked pointer is valid for `size` bytes
        // until it is unlocked, which only happens when `self` drops.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    /// The locked bytes, mutably.
    #[inline]
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: see `as_slice`; `&mut self` makes the view exclusive.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }
}

impl<S: SurfaceService + ?Sized> Drop for LockedBlock<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.service.unlock_memory(self.memory) {
            warn!("Failed to unlock native memory block: {e}");
        }
    }
}
