//! Page-granular memory calls.
//!
//! Protected secrets live in whole pages obtained straight from the OS so that their
//! protection can be flipped between no-access and read-only, and so that they can be
//! locked into RAM. [`PageRegion`] owns one such mapping and wipes it before handing it
//! back.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as sys;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as sys;

use std::io;
use std::ptr::NonNull;

use log::{error, trace, warn};
use once_cell::sync::Lazy;
use zeroize::Zeroize;

use crate::error::{PipelineError, Result};

/// System memory page size, determined once at runtime.
pub(crate) static PAGE_SIZE: Lazy<usize> = Lazy::new(page_size::get);

/// Rounds `size` up to a whole number of pages, or `None` on overflow.
pub(crate) fn round_to_page_size(size: usize) -> Option<usize> {
    let page = *PAGE_SIZE;
    size.checked_add(page - 1).map(|s| s / page * page)
}

/// Access rights that can be applied to a [`PageRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    NoAccess,
    ReadOnly,
    ReadWrite,
}

/// An owned, page-aligned mapping.
///
/// Freshly allocated regions are read-write and zero-filled. On drop the region is
/// made writable again, wiped across its whole capacity, unlocked and unmapped.
pub(crate) struct PageRegion {
    ptr: NonNull<u8>,
    len: usize,
    capacity: usize,
    locked: bool,
}

// Safety: the region exclusively owns its mapping; callers coordinate access to the bytes.
unsafe impl Send for PageRegion {}
unsafe impl Sync for PageRegion {}

impl PageRegion {
    /// Maps enough pages to hold `len` bytes. `len` must be non-zero.
    pub(crate) fn allocate(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(PipelineError::AllocationFailed(
                "Cannot map a zero-length region".to_string(),
            ));
        }

        let capacity = round_to_page_size(len).ok_or_else(|| {
            PipelineError::AllocationFailed(format!("Region of {} bytes overflows", len))
        })?;

        let ptr = sys::map(capacity).map_err(|e| {
            PipelineError::AllocationFailed(format!("could not map {} bytes: {}", capacity, e))
        })?;

        #[cfg(not(feature = "no-mlock"))]
        // SAFETY: ptr/capacity describe the mapping we just created.
        let locked = match unsafe { sys::lock(ptr, capacity) } {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not lock {} bytes into RAM: {}", capacity, e);
                false
            }
        };
        #[cfg(feature = "no-mlock")]
        let locked = false;

        let region = Self {
            ptr,
            len,
            capacity,
            locked,
        };

        trace!("Mapped {} bytes for a {} byte region", capacity, len);
        Ok(region)
    }

    /// Number of bytes requested by the caller.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Number of bytes actually mapped.
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Applies `access` to every page of the region.
    pub(crate) fn protect(&self, access: Access) -> io::Result<()> {
        // SAFETY: ptr/capacity describe a mapping owned by self.
        unsafe { sys::protect(self.ptr, self.capacity, access) }
    }
}

impl Drop for PageRegion {
    fn drop(&mut self) {
        match self.protect(Access::ReadWrite) {
            Ok(()) => {
                // SAFETY: the whole mapping is writable and nothing else references it.
                let bytes = unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) };
                bytes.zeroize();
            }
            // Unmapping still discards the pages, we just cannot wipe them first.
            Err(e) => error!("Failed to make region writable before wiping: {}", e),
        }

        if self.locked {
            // SAFETY: same mapping that was locked in allocate.
            if let Err(e) = unsafe { sys::unlock(self.ptr, self.capacity) } {
                warn!("Failed to unlock region: {}", e);
            }
        }

        // SAFETY: the mapping came from sys::map with this capacity and is not used again.
        if let Err(e) = unsafe { sys::unmap(self.ptr, self.capacity) } {
            error!("Failed to unmap region: {}", e);
        }
    }
}
