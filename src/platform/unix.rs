use std::io;
use std::ptr::{self, NonNull};

use super::Access;

/// Maps `size` bytes of private, anonymous, read-write memory.
pub(super) fn map(size: usize) -> io::Result<NonNull<u8>> {
    // SAFETY: anonymous private mapping, no existing memory is touched.
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    // Anonymous mappings are zero-filled by the kernel.
    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::other("mmap returned null"))
}

/// # Safety
///
/// `ptr`/`size` must describe a mapping returned by [`map`] that is not used afterwards.
pub(super) unsafe fn unmap(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
    if libc::munmap(ptr.as_ptr().cast::<libc::c_void>(), size) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `ptr`/`size` must describe a live mapping returned by [`map`].
pub(super) unsafe fn protect(ptr: NonNull<u8>, size: usize, access: Access) -> io::Result<()> {
    let prot = match access {
        Access::NoAccess => libc::PROT_NONE,
        Access::ReadOnly => libc::PROT_READ,
        Access::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
    };

    if libc::mprotect(ptr.as_ptr().cast::<libc::c_void>(), size, prot) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `ptr`/`size` must describe a live mapping returned by [`map`].
pub(super) unsafe fn lock(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
    let addr = ptr.as_ptr().cast::<libc::c_void>();

    // Keep the pages out of core dumps as well.
    #[cfg(target_os = "linux")]
    libc::madvise(addr, size, libc::MADV_DONTDUMP);

    if libc::mlock(addr, size) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `ptr`/`size` must describe a mapping previously passed to [`lock`].
pub(super) unsafe fn unlock(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
    if libc::munlock(ptr.as_ptr().cast::<libc::c_void>(), size) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
