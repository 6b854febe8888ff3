use std::io;
use std::ptr::{self, NonNull};

use winapi::shared::minwindef::DWORD;
use winapi::um::memoryapi::{VirtualAlloc, VirtualFree, VirtualLock, VirtualProtect, VirtualUnlock};
use winapi::um::winnt::{
    MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_READONLY, PAGE_READWRITE,
};

use super::Access;

/// Commits `size` bytes of read-write memory.
pub(super) fn map(size: usize) -> io::Result<NonNull<u8>> {
    // SAFETY: fresh reservation, no existing memory is touched.
    let ptr = unsafe { VirtualAlloc(ptr::null_mut(), size, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };

    // Committed pages are zero-filled by the system.
    NonNull::new(ptr.cast::<u8>()).ok_or_else(io::Error::last_os_error)
}

/// # Safety
///
/// `ptr` must come from [`map`] and not be used afterwards.
pub(super) unsafe fn unmap(ptr: NonNull<u8>, _size: usize) -> io::Result<()> {
    if VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE) == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `ptr`/`size` must describe a live allocation returned by [`map`].
pub(super) unsafe fn protect(ptr: NonNull<u8>, size: usize, access: Access) -> io::Result<()> {
    let prot = match access {
        Access::NoAccess => PAGE_NOACCESS,
        Access::ReadOnly => PAGE_READONLY,
        Access::ReadWrite => PAGE_READWRITE,
    };

    let mut previous: DWORD = 0;
    if VirtualProtect(ptr.as_ptr().cast(), size, prot, &mut previous) == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `ptr`/`size` must describe a live allocation returned by [`map`].
pub(super) unsafe fn lock(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
    if VirtualLock(ptr.as_ptr().cast(), size) == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `ptr`/`size` must describe an allocation previously passed to [`lock`].
pub(super) unsafe fn unlock(ptr: NonNull<u8>, size: usize) -> io::Result<()> {
    if VirtualUnlock(ptr.as_ptr().cast(), size) == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
