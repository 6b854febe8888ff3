use std::fmt;
use std::ptr;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};
use zeroize::Zeroize;

use super::ProtectedText;
use crate::error::{PipelineError, Result};
use crate::platform::{Access, PageRegion};

/// Shared state behind every clone of a [`ProtectedString`].
struct SecretInner {
    /// Length in UTF-16 code units; kept after close so a closed secret is not mistaken
    /// for an empty one.
    len: usize,
    state: Mutex<AccessState>,
    released: Condvar,
}

struct AccessState {
    region: Option<PageRegion>,
    closing: bool,
    closed: bool,
    readers: usize,
}

/// A UTF-16 secret stored in locked, page-protected memory.
///
/// The code units are only readable while a [`ProtectedText::with_code_units`] closure is
/// running. Any number of threads may read at once; the pages drop back to no-access
/// when the last reader leaves. Clones share the same memory, which is wiped and
/// unmapped by [`close`](ProtectedString::close) or when the last clone is dropped.
///
/// # Example
///
/// ```rust,no_run
/// use securehash::{ProtectedString, ProtectedText};
///
/// let secret = ProtectedString::from_string("hunter2".to_string()).unwrap();
/// assert_eq!(secret.len(), 7);
///
/// secret.with_code_units(|units| {
///     assert_eq!(units[0], u16::from(b'h'));
///     Ok(())
/// }).unwrap();
///
/// secret.close();
/// assert!(secret.is_closed());
/// ```
#[derive(Clone)]
pub struct ProtectedString {
    inner: Arc<SecretInner>,
}

impl ProtectedString {
    /// Creates an empty secret. No memory is mapped.
    pub fn new() -> Self {
        Self::with_region(0, None)
    }

    /// Copies `text` into protected memory.
    ///
    /// The text is transcoded straight into the protected pages, so no intermediate
    /// heap copy is made. The caller remains responsible for `text` itself.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_units(text.encode_utf16().count(), text.encode_utf16())
    }

    /// Moves `text` into protected memory and wipes the `String`.
    pub fn from_string(mut text: String) -> Result<Self> {
        let secret = Self::from_text(&text);
        text.zeroize();
        secret
    }

    /// Copies `source` into protected memory and wipes it, whether or not creation succeeds.
    pub fn from_code_units(source: &mut [u16]) -> Result<Self> {
        let secret = Self::from_units(source.len(), source.iter().copied());
        source.zeroize();
        secret
    }

    /// Returns `true` once the secret has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Wipes and unmaps the secret.
    ///
    /// Blocks until in-flight readers have finished, so it must not be called from inside
    /// a `with_code_units` closure on the same secret. Closing twice is a no-op.
    pub fn close(&self) {
        let region = {
            let mut state = self.inner.state.lock();
            state.closing = true;
            while state.readers > 0 {
                self.inner.released.wait(&mut state);
            }
            if state.closed {
                return;
            }
            state.closed = true;
            state.region.take()
        };

        // Dropping the region makes it writable, wipes and unmaps it.
        drop(region);
        debug!("Closed protected string of {} code units", self.inner.len);
    }

    fn from_units<I>(len: usize, units: I) -> Result<Self>
    where
        I: Iterator<Item = u16>,
    {
        if len == 0 {
            return Ok(Self::new());
        }

        let size = len.checked_mul(2).ok_or_else(|| {
            PipelineError::AllocationFailed(format!("{} code units overflow", len))
        })?;
        let region = PageRegion::allocate(size)?;

        // SAFETY: the region is freshly mapped read-write, page aligned and at least
        // `len` u16 slots long.
        let slots = unsafe { std::slice::from_raw_parts_mut(region.as_ptr().cast::<u16>(), len) };
        for (slot, unit) in slots.iter_mut().zip(units) {
            *slot = unit;
        }

        region
            .protect(Access::NoAccess)
            .map_err(|e| PipelineError::ProtectionFailed(e.to_string()))?;

        trace!(
            "Created protected string of {} code units ({} of {} bytes used, locked: {})",
            len,
            region.len(),
            region.capacity(),
            region.is_locked()
        );

        Ok(Self::with_region(len, Some(region)))
    }

    fn with_region(len: usize, region: Option<PageRegion>) -> Self {
        Self {
            inner: Arc::new(SecretInner {
                len,
                state: Mutex::new(AccessState {
                    region,
                    closing: false,
                    closed: false,
                    readers: 0,
                }),
                released: Condvar::new(),
            }),
        }
    }

    /// Registers a reader, raising the pages to read-only if it is the first one.
    fn acquire(&self) -> Result<ReadGuard<'_>> {
        let mut state = self.inner.state.lock();

        if state.closing || state.closed {
            return Err(PipelineError::SecretClosed);
        }

        let ptr = match state.region.as_ref() {
            Some(region) => {
                if state.readers == 0 {
                    region
                        .protect(Access::ReadOnly)
                        .map_err(|e| PipelineError::UnprotectFailed(e.to_string()))?;
                }
                region.as_ptr()
            }
            None => ptr::null_mut(),
        };

        state.readers += 1;
        Ok(ReadGuard {
            inner: &self.inner,
            ptr,
        })
    }
}

impl Default for ProtectedString {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ProtectedString {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_text(s)
    }
}

impl fmt::Debug for ProtectedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedString")
            .field("len", &self.inner.len)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ProtectedText for ProtectedString {
    fn len(&self) -> usize {
        self.inner.len
    }

    fn with_code_units<F, R>(&self, action: F) -> Result<R>
    where
        F: FnOnce(&[u16]) -> Result<R>,
    {
        let guard = self.acquire()?;
        action(guard.units())
    }
}

/// One registered reader. Dropping it releases the view, also while unwinding.
struct ReadGuard<'a> {
    inner: &'a SecretInner,
    ptr: *mut u8,
}

impl ReadGuard<'_> {
    fn units(&self) -> &[u16] {
        if self.ptr.is_null() {
            return &[];
        }
        // SAFETY: the region is read-only for as long as this reader is registered, and
        // close() waits for all readers before unmapping it.
        unsafe { std::slice::from_raw_parts(self.ptr.cast::<u16>(), self.inner.len) }
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.readers -= 1;

        if state.readers == 0 {
            if let Some(region) = state.region.as_ref() {
                if let Err(e) = region.protect(Access::NoAccess) {
                    warn!("Failed to set protected string to NoAccess: {}", e);
                }
            }
        }

        // Wake up any waiting close() calls
        self.inner.released.notify_all();
    }
}
