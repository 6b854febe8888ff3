//! Protected secrets.
//!
//! The pipeline only needs two things from a secret: how many UTF-16 code units it holds,
//! and a way to look at those units for the duration of a closure. [`ProtectedText`]
//! captures exactly that. [`ProtectedString`] is the implementation shipped with this
//! crate, keeping its code units in locked pages that are inaccessible outside of
//! [`ProtectedText::with_code_units`].
//!
//! The memory protection state transitions of a `ProtectedString` are:
//!
//! ```text
//! Initial state: NoAccess
//!      |
//!      | (first reader enters with_code_units)
//!      v
//!    ReadOnly
//!      |
//!      | (last reader leaves, including by panic)
//!      v
//!    NoAccess
//!      |
//!      | (close or last handle dropped)
//!      v
//!    ReadWrite (for zeroing)
//!      |
//!      v
//!    Unmapped
//! ```

mod string;

pub use string::ProtectedString;

use crate::error::Result;

/// A caller-owned secret whose UTF-16 code units live in protected memory.
///
/// `with_code_units` is generic over its closure, so the trait is used through static
/// dispatch only. Pass `&S` where a borrowed secret is needed.
pub trait ProtectedText {
    /// Number of UTF-16 code units in the secret.
    fn len(&self) -> usize;

    /// Returns `true` if the secret holds no code units.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `action` with a temporary, read-only view of the code units.
    ///
    /// The view is only valid inside the closure. Implementations must re-protect or
    /// destroy it when the closure returns, whether it returned an error or unwound.
    /// Errors from `action` are returned unchanged.
    fn with_code_units<F, R>(&self, action: F) -> Result<R>
    where
        F: FnOnce(&[u16]) -> Result<R>;
}

impl<T: ProtectedText + ?Sized> ProtectedText for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn with_code_units<F, R>(&self, action: F) -> Result<R>
    where
        F: FnOnce(&[u16]) -> Result<R>,
    {
        (**self).with_code_units(action)
    }
}
