use thiserror::Error;

use crate::hasher::HashError;

/// Errors that can occur while hashing a protected secret.
///
/// The first three variants are precondition violations and are reported before any
/// memory is touched. Everything else is a collaborator failure that is surfaced as-is
/// once the pipeline has wiped and released whatever it had acquired.
///
/// None of the messages carried by these variants contain secret material. Encoders
/// report *where* they failed, never the offending code unit.
///
/// # Examples
///
/// ```rust,no_run
/// use securehash::{hash, PipelineError, ProtectedString, Sha256Hasher};
///
/// let hasher = Sha256Hasher::new();
/// let result = hash(None::<&ProtectedString>, Some(&hasher));
///
/// assert!(matches!(result, Err(PipelineError::NullSecret)));
/// ```
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No secret was supplied.
    #[error("Secret must not be null")]
    NullSecret,

    /// No hash function was supplied.
    #[error("Hash function must not be null")]
    NullHashFunction,

    /// No encoding was supplied.
    #[error("Encoding must not be null")]
    NullEncoding,

    /// Scratch or page memory could not be allocated.
    ///
    /// This also covers a capacity computation that overflows `usize`.
    #[error("Failed to allocate memory: {0}")]
    AllocationFailed(String),

    /// The protected secret could not be made readable.
    #[error("Failed to unprotect secret: {0}")]
    UnprotectFailed(String),

    /// The protected secret has already been closed.
    #[error("Secret is already closed")]
    SecretClosed,

    /// Memory protection could not be applied to a newly created secret.
    #[error("Failed to set memory protection: {0}")]
    ProtectionFailed(String),

    /// The encoder rejected the secret or ran out of destination space.
    #[error("Failed to encode secret as {charset}: {reason}")]
    EncodingFailed {
        /// Canonical name of the charset that failed.
        charset: &'static str,
        /// What went wrong. Never contains secret content.
        reason: String,
    },

    /// The hash primitive failed. The original error is kept as the source.
    #[error("Hash function failed: {0}")]
    HashFailed(#[source] HashError),
}

impl PipelineError {
    /// Returns `true` for the null-argument variants.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::NullSecret | PipelineError::NullHashFunction | PipelineError::NullEncoding
        )
    }

    pub(crate) fn encoding(charset: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::EncodingFailed {
            charset,
            reason: reason.into(),
        }
    }
}

/// Result type for securehash operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
