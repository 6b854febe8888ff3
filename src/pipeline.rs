//! Hashing of protected secrets.
//!
//! The pipeline re-encodes a secret into the requested charset inside a scratch buffer,
//! hands the encoded bytes to the caller's hash function and wipes the buffer before
//! returning. The order of operations for a non-empty secret is:
//!
//! 1. size and allocate the scratch buffer from the secret's length;
//! 2. open the secret's view and encode it into the buffer;
//! 3. close the view;
//! 4. hash the used prefix of the buffer in place;
//! 5. zero the full buffer and release it.
//!
//! Steps 3 and 5 are tied to scope exit rather than to the happy path, so they also run
//! when encoding or hashing fails, and while unwinding from a panicking hash function.

#[cfg(feature = "metrics")]
use std::time::Instant;

use log::trace;

use crate::encoding::{Charset, CharsetEncoder, Encoding, Fallback};
use crate::error::{PipelineError, Result};
use crate::hasher::{Digest, HashFunction};
use crate::protected::ProtectedText;
use crate::scratch::ScratchBuffer;

/// Hashes `secret` as UTF-8.
///
/// Equivalent to [`hash_with_charset`] with [`Charset::Utf8`].
///
/// # Errors
///
/// * [`PipelineError::NullSecret`] if `secret` is `None`
/// * [`PipelineError::NullHashFunction`] if `hasher` is `None`
/// * any error [`hash_with_charset`] can return
///
/// # Example
///
/// ```rust,no_run
/// use securehash::{hash, ProtectedString, Sha256Hasher};
///
/// let secret = ProtectedString::from_text("correct horse battery staple").unwrap();
/// let digest = hash(Some(&secret), Some(&Sha256Hasher::new())).unwrap();
/// println!("{}", digest);
/// ```
pub fn hash<S, H>(secret: Option<&S>, hasher: Option<&H>) -> Result<Digest>
where
    S: ProtectedText,
    H: HashFunction + ?Sized,
{
    hash_with_charset(secret, hasher, Some(&Charset::Utf8))
}

/// Hashes `secret` under `charset`.
///
/// Arguments are validated in order (secret, hash function, charset) before anything is
/// allocated, so the reported error is deterministic when several are missing.
///
/// # Errors
///
/// * [`PipelineError::NullSecret`], [`PipelineError::NullHashFunction`],
///   [`PipelineError::NullEncoding`] for missing arguments
/// * [`PipelineError::AllocationFailed`] if the scratch buffer cannot be sized or allocated
/// * [`PipelineError::SecretClosed`] or [`PipelineError::UnprotectFailed`] if the secret
///   cannot be opened
/// * [`PipelineError::EncodingFailed`] if the charset rejects the secret
/// * [`PipelineError::HashFailed`] if the hash function fails
pub fn hash_with_charset<S, H>(
    secret: Option<&S>,
    hasher: Option<&H>,
    charset: Option<&dyn Encoding>,
) -> Result<Digest>
where
    S: ProtectedText,
    H: HashFunction + ?Sized,
{
    let secret = secret.ok_or(PipelineError::NullSecret)?;
    let hasher = hasher.ok_or(PipelineError::NullHashFunction)?;
    let charset = charset.ok_or(PipelineError::NullEncoding)?;

    #[cfg(feature = "metrics")]
    let start = Instant::now();

    let result = run(secret, hasher, charset);

    #[cfg(feature = "metrics")]
    {
        metrics::histogram!(
            "securehash.pipeline.hash_duration_seconds",
            start.elapsed().as_secs_f64()
        );
        if result.is_err() {
            metrics::increment_counter!("securehash.pipeline.failures");
        }
    }

    result
}

fn run<S, H>(secret: &S, hasher: &H, charset: &dyn Encoding) -> Result<Digest>
where
    S: ProtectedText,
    H: HashFunction + ?Sized,
{
    let code_units = secret.len();

    if code_units == 0 {
        trace!("Hashing empty secret as {}", charset.name());
        return hasher.compute_hash(&[]).map_err(PipelineError::HashFailed);
    }

    let capacity = charset.max_encoded_len(code_units)?;
    let mut scratch = ScratchBuffer::allocate(capacity)?;

    // The view only lives for the duration of this closure.
    secret.with_code_units(|units| scratch.encode(charset, units))?;

    trace!(
        "Encoded {} code units as {} into {} of {} scratch bytes",
        code_units,
        charset.name(),
        scratch.used(),
        scratch.capacity()
    );

    let digest = hasher
        .compute_hash(scratch.as_bytes())
        .map_err(PipelineError::HashFailed);

    // Zero, then release.
    drop(scratch);
    digest
}

/// A reusable hashing configuration.
///
/// Holds the charset and fallback applied to every secret it hashes. The default is UTF-8
/// with replacement of unpaired surrogates.
///
/// # Example
///
/// ```rust,no_run
/// use securehash::{Charset, Fallback, ProtectedString, SecureHashPipeline, Sha256Hasher};
///
/// let pipeline = SecureHashPipeline::new()
///     .with_charset(Charset::Utf16)
///     .with_fallback(Fallback::Strict);
///
/// let secret = ProtectedString::from_text("s3cr3t").unwrap();
/// let digest = pipeline.hash(&secret, &Sha256Hasher::new()).unwrap();
/// assert_eq!(digest.len(), 32);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecureHashPipeline {
    encoder: CharsetEncoder,
}

impl SecureHashPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_charset(self, charset: Charset) -> Self {
        Self {
            encoder: CharsetEncoder::new(charset).with_fallback(self.encoder.fallback()),
        }
    }

    pub fn with_fallback(self, fallback: Fallback) -> Self {
        Self {
            encoder: self.encoder.with_fallback(fallback),
        }
    }

    pub fn charset(&self) -> Charset {
        self.encoder.charset()
    }

    pub fn fallback(&self) -> Fallback {
        self.encoder.fallback()
    }

    /// Hashes `secret` under this pipeline's charset.
    pub fn hash<S, H>(&self, secret: &S, hasher: &H) -> Result<Digest>
    where
        S: ProtectedText,
        H: HashFunction + ?Sized,
    {
        hash_with_charset(Some(secret), Some(hasher), Some(&self.encoder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{HashError, Sha256Hasher};
    use crate::protected::ProtectedString;
    use std::cell::{Cell, RefCell};

    /// Secret double that records how its view is used.
    struct RecordingSecret {
        units: Vec<u16>,
        opened: Cell<usize>,
        fail_open: bool,
    }

    impl RecordingSecret {
        fn new(text: &str) -> Self {
            Self {
                units: text.encode_utf16().collect(),
                opened: Cell::new(0),
                fail_open: false,
            }
        }
    }

    impl ProtectedText for RecordingSecret {
        fn len(&self) -> usize {
            self.units.len()
        }

        fn with_code_units<F, R>(&self, action: F) -> Result<R>
        where
            F: FnOnce(&[u16]) -> Result<R>,
        {
            self.opened.set(self.opened.get() + 1);
            if self.fail_open {
                return Err(PipelineError::UnprotectFailed("handle revoked".to_string()));
            }
            action(&self.units)
        }
    }

    #[test]
    fn test_empty_secret_skips_view() {
        let secret = RecordingSecret::new("");
        let seen = RefCell::new(None);
        let hasher = |bytes: &[u8]| -> std::result::Result<Digest, HashError> {
            *seen.borrow_mut() = Some(bytes.len());
            Ok(Digest::new(vec![7]))
        };

        let digest = hash(Some(&secret), Some(&hasher)).expect("hash failed");

        assert_eq!(digest.as_bytes(), &[7]);
        assert_eq!(*seen.borrow(), Some(0));
        assert_eq!(secret.opened.get(), 0);
    }

    #[test]
    fn test_view_opened_once() {
        let secret = RecordingSecret::new("abc");
        hash(Some(&secret), Some(&Sha256Hasher::new())).expect("hash failed");
        assert_eq!(secret.opened.get(), 1);
    }

    #[test]
    fn test_hasher_sees_encoded_bytes() {
        let secret = RecordingSecret::new("h\u{e9}");
        let seen = RefCell::new(Vec::new());
        let hasher = |bytes: &[u8]| -> std::result::Result<Digest, HashError> {
            seen.borrow_mut().extend_from_slice(bytes);
            Ok(Digest::default())
        };

        hash_with_charset(Some(&secret), Some(&hasher), Some(&Charset::Utf16BigEndian))
            .expect("hash failed");

        assert_eq!(*seen.borrow(), [0x00, 0x68, 0x00, 0xE9]);
    }

    #[test]
    fn test_validation_order() {
        let secret = RecordingSecret::new("abc");
        let hasher = Sha256Hasher::new();

        let err = hash_with_charset(None::<&RecordingSecret>, None::<&Sha256Hasher>, None)
            .expect_err("should fail");
        assert!(matches!(err, PipelineError::NullSecret));

        let err = hash_with_charset(Some(&secret), None::<&Sha256Hasher>, None)
            .expect_err("should fail");
        assert!(matches!(err, PipelineError::NullHashFunction));

        let err = hash_with_charset(Some(&secret), Some(&hasher), None).expect_err("should fail");
        assert!(matches!(err, PipelineError::NullEncoding));

        assert_eq!(secret.opened.get(), 0);
    }

    #[test]
    fn test_open_failure_propagates() {
        let mut secret = RecordingSecret::new("abc");
        secret.fail_open = true;

        let err = hash(Some(&secret), Some(&Sha256Hasher::new())).expect_err("should fail");
        assert!(matches!(err, PipelineError::UnprotectFailed(_)));
    }

    #[test]
    fn test_pipeline_configuration() {
        let pipeline = SecureHashPipeline::new();
        assert_eq!(pipeline.charset(), Charset::Utf8);
        assert_eq!(pipeline.fallback(), Fallback::Replacement);

        let pipeline = pipeline.with_fallback(Fallback::Strict).with_charset(Charset::Utf32);
        assert_eq!(pipeline.charset(), Charset::Utf32);
        assert_eq!(pipeline.fallback(), Fallback::Strict);
    }

    #[test]
    fn test_pipeline_matches_free_function() {
        let secret = ProtectedString::from_text("pipeline").expect("create failed");
        let hasher = Sha256Hasher::new();

        let configured = SecureHashPipeline::new()
            .with_charset(Charset::Utf7)
            .hash(&secret, &hasher)
            .expect("hash failed");
        let direct = hash_with_charset(Some(&secret), Some(&hasher), Some(&Charset::Utf7))
            .expect("hash failed");

        assert_eq!(configured, direct);
    }

    #[test]
    fn test_strict_pipeline_rejects_lone_surrogate() {
        let mut units = [0x61_u16, 0xDC00];
        let secret = ProtectedString::from_code_units(&mut units).expect("create failed");

        let err = SecureHashPipeline::new()
            .with_fallback(Fallback::Strict)
            .hash(&secret, &Sha256Hasher::new())
            .expect_err("should fail");

        assert!(matches!(err, PipelineError::EncodingFailed { charset: "utf-8", .. }));
    }
}
