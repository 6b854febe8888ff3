//! # Secure Hash
//!
//! Hash secrets held in protected memory without leaving plaintext copies behind.
//!
//! `securehash` takes a secret stored as UTF-16 code units in protected memory, re-encodes
//! it into a chosen charset, runs a caller-supplied hash function over the result and
//! returns the digest. Every transient buffer created along the way is overwritten with
//! zeros before the call returns, on success, on error and while unwinding.
//!
//! ## Features
//!
//! - **Scoped Access**: Secrets are only readable inside a closure; the memory drops
//!   back to no-access as soon as it returns
//! - **Guaranteed Wiping**: Scratch buffers are zeroed with `zeroize` from `Drop`, so no
//!   exit path can skip it
//! - **Pluggable Primitives**: Any [`HashFunction`] and any [`Encoding`] can be used;
//!   adapters for `sha2`, `blake2` and `ring` are included
//! - **Charsets**: UTF-8, UTF-16 and UTF-32 in both byte orders, and UTF-7
//! - **Protected Storage**: [`ProtectedString`] keeps its code units in locked,
//!   page-protected memory and wipes them on close
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use securehash::{hash, hash_with_charset, Charset, ProtectedString, Sha256Hasher};
//!
//! let secret = ProtectedString::from_string("my-password".to_string()).unwrap();
//! let hasher = Sha256Hasher::new();
//!
//! // UTF-8 unless told otherwise
//! let digest = hash(Some(&secret), Some(&hasher)).unwrap();
//! println!("{}", digest);
//!
//! let utf16 = hash_with_charset(Some(&secret), Some(&hasher), Some(&Charset::Utf16)).unwrap();
//! assert_ne!(digest, utf16);
//! ```
//!
//! ## Error Handling
//!
//! All operations that can fail return a `Result<T, PipelineError>`. Missing arguments
//! are reported as [`PipelineError::NullSecret`], [`PipelineError::NullHashFunction`]
//! or [`PipelineError::NullEncoding`], checked in that order. Collaborator failures are
//! passed through after cleanup.
//!
//! ```rust,no_run
//! use securehash::{Fallback, PipelineError, ProtectedString, SecureHashPipeline, Sha256Hasher};
//!
//! // "a" followed by an unpaired surrogate
//! let mut units = [0x0061_u16, 0xD800];
//! let secret = ProtectedString::from_code_units(&mut units).unwrap();
//!
//! let strict = SecureHashPipeline::new().with_fallback(Fallback::Strict);
//!
//! match strict.hash(&secret, &Sha256Hasher::new()) {
//!     Err(PipelineError::EncodingFailed { charset, reason }) => {
//!         println!("{} rejected the secret: {}", charset, reason)
//!     }
//!     other => println!("unexpected: {:?}", other),
//! }
//! ```

/// Error types
pub mod error;

/// Charsets and the encoding trait
pub mod encoding;

/// Hash functions and digests
pub mod hasher;

/// The hash-and-wipe pipeline
pub mod pipeline;

/// Protected secrets
pub mod protected;

mod platform;
mod scratch;

// Re-export key types
pub use crate::encoding::{Charset, CharsetEncoder, Encoding, Fallback, ParseCharsetError};
pub use crate::error::{PipelineError, Result};
pub use crate::hasher::{
    Blake2b256Hasher, Digest, DigestHasher, HashError, HashFunction, RingHasher, Sha256Hasher,
    Sha384Hasher, Sha512Hasher,
};
pub use crate::pipeline::{hash, hash_with_charset, SecureHashPipeline};
pub use crate::protected::{ProtectedString, ProtectedText};

#[cfg(test)]
#[ctor::ctor]
fn test_init() {
    // Initialize logging for tests
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
