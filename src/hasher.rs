//! Hash primitives consumed by the pipeline.
//!
//! The pipeline never picks an algorithm on its own; callers hand it anything that
//! implements [`HashFunction`]. Adapters are provided for the RustCrypto digests
//! (`sha2`, `blake2`), for `ring::digest`, and for plain closures.

use std::fmt;
use std::marker::PhantomData;

use blake2::digest::consts::U32;
use subtle::ConstantTimeEq;

/// Error type returned by hash primitives.
pub type HashError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A one-way function over a byte sequence.
///
/// Implementations must be pure with respect to their input. A failure is propagated
/// by the pipeline unchanged, wrapped in [`PipelineError::HashFailed`].
///
/// [`PipelineError::HashFailed`]: crate::PipelineError::HashFailed
pub trait HashFunction {
    /// Hashes `bytes`.
    fn compute_hash(&self, bytes: &[u8]) -> Result<Digest, HashError>;
}

impl<F> HashFunction for F
where
    F: Fn(&[u8]) -> Result<Digest, HashError>,
{
    fn compute_hash(&self, bytes: &[u8]) -> Result<Digest, HashError> {
        self(bytes)
    }
}

/// Output of a [`HashFunction`].
///
/// Digests carry no secrecy obligation, but equality is still checked in constant time
/// since they are commonly compared against stored verifiers.
#[derive(Clone, Default)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hexadecimal rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl PartialEq for Digest {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && bool::from(self.0.ct_eq(&other.0))
    }
}

impl Eq for Digest {}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Digest {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Digest {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// [`HashFunction`] backed by any RustCrypto `Digest` implementation.
pub struct DigestHasher<D> {
    _algorithm: PhantomData<fn() -> D>,
}

impl<D: sha2::Digest> DigestHasher<D> {
    pub fn new() -> Self {
        Self {
            _algorithm: PhantomData,
        }
    }
}

impl<D: sha2::Digest> Default for DigestHasher<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Clone for DigestHasher<D> {
    fn clone(&self) -> Self {
        Self {
            _algorithm: PhantomData,
        }
    }
}

impl<D> fmt::Debug for DigestHasher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestHasher")
            .field("algorithm", &std::any::type_name::<D>())
            .finish()
    }
}

impl<D: sha2::Digest> HashFunction for DigestHasher<D> {
    fn compute_hash(&self, bytes: &[u8]) -> Result<Digest, HashError> {
        Ok(Digest(D::digest(bytes).to_vec()))
    }
}

pub type Sha256Hasher = DigestHasher<sha2::Sha256>;
pub type Sha384Hasher = DigestHasher<sha2::Sha384>;
pub type Sha512Hasher = DigestHasher<sha2::Sha512>;
pub type Blake2b256Hasher = DigestHasher<blake2::Blake2b<U32>>;

/// [`HashFunction`] backed by `ring::digest`.
#[derive(Clone, Copy)]
pub struct RingHasher {
    algorithm: &'static ring::digest::Algorithm,
}

impl RingHasher {
    pub fn new(algorithm: &'static ring::digest::Algorithm) -> Self {
        Self { algorithm }
    }

    pub fn sha256() -> Self {
        Self::new(&ring::digest::SHA256)
    }

    pub fn sha384() -> Self {
        Self::new(&ring::digest::SHA384)
    }

    pub fn sha512() -> Self {
        Self::new(&ring::digest::SHA512)
    }
}

impl fmt::Debug for RingHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingHasher")
            .field("algorithm", self.algorithm)
            .finish()
    }
}

impl HashFunction for RingHasher {
    fn compute_hash(&self, bytes: &[u8]) -> Result<Digest, HashError> {
        let digest = ring::digest::digest(self.algorithm, bytes);
        Ok(Digest(digest.as_ref().to_vec()))
    }
}
