use log::trace;
use zeroize::Zeroize;

use crate::encoding::Encoding;
use crate::error::{PipelineError, Result};

/// Transient storage for a secret re-encoded into its target charset.
///
/// A fresh buffer is allocated for every pipeline call. Dropping it overwrites the whole
/// capacity with zeros through `zeroize` before the memory goes back to the allocator,
/// which covers early returns, errors and unwinding alike.
pub(crate) struct ScratchBuffer {
    bytes: Vec<u8>,
    used: usize,
}

impl ScratchBuffer {
    /// Allocates a zero-filled buffer of exactly `capacity` bytes.
    pub(crate) fn allocate(capacity: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(capacity).map_err(|e| {
            PipelineError::AllocationFailed(format!(
                "could not reserve {} scratch bytes: {}",
                capacity, e
            ))
        })?;
        bytes.resize(capacity, 0);

        trace!("Allocated {} byte scratch buffer", capacity);
        Ok(Self { bytes, used: 0 })
    }

    /// Encodes `units` into the buffer and records how many bytes were used.
    pub(crate) fn encode(&mut self, encoding: &dyn Encoding, units: &[u16]) -> Result<usize> {
        let used = encoding.encode(units, &mut self.bytes)?;
        if used > self.bytes.len() {
            return Err(PipelineError::encoding(
                encoding.name(),
                format!(
                    "encoder reported {} bytes for a {} byte buffer",
                    used,
                    self.bytes.len()
                ),
            ));
        }
        self.used = used;
        Ok(used)
    }

    /// The encoded bytes.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.used]
    }

    pub(crate) fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }

    /// Zeroes every byte of the buffer, not just the used prefix.
    pub(crate) fn wipe(&mut self) {
        self.bytes.as_mut_slice().zeroize();
        self.used = 0;
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        self.wipe();
        // Also clears the Vec's spare capacity before it is freed.
        self.bytes.zeroize();
    }
}
