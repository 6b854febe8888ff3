//! Charsets used to turn a secret's UTF-16 code units into bytes.
//!
//! Every encoder writes straight into a caller-provided buffer and checks the remaining
//! space before each write, so an inaccurate size bound surfaces as
//! [`PipelineError::EncodingFailed`] instead of an overrun. No encoder allocates.

mod utf7;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use zeroize::Zeroize;

use crate::error::{PipelineError, Result};

/// Converts UTF-16 code units into a byte encoding.
///
/// # Contract
///
/// * `max_encoded_len(n)` must be a true upper bound on the bytes `encode` produces for
///   any `n` code units, not just a typical case.
/// * `encode` returns the number of bytes written to the front of `dst`.
pub trait Encoding {
    /// Canonical charset name, used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Upper bound on the encoded size of `code_units` code units.
    fn max_encoded_len(&self, code_units: usize) -> Result<usize>;

    /// Encodes `units` into `dst`, returning the number of bytes written.
    fn encode(&self, units: &[u16], dst: &mut [u8]) -> Result<usize>;
}

/// What to do with unpaired surrogates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fallback {
    /// Emit U+FFFD in place of each unpaired surrogate.
    #[default]
    Replacement,
    /// Fail with [`PipelineError::EncodingFailed`].
    Strict,
}

/// Supported charsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    #[default]
    Utf8,
    /// UTF-16, little-endian, no byte order mark.
    Utf16,
    /// UTF-16, big-endian, no byte order mark.
    Utf16BigEndian,
    /// UTF-32, little-endian, no byte order mark.
    Utf32,
    /// UTF-32, big-endian, no byte order mark.
    Utf32BigEndian,
    /// UTF-7 (RFC 2152), optional direct characters base64-encoded.
    Utf7,
}

impl Charset {
    pub const ALL: [Charset; 6] = [
        Charset::Utf8,
        Charset::Utf16,
        Charset::Utf16BigEndian,
        Charset::Utf32,
        Charset::Utf32BigEndian,
        Charset::Utf7,
    ];

    /// Canonical name, as accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Utf16 => "utf-16",
            Charset::Utf16BigEndian => "utf-16be",
            Charset::Utf32 => "utf-32",
            Charset::Utf32BigEndian => "utf-32be",
            Charset::Utf7 => "utf-7",
        }
    }

    /// This charset with an explicit fallback.
    pub fn with_fallback(self, fallback: Fallback) -> CharsetEncoder {
        CharsetEncoder::new(self).with_fallback(fallback)
    }

    /// This charset, failing on unpaired surrogates.
    pub fn strict(self) -> CharsetEncoder {
        self.with_fallback(Fallback::Strict)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a charset name is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown charset: {0}")]
pub struct ParseCharsetError(String);

impl FromStr for Charset {
    type Err = ParseCharsetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            "utf-16" | "utf16" | "utf-16le" | "utf16le" | "unicode" => Ok(Charset::Utf16),
            "utf-16be" | "utf16be" => Ok(Charset::Utf16BigEndian),
            "utf-32" | "utf32" | "utf-32le" | "utf32le" => Ok(Charset::Utf32),
            "utf-32be" | "utf32be" => Ok(Charset::Utf32BigEndian),
            "utf-7" | "utf7" => Ok(Charset::Utf7),
            _ => Err(ParseCharsetError(s.to_string())),
        }
    }
}

/// A [`Charset`] paired with a [`Fallback`] policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharsetEncoder {
    charset: Charset,
    fallback: Fallback,
}

impl CharsetEncoder {
    pub fn new(charset: Charset) -> Self {
        Self {
            charset,
            fallback: Fallback::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn fallback(&self) -> Fallback {
        self.fallback
    }

    /// Decodes `units` into scalar values, applying the fallback to unpaired surrogates.
    fn for_each_scalar<F>(&self, units: &[u16], mut emit: F) -> Result<()>
    where
        F: FnMut(char) -> Result<()>,
    {
        let mut index = 0;
        for decoded in char::decode_utf16(units.iter().copied()) {
            let ch = match decoded {
                Ok(ch) => {
                    index += ch.len_utf16();
                    ch
                }
                Err(_) if self.fallback == Fallback::Strict => {
                    return Err(PipelineError::encoding(
                        self.charset.as_str(),
                        format!("unpaired surrogate at code unit {}", index),
                    ));
                }
                Err(_) => {
                    index += 1;
                    char::REPLACEMENT_CHARACTER
                }
            };
            emit(ch)?;
        }
        Ok(())
    }
}

impl Encoding for CharsetEncoder {
    fn name(&self) -> &'static str {
        self.charset.as_str()
    }

    fn max_encoded_len(&self, code_units: usize) -> Result<usize> {
        let bound = match self.charset {
            // A surrogate pair is 4 bytes for 2 units; anything else is at most 3.
            Charset::Utf8 => code_units.checked_mul(3),
            Charset::Utf16 | Charset::Utf16BigEndian => code_units.checked_mul(2),
            Charset::Utf32 | Charset::Utf32BigEndian => code_units.checked_mul(4),
            // One unit alone in a shift sequence costs '+', three sextets and '-'.
            Charset::Utf7 => code_units.checked_mul(3).and_then(|n| n.checked_add(2)),
        };

        bound.ok_or_else(|| {
            PipelineError::AllocationFailed(format!(
                "{} code units overflow the {} size bound",
                code_units,
                self.charset.as_str()
            ))
        })
    }

    fn encode(&self, units: &[u16], dst: &mut [u8]) -> Result<usize> {
        let mut out = Writer::new(dst, self.charset.as_str());

        match self.charset {
            Charset::Utf8 => self.for_each_scalar(units, |ch| out.put_utf8(ch))?,
            Charset::Utf16 => self.for_each_scalar(units, |ch| out.put_utf16(ch, u16::to_le_bytes))?,
            Charset::Utf16BigEndian => {
                self.for_each_scalar(units, |ch| out.put_utf16(ch, u16::to_be_bytes))?
            }
            Charset::Utf32 => self.for_each_scalar(units, |ch| out.put_utf32(ch, u32::to_le_bytes))?,
            Charset::Utf32BigEndian => {
                self.for_each_scalar(units, |ch| out.put_utf32(ch, u32::to_be_bytes))?
            }
            // UTF-7 carries raw code units, so it never needs a fallback.
            Charset::Utf7 => utf7::encode(units, &mut out)?,
        }

        Ok(out.written())
    }
}

impl Encoding for Charset {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn max_encoded_len(&self, code_units: usize) -> Result<usize> {
        CharsetEncoder::new(*self).max_encoded_len(code_units)
    }

    fn encode(&self, units: &[u16], dst: &mut [u8]) -> Result<usize> {
        CharsetEncoder::new(*self).encode(units, dst)
    }
}

/// Bounds-checked cursor over an encoder's destination buffer.
pub(crate) struct Writer<'a> {
    dst: &'a mut [u8],
    pos: usize,
    charset: &'static str,
}

impl<'a> Writer<'a> {
    fn new(dst: &'a mut [u8], charset: &'static str) -> Self {
        Self {
            dst,
            pos: 0,
            charset,
        }
    }

    fn written(&self) -> usize {
        self.pos
    }

    fn reserve(&mut self, n: usize) -> Result<&mut [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.dst.len())
            .ok_or_else(|| {
                PipelineError::encoding(
                    self.charset,
                    format!("destination of {} bytes is too small", self.dst.len()),
                )
            })?;
        let slot = &mut self.dst[self.pos..end];
        self.pos = end;
        Ok(slot)
    }

    pub(crate) fn push(&mut self, byte: u8) -> Result<()> {
        self.reserve(1)?[0] = byte;
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Copies `bytes` and wipes them, whether or not the write fits.
    fn put_wiped(&mut self, bytes: &mut [u8]) -> Result<()> {
        let result = self.put(bytes);
        bytes.zeroize();
        result
    }

    fn put_utf16(&mut self, ch: char, order: fn(u16) -> [u8; 2]) -> Result<()> {
        let mut pair = [0_u16; 2];
        let len = ch.encode_utf16(&mut pair).len();
        let result = pair[..len]
            .iter()
            .try_for_each(|&unit| self.put_wiped(&mut order(unit)));
        pair.zeroize();
        result
    }

    fn put_utf32(&mut self, ch: char, order: fn(u32) -> [u8; 4]) -> Result<()> {
        self.put_wiped(&mut order(u32::from(ch)))
    }

    fn put_utf8(&mut self, ch: char) -> Result<()> {
        let slot = self.reserve(ch.len_utf8())?;
        ch.encode_utf8(slot);
        Ok(())
    }
}
