//! UTF-7 (RFC 2152).
//!
//! Only the RFC's "directly encoded" set plus space, tab, CR and LF is written as-is.
//! Optional direct characters such as `!` or `_` go through base64, `+` is written as
//! `+-`, and every shift sequence is terminated with `-`. Code units are encoded as
//! they are, so unpaired surrogates pass through without a fallback.

use zeroize::Zeroize;

use super::Writer;
use crate::error::Result;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn is_direct(unit: u16) -> bool {
    match u8::try_from(unit) {
        Ok(b) => matches!(
            b,
            b'A'..=b'Z'
                | b'a'..=b'z'
                | b'0'..=b'9'
                | b'\t'
                | b'\n'
                | b'\r'
                | b' '
                | b'\''
                | b'('
                | b')'
                | b','
                | b'-'
                | b'.'
                | b'/'
                | b':'
                | b'?'
        ),
        Err(_) => false,
    }
}

fn sextet(value: u32) -> u8 {
    BASE64[(value & 0x3f) as usize]
}

pub(super) fn encode(units: &[u16], out: &mut Writer<'_>) -> Result<()> {
    let mut bits: u32 = 0;
    let mut bit_count: u32 = 0;
    let mut shifted = false;

    let result = (|| -> Result<()> {
        for &unit in units {
            if is_direct(unit) {
                if shifted {
                    if bit_count > 0 {
                        out.push(sextet(bits << (6 - bit_count)))?;
                        bit_count = 0;
                    }
                    out.push(b'-')?;
                    shifted = false;
                }
                out.push(unit as u8)?;
            } else if !shifted && unit == u16::from(b'+') {
                out.push(b'+')?;
                out.push(b'-')?;
            } else {
                if !shifted {
                    out.push(b'+')?;
                    shifted = true;
                }
                bits = (bits << 16) | u32::from(unit);
                bit_count += 16;
                while bit_count >= 6 {
                    bit_count -= 6;
                    out.push(sextet(bits >> bit_count))?;
                }
            }
        }

        if shifted {
            if bit_count > 0 {
                out.push(sextet(bits << (6 - bit_count)))?;
            }
            out.push(b'-')?;
        }
        Ok(())
    })();

    // The bit accumulator holds the tail of the last encoded unit.
    bits.zeroize();
    result
}
