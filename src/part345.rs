//! Decoder for the firmware GUI/data regions (parts 3, 4 and 5)
//!
//! The three GUI regions share the four-byte region header with the boot
//! binaries but use their own token grammar, and are never scrambled, so
//! this decoder reads plain slices directly instead of going through a
//! [`crate::source::ByteSource`].
//!
//! Grammar: a flag byte announces eight tokens, least-significant bit
//! first. A clear bit copies one literal. A set bit reads two bytes; the
//! high nibble of the first is the copy length (value + 2), the remaining
//! 12 bits are the backward distance (value + 1). A zero length nibble
//! escapes to a third byte holding an extended length (value + 0x12).
//!
//! Callers size their output with [`declared_size`] (the probe pass) before
//! [`decompress_bytes`] performs the fill pass; both go through the same
//! header parse and always agree.

use crate::common::{CompressedHeader, FwError, Result};

/// Minimum back-reference copy length
pub const MIN_MATCH_LENGTH: usize = 2;

/// Extended copy lengths start here (escape tokens)
pub const EXTENDED_LENGTH_BASE: usize = 0x12;

fn byte_at(src: &[u8], index: usize) -> Result<u8> {
    src.get(index)
        .copied()
        .ok_or(FwError::TruncatedSource(index))
}

/// Probe pass: parse the region header and return the declared size
/// without touching the token stream
pub fn declared_size(src: &[u8]) -> Result<usize> {
    let header = CompressedHeader::parse(src)?;
    header.validate()?;
    Ok(header.declared_size as usize)
}

/// Fill pass: decode the whole region into a freshly allocated buffer of
/// exactly the declared size
pub fn decompress_bytes(src: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; declared_size(src)?];
    decompress_into(src, &mut out)?;
    Ok(out)
}

fn decompress_into(src: &[u8], out: &mut [u8]) -> Result<()> {
    let declared = out.len();
    let mut pos = 0;
    // Token stream begins right after the header.
    let mut cursor = 4;

    while pos < declared {
        let flags = byte_at(src, cursor)?;
        cursor += 1;
        for bit in 0..8 {
            if pos >= declared {
                break;
            }
            if flags & (1 << bit) == 0 {
                out[pos] = byte_at(src, cursor)?;
                cursor += 1;
                pos += 1;
                continue;
            }

            let b1 = byte_at(src, cursor)? as usize;
            let b2 = byte_at(src, cursor + 1)? as usize;
            cursor += 2;
            let length = match b1 >> 4 {
                0 => {
                    let extended = byte_at(src, cursor)? as usize;
                    cursor += 1;
                    extended + EXTENDED_LENGTH_BASE
                }
                nibble => nibble + MIN_MATCH_LENGTH,
            };
            let distance = (((b1 & 0xF) << 8) | b2) + 1;

            if distance > pos {
                return Err(FwError::BackReferenceOutOfRange {
                    distance,
                    produced: pos,
                });
            }

            let mut from = pos - distance;
            for _ in 0..length {
                if pos >= declared {
                    break;
                }
                out[pos] = out[from];
                pos += 1;
                from += 1;
            }
        }
    }

    Ok(())
}
