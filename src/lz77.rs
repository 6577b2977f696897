//! LZ77 decoder for the firmware boot binaries
//!
//! This is the BIOS-family LZ77 scheme: a flag byte announces eight tokens,
//! most-significant bit first. A clear bit copies one literal byte from the
//! source; a set bit reads a two-byte back-reference whose first byte packs
//! the copy length (high nibble, value + 3) and the top of a 12-bit
//! backward distance (value + 1).
//!
//! The decoder is written once against [`ByteSource`] and therefore works
//! identically on cleartext and KEY1-scrambled regions.

use crate::common::{CompressedHeader, FwError, Result};
use crate::source::ByteSource;

/// Minimum back-reference copy length
pub const MIN_MATCH_LENGTH: usize = 3;

/// Decompress a token stream into a pre-sized output buffer
///
/// Produces exactly `out.len()` bytes or fails; flag bits left over in the
/// final flag byte are discarded once the limit is reached, and a copy that
/// would cross the limit is truncated at it.
pub fn decompress(source: &mut ByteSource<'_>, out: &mut [u8]) -> Result<()> {
    let declared_size = out.len();
    let mut pos = 0;

    while pos < declared_size {
        let flags = source.get_u8()?;
        for bit in (0..8).rev() {
            if pos >= declared_size {
                break;
            }
            if flags & (1 << bit) == 0 {
                out[pos] = source.get_u8()?;
                pos += 1;
            } else {
                let hi = source.get_u8()? as usize;
                let lo = source.get_u8()? as usize;
                let length = (hi >> 4) + MIN_MATCH_LENGTH;
                let distance = (((hi & 0xF) << 8) | lo) + 1;

                if distance > pos {
                    return Err(FwError::BackReferenceOutOfRange {
                        distance,
                        produced: pos,
                    });
                }

                // Copy byte by byte so overlapping references repeat the
                // bytes they produce (distance < length).
                let mut from = pos - distance;
                for _ in 0..length {
                    if pos >= declared_size {
                        break;
                    }
                    out[pos] = out[from];
                    pos += 1;
                    from += 1;
                }
            }
        }
    }

    Ok(())
}

/// Read a region header through the source, then decompress the region
///
/// The declared size is obtained before any output is allocated, and the
/// returned buffer is exactly that long.
pub fn decompress_bytes(source: &mut ByteSource<'_>) -> Result<Vec<u8>> {
    let header = CompressedHeader::from_word(source.get_u32()?);
    header.validate()?;

    let mut out = vec![0u8; header.declared_size as usize];
    decompress(source, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key1::Key1;

    /// Wrap a raw token stream in an LZ77 region header and pad it to a
    /// whole number of cipher blocks so a ByteSource can always refill.
    fn region(declared_size: u32, tokens: &[u8]) -> Vec<u8> {
        let word = 0x10 | (declared_size << 8);
        let mut region = word.to_le_bytes().to_vec();
        region.extend_from_slice(tokens);
        while region.len() % 8 != 0 {
            region.push(0);
        }
        region
    }

    #[test]
    fn test_literal_only_stream() {
        let data = region(8, &[0x00, 1, 2, 3, 4, 5, 6, 7, 8]);
        let mut source = ByteSource::plain(&data, 0).unwrap();
        let out = decompress_bytes(&mut source).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_overlapping_copy_expands_run() {
        // Literal 'A', then (length 5, distance 1): flag byte 0x40 marks
        // the second token as a back-reference. length nibble 2 -> 5.
        let data = region(6, &[0x40, b'A', 0x20, 0x00]);
        let mut source = ByteSource::plain(&data, 0).unwrap();
        let out = decompress_bytes(&mut source).unwrap();
        assert_eq!(out, b"AAAAAA");
    }

    #[test]
    fn test_copy_truncated_at_declared_size() {
        // Back-reference of length 3 with only 2 output bytes remaining.
        let data = region(3, &[0x40, b'x', 0x00, 0x00]);
        let mut source = ByteSource::plain(&data, 0).unwrap();
        let out = decompress_bytes(&mut source).unwrap();
        assert_eq!(out, b"xxx");
    }

    #[test]
    fn test_surplus_flag_bits_discarded() {
        // All eight flag bits set but the declared size is 1; only the
        // first literal may be consumed.
        let data = region(1, &[0x00, b'z', 0xFF, 0xFF]);
        let mut source = ByteSource::plain(&data, 0).unwrap();
        let out = decompress_bytes(&mut source).unwrap();
        assert_eq!(out, b"z");
    }

    #[test]
    fn test_back_reference_out_of_range() {
        // First token is a back-reference with nothing produced yet.
        let data = region(4, &[0x80, 0x00, 0x05, 0x00]);
        let mut source = ByteSource::plain(&data, 0).unwrap();
        let err = decompress_bytes(&mut source).unwrap_err();
        assert!(matches!(
            err,
            FwError::BackReferenceOutOfRange {
                distance: 6,
                produced: 0
            }
        ));
    }

    #[test]
    fn test_unsupported_compression_type() {
        let mut data = region(4, &[0x00, 1, 2, 3, 4]);
        data[0] = 0x20;
        let mut source = ByteSource::plain(&data, 0).unwrap();
        assert!(matches!(
            decompress_bytes(&mut source),
            Err(FwError::UnsupportedCompressionType(2))
        ));
    }

    #[test]
    fn test_truncated_token_stream() {
        // Declares 32 bytes but the buffer ends after one block.
        let data = region(32, &[0x00, 1, 2, 3]);
        let mut source = ByteSource::plain(&data, 0).unwrap();
        assert!(matches!(
            decompress_bytes(&mut source),
            Err(FwError::TruncatedSource(_))
        ));
    }

    #[test]
    fn test_decodes_identically_through_cipher() {
        let key = Key1::new(u32::from_le_bytes(*b"MACP"), 2);
        let clear = region(8, &[0x00, 9, 8, 7, 6, 5, 4, 3, 2]);

        let mut scrambled = clear.clone();
        for chunk in scrambled.chunks_exact_mut(8) {
            let block: &mut [u8; 8] = chunk.try_into().unwrap();
            key.encrypt_block(block);
        }

        let mut plain_src = ByteSource::plain(&clear, 0).unwrap();
        let mut enc_src = ByteSource::encrypted(&scrambled, 0, &key).unwrap();
        let plain_out = decompress_bytes(&mut plain_src).unwrap();
        let enc_out = decompress_bytes(&mut enc_src).unwrap();
        assert_eq!(plain_out, enc_out);
        assert_eq!(plain_out, [9, 8, 7, 6, 5, 4, 3, 2]);
    }
}
