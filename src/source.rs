//! Sequential byte source over a firmware buffer
//!
//! The LZ77 decoder reads its token stream through [`ByteSource`], which
//! hides whether the underlying bytes are stored in the clear or scrambled
//! with the KEY1 cipher. Bytes are pulled 8 at a time into a small cache;
//! the two source kinds differ only in how that cache is filled, so byte
//! order and refill boundaries are identical for both.

use crate::common::{FwError, Result, CIPHER_BLOCK_SIZE};
use crate::key1::Key1;

/// How a [`ByteSource`] fills its cache from the underlying buffer
#[derive(Debug, Clone, Copy)]
pub enum SourceKind<'a> {
    /// Bytes are stored in the clear
    Plain,
    /// Each 8-byte block must be decrypted before use
    Encrypted(&'a Key1),
}

/// Cursor over a firmware buffer with an 8-byte lookahead cache
///
/// A source is created per decode call and never shared; the buffer it
/// reads from stays untouched. Every refill is checked against the end of
/// the buffer and fails with [`FwError::TruncatedSource`] instead of
/// reading past it.
#[derive(Debug)]
pub struct ByteSource<'a> {
    data: &'a [u8],
    kind: SourceKind<'a>,
    /// Buffer offset of the cached block
    block_start: usize,
    cache: [u8; CIPHER_BLOCK_SIZE],
    cache_pos: usize,
}

impl<'a> ByteSource<'a> {
    /// Create a source reading cleartext bytes starting at `offset`
    pub fn plain(data: &'a [u8], offset: usize) -> Result<Self> {
        Self::with_kind(data, offset, SourceKind::Plain)
    }

    /// Create a source decrypting 8-byte blocks through `key` starting at `offset`
    pub fn encrypted(data: &'a [u8], offset: usize, key: &'a Key1) -> Result<Self> {
        Self::with_kind(data, offset, SourceKind::Encrypted(key))
    }

    fn with_kind(data: &'a [u8], offset: usize, kind: SourceKind<'a>) -> Result<Self> {
        let mut source = ByteSource {
            data,
            kind,
            block_start: 0,
            cache: [0; CIPHER_BLOCK_SIZE],
            cache_pos: 0,
        };
        source.set_address(offset)?;
        Ok(source)
    }

    /// Re-aim the cursor at a new buffer offset and eagerly fill the cache
    pub fn set_address(&mut self, offset: usize) -> Result<()> {
        self.fill(offset)
    }

    /// Logical read position within the underlying buffer
    pub fn position(&self) -> usize {
        self.block_start + self.cache_pos
    }

    fn fill(&mut self, offset: usize) -> Result<()> {
        let block = self
            .data
            .get(offset..offset + CIPHER_BLOCK_SIZE)
            .ok_or(FwError::TruncatedSource(offset))?;
        self.cache.copy_from_slice(block);
        if let SourceKind::Encrypted(key) = self.kind {
            key.decrypt_block(&mut self.cache);
        }
        self.block_start = offset;
        self.cache_pos = 0;
        Ok(())
    }

    /// Read the next byte, refilling the cache at each 8-byte boundary
    pub fn get_u8(&mut self) -> Result<u8> {
        if self.cache_pos >= CIPHER_BLOCK_SIZE {
            self.fill(self.block_start + CIPHER_BLOCK_SIZE)?;
        }
        let byte = self.cache[self.cache_pos];
        self.cache_pos += 1;
        Ok(byte)
    }

    /// Read a little-endian u16
    pub fn get_u16(&mut self) -> Result<u16> {
        let lo = self.get_u8()? as u16;
        let hi = self.get_u8()? as u16;
        Ok(lo | (hi << 8))
    }

    /// Read a little-endian u32
    pub fn get_u32(&mut self) -> Result<u32> {
        let lo = self.get_u16()? as u32;
        let hi = self.get_u16()? as u32;
        Ok(lo | (hi << 16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_sequential_reads() {
        let data: Vec<u8> = (0u8..32).collect();
        let mut source = ByteSource::plain(&data, 0).unwrap();
        for expected in 0u8..20 {
            assert_eq!(source.get_u8().unwrap(), expected);
        }
        assert_eq!(source.position(), 20);
    }

    #[test]
    fn test_plain_little_endian_composition() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xCD, 0xAB, 0x00, 0x00];
        let mut source = ByteSource::plain(&data, 0).unwrap();
        assert_eq!(source.get_u32().unwrap(), 0x1234_5678);
        assert_eq!(source.get_u16().unwrap(), 0xABCD);
    }

    #[test]
    fn test_set_address_refills() {
        let data: Vec<u8> = (0u8..32).collect();
        let mut source = ByteSource::plain(&data, 0).unwrap();
        source.set_address(16).unwrap();
        assert_eq!(source.get_u8().unwrap(), 16);
    }

    #[test]
    fn test_truncated_at_construction() {
        let data = [0u8; 5];
        assert!(matches!(
            ByteSource::plain(&data, 0),
            Err(FwError::TruncatedSource(0))
        ));
    }

    #[test]
    fn test_truncated_on_refill() {
        let data = [0u8; 12];
        let mut source = ByteSource::plain(&data, 0).unwrap();
        for _ in 0..8 {
            source.get_u8().unwrap();
        }
        // Second block would need bytes 8..16 but only 12 exist.
        assert!(matches!(
            source.get_u8(),
            Err(FwError::TruncatedSource(8))
        ));
    }

    #[test]
    fn test_encrypted_matches_plain_after_decryption() {
        let key = Key1::new(0x4D41_4350, 2);
        let clear: Vec<u8> = (0u8..16).collect();

        // Scramble the buffer block by block, then read it back through an
        // encrypted source.
        let mut scrambled = clear.clone();
        for chunk in scrambled.chunks_exact_mut(8) {
            let block: &mut [u8; 8] = chunk.try_into().unwrap();
            key.encrypt_block(block);
        }

        let mut source = ByteSource::encrypted(&scrambled, 0, &key).unwrap();
        for expected in 0u8..16 {
            assert_eq!(source.get_u8().unwrap(), expected);
        }
    }

    #[test]
    fn test_refill_boundaries_identical_across_kinds() {
        let key = Key1::new(1, 1);
        let data = [0u8; 24];
        let mut plain = ByteSource::plain(&data, 8).unwrap();
        let mut encrypted = ByteSource::encrypted(&data, 8, &key).unwrap();
        for _ in 0..16 {
            plain.get_u8().unwrap();
            encrypted.get_u8().unwrap();
        }
        assert_eq!(plain.position(), encrypted.position());
        assert!(plain.get_u8().is_err());
        assert!(encrypted.get_u8().is_err());
    }
}
