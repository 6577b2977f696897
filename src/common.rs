//! Common types and constants for the DS firmware unpacker
//!
//! This module defines the error type, the shared compressed-region header,
//! and the constants used by both decoding engines and the orchestrator.

use thiserror::Error;

/// Valid firmware image sizes in bytes (128KiB, 256KiB, 512KiB)
pub const FW_IMAGE_SIZES: [usize; 3] = [0x2_0000, 0x4_0000, 0x8_0000];

/// Offset of the console identifier within the image
pub const FW_MARKER_OFFSET: usize = 8;

/// Expected identifier bytes ("MAC", first three bytes of "MACP")
pub const FW_MARKER: &[u8; 3] = b"MAC";

/// Compression-type nibble for LZ77, the only supported scheme
pub const COMPRESSION_TYPE_LZ77: u8 = 1;

/// Block size of the KEY1 cipher in bytes
pub const CIPHER_BLOCK_SIZE: usize = 8;

/// Key-schedule level used for firmware boot regions
pub const FW_KEY_LEVEL: u8 = 2;

/// Error type for firmware decoding operations
#[derive(Debug, Error)]
pub enum FwError {
    /// Image is not one of the known firmware sizes
    #[error("invalid firmware image size: {0:#x} bytes (expected 0x20000, 0x40000 or 0x80000)")]
    InvalidImageSize(usize),

    /// The "MAC" identifier bytes were not found at offset 8
    #[error("firmware identifier marker not found")]
    BadMarker,

    /// Compression-type nibble is not recognized
    #[error("unsupported compression type: {0}")]
    UnsupportedCompressionType(u8),

    /// A back-reference points before the start of the produced output
    #[error("back-reference distance {distance} exceeds {produced} bytes produced")]
    BackReferenceOutOfRange {
        /// Backward distance requested by the token
        distance: usize,
        /// Bytes produced when the token was decoded
        produced: usize,
    },

    /// The token stream or header would read past the end of the source
    #[error("compressed stream truncated at source offset {0:#x}")]
    TruncatedSource(usize),

    /// Header slice shorter than the fixed header layout
    #[error("firmware header too short: {0} bytes")]
    HeaderTooShort(usize),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for firmware decoding operations
pub type Result<T> = std::result::Result<T, FwError>;

/// Parsed form of the 4-byte header that prefixes every compressed region
///
/// Byte 0 carries the compression-type tag in its high nibble; the declared
/// decompressed size is stored as 24 little-endian bits in bytes 1-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedHeader {
    /// Compression-type nibble (1 = LZ77)
    pub compression_type: u8,
    /// Decompressed size declared by the region
    pub declared_size: u32,
}

impl CompressedHeader {
    /// Decode the header from its little-endian 32-bit representation
    pub fn from_word(word: u32) -> Self {
        CompressedHeader {
            compression_type: ((word >> 4) & 0xF) as u8,
            declared_size: word >> 8,
        }
    }

    /// Parse the header from the first 4 bytes of a region
    pub fn parse(region: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = region
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(FwError::TruncatedSource(region.len()))?;
        Ok(Self::from_word(u32::from_le_bytes(bytes)))
    }

    /// Fail unless the region uses the one supported compression scheme
    pub fn validate(&self) -> Result<()> {
        if self.compression_type != COMPRESSION_TYPE_LZ77 {
            return Err(FwError::UnsupportedCompressionType(self.compression_type));
        }
        Ok(())
    }
}
