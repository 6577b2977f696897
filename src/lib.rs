//! ndsfw - Rust implementation of the Nintendo DS firmware unpacker
//!
//! This crate extracts the executable and graphical payloads embedded in a
//! DS firmware image. The fixed-layout header locates five sub-regions;
//! the two boot binaries are descrambled with the console's KEY1 block
//! cipher and LZ77-decoded, the three GUI regions are decoded with the
//! firmware's own part345 scheme, and the results are concatenated into a
//! single fully decoded stream.
//!
//! # Features
//!
//! - KEY1 key schedule and 64-bit block transform (decrypt and encrypt)
//! - LZ77 decoding through plain or encrypted byte sources
//! - part345 probe/fill decoding for the GUI regions
//! - Region-granular error recovery: a corrupt region is reported, not
//!   silently truncated
//! - Decode-only: no re-encryption or re-compression support
//!
//! # Example
//!
//! ```no_run
//! use ndsfw::unpack;
//!
//! let image = std::fs::read("firmware.bin")?;
//! let unpacked = unpack(&image)?;
//! for region in &unpacked.regions {
//!     println!("{}: {} bytes", region.kind, region.data.len());
//! }
//! std::fs::write("firmware.unpacked", unpacked.concat())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod common;
pub mod error;
pub mod header;
pub mod key1;
pub mod lz77;
pub mod part345;
pub mod source;
pub mod tables;
pub mod unpack;

// Re-export commonly used types
pub use common::{CompressedHeader, FwError, Result, COMPRESSION_TYPE_LZ77, FW_IMAGE_SIZES};
pub use header::FwHeader;
pub use key1::Key1;
pub use source::{ByteSource, SourceKind};
pub use unpack::{Region, RegionKind, Unpacked};

// Convenience functions

/// Unpack a firmware image, recovering from per-region decode failures
///
/// # Arguments
/// * `fw` - The raw firmware image (128, 256 or 512 KiB)
///
/// # Returns
/// An [`Unpacked`] with one entry per region, each carrying its payload or
/// its decode error
pub fn unpack(fw: &[u8]) -> Result<Unpacked> {
    unpack::unpack(fw)
}

/// Unpack a firmware image into one concatenated byte stream
///
/// Strict variant of [`unpack`]: the first region decode failure aborts
/// the whole operation.
pub fn unpack_bytes(fw: &[u8]) -> Result<Vec<u8>> {
    unpack::unpack_bytes(fw)
}

/// Read a firmware image from disk and unpack it into one byte stream
pub fn unpack_file<P: AsRef<std::path::Path>>(path: P) -> Result<Vec<u8>> {
    let fw = std::fs::read(path)?;
    unpack_bytes(&fw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        // Test that common types are accessible
        let _ = RegionKind::Arm7Boot;
        let _ = Key1::new(0, 0);

        // Test that functions are accessible
        let fw = [0u8; 16];
        assert!(unpack_bytes(&fw).is_err());
    }
}
