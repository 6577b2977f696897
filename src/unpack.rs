//! Unpack orchestration: from raw image to decoded region payloads
//!
//! The orchestrator validates the image, derives the cipher schedule from
//! the identifier bytes, walks the five regions in the order the original
//! firmware layout concatenates them (ARM7 boot, ARM9 boot, ARM7 GUI,
//! ARM9 GUI, GUI data) and hands each one to the matching decoder: boot
//! binaries are read through an encrypted [`ByteSource`] and LZ77-decoded,
//! GUI regions go through the part345 probe/fill decoder on the raw buffer.
//!
//! Decode failures are recoverable per region: [`unpack`] reports them
//! alongside the successfully decoded payloads instead of aborting, while
//! [`unpack_bytes`] is the strict variant that fails on the first error.

use crate::common::{
    FwError, Result, FW_IMAGE_SIZES, FW_KEY_LEVEL, FW_MARKER, FW_MARKER_OFFSET,
};
use crate::header::FwHeader;
use crate::key1::Key1;
use crate::source::ByteSource;
use crate::{lz77, part345};

/// Identifies one of the five firmware sub-images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// ARM7 boot binary (encrypted, LZ77)
    Arm7Boot,
    /// ARM9 boot binary (encrypted, LZ77)
    Arm9Boot,
    /// ARM7 GUI binary (part345)
    Arm7Gui,
    /// ARM9 GUI binary (part345)
    Arm9Gui,
    /// GUI graphics data (part345)
    GuiData,
}

impl RegionKind {
    /// All regions in decode/concatenation order
    pub const ALL: [RegionKind; 5] = [
        RegionKind::Arm7Boot,
        RegionKind::Arm9Boot,
        RegionKind::Arm7Gui,
        RegionKind::Arm9Gui,
        RegionKind::GuiData,
    ];

    /// Short lowercase name, used for split output files
    pub fn name(&self) -> &'static str {
        match self {
            RegionKind::Arm7Boot => "arm7boot",
            RegionKind::Arm9Boot => "arm9boot",
            RegionKind::Arm7Gui => "arm7gui",
            RegionKind::Arm9Gui => "arm9gui",
            RegionKind::GuiData => "guidata",
        }
    }

    /// Whether this region is scrambled with the KEY1 cipher
    pub fn is_encrypted(&self) -> bool {
        matches!(self, RegionKind::Arm7Boot | RegionKind::Arm9Boot)
    }
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RegionKind::Arm7Boot => "ARM7 boot",
            RegionKind::Arm9Boot => "ARM9 boot",
            RegionKind::Arm7Gui => "ARM7 GUI",
            RegionKind::Arm9Gui => "ARM9 GUI",
            RegionKind::GuiData => "GUI data",
        };
        f.write_str(label)
    }
}

/// One decoded region
///
/// A failed region keeps its error and an empty payload so the caller can
/// tell a skipped region from a genuinely empty one.
#[derive(Debug)]
pub struct Region {
    /// Which sub-image this is
    pub kind: RegionKind,
    /// Byte offset of the compressed region within the image
    pub rom_offset: u32,
    /// Decoded payload (empty when `error` is set)
    pub data: Vec<u8>,
    /// Decode failure for this region, if any
    pub error: Option<FwError>,
}

/// Result of unpacking a firmware image
#[derive(Debug)]
pub struct Unpacked {
    /// The five regions in decode order
    pub regions: Vec<Region>,
}

impl Unpacked {
    /// True when every region decoded without error
    pub fn is_complete(&self) -> bool {
        self.regions.iter().all(|r| r.error.is_none())
    }

    /// Total decoded byte count across all regions
    pub fn total_len(&self) -> usize {
        self.regions.iter().map(|r| r.data.len()).sum()
    }

    /// Concatenate the decoded payloads in region order
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        for region in &self.regions {
            out.extend_from_slice(&region.data);
        }
        out
    }
}

/// Check the image size and the "MAC" identifier marker
pub fn validate_image(fw: &[u8]) -> Result<()> {
    if !FW_IMAGE_SIZES.contains(&fw.len()) {
        return Err(FwError::InvalidImageSize(fw.len()));
    }
    if &fw[FW_MARKER_OFFSET..FW_MARKER_OFFSET + FW_MARKER.len()] != FW_MARKER {
        return Err(FwError::BadMarker);
    }
    Ok(())
}

/// ROM offset of a region as declared by the header
pub fn region_offset(header: &FwHeader, kind: RegionKind) -> u32 {
    match kind {
        RegionKind::Arm7Boot => header.arm7_boot_rom(),
        RegionKind::Arm9Boot => header.arm9_boot_rom(),
        RegionKind::Arm7Gui => header.arm7_gui_rom(),
        RegionKind::Arm9Gui => header.arm9_gui_rom(),
        RegionKind::GuiData => header.gui_data_rom(),
    }
}

fn decode_region(fw: &[u8], key: &Key1, kind: RegionKind, offset: u32) -> Result<Vec<u8>> {
    let offset = offset as usize;
    if kind.is_encrypted() {
        let mut source = ByteSource::encrypted(fw, offset, key)?;
        lz77::decompress_bytes(&mut source)
    } else {
        let region = fw
            .get(offset..)
            .ok_or(FwError::TruncatedSource(offset))?;
        part345::decompress_bytes(region)
    }
}

/// Unpack a firmware image, recovering from per-region decode failures
///
/// Fails outright only on image-level problems (bad size, missing marker,
/// unreadable header); decode errors are reported per region.
pub fn unpack(fw: &[u8]) -> Result<Unpacked> {
    validate_image(fw)?;
    let header = FwHeader::parse(fw)?;
    let key = Key1::new(header.idcode(), FW_KEY_LEVEL);

    let regions = RegionKind::ALL
        .iter()
        .map(|&kind| {
            let rom_offset = region_offset(&header, kind);
            match decode_region(fw, &key, kind, rom_offset) {
                Ok(data) => Region {
                    kind,
                    rom_offset,
                    data,
                    error: None,
                },
                Err(error) => Region {
                    kind,
                    rom_offset,
                    data: Vec::new(),
                    error: Some(error),
                },
            }
        })
        .collect();

    Ok(Unpacked { regions })
}

/// Unpack a firmware image into one concatenated byte stream
///
/// Strict variant: the first region that fails to decode aborts the whole
/// operation with its error.
pub fn unpack_bytes(fw: &[u8]) -> Result<Vec<u8>> {
    let unpacked = unpack(fw)?;
    let mut out = Vec::with_capacity(unpacked.total_len());
    for region in unpacked.regions {
        if let Some(error) = region.error {
            return Err(error);
        }
        out.extend_from_slice(&region.data);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_size() {
        let fw = vec![0u8; 0x1234];
        assert!(matches!(
            unpack(&fw),
            Err(FwError::InvalidImageSize(0x1234))
        ));
    }

    #[test]
    fn test_rejects_missing_marker() {
        let fw = vec![0u8; 0x2_0000];
        assert!(matches!(unpack(&fw), Err(FwError::BadMarker)));
    }

    #[test]
    fn test_region_order_matches_layout() {
        let names: Vec<_> = RegionKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            ["arm7boot", "arm9boot", "arm7gui", "arm9gui", "guidata"]
        );
        assert!(RegionKind::Arm7Boot.is_encrypted());
        assert!(!RegionKind::GuiData.is_encrypted());
    }

    #[test]
    fn test_failed_regions_are_reported_not_fatal() {
        // Valid marker but all region offsets point at zeroed data. The
        // GUI regions see a zero compression-type nibble and must fail
        // with an unsupported type rather than aborting the whole unpack.
        let mut fw = vec![0u8; 0x2_0000];
        fw[8..12].copy_from_slice(b"MACP");
        let unpacked = unpack(&fw).unwrap();
        assert_eq!(unpacked.regions.len(), 5);
        assert!(!unpacked.is_complete());
        for region in &unpacked.regions {
            if !region.kind.is_encrypted() {
                assert!(matches!(
                    region.error,
                    Some(FwError::UnsupportedCompressionType(0))
                ));
                assert!(region.data.is_empty());
            }
        }

        // The strict variant surfaces the first failure instead.
        assert!(unpack_bytes(&fw).is_err());
    }
}
