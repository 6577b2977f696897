//! Firmware header parsing and region address decoding
//!
//! The first bytes of the image form a fixed-layout table of ROM/RAM words
//! and shift amounts. ROM words are scaled block counts: the boot regions
//! use a per-region shift decoded from `shift_amounts`, the GUI regions a
//! fixed 8-byte granularity. This module turns those fields into absolute
//! byte offsets; it knows nothing about the compressed payloads themselves.

use crate::common::{FwError, Result};

/// Number of header bytes this parser consumes
pub const FW_HEADER_LEN: usize = 42;

/// Parsed fixed-layout firmware header
#[derive(Debug, Clone, Copy)]
pub struct FwHeader {
    /// ARM9 GUI region ROM word (part 3)
    pub part3_romaddr: u16,
    /// ARM7 GUI region ROM word (part 4)
    pub part4_romaddr: u16,
    /// CRC16 over parts 3 and 4
    pub part34_crc16: u16,
    /// CRC16 over parts 1 and 2
    pub part12_crc16: u16,
    /// Console identifier bytes (usually "MACP")
    pub fw_identifier: [u8; 4],
    /// ARM9 boot region ROM word (part 1)
    pub part1_romaddr: u16,
    /// ARM9 boot RAM word
    pub part1_ramaddr: u16,
    /// ARM7 boot region ROM word (part 2)
    pub part2_romaddr: u16,
    /// ARM7 boot RAM word
    pub part2_ramaddr: u16,
    /// Packed per-region address shift amounts
    pub shift_amounts: u16,
    /// GUI data region ROM word (part 5)
    pub part5_romaddr: u16,
    /// Build timestamp
    pub fw_timestamp: [u8; 5],
    /// Console type byte
    pub console_type: u8,
    /// User settings area offset word
    pub user_settings_offset: u16,
    /// CRC16 over part 5
    pub part5_crc16: u16,
}

impl FwHeader {
    /// Parse the fixed-layout header from the start of a firmware image
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FW_HEADER_LEN {
            return Err(FwError::HeaderTooShort(data.len()));
        }
        let u16_at = |off: usize| u16::from_le_bytes([data[off], data[off + 1]]);

        Ok(FwHeader {
            part3_romaddr: u16_at(0),
            part4_romaddr: u16_at(2),
            part34_crc16: u16_at(4),
            part12_crc16: u16_at(6),
            fw_identifier: [data[8], data[9], data[10], data[11]],
            part1_romaddr: u16_at(12),
            part1_ramaddr: u16_at(14),
            part2_romaddr: u16_at(16),
            part2_ramaddr: u16_at(18),
            shift_amounts: u16_at(20),
            part5_romaddr: u16_at(22),
            fw_timestamp: [data[24], data[25], data[26], data[27], data[28]],
            console_type: data[29],
            user_settings_offset: u16_at(32),
            part5_crc16: u16_at(38),
        })
    }

    /// Cipher seed: the identifier bytes read as a little-endian word
    pub fn idcode(&self) -> u32 {
        u32::from_le_bytes(self.fw_identifier)
    }

    fn boot_shift(&self, bit_offset: u16) -> u32 {
        4 << ((self.shift_amounts >> bit_offset) & 7)
    }

    /// ROM offset of the ARM9 boot binary
    pub fn arm9_boot_rom(&self) -> u32 {
        u32::from(self.part1_romaddr) * self.boot_shift(0)
    }

    /// RAM load address of the ARM9 boot binary
    pub fn arm9_boot_ram(&self) -> u32 {
        0x0280_0000 - u32::from(self.part1_ramaddr) * self.boot_shift(3)
    }

    /// ROM offset of the ARM7 boot binary
    pub fn arm7_boot_rom(&self) -> u32 {
        u32::from(self.part2_romaddr) * self.boot_shift(6)
    }

    /// RAM load address of the ARM7 boot binary
    pub fn arm7_boot_ram(&self) -> u32 {
        let base = if self.shift_amounts & 0x1000 != 0 {
            0x0280_0000
        } else {
            0x0381_0000
        };
        base - u32::from(self.part2_ramaddr) * self.boot_shift(9)
    }

    /// ROM offset of the ARM9 GUI binary
    pub fn arm9_gui_rom(&self) -> u32 {
        u32::from(self.part3_romaddr) * 8
    }

    /// ROM offset of the ARM7 GUI binary
    pub fn arm7_gui_rom(&self) -> u32 {
        u32::from(self.part4_romaddr) * 8
    }

    /// ROM offset of the GUI graphics data
    pub fn gui_data_rom(&self) -> u32 {
        u32::from(self.part5_romaddr) * 8
    }
}
