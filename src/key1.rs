//! KEY1 block cipher used to scramble the firmware boot binaries
//!
//! The engine derives a per-console key schedule from a 32-bit seed (the
//! `idcode` stored in the firmware identifier bytes, usually "MACP") and
//! transforms 64-bit blocks with a 16-round Feistel network over four
//! substitution boxes. Encryption and decryption are exact inverses over
//! the same schedule, so a single [`Key1`] serves both directions.
//!
//! The schedule is immutable once built; [`Key1::decrypt_block`] takes
//! `&self` and independent region decodes may share one instance freely.

use crate::common::CIPHER_BLOCK_SIZE;
use crate::tables::KEY1_BASE;

/// Number of 32-bit words in the key schedule (18 round entries + 4x256 S-box entries)
pub const KEY_TABLE_WORDS: usize = 0x412;

/// Number of round entries at the front of the schedule
const ROUND_ENTRIES: usize = 0x12;

/// The keycode words cycle with this period when mixed into the round entries
const KEYCODE_WORDS: usize = 3;

/// Per-console KEY1 key schedule
pub struct Key1 {
    keybuf: [u32; KEY_TABLE_WORDS],
}

impl std::fmt::Debug for Key1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The schedule is key material; only expose its identity.
        f.debug_struct("Key1").finish_non_exhaustive()
    }
}

impl Key1 {
    /// Build a key schedule from a console seed
    ///
    /// `level` is the number of diffusion iterations applied to the base
    /// table; firmware boot regions use level 2
    /// ([`crate::common::FW_KEY_LEVEL`]).
    pub fn new(idcode: u32, level: u8) -> Self {
        let mut keybuf = KEY1_BASE;
        let mut keycode = [idcode, idcode >> 1, idcode.wrapping_shl(1)];

        if level >= 1 {
            Self::apply_keycode(&mut keybuf, &mut keycode);
        }
        if level >= 2 {
            Self::apply_keycode(&mut keybuf, &mut keycode);
        }
        keycode[1] = keycode[1].wrapping_shl(1);
        keycode[2] >>= 1;
        if level >= 3 {
            Self::apply_keycode(&mut keybuf, &mut keycode);
        }

        Key1 { keybuf }
    }

    /// One diffusion iteration: fold the keycode into the round entries,
    /// then regenerate the whole table by encrypting a running scratch pair
    fn apply_keycode(keybuf: &mut [u32; KEY_TABLE_WORDS], keycode: &mut [u32; KEYCODE_WORDS]) {
        let (a, b) = Self::encrypt_pair(keybuf, keycode[1], keycode[2]);
        keycode[1] = a;
        keycode[2] = b;
        let (a, b) = Self::encrypt_pair(keybuf, keycode[0], keycode[1]);
        keycode[0] = a;
        keycode[1] = b;

        for i in 0..ROUND_ENTRIES {
            keybuf[i] ^= keycode[i % KEYCODE_WORDS].swap_bytes();
        }

        let mut scratch = (0u32, 0u32);
        let mut i = 0;
        while i < KEY_TABLE_WORDS {
            scratch = Self::encrypt_pair(keybuf, scratch.0, scratch.1);
            keybuf[i] = scratch.1;
            keybuf[i + 1] = scratch.0;
            i += 2;
        }
    }

    /// Feistel round function over the four substitution boxes
    fn mix(keybuf: &[u32; KEY_TABLE_WORDS], z: u32) -> u32 {
        let a = keybuf[0x012 + (z >> 24) as usize];
        let b = keybuf[0x112 + ((z >> 16) & 0xFF) as usize];
        let c = keybuf[0x212 + ((z >> 8) & 0xFF) as usize];
        let d = keybuf[0x312 + (z & 0xFF) as usize];
        (a.wrapping_add(b) ^ c).wrapping_add(d)
    }

    /// Encrypt one block given as its two little-endian word halves
    fn encrypt_pair(keybuf: &[u32; KEY_TABLE_WORDS], lo: u32, hi: u32) -> (u32, u32) {
        let mut y = lo;
        let mut x = hi;
        for entry in &keybuf[..0x10] {
            let z = entry ^ x;
            x = Self::mix(keybuf, z) ^ y;
            y = z;
        }
        (x ^ keybuf[0x10], y ^ keybuf[0x11])
    }

    /// Decrypt one block given as its two little-endian word halves
    fn decrypt_pair(keybuf: &[u32; KEY_TABLE_WORDS], lo: u32, hi: u32) -> (u32, u32) {
        let mut y = lo;
        let mut x = hi;
        for i in (0x02..=0x11).rev() {
            let z = keybuf[i] ^ x;
            x = Self::mix(keybuf, z) ^ y;
            y = z;
        }
        (x ^ keybuf[0x01], y ^ keybuf[0x00])
    }

    /// Encrypt an 8-byte block in place
    ///
    /// The unpacker itself only ever decrypts; the forward direction exists
    /// for building test vectors and verifying the round-trip property.
    pub fn encrypt_block(&self, block: &mut [u8; CIPHER_BLOCK_SIZE]) {
        let lo = u32::from_le_bytes(block[0..4].try_into().unwrap());
        let hi = u32::from_le_bytes(block[4..8].try_into().unwrap());
        let (lo, hi) = Self::encrypt_pair(&self.keybuf, lo, hi);
        block[0..4].copy_from_slice(&lo.to_le_bytes());
        block[4..8].copy_from_slice(&hi.to_le_bytes());
    }

    /// Decrypt an 8-byte block in place
    pub fn decrypt_block(&self, block: &mut [u8; CIPHER_BLOCK_SIZE]) {
        let lo = u32::from_le_bytes(block[0..4].try_into().unwrap());
        let hi = u32::from_le_bytes(block[4..8].try_into().unwrap());
        let (lo, hi) = Self::decrypt_pair(&self.keybuf, lo, hi);
        block[0..4].copy_from_slice(&lo.to_le_bytes());
        block[4..8].copy_from_slice(&hi.to_le_bytes());
    }
}
