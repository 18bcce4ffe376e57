//! CRC-32 as used by UEFI table headers.
//!
//! This is the reflected CRC-32 (ISO-HDLC, the one used by zip and
//! Ethernet): polynomial `0x04C11DB7` processed LSB-first as `0xEDB88320`,
//! register initialised to all ones, result complemented.
//!
//! The 256-entry lookup table is computed at compile time.

use core::hash::Hasher;
use core::ops::Range;

use crate::table::{TableError, TableHeader};

/// The reflected generator polynomial.
pub const POLYNOMIAL: u32 = 0xEDB8_8320;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut value = i as u32;
        let mut round = 0;
        while round < 8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ POLYNOMIAL
            } else {
                value >> 1
            };
            round += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

/// The lookup table, one remainder per byte value.
#[must_use]
pub fn table() -> &'static [u32; 256] {
    &TABLE
}

/// Streaming CRC-32.
///
/// ```text
/// let mut crc = Crc32::new();
/// crc.update(b"1234");
/// crc.update(b"56789");
/// assert_eq!(crc.finalize(), 0xCBF4_3926);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    register: u32,
}

impl Crc32 {
    /// A hasher that has seen no input.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            register: 0xFFFF_FFFF,
        }
    }

    #[inline]
    fn step(register: u32, byte: u8) -> u32 {
        TABLE[((register ^ u32::from(byte)) & 0xFF) as usize] ^ (register >> 8)
    }

    /// Feeds `data` into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        self.register = data
            .iter()
            .fold(self.register, |reg, &byte| Self::step(reg, byte));
    }

    /// Feeds `count` zero bytes into the checksum.
    pub fn update_zeroed(&mut self, count: usize) {
        for _ in 0..count {
            self.register = Self::step(self.register, 0);
        }
    }

    /// The checksum of everything fed so far.
    #[must_use]
    pub const fn finalize(&self) -> u32 {
        !self.register
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Crc32 {
    fn finish(&self) -> u64 {
        u64::from(self.finalize())
    }

    fn write(&mut self, bytes: &[u8]) {
        self.update(bytes);
    }
}

/// CRC-32 of `data`. The empty slice checksums to zero.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(data);
    crc.finalize()
}

/// CRC-32 of `data` with the bytes in `field` read as zero.
///
/// `data` is not modified. The range is clamped to the slice, so a field
/// that lies partly or wholly outside `data` excludes only what overlaps.
#[must_use]
pub fn checksum_excluding(data: &[u8], field: Range<usize>) -> u32 {
    let start = field.start.min(data.len());
    let end = field.end.clamp(start, data.len());

    let mut crc = Crc32::new();
    crc.update(&data[..start]);
    crc.update_zeroed(end - start);
    crc.update(&data[end..]);
    crc.finalize()
}

/// Checksums a table laid out in `bytes`.
///
/// The header is parsed from the start of the slice, and the first
/// `header.size` bytes are checksummed with the header's `crc32` field read
/// as zero.
///
/// # Errors
///
/// Fails if the slice cannot hold a header, or if `header.size` is smaller
/// than the header or larger than the slice.
pub fn table_checksum(bytes: &[u8]) -> Result<u32, TableError> {
    let header = TableHeader::read_from(bytes)?;
    let len = header.checked_extent(bytes.len())?;
    Ok(checksum_excluding(&bytes[..len], TableHeader::CRC32_RANGE))
}

/// Returns `true` if the table in `bytes` carries a matching checksum.
///
/// Malformed input is reported as a mismatch.
#[must_use]
pub fn verify_table_checksum(bytes: &[u8]) -> bool {
    let Ok(header) = TableHeader::read_from(bytes) else {
        return false;
    };
    table_checksum(bytes).is_ok_and(|crc| crc == header.crc32)
}
