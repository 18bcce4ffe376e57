//! Self-describing firmware tables.
//!
//! Every table the firmware hands out (the system table and the boot and
//! runtime services tables) begins with a [`TableHeader`]. The header names
//! the table ([`Signature`]), states the UEFI [`Revision`] it
//! follows, and records the table's total size and CRC-32.
//!
//! The `size` field is authoritative: firmware may append data past the
//! layout this crate declares, and that trailing data is part of the
//! checksum. The [`Table`] trait computes and verifies checksums over
//! `header.size` bytes, reading the `crc32` field as zero without ever
//! writing to the table.

mod boot;
mod runtime;
mod system;

pub use boot::{
    BootServices, EventNotify, InterfaceType, LocateSearchType, OpenProtocolAttributes,
    OpenProtocolInformationEntry, TimerDelay,
};
pub use runtime::{CapsuleHeader, ResetType, RuntimeServices};
pub use system::{ConfigurationTable, SystemTable};

use core::fmt;
use core::ops::Range;

use crate::{EfiStatus, crc32};

// ── Signature ────────────────────────────────────────────────────────

/// The 64-bit identifier at the start of every table header.
///
/// Signatures are eight ASCII bytes read as a little-endian integer.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub u64);

impl Signature {
    /// `"IBI SYST"`, the system table.
    pub const SYSTEM_TABLE: Self = Self::from_ascii(b"IBI SYST");
    /// `"BOOTSERV"`, the boot services table.
    pub const BOOT_SERVICES: Self = Self::from_ascii(b"BOOTSERV");
    /// `"RUNTSERV"`, the runtime services table.
    pub const RUNTIME_SERVICES: Self = Self::from_ascii(b"RUNTSERV");

    /// Builds a signature from its eight ASCII bytes.
    #[must_use]
    pub const fn from_ascii(bytes: &[u8; 8]) -> Self {
        Self(u64::from_le_bytes(*bytes))
    }

    /// The signature's bytes in memory order.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            if byte.is_ascii_graphic() || byte == b' ' {
                fmt::Write::write_char(f, char::from(byte))?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(\"{self}\")")
    }
}

// ── Revision ─────────────────────────────────────────────────────────

/// A UEFI revision, packed as `major << 16 | minor`.
///
/// The minor part encodes two digits: `2.70` is minor `70` and reads "2.7",
/// `2.31` reads "2.3.1".
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision {
    /// Minor revision.
    pub minor: u16,
    /// Major revision.
    pub major: u16,
}

impl Revision {
    /// UEFI 2.0.
    pub const UEFI_2_0: Self = Self::new(2, 0);
    /// UEFI 2.7.
    pub const UEFI_2_7: Self = Self::new(2, 70);
    /// UEFI 2.10.
    pub const UEFI_2_10: Self = Self::new(2, 100);

    /// Builds a revision from its parts.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { minor, major }
    }

    /// The packed 32-bit form.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        ((self.major as u32) << 16) | self.minor as u32
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (minor, patch) = (self.minor / 10, self.minor % 10);
        if patch == 0 {
            write!(f, "{}.{minor}", self.major)
        } else {
            write!(f, "{}.{minor}.{patch}", self.major)
        }
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({self})")
    }
}

// ── Table Header ─────────────────────────────────────────────────────

/// Common header for all UEFI tables.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    /// Identifies the type of table that follows.
    pub signature: Signature,
    /// The UEFI revision the table conforms to.
    pub revision: Revision,
    /// The size in bytes of the entire table, header included.
    pub size: u32,
    /// CRC-32 of the first `size` bytes, computed with this field as zero.
    pub crc32: u32,
    /// Must be zero.
    pub reserved: u32,
}

impl TableHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Byte range of the `crc32` field within the header.
    pub const CRC32_RANGE: Range<usize> = {
        let start = core::mem::offset_of!(Self, crc32);
        start..start + 4
    };

    /// Reads a header from the start of `bytes`.
    ///
    /// Only the header itself is parsed; `size` is not compared with the
    /// slice length.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Truncated`] if `bytes` is shorter than a header.
    pub fn read_from(bytes: &[u8]) -> Result<Self, TableError> {
        if bytes.len() < Self::SIZE {
            return Err(TableError::Truncated { len: bytes.len() });
        }
        // SAFETY: the slice holds at least `SIZE` bytes, and every bit
        // pattern is a valid `TableHeader`. The read tolerates any alignment.
        Ok(unsafe { bytes.as_ptr().cast::<Self>().read_unaligned() })
    }

    /// Returns the number of checksummed bytes, given that `available`
    /// bytes of the table are readable.
    ///
    /// # Errors
    ///
    /// Fails if `size` is smaller than the header or larger than `available`.
    pub const fn checked_extent(&self, available: usize) -> Result<usize, TableError> {
        let size = self.size as usize;
        if size < Self::SIZE {
            Err(TableError::SizeTooSmall { size: self.size })
        } else if size > available {
            Err(TableError::SizeExceedsBuffer {
                size: self.size,
                available,
            })
        } else {
            Ok(size)
        }
    }
}

/// Why a byte slice could not be checksummed as a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// The slice cannot hold a table header.
    #[error("{len} bytes cannot hold a 24-byte table header")]
    Truncated {
        /// Length of the slice.
        len: usize,
    },
    /// `header.size` does not even cover the header.
    #[error("table size {size} is smaller than its 24-byte header")]
    SizeTooSmall {
        /// The declared size.
        size: u32,
    },
    /// `header.size` reaches past the end of the slice.
    #[error("table size {size} exceeds the {available} bytes available")]
    SizeExceedsBuffer {
        /// The declared size.
        size: u32,
        /// Length of the slice.
        available: usize,
    },
}

impl From<TableError> for EfiStatus {
    fn from(_: TableError) -> Self {
        Self::BAD_BUFFER_SIZE
    }
}

// ── Table trait ──────────────────────────────────────────────────────

/// A `#[repr(C)]` structure that begins with a [`TableHeader`].
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with the [`TableHeader`] as their first
/// field, and [`header`](Table::header) must return that field.
pub unsafe trait Table {
    /// The signature this table is expected to carry.
    const SIGNATURE: Signature;

    /// The table's header.
    fn header(&self) -> &TableHeader;

    /// The table's header, mutably.
    fn header_mut(&mut self) -> &mut TableHeader;

    /// Returns `true` if the header carries [`Self::SIGNATURE`].
    fn has_valid_signature(&self) -> bool {
        self.header().signature == Self::SIGNATURE
    }

    /// The first `header.size` bytes of the table.
    ///
    /// # Safety
    ///
    /// `header.size` bytes starting at `self` must be readable and must not
    /// be written for the lifetime of the returned slice. Firmware tables
    /// may extend past `size_of::<Self>()`; the caller vouches for that
    /// extent.
    unsafe fn checksummed_bytes(&self) -> &[u8] {
        let len = self.header().size as usize;
        let base = core::ptr::from_ref(self).cast::<u8>();
        // SAFETY: guaranteed by the caller.
        unsafe { core::slice::from_raw_parts(base, len) }
    }

    /// Computes the table's CRC-32 with the `crc32` field read as zero.
    ///
    /// The table is never written, so the stored checksum is unchanged.
    ///
    /// # Safety
    ///
    /// As for [`checksummed_bytes`](Table::checksummed_bytes).
    unsafe fn compute_crc32(&self) -> u32 {
        // SAFETY: guaranteed by the caller.
        let bytes = unsafe { self.checksummed_bytes() };
        crc32::checksum_excluding(bytes, TableHeader::CRC32_RANGE)
    }

    /// Returns `true` if the stored checksum matches the computed one.
    ///
    /// # Safety
    ///
    /// As for [`checksummed_bytes`](Table::checksummed_bytes).
    unsafe fn verify_crc32(&self) -> bool {
        // SAFETY: guaranteed by the caller.
        self.header().crc32 == unsafe { self.compute_crc32() }
    }

    /// Computes the checksum and stores it in the header.
    ///
    /// # Safety
    ///
    /// As for [`checksummed_bytes`](Table::checksummed_bytes).
    unsafe fn update_crc32(&mut self) {
        // SAFETY: guaranteed by the caller.
        let crc = unsafe { self.compute_crc32() };
        self.header_mut().crc32 = crc;
    }
}

const _: () = {
    assert!(core::mem::size_of::<TableHeader>() == 24);
    assert!(core::mem::size_of::<Revision>() == 4);
    assert!(core::mem::offset_of!(TableHeader, revision) == 8);
    assert!(core::mem::offset_of!(TableHeader, size) == 12);
    assert!(core::mem::offset_of!(TableHeader, crc32) == 16);
    assert!(core::mem::offset_of!(TableHeader, reserved) == 20);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct TestTable {
        header: TableHeader,
        payload: [u8; 16],
    }

    // SAFETY: `repr(C)` with the header first.
    unsafe impl Table for TestTable {
        const SIGNATURE: Signature = Signature::from_ascii(b"TESTTABL");

        fn header(&self) -> &TableHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut TableHeader {
            &mut self.header
        }
    }

    fn test_table() -> TestTable {
        TestTable {
            header: TableHeader {
                signature: TestTable::SIGNATURE,
                revision: Revision::UEFI_2_7,
                size: size_of::<TestTable>() as u32,
                crc32: 0xDEAD_BEEF,
                reserved: 0,
            },
            payload: *b"payload--payload",
        }
    }

    #[test]
    fn signatures_match_firmware_constants() {
        assert_eq!(Signature::SYSTEM_TABLE.0, 0x5453_5953_2049_4249);
        assert_eq!(Signature::BOOT_SERVICES.0, 0x5652_4553_544f_4f42);
        assert_eq!(Signature::RUNTIME_SERVICES.0, 0x5652_4553_544e_5552);
        assert_eq!(Signature::BOOT_SERVICES.to_string(), "BOOTSERV");
        assert_eq!(Signature(0x41).to_string(), "A\\x00\\x00\\x00\\x00\\x00\\x00\\x00");
    }

    #[test]
    fn revision_formatting() {
        assert_eq!(Revision::UEFI_2_7.to_string(), "2.7");
        assert_eq!(Revision::new(2, 31).to_string(), "2.3.1");
        assert_eq!(Revision::UEFI_2_10.to_string(), "2.10");
        assert_eq!(Revision::UEFI_2_7.as_u32(), 0x0002_0046);
        assert!(Revision::UEFI_2_0 < Revision::UEFI_2_7);
    }

    #[test]
    fn crc32_range_covers_the_field() {
        assert_eq!(TableHeader::CRC32_RANGE, 16..20);
    }

    #[test]
    fn read_from_rejects_short_slices() {
        assert_eq!(
            TableHeader::read_from(&[0; 23]),
            Err(TableError::Truncated { len: 23 })
        );
    }

    #[test]
    fn read_from_tolerates_misalignment() {
        let table = test_table();
        let mut bytes = [0u8; 25];
        // SAFETY: the header is 24 bytes of plain integers.
        let header: [u8; 24] = unsafe { core::mem::transmute(table.header) };
        bytes[1..].copy_from_slice(&header);
        assert_eq!(TableHeader::read_from(&bytes[1..]), Ok(table.header));
    }

    #[test]
    fn checked_extent_bounds() {
        let mut header = test_table().header;
        assert_eq!(header.checked_extent(40), Ok(40));
        assert_eq!(header.checked_extent(64), Ok(40));
        assert_eq!(
            header.checked_extent(39),
            Err(TableError::SizeExceedsBuffer {
                size: 40,
                available: 39
            })
        );
        header.size = 8;
        assert_eq!(
            header.checked_extent(40),
            Err(TableError::SizeTooSmall { size: 8 })
        );
    }

    #[test]
    fn table_errors_map_to_bad_buffer_size() {
        let error = TableError::Truncated { len: 3 };
        assert_eq!(EfiStatus::from(error), EfiStatus::BAD_BUFFER_SIZE);
        assert_eq!(error.to_string(), "3 bytes cannot hold a 24-byte table header");
    }

    #[test]
    fn update_then_verify() {
        let mut table = test_table();
        assert!(table.has_valid_signature());
        unsafe {
            assert!(!table.verify_crc32());
            table.update_crc32();
            assert!(table.verify_crc32());
        }
    }

    #[test]
    fn compute_leaves_stored_checksum_alone() {
        let table = test_table();
        let before = table.header.crc32;
        let _ = unsafe { table.compute_crc32() };
        assert_eq!(table.header.crc32, before);
    }

    #[test]
    fn stored_checksum_does_not_feed_the_computation() {
        let mut table = test_table();
        let first = unsafe { table.compute_crc32() };
        table.header.crc32 = 0x1234_5678;
        assert_eq!(unsafe { table.compute_crc32() }, first);
    }

    #[test]
    fn altered_payload_fails_verification() {
        let mut table = test_table();
        unsafe { table.update_crc32() };
        table.payload[7] ^= 0x01;
        assert!(!unsafe { table.verify_crc32() });
    }

    #[test]
    fn altered_header_fails_verification() {
        let mut table = test_table();
        unsafe { table.update_crc32() };
        table.header.reserved = 1;
        assert!(!unsafe { table.verify_crc32() });
    }

    #[test]
    fn size_field_bounds_the_checksum() {
        let mut table = test_table();
        table.header.size = TableHeader::SIZE as u32;
        unsafe { table.update_crc32() };
        table.payload[0] ^= 0xFF;
        assert!(unsafe { table.verify_crc32() });
    }
}
