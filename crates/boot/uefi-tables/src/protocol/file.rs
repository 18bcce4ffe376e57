//! `EFI_FILE_PROTOCOL` and the information records returned by `GetInfo`.
//!
//! `GetInfo` fills a caller buffer with a fixed header followed by a
//! null-terminated UCS-2 string. The records here copy both out of the raw
//! bytes, so callers never hold references into firmware-sized buffers.

use bitflags::bitflags;

use crate::time::EfiTime;
use crate::ucs2::Ucs2Display;
use crate::{EfiGuid, EfiStatus};

/// Function table of an open file or directory.
#[repr(C)]
pub struct FileProtocol {
    /// Protocol revision.
    pub revision: u64,
    /// Opens a file relative to this one.
    pub open: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        new_handle: *mut *mut FileProtocol,
        file_name: *const u16,
        open_mode: FileMode,
        attributes: FileAttributes,
    ) -> EfiStatus,
    /// Closes the handle.
    pub close: unsafe extern "efiapi" fn(this: *mut FileProtocol) -> EfiStatus,
    /// Closes the handle and deletes the file.
    pub delete: unsafe extern "efiapi" fn(this: *mut FileProtocol) -> EfiStatus,
    /// Reads from the current position. Directories yield one `FileInfo` per call.
    pub read: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        buffer_size: *mut usize,
        buffer: *mut u8,
    ) -> EfiStatus,
    /// Writes at the current position.
    pub write: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        buffer_size: *mut usize,
        buffer: *const u8,
    ) -> EfiStatus,
    /// Reads the current position.
    pub get_position:
        unsafe extern "efiapi" fn(this: *mut FileProtocol, position: *mut u64) -> EfiStatus,
    /// Moves the current position. `u64::MAX` seeks to the end.
    pub set_position: unsafe extern "efiapi" fn(this: *mut FileProtocol, position: u64) -> EfiStatus,
    /// Fills a buffer with the information record named by a GUID.
    pub get_info: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        information_type: *const EfiGuid,
        buffer_size: *mut usize,
        buffer: *mut u8,
    ) -> EfiStatus,
    /// Replaces an information record.
    pub set_info: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        information_type: *const EfiGuid,
        buffer_size: usize,
        buffer: *const u8,
    ) -> EfiStatus,
    /// Writes buffered data to the device.
    pub flush: unsafe extern "efiapi" fn(this: *mut FileProtocol) -> EfiStatus,
}

bitflags! {
    /// How a file is opened. `CREATE` requires `READ | WRITE`.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileMode: u64 {
        /// Open for reading.
        const READ = 0x0000_0000_0000_0001;
        /// Open for writing.
        const WRITE = 0x0000_0000_0000_0002;
        /// Create the file if it does not exist.
        const CREATE = 0x8000_0000_0000_0000;
    }
}

impl FileMode {
    /// Returns `true` for the three combinations `Open` accepts.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self.bits(), 0x1 | 0x3 | 0x8000_0000_0000_0003)
    }
}

bitflags! {
    /// Attributes of a file, and of a file created by `Open`.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u64 {
        /// Read-only.
        const READ_ONLY = 0x0000_0000_0000_0001;
        /// Hidden.
        const HIDDEN = 0x0000_0000_0000_0002;
        /// System file.
        const SYSTEM = 0x0000_0000_0000_0004;
        /// Reserved.
        const RESERVED = 0x0000_0000_0000_0008;
        /// Directory.
        const DIRECTORY = 0x0000_0000_0000_0010;
        /// Modified since the last backup.
        const ARCHIVE = 0x0000_0000_0000_0020;
    }
}

/// Fixed part of `EFI_FILE_INFO`. The file name follows at offset 80.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FileInfoHeader {
    /// Size of the whole record, name included.
    pub size: u64,
    /// File length in bytes.
    pub file_size: u64,
    /// Bytes allocated on the volume.
    pub physical_size: u64,
    /// Creation time.
    pub create_time: EfiTime,
    /// Last access time.
    pub last_access_time: EfiTime,
    /// Last modification time.
    pub modification_time: EfiTime,
    /// Attribute bits.
    pub attribute: FileAttributes,
}

/// Longest file name [`FileInfo`] keeps, in UCS-2 units. FAT caps names at 255.
pub const MAX_FILE_NAME: usize = 255;

/// Longest volume label [`FileSystemInfo`] keeps, in UCS-2 units.
pub const MAX_VOLUME_LABEL: usize = 63;

/// An owned `EFI_FILE_INFO` record.
#[derive(Clone, Copy)]
pub struct FileInfo {
    /// The fixed fields.
    pub header: FileInfoHeader,
    name: [u16; MAX_FILE_NAME + 1],
}

impl FileInfo {
    /// Parses a record as written by `GetInfo`.
    ///
    /// Names longer than [`MAX_FILE_NAME`] are truncated.
    ///
    /// # Errors
    ///
    /// Returns [`EfiStatus::BAD_BUFFER_SIZE`] if `bytes` cannot hold the
    /// fixed header.
    pub fn parse(bytes: &[u8]) -> Result<Self, EfiStatus> {
        const NAME_OFFSET: usize = core::mem::size_of::<FileInfoHeader>();
        if bytes.len() < NAME_OFFSET {
            return Err(EfiStatus::BAD_BUFFER_SIZE);
        }
        // SAFETY: the slice holds a full header; every field is plain data
        // for which any bit pattern is valid. Read unaligned.
        let header = unsafe { bytes.as_ptr().cast::<FileInfoHeader>().read_unaligned() };
        let mut name = [0; MAX_FILE_NAME + 1];
        copy_ucs2(&bytes[NAME_OFFSET..], &mut name[..MAX_FILE_NAME]);
        Ok(Self { header, name })
    }

    /// The file name.
    #[must_use]
    pub fn name(&self) -> Ucs2Display<'_> {
        Ucs2Display(&self.name)
    }

    /// Returns `true` for directories.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        self.header.attribute.contains(FileAttributes::DIRECTORY)
    }
}

impl core::fmt::Debug for FileInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileInfo")
            .field("name", &self.name())
            .field("file_size", &self.header.file_size)
            .field("attribute", &self.header.attribute)
            .finish_non_exhaustive()
    }
}

/// An owned `EFI_FILE_SYSTEM_INFO` record.
///
/// On the wire the record is packed: `volume_label` starts at offset 36,
/// directly after the 32-bit `block_size`.
#[derive(Clone, Copy)]
pub struct FileSystemInfo {
    /// Size of the whole record, label included.
    pub size: u64,
    /// Whether the volume only allows reads.
    pub read_only: bool,
    /// Volume size in bytes.
    pub volume_size: u64,
    /// Free bytes.
    pub free_space: u64,
    /// Nominal block size in bytes.
    pub block_size: u32,
    label: [u16; MAX_VOLUME_LABEL + 1],
}

impl FileSystemInfo {
    /// Offset of the volume label in the raw record.
    pub const LABEL_OFFSET: usize = 36;

    /// Parses a record as written by `GetInfo`.
    ///
    /// # Errors
    ///
    /// Returns [`EfiStatus::BAD_BUFFER_SIZE`] if `bytes` cannot hold the
    /// fixed fields.
    pub fn parse(bytes: &[u8]) -> Result<Self, EfiStatus> {
        if bytes.len() < Self::LABEL_OFFSET {
            return Err(EfiStatus::BAD_BUFFER_SIZE);
        }
        let u64_at = |offset: usize| {
            let mut raw = [0; 8];
            raw.copy_from_slice(&bytes[offset..offset + 8]);
            u64::from_le_bytes(raw)
        };
        let mut label = [0; MAX_VOLUME_LABEL + 1];
        copy_ucs2(&bytes[Self::LABEL_OFFSET..], &mut label[..MAX_VOLUME_LABEL]);
        Ok(Self {
            size: u64_at(0),
            read_only: bytes[8] != 0,
            volume_size: u64_at(16),
            free_space: u64_at(24),
            block_size: u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]),
            label,
        })
    }

    /// The volume label.
    #[must_use]
    pub fn volume_label(&self) -> Ucs2Display<'_> {
        Ucs2Display(&self.label)
    }
}

impl core::fmt::Debug for FileSystemInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileSystemInfo")
            .field("volume_label", &self.volume_label())
            .field("read_only", &self.read_only)
            .field("volume_size", &self.volume_size)
            .field("free_space", &self.free_space)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

/// Copies little-endian UCS-2 units from `bytes` into `out`, stopping at a
/// null, the end of either buffer, or a trailing odd byte.
fn copy_ucs2(bytes: &[u8], out: &mut [u16]) {
    for (unit, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *unit = u16::from_le_bytes([pair[0], pair[1]]);
        if *unit == 0 {
            break;
        }
    }
}

const _: () = {
    assert!(core::mem::size_of::<FileInfoHeader>() == 80);
    assert!(core::mem::offset_of!(FileInfoHeader, create_time) == 24);
    assert!(core::mem::offset_of!(FileInfoHeader, attribute) == 72);
};

#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<FileProtocol>() == 88);
