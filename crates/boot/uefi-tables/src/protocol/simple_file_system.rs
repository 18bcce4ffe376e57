//! `EFI_SIMPLE_FILE_SYSTEM_PROTOCOL`.

use super::file::FileProtocol;
use crate::EfiStatus;

/// Function table of a mounted volume.
#[repr(C)]
pub struct SimpleFileSystemProtocol {
    /// Protocol revision.
    pub revision: u64,
    /// Opens the volume's root directory.
    pub open_volume: unsafe extern "efiapi" fn(
        this: *mut SimpleFileSystemProtocol,
        root: *mut *mut FileProtocol,
    ) -> EfiStatus,
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<SimpleFileSystemProtocol>() == 16);
