use core::marker::PhantomData;
use core::mem::{ManuallyDrop, size_of, size_of_val};
use core::ptr::{self, NonNull};

use crate::protocol::file::{
    FileAttributes, FileInfo, FileInfoHeader, FileMode, FileProtocol, FileSystemInfo,
    MAX_FILE_NAME, MAX_VOLUME_LABEL,
};
use crate::protocol::simple_file_system::SimpleFileSystemProtocol;
use crate::{EfiGuid, EfiHandle, EfiStatus, ucs2};

use super::{BootServices, SimpleFileSystemId};

/// Words of the stack buffer `GetInfo` writes into. Sized for the largest
/// record kept: a file info header and a full-length name.
const INFO_WORDS: usize =
    (size_of::<FileInfoHeader>() + (MAX_FILE_NAME + 1) * size_of::<u16>()).div_ceil(8);

const _: () = assert!(
    INFO_WORDS * 8 >= FileSystemInfo::LABEL_OFFSET + (MAX_VOLUME_LABEL + 1) * size_of::<u16>()
);

/// A volume exposing the simple file system protocol.
pub struct FileSystem<'st> {
    raw: NonNull<SimpleFileSystemProtocol>,
    _lifetime: PhantomData<&'st ()>,
}

impl<'st> FileSystem<'st> {
    /// The first file system the firmware knows of.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` if there is none.
    pub fn locate(bs: &BootServices<'st>) -> Result<Self, EfiStatus> {
        bs.locate_protocol::<SimpleFileSystemId>().map(Self::new)
    }

    /// The file system on `handle`, typically the device the image was
    /// loaded from.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` if the handle has no file system.
    pub fn from_handle(bs: &BootServices<'st>, handle: EfiHandle) -> Result<Self, EfiStatus> {
        bs.handle_protocol::<SimpleFileSystemId>(handle).map(Self::new)
    }

    fn new(raw: NonNull<SimpleFileSystemProtocol>) -> Self {
        Self {
            raw,
            _lifetime: PhantomData,
        }
    }

    /// Wraps a protocol obtained elsewhere.
    ///
    /// # Safety
    ///
    /// `raw` must stay valid for `'st`.
    pub unsafe fn from_raw(raw: NonNull<SimpleFileSystemProtocol>) -> Self {
        Self::new(raw)
    }

    /// Opens the root directory.
    ///
    /// # Errors
    ///
    /// `NO_MEDIA`, `MEDIA_CHANGED`, `DEVICE_ERROR`, or `UNSUPPORTED` for an
    /// unknown file system format.
    pub fn open_volume(&self) -> Result<File<'st>, EfiStatus> {
        let mut root: *mut FileProtocol = ptr::null_mut();
        // SAFETY: `this` is the protocol's own pointer; `root` is a valid
        // out-pointer.
        unsafe { (self.raw.as_ref().open_volume)(self.raw.as_ptr(), &raw mut root) }
            .to_result()?;
        File::from_opened(root)
    }

    /// Size, free space and label of the volume.
    ///
    /// # Errors
    ///
    /// As for [`open_volume`](Self::open_volume), or the `GetInfo` status.
    pub fn volume_info(&self) -> Result<FileSystemInfo, EfiStatus> {
        let root = self.open_volume()?;
        let mut buf = [0u64; INFO_WORDS];
        FileSystemInfo::parse(root.get_info(&EfiGuid::FILE_SYSTEM_INFO, &mut buf)?)
    }
}

/// An open file or directory. Closed on drop.
pub struct File<'st> {
    raw: NonNull<FileProtocol>,
    _lifetime: PhantomData<&'st ()>,
}

impl<'st> File<'st> {
    fn from_opened(raw: *mut FileProtocol) -> Result<Self, EfiStatus> {
        let raw = NonNull::new(raw).ok_or(EfiStatus::DEVICE_ERROR)?;
        Ok(Self {
            raw,
            _lifetime: PhantomData,
        })
    }

    fn protocol(&self) -> &FileProtocol {
        // SAFETY: the handle stays open until `self` is dropped.
        unsafe { self.raw.as_ref() }
    }

    /// Opens `name` relative to this directory.
    ///
    /// `name` uses `\` as separator and is limited to [`MAX_FILE_NAME`]
    /// units.
    ///
    /// # Errors
    ///
    /// `INVALID_PARAMETER` for a mode other than read, read-write, or
    /// create-read-write; `BUFFER_TOO_SMALL` for an overlong name;
    /// otherwise `NOT_FOUND`, `ACCESS_DENIED`, `WRITE_PROTECTED`, or
    /// `VOLUME_FULL` from the firmware.
    pub fn open(
        &self,
        name: &str,
        mode: FileMode,
        attributes: FileAttributes,
    ) -> Result<File<'st>, EfiStatus> {
        if !mode.is_valid() {
            return Err(EfiStatus::INVALID_PARAMETER);
        }
        let mut name_buf = [0u16; MAX_FILE_NAME + 1];
        ucs2::encode_into(name, &mut name_buf)?;

        let mut handle: *mut FileProtocol = ptr::null_mut();
        // SAFETY: `name_buf` is null-terminated; `handle` is a valid
        // out-pointer.
        unsafe {
            (self.protocol().open)(
                self.raw.as_ptr(),
                &raw mut handle,
                name_buf.as_ptr(),
                mode,
                attributes,
            )
        }
        .to_result()?;
        File::from_opened(handle)
    }

    /// Reads from the current position. Returns `0` at end of file.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR`, or `BUFFER_TOO_SMALL` when reading a directory entry
    /// into a short buffer.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, EfiStatus> {
        let mut size = buf.len();
        // SAFETY: `buf` is valid for `size` bytes.
        unsafe { (self.protocol().read)(self.raw.as_ptr(), &raw mut size, buf.as_mut_ptr()) }
            .to_result()?;
        Ok(size)
    }

    /// Fills `buf` entirely.
    ///
    /// # Errors
    ///
    /// `END_OF_FILE` if the file ends first, or any [`read`](Self::read)
    /// error.
    pub fn read_exact(&self, mut buf: &mut [u8]) -> Result<(), EfiStatus> {
        while !buf.is_empty() {
            match self.read(buf)? {
                0 => return Err(EfiStatus::END_OF_FILE),
                n => buf = &mut buf[n..],
            }
        }
        Ok(())
    }

    /// Writes at the current position. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// `WRITE_PROTECTED`, `ACCESS_DENIED` for files opened read-only,
    /// `VOLUME_FULL`.
    pub fn write(&self, data: &[u8]) -> Result<usize, EfiStatus> {
        let mut size = data.len();
        // SAFETY: `data` is valid for `size` bytes.
        unsafe { (self.protocol().write)(self.raw.as_ptr(), &raw mut size, data.as_ptr()) }
            .to_result()?;
        Ok(size)
    }

    /// The current position.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` for directories.
    pub fn position(&self) -> Result<u64, EfiStatus> {
        let mut position = 0;
        // SAFETY: valid out-pointer.
        unsafe { (self.protocol().get_position)(self.raw.as_ptr(), &raw mut position) }
            .to_result()?;
        Ok(position)
    }

    /// Moves the current position. `u64::MAX` seeks to the end.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` for a non-zero position on a directory.
    pub fn set_position(&self, position: u64) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.protocol().set_position)(self.raw.as_ptr(), position) }.to_result()
    }

    fn get_info<'b>(&self, kind: &EfiGuid, buf: &'b mut [u64]) -> Result<&'b [u8], EfiStatus> {
        let capacity = size_of_val(buf);
        let mut size = capacity;
        let bytes = buf.as_mut_ptr().cast::<u8>();
        // SAFETY: `buf` is valid for `size` bytes and 8-byte aligned.
        unsafe { (self.protocol().get_info)(self.raw.as_ptr(), kind, &raw mut size, bytes) }
            .to_result()?;
        // SAFETY: the firmware wrote `size` bytes, at most the buffer length.
        Ok(unsafe { core::slice::from_raw_parts(bytes, size.min(capacity)) })
    }

    /// The file's information record.
    ///
    /// # Errors
    ///
    /// `BUFFER_TOO_SMALL` if the name exceeds [`MAX_FILE_NAME`] units, or
    /// `DEVICE_ERROR`.
    pub fn info(&self) -> Result<FileInfo, EfiStatus> {
        let mut buf = [0u64; INFO_WORDS];
        FileInfo::parse(self.get_info(&EfiGuid::FILE_INFO, &mut buf)?)
    }

    /// The file length in bytes.
    ///
    /// # Errors
    ///
    /// As for [`info`](Self::info).
    pub fn size(&self) -> Result<u64, EfiStatus> {
        Ok(self.info()?.header.file_size)
    }

    /// Writes buffered data to the device.
    ///
    /// # Errors
    ///
    /// `WRITE_PROTECTED`, `VOLUME_FULL`, or `DEVICE_ERROR`.
    pub fn flush(&self) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.protocol().flush)(self.raw.as_ptr()) }.to_result()
    }

    /// Deletes the file. The handle is closed either way.
    ///
    /// # Errors
    ///
    /// `WARN_DELETE_FAILURE` if the file was closed but not deleted.
    pub fn delete(self) -> Result<(), EfiStatus> {
        let file = ManuallyDrop::new(self);
        // SAFETY: `Delete` closes the handle; `file` is never dropped.
        let status = unsafe { (file.protocol().delete)(file.raw.as_ptr()) };
        if status == EfiStatus::WARN_DELETE_FAILURE {
            return Err(status);
        }
        status.to_result()
    }
}

impl Drop for File<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle is open and not used again.
        let status = unsafe { (self.protocol().close)(self.raw.as_ptr()) };
        if status.is_error() {
            log::warn!("failed to close file: {status}");
        }
    }
}
