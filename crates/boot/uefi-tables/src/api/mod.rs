//! Safe wrappers over the raw tables.
//!
//! Everything that calls through a firmware function pointer lives here.
//! [`SystemTable`] tracks the boot phase in its type: boot-time services are
//! only reachable from `SystemTable<Boot>`, and
//! [`exit_boot_services`](SystemTable::exit_boot_services) consumes it.

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::protocol::simple_file_system::SimpleFileSystemProtocol;
use crate::protocol::simple_text_input::SimpleTextInputProtocol;
use crate::protocol::simple_text_output::SimpleTextOutputProtocol;
use crate::table::{self, ConfigurationTable, Table, TableHeader};
use crate::ucs2::Ucs2Display;
use crate::{EfiGuid, EfiHandle, EfiStatus};

/// Boot services wrapper.
pub mod boot;
/// Console output, number formatting and keyboard input.
pub mod console;
/// File system and file RAII wrappers.
pub mod fs;
/// Memory map acquisition.
pub mod memory;
/// Runtime services wrapper.
pub mod runtime;

#[cfg(test)]
pub(crate) mod mock;

pub use boot::{BootServices, HandleBuffer, TplGuard};
pub use console::{Console, FormattedNumber, NumberFormat, Radix, TextInput};
pub use fs::{File, FileSystem};
pub use memory::{
    Descriptors, MemoryMap, MemoryMapConfig, MemoryMapError, MemoryServices, RawMemoryMap,
};
pub use runtime::{RuntimeServices, VariableAttributes};

// ---------------------------------------------------------------------------
// Type-state markers
// ---------------------------------------------------------------------------

/// Boot services are available.
pub enum Boot {}

/// `ExitBootServices` has succeeded.
pub enum Runtime {}

mod sealed {
    pub trait Phase {}
    impl Phase for super::Boot {}
    impl Phase for super::Runtime {}
}

// ---------------------------------------------------------------------------
// Protocol trait
// ---------------------------------------------------------------------------

/// A protocol that can be looked up by GUID.
///
/// # Safety
///
/// `GUID` must identify an interface whose layout is `Raw`.
pub unsafe trait Protocol {
    /// The protocol GUID.
    const GUID: EfiGuid;
    /// The raw interface type.
    type Raw;
}

/// Marker for [`SimpleTextOutputProtocol`].
pub enum SimpleTextOutputId {}
// SAFETY: GUID and layout match.
unsafe impl Protocol for SimpleTextOutputId {
    const GUID: EfiGuid = EfiGuid::SIMPLE_TEXT_OUTPUT_PROTOCOL;
    type Raw = SimpleTextOutputProtocol;
}

/// Marker for [`SimpleTextInputProtocol`].
pub enum SimpleTextInputId {}
// SAFETY: GUID and layout match.
unsafe impl Protocol for SimpleTextInputId {
    const GUID: EfiGuid = EfiGuid::SIMPLE_TEXT_INPUT_PROTOCOL;
    type Raw = SimpleTextInputProtocol;
}

/// Marker for [`SimpleFileSystemProtocol`].
pub enum SimpleFileSystemId {}
// SAFETY: GUID and layout match.
unsafe impl Protocol for SimpleFileSystemId {
    const GUID: EfiGuid = EfiGuid::SIMPLE_FILE_SYSTEM_PROTOCOL;
    type Raw = SimpleFileSystemProtocol;
}

// ---------------------------------------------------------------------------
// SystemTable
// ---------------------------------------------------------------------------

/// Why [`SystemTable::exit_boot_services`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExitBootServicesError {
    /// The final memory map could not be acquired or refreshed.
    #[error(transparent)]
    MemoryMap(#[from] MemoryMapError),
    /// `ExitBootServices` rejected the call, after the stale-key retry.
    #[error("ExitBootServices failed: {0}")]
    Firmware(EfiStatus),
}

impl From<ExitBootServicesError> for EfiStatus {
    fn from(err: ExitBootServicesError) -> Self {
        match err {
            ExitBootServicesError::MemoryMap(err) => err.into(),
            ExitBootServicesError::Firmware(status) => status,
        }
    }
}

/// The system table handed to the image entry point.
pub struct SystemTable<S: sealed::Phase> {
    handle: EfiHandle,
    raw: NonNull<table::SystemTable>,
    _phase: PhantomData<S>,
}

impl<S: sealed::Phase> core::fmt::Debug for SystemTable<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SystemTable")
            .field("handle", &self.handle)
            .field("header", self.header())
            .finish()
    }
}

impl<S: sealed::Phase> SystemTable<S> {
    fn raw(&self) -> &table::SystemTable {
        // SAFETY: `from_raw` requires a live table for the whole boot.
        unsafe { self.raw.as_ref() }
    }

    /// The handle of the running image.
    #[must_use]
    pub fn image_handle(&self) -> EfiHandle {
        self.handle
    }

    /// The table header.
    #[must_use]
    pub fn header(&self) -> &TableHeader {
        &self.raw().header
    }

    /// Checks the signature and checksum of the system table.
    ///
    /// Firmware recomputes the checksum whenever it edits the table, so a
    /// mismatch means the pointer is not a system table or it was corrupted.
    #[must_use]
    pub fn verify(&self) -> bool {
        let raw = self.raw();
        // SAFETY: the firmware sizes the header to the table it describes.
        raw.has_valid_signature() && unsafe { raw.verify_crc32() }
    }

    /// Revision reported by the firmware vendor.
    #[must_use]
    pub fn firmware_revision(&self) -> u32 {
        self.raw().firmware_revision
    }

    /// The firmware vendor string, or an empty string if absent.
    #[must_use]
    pub fn firmware_vendor(&self) -> Ucs2Display<'_> {
        let vendor = self.raw().firmware_vendor;
        if vendor.is_null() {
            return Ucs2Display(&[]);
        }
        let mut len = 0;
        // SAFETY: the firmware stores a null-terminated string.
        unsafe {
            while *vendor.add(len) != 0 {
                len += 1;
            }
            Ucs2Display(core::slice::from_raw_parts(vendor, len))
        }
    }

    /// The runtime services, if the firmware provides them.
    #[must_use]
    pub fn runtime_services(&self) -> Option<RuntimeServices<'_>> {
        // SAFETY: a non-null pointer refers to the firmware's table.
        let raw = unsafe { self.raw().runtime_services.as_ref()? };
        Some(RuntimeServices::new(raw))
    }

    /// The installed configuration tables.
    #[must_use]
    pub fn configuration_tables(&self) -> &[ConfigurationTable] {
        // SAFETY: the firmware keeps the array and its count consistent.
        unsafe { self.raw().configuration_tables() }
    }

    /// Looks up a configuration table such as ACPI or SMBIOS by GUID.
    #[must_use]
    pub fn find_configuration_table(&self, guid: &EfiGuid) -> Option<*mut core::ffi::c_void> {
        // SAFETY: as for `configuration_tables`.
        unsafe { self.raw().find_configuration_table(guid) }
    }
}

impl SystemTable<Boot> {
    /// Wraps the pointers passed to the image entry point.
    ///
    /// Returns `None` if `raw` is null.
    ///
    /// # Safety
    ///
    /// `raw` must point to the firmware's system table, `handle` must be the
    /// running image, and only one wrapper may exist per boot.
    pub unsafe fn from_raw(handle: EfiHandle, raw: *mut table::SystemTable) -> Option<Self> {
        Some(Self {
            handle,
            raw: NonNull::new(raw)?,
            _phase: PhantomData,
        })
    }

    /// The boot services.
    #[must_use]
    pub fn boot_services(&self) -> BootServices<'_> {
        // SAFETY: boot services exist until `ExitBootServices`, which consumes
        // `self`.
        let raw = unsafe { &*self.raw().boot_services };
        BootServices::new(raw, self.handle)
    }

    /// Standard output, if a console is attached.
    #[must_use]
    pub fn console_out(&self) -> Option<Console<'_>> {
        NonNull::new(self.raw().console_out).map(Console::new)
    }

    /// Standard error, if a console is attached.
    #[must_use]
    pub fn console_err(&self) -> Option<Console<'_>> {
        NonNull::new(self.raw().standard_error).map(Console::new)
    }

    /// Keyboard input, if a console is attached.
    #[must_use]
    pub fn console_in(&self) -> Option<TextInput<'_>> {
        NonNull::new(self.raw().console_in).map(TextInput::new)
    }

    /// Leaves boot services and returns the final memory map.
    ///
    /// The map is acquired with `config`. If the firmware rejects its key as
    /// stale, the map is re-read into the same buffer and the call is retried
    /// once. Nothing is logged or allocated between the two attempts, since a
    /// failed `ExitBootServices` may already have shut the console down.
    ///
    /// # Errors
    ///
    /// [`ExitBootServicesError::MemoryMap`] if the map could not be read, or
    /// [`ExitBootServicesError::Firmware`] if the firmware refused both
    /// attempts. Boot services may be partially shut down after a failure,
    /// so once the firmware has been called the map buffer is leaked on
    /// every path.
    pub fn exit_boot_services(
        self,
        config: &MemoryMapConfig,
    ) -> Result<(SystemTable<Runtime>, RawMemoryMap), ExitBootServicesError> {
        let bs = self.boot_services();
        let mut map = MemoryMap::try_acquire(&bs, config)?;
        log::debug!(
            "exiting boot services: {} descriptors, key {:#x}",
            map.len(),
            map.map_key()
        );

        // SAFETY: `self` is consumed on success. From here on the map buffer
        // is leaked, never freed, since `FreePool` may already be gone.
        let mut status = unsafe { bs.exit_boot_services(map.map_key()) };
        if status == EfiStatus::INVALID_PARAMETER {
            if let Err(err) = map.refresh() {
                let _ = map.into_raw();
                return Err(err.into());
            }
            // SAFETY: as above.
            status = unsafe { bs.exit_boot_services(map.map_key()) };
        }
        let map = map.into_raw();
        status.to_result().map_err(ExitBootServicesError::Firmware)?;

        let runtime = SystemTable {
            handle: self.handle,
            raw: self.raw,
            _phase: PhantomData,
        };
        Ok((runtime, map))
    }
}
