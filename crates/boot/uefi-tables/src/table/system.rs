//! `EFI_SYSTEM_TABLE` and configuration table entries.

use core::ffi::c_void;

use super::{BootServices, RuntimeServices, Signature, Table, TableHeader};
use crate::protocol::simple_text_input::SimpleTextInputProtocol;
use crate::protocol::simple_text_output::SimpleTextOutputProtocol;
use crate::{EfiGuid, EfiHandle};

/// An entry of the configuration table array: a GUID-tagged pointer to a
/// vendor table such as ACPI or SMBIOS.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationTable {
    /// Identifies the table.
    pub vendor_guid: EfiGuid,
    /// The table itself.
    pub vendor_table: *mut c_void,
}

/// The system table passed to an image's entry point.
///
/// Every pointer is owned by the firmware. After `ExitBootServices` the
/// console fields and `boot_services` must no longer be used.
#[repr(C)]
pub struct SystemTable {
    /// Table header; signature [`Signature::SYSTEM_TABLE`].
    pub header: TableHeader,
    /// Null-terminated UCS-2 vendor name.
    pub firmware_vendor: *const u16,
    /// Vendor-specific firmware revision.
    pub firmware_revision: u32,
    /// Handle of the active console input device.
    pub console_in_handle: EfiHandle,
    /// Input protocol of `console_in_handle`.
    pub console_in: *mut SimpleTextInputProtocol,
    /// Handle of the active console output device.
    pub console_out_handle: EfiHandle,
    /// Output protocol of `console_out_handle`.
    pub console_out: *mut SimpleTextOutputProtocol,
    /// Handle of the standard error device.
    pub standard_error_handle: EfiHandle,
    /// Output protocol of `standard_error_handle`.
    pub standard_error: *mut SimpleTextOutputProtocol,
    /// The runtime services table.
    pub runtime_services: *mut RuntimeServices,
    /// The boot services table.
    pub boot_services: *mut BootServices,
    /// Number of entries in `configuration_table`.
    pub number_of_table_entries: usize,
    /// Configuration table array.
    pub configuration_table: *mut ConfigurationTable,
}

impl SystemTable {
    /// The configuration table entries.
    ///
    /// # Safety
    ///
    /// `configuration_table` must point to `number_of_table_entries` valid
    /// entries, or the count must be zero.
    #[must_use]
    pub unsafe fn configuration_tables(&self) -> &[ConfigurationTable] {
        if self.number_of_table_entries == 0 || self.configuration_table.is_null() {
            return &[];
        }
        // SAFETY: guaranteed by the caller.
        unsafe {
            core::slice::from_raw_parts(self.configuration_table, self.number_of_table_entries)
        }
    }

    /// Finds the vendor table tagged `guid`.
    ///
    /// # Safety
    ///
    /// As for [`configuration_tables`](Self::configuration_tables).
    #[must_use]
    pub unsafe fn find_configuration_table(&self, guid: &EfiGuid) -> Option<*mut c_void> {
        // SAFETY: guaranteed by the caller.
        unsafe { self.configuration_tables() }
            .iter()
            .find(|entry| entry.vendor_guid == *guid)
            .map(|entry| entry.vendor_table)
    }
}

// SAFETY: `repr(C)` with the header first.
unsafe impl Table for SystemTable {
    const SIGNATURE: Signature = Signature::SYSTEM_TABLE;

    fn header(&self) -> &TableHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut TableHeader {
        &mut self.header
    }
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(core::mem::size_of::<ConfigurationTable>() == 24);

    // 4 bytes of padding after `firmware_revision`.
    assert!(core::mem::size_of::<SystemTable>() == 120);
    assert!(core::mem::offset_of!(SystemTable, firmware_vendor) == 24);
    assert!(core::mem::offset_of!(SystemTable, firmware_revision) == 32);
    assert!(core::mem::offset_of!(SystemTable, console_in_handle) == 40);
    assert!(core::mem::offset_of!(SystemTable, console_out) == 64);
    assert!(core::mem::offset_of!(SystemTable, standard_error) == 80);
    assert!(core::mem::offset_of!(SystemTable, runtime_services) == 88);
    assert!(core::mem::offset_of!(SystemTable, boot_services) == 96);
    assert!(core::mem::offset_of!(SystemTable, configuration_table) == 112);
};
