//! `EFI_RUNTIME_SERVICES`.

use core::ffi::c_void;

use super::{Signature, Table, TableHeader};
use crate::time::{EfiTime, EfiTimeCapabilities};
use crate::{EfiGuid, EfiPhysicalAddress, EfiStatus};

/// How `ResetSystem` resets the platform.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    /// Power cycle.
    Cold = 0,
    /// Reinitialise without removing power.
    Warm = 1,
    /// Power off.
    Shutdown = 2,
    /// A platform-specific reset, identified by a GUID in the reset data.
    PlatformSpecific = 3,
}

/// Header of an update capsule.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CapsuleHeader {
    /// Identifies the capsule's consumer.
    pub capsule_guid: EfiGuid,
    /// Size of this header.
    pub header_size: u32,
    /// Capsule flags.
    pub flags: u32,
    /// Size of the whole capsule.
    pub capsule_image_size: u32,
}

/// The runtime services table. Usable before and after `ExitBootServices`.
#[repr(C)]
pub struct RuntimeServices {
    /// Table header; signature [`Signature::RUNTIME_SERVICES`].
    pub header: TableHeader,

    // ── Time ─────────────────────────────────────────────────────
    /// Reads the real-time clock.
    pub get_time: unsafe extern "efiapi" fn(
        time: *mut EfiTime,
        capabilities: *mut EfiTimeCapabilities,
    ) -> EfiStatus,
    /// Sets the real-time clock.
    pub set_time: unsafe extern "efiapi" fn(time: *const EfiTime) -> EfiStatus,
    /// Reads the wakeup alarm.
    pub get_wakeup_time: unsafe extern "efiapi" fn(
        enabled: *mut bool,
        pending: *mut bool,
        time: *mut EfiTime,
    ) -> EfiStatus,
    /// Arms or disarms the wakeup alarm.
    pub set_wakeup_time: unsafe extern "efiapi" fn(enable: bool, time: *const EfiTime) -> EfiStatus,

    // ── Virtual memory ───────────────────────────────────────────
    /// Switches runtime services to virtual addressing.
    pub set_virtual_address_map: unsafe extern "efiapi" fn(
        memory_map_size: usize,
        descriptor_size: usize,
        descriptor_version: u32,
        virtual_map: *mut u8,
    ) -> EfiStatus,
    /// Translates a pointer during `SetVirtualAddressMap`.
    pub convert_pointer:
        unsafe extern "efiapi" fn(debug_disposition: usize, address: *mut *mut c_void) -> EfiStatus,

    // ── Variables ────────────────────────────────────────────────
    /// Reads a variable.
    pub get_variable: unsafe extern "efiapi" fn(
        variable_name: *const u16,
        vendor_guid: *const EfiGuid,
        attributes: *mut u32,
        data_size: *mut usize,
        data: *mut c_void,
    ) -> EfiStatus,
    /// Steps through variable names.
    pub get_next_variable_name: unsafe extern "efiapi" fn(
        variable_name_size: *mut usize,
        variable_name: *mut u16,
        vendor_guid: *mut EfiGuid,
    ) -> EfiStatus,
    /// Writes or deletes a variable.
    pub set_variable: unsafe extern "efiapi" fn(
        variable_name: *const u16,
        vendor_guid: *const EfiGuid,
        attributes: u32,
        data_size: usize,
        data: *const c_void,
    ) -> EfiStatus,

    // ── Miscellaneous ────────────────────────────────────────────
    /// Reads the high half of the monotonic counter.
    pub get_next_high_monotonic_count: unsafe extern "efiapi" fn(high_count: *mut u32) -> EfiStatus,
    /// Resets the platform. Does not return.
    pub reset_system: unsafe extern "efiapi" fn(
        reset_type: ResetType,
        reset_status: EfiStatus,
        data_size: usize,
        reset_data: *const c_void,
    ) -> !,

    // ── Capsules ─────────────────────────────────────────────────
    /// Hands capsules to the firmware.
    pub update_capsule: unsafe extern "efiapi" fn(
        capsule_header_array: *mut *mut CapsuleHeader,
        capsule_count: usize,
        scatter_gather_list: EfiPhysicalAddress,
    ) -> EfiStatus,
    /// Reports whether capsules can be delivered.
    pub query_capsule_capabilities: unsafe extern "efiapi" fn(
        capsule_header_array: *mut *mut CapsuleHeader,
        capsule_count: usize,
        maximum_capsule_size: *mut u64,
        reset_type: *mut ResetType,
    ) -> EfiStatus,

    /// Reports variable storage usage.
    pub query_variable_info: unsafe extern "efiapi" fn(
        attributes: u32,
        maximum_variable_storage_size: *mut u64,
        remaining_variable_storage_size: *mut u64,
        maximum_variable_size: *mut u64,
    ) -> EfiStatus,
}

// SAFETY: `repr(C)` with the header first.
unsafe impl Table for RuntimeServices {
    const SIGNATURE: Signature = Signature::RUNTIME_SERVICES;

    fn header(&self) -> &TableHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut TableHeader {
        &mut self.header
    }
}

const _: () = assert!(core::mem::size_of::<CapsuleHeader>() == 28);

// Header plus 14 function pointers.
#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(core::mem::size_of::<RuntimeServices>() == 136);
    assert!(core::mem::offset_of!(RuntimeServices, get_variable) == 72);
    assert!(core::mem::offset_of!(RuntimeServices, reset_system) == 104);
    assert!(core::mem::offset_of!(RuntimeServices, query_variable_info) == 128);
};
