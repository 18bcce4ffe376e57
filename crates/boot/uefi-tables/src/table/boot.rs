//! `EFI_BOOT_SERVICES`.
//!
//! Function pointers are stored bare rather than as `Option<fn>`, matching
//! the firmware layout. The two variadic entries
//! (`InstallMultipleProtocolInterfaces` and its inverse) are declared as
//! opaque pointers: they keep their slots but cannot be called from here.

use core::ffi::c_void;

use bitflags::bitflags;

use super::{Signature, Table, TableHeader};
use crate::memory::{EfiAllocateType, EfiMemoryType};
use crate::{EfiEvent, EfiGuid, EfiHandle, EfiPhysicalAddress, EfiStatus, Tpl};

/// Timer kinds for `SetTimer`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDelay {
    /// Cancel the timer.
    Cancel = 0,
    /// Fire every `trigger_time` units of 100 ns.
    Periodic = 1,
    /// Fire once after `trigger_time` units of 100 ns.
    Relative = 2,
}

/// Interface kinds for `InstallProtocolInterface`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    /// The only kind defined.
    NativeInterface = 0,
}

/// Which handles `LocateHandle` and `LocateHandleBuffer` return.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateSearchType {
    /// Every handle.
    AllHandles = 0,
    /// The next handle registered for a notification key.
    ByRegisterNotify = 1,
    /// Handles supporting a protocol.
    ByProtocol = 2,
}

bitflags! {
    /// How `OpenProtocol` opens an interface.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenProtocolAttributes: u32 {
        /// Used by handle-protocol style lookups.
        const BY_HANDLE_PROTOCOL = 0x01;
        /// Query the interface without taking a reference.
        const GET_PROTOCOL = 0x02;
        /// Only test that the protocol is present.
        const TEST_PROTOCOL = 0x04;
        /// Used by bus drivers for their children.
        const BY_CHILD_CONTROLLER = 0x08;
        /// Used by drivers managing the controller.
        const BY_DRIVER = 0x10;
        /// Exclusive access; disconnects other drivers.
        const EXCLUSIVE = 0x20;
    }
}

/// One agent holding a protocol open.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OpenProtocolInformationEntry {
    /// The agent.
    pub agent_handle: EfiHandle,
    /// The controller, if opened by a driver.
    pub controller_handle: EfiHandle,
    /// Attributes passed to `OpenProtocol`.
    pub attributes: OpenProtocolAttributes,
    /// Number of times this agent opened the protocol.
    pub open_count: u32,
}

/// Event notification callback.
pub type EventNotify = unsafe extern "efiapi" fn(event: EfiEvent, context: *mut c_void);

/// The boot services table. Valid until `ExitBootServices` succeeds.
#[repr(C)]
pub struct BootServices {
    /// Table header; signature [`Signature::BOOT_SERVICES`].
    pub header: TableHeader,

    // ── Task priority ────────────────────────────────────────────
    /// Raises the task priority level, returning the previous one.
    pub raise_tpl: unsafe extern "efiapi" fn(new_tpl: Tpl) -> Tpl,
    /// Restores a level returned by `raise_tpl`.
    pub restore_tpl: unsafe extern "efiapi" fn(old_tpl: Tpl),

    // ── Memory ───────────────────────────────────────────────────
    /// Allocates 4 KiB pages.
    pub allocate_pages: unsafe extern "efiapi" fn(
        alloc_type: EfiAllocateType,
        memory_type: EfiMemoryType,
        pages: usize,
        memory: *mut EfiPhysicalAddress,
    ) -> EfiStatus,
    /// Frees pages from `allocate_pages`.
    pub free_pages:
        unsafe extern "efiapi" fn(memory: EfiPhysicalAddress, pages: usize) -> EfiStatus,
    /// Copies the memory map into a caller buffer.
    pub get_memory_map: unsafe extern "efiapi" fn(
        memory_map_size: *mut usize,
        memory_map: *mut u8,
        map_key: *mut usize,
        descriptor_size: *mut usize,
        descriptor_version: *mut u32,
    ) -> EfiStatus,
    /// Allocates 8-byte aligned pool memory.
    pub allocate_pool: unsafe extern "efiapi" fn(
        pool_type: EfiMemoryType,
        size: usize,
        buffer: *mut *mut c_void,
    ) -> EfiStatus,
    /// Frees pool memory.
    pub free_pool: unsafe extern "efiapi" fn(buffer: *mut c_void) -> EfiStatus,

    // ── Events and timers ────────────────────────────────────────
    /// Creates an event.
    pub create_event: unsafe extern "efiapi" fn(
        event_type: u32,
        notify_tpl: Tpl,
        notify_function: Option<EventNotify>,
        notify_context: *mut c_void,
        event: *mut EfiEvent,
    ) -> EfiStatus,
    /// Arms a timer event.
    pub set_timer: unsafe extern "efiapi" fn(
        event: EfiEvent,
        timer_type: TimerDelay,
        trigger_time: u64,
    ) -> EfiStatus,
    /// Blocks until one of the events is signaled.
    pub wait_for_event: unsafe extern "efiapi" fn(
        number_of_events: usize,
        event: *mut EfiEvent,
        index: *mut usize,
    ) -> EfiStatus,
    /// Signals an event.
    pub signal_event: unsafe extern "efiapi" fn(event: EfiEvent) -> EfiStatus,
    /// Closes an event.
    pub close_event: unsafe extern "efiapi" fn(event: EfiEvent) -> EfiStatus,
    /// Polls an event.
    pub check_event: unsafe extern "efiapi" fn(event: EfiEvent) -> EfiStatus,

    // ── Protocol handlers ────────────────────────────────────────
    /// Installs an interface on a handle.
    pub install_protocol_interface: unsafe extern "efiapi" fn(
        handle: *mut EfiHandle,
        protocol: *const EfiGuid,
        interface_type: InterfaceType,
        interface: *mut c_void,
    ) -> EfiStatus,
    /// Replaces an installed interface.
    pub reinstall_protocol_interface: unsafe extern "efiapi" fn(
        handle: EfiHandle,
        protocol: *const EfiGuid,
        old_interface: *mut c_void,
        new_interface: *mut c_void,
    ) -> EfiStatus,
    /// Removes an installed interface.
    pub uninstall_protocol_interface: unsafe extern "efiapi" fn(
        handle: EfiHandle,
        protocol: *const EfiGuid,
        interface: *mut c_void,
    ) -> EfiStatus,
    /// Looks up an interface on a handle.
    pub handle_protocol: unsafe extern "efiapi" fn(
        handle: EfiHandle,
        protocol: *const EfiGuid,
        interface: *mut *mut c_void,
    ) -> EfiStatus,
    /// Reserved; null.
    pub reserved: *mut c_void,
    /// Registers an event signaled when the protocol is installed.
    pub register_protocol_notify: unsafe extern "efiapi" fn(
        protocol: *const EfiGuid,
        event: EfiEvent,
        registration: *mut *mut c_void,
    ) -> EfiStatus,
    /// Copies matching handles into a caller buffer.
    pub locate_handle: unsafe extern "efiapi" fn(
        search_type: LocateSearchType,
        protocol: *const EfiGuid,
        search_key: *mut c_void,
        buffer_size: *mut usize,
        buffer: *mut EfiHandle,
    ) -> EfiStatus,
    /// Finds the handle nearest a device path that supports a protocol.
    pub locate_device_path: unsafe extern "efiapi" fn(
        protocol: *const EfiGuid,
        device_path: *mut *mut c_void,
        device: *mut EfiHandle,
    ) -> EfiStatus,
    /// Adds, replaces, or removes a configuration table entry.
    pub install_configuration_table:
        unsafe extern "efiapi" fn(guid: *const EfiGuid, table: *mut c_void) -> EfiStatus,

    // ── Images ───────────────────────────────────────────────────
    /// Loads an image.
    pub load_image: unsafe extern "efiapi" fn(
        boot_policy: bool,
        parent_image_handle: EfiHandle,
        device_path: *mut c_void,
        source_buffer: *const c_void,
        source_size: usize,
        image_handle: *mut EfiHandle,
    ) -> EfiStatus,
    /// Runs a loaded image.
    pub start_image: unsafe extern "efiapi" fn(
        image_handle: EfiHandle,
        exit_data_size: *mut usize,
        exit_data: *mut *mut u16,
    ) -> EfiStatus,
    /// Returns from an image to its starter.
    pub exit: unsafe extern "efiapi" fn(
        image_handle: EfiHandle,
        exit_status: EfiStatus,
        exit_data_size: usize,
        exit_data: *mut u16,
    ) -> EfiStatus,
    /// Unloads an image.
    pub unload_image: unsafe extern "efiapi" fn(image_handle: EfiHandle) -> EfiStatus,
    /// Ends boot services, given the key of the current memory map.
    pub exit_boot_services:
        unsafe extern "efiapi" fn(image_handle: EfiHandle, map_key: usize) -> EfiStatus,

    // ── Miscellaneous ────────────────────────────────────────────
    /// Reads the monotonic counter.
    pub get_next_monotonic_count: unsafe extern "efiapi" fn(count: *mut u64) -> EfiStatus,
    /// Busy-waits.
    pub stall: unsafe extern "efiapi" fn(microseconds: usize) -> EfiStatus,
    /// Arms or disarms the watchdog.
    pub set_watchdog_timer: unsafe extern "efiapi" fn(
        timeout: usize,
        watchdog_code: u64,
        data_size: usize,
        watchdog_data: *const u16,
    ) -> EfiStatus,

    // ── Driver support ───────────────────────────────────────────
    /// Connects drivers to a controller.
    pub connect_controller: unsafe extern "efiapi" fn(
        controller_handle: EfiHandle,
        driver_image_handle: *mut EfiHandle,
        remaining_device_path: *mut c_void,
        recursive: bool,
    ) -> EfiStatus,
    /// Disconnects drivers from a controller.
    pub disconnect_controller: unsafe extern "efiapi" fn(
        controller_handle: EfiHandle,
        driver_image_handle: EfiHandle,
        child_handle: EfiHandle,
    ) -> EfiStatus,

    // ── Open and close protocol ──────────────────────────────────
    /// Opens an interface on behalf of an agent.
    pub open_protocol: unsafe extern "efiapi" fn(
        handle: EfiHandle,
        protocol: *const EfiGuid,
        interface: *mut *mut c_void,
        agent_handle: EfiHandle,
        controller_handle: EfiHandle,
        attributes: OpenProtocolAttributes,
    ) -> EfiStatus,
    /// Closes an interface opened with `open_protocol`.
    pub close_protocol: unsafe extern "efiapi" fn(
        handle: EfiHandle,
        protocol: *const EfiGuid,
        agent_handle: EfiHandle,
        controller_handle: EfiHandle,
    ) -> EfiStatus,
    /// Lists the agents holding an interface open.
    pub open_protocol_information: unsafe extern "efiapi" fn(
        handle: EfiHandle,
        protocol: *const EfiGuid,
        entry_buffer: *mut *mut OpenProtocolInformationEntry,
        entry_count: *mut usize,
    ) -> EfiStatus,

    // ── Library ──────────────────────────────────────────────────
    /// Lists the protocols installed on a handle, in pool memory.
    pub protocols_per_handle: unsafe extern "efiapi" fn(
        handle: EfiHandle,
        protocol_buffer: *mut *mut *mut EfiGuid,
        protocol_buffer_count: *mut usize,
    ) -> EfiStatus,
    /// Lists matching handles, in pool memory.
    pub locate_handle_buffer: unsafe extern "efiapi" fn(
        search_type: LocateSearchType,
        protocol: *const EfiGuid,
        search_key: *mut c_void,
        no_handles: *mut usize,
        buffer: *mut *mut EfiHandle,
    ) -> EfiStatus,
    /// Returns the first installed instance of a protocol.
    pub locate_protocol: unsafe extern "efiapi" fn(
        protocol: *const EfiGuid,
        registration: *mut c_void,
        interface: *mut *mut c_void,
    ) -> EfiStatus,
    /// Variadic; not callable through this declaration.
    pub install_multiple_protocol_interfaces: *const c_void,
    /// Variadic; not callable through this declaration.
    pub uninstall_multiple_protocol_interfaces: *const c_void,

    // ── CRC ──────────────────────────────────────────────────────
    /// Computes the CRC-32 of a buffer.
    pub calculate_crc32: unsafe extern "efiapi" fn(
        data: *const c_void,
        data_size: usize,
        crc32: *mut u32,
    ) -> EfiStatus,

    // ── Memory utilities ─────────────────────────────────────────
    /// `memmove`.
    pub copy_mem:
        unsafe extern "efiapi" fn(destination: *mut c_void, source: *const c_void, length: usize),
    /// `memset`.
    pub set_mem: unsafe extern "efiapi" fn(buffer: *mut c_void, size: usize, value: u8),

    /// Creates an event in a group.
    pub create_event_ex: unsafe extern "efiapi" fn(
        event_type: u32,
        notify_tpl: Tpl,
        notify_function: Option<EventNotify>,
        notify_context: *const c_void,
        event_group: *const EfiGuid,
        event: *mut EfiEvent,
    ) -> EfiStatus,
}

// SAFETY: `repr(C)` with the header first.
unsafe impl Table for BootServices {
    const SIGNATURE: Signature = Signature::BOOT_SERVICES;

    fn header(&self) -> &TableHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut TableHeader {
        &mut self.header
    }
}

// Header plus 44 pointer-sized slots.
#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(core::mem::size_of::<OpenProtocolInformationEntry>() == 24);
    assert!(core::mem::size_of::<BootServices>() == 376);
    assert!(core::mem::offset_of!(BootServices, get_memory_map) == 56);
    assert!(core::mem::offset_of!(BootServices, allocate_pool) == 64);
    assert!(core::mem::offset_of!(BootServices, free_pool) == 72);
    assert!(core::mem::offset_of!(BootServices, handle_protocol) == 152);
    assert!(core::mem::offset_of!(BootServices, exit_boot_services) == 232);
    assert!(core::mem::offset_of!(BootServices, open_protocol) == 280);
    assert!(core::mem::offset_of!(BootServices, locate_protocol) == 320);
    assert!(core::mem::offset_of!(BootServices, calculate_crc32) == 344);
};
