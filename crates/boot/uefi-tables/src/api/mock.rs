//! Fake firmware tables for host tests.
//!
//! The raw tables hold bare `extern "efiapi"` function pointers, which cannot
//! capture state, so the fakes read and write a thread-local [`State`]. Every
//! test starts with [`reset`].

use core::cell::RefCell;
use core::ffi::c_void;
use core::mem::size_of;
use core::ptr;

use crate::memory::{EfiAllocateType, EfiMemoryDescriptor, EfiMemoryType};
use crate::protocol::file::{FileAttributes, FileInfoHeader, FileMode, FileProtocol, FileSystemInfo};
use crate::protocol::simple_file_system::SimpleFileSystemProtocol;
use crate::protocol::simple_text_input::{InputKey, ScanCode, SimpleTextInputProtocol};
use crate::protocol::simple_text_output::{SimpleTextOutputProtocol, TextOutputMode};
use crate::table::{self, Revision, Signature, Table, TableHeader};
use crate::time::{EfiTime, EfiTimeCapabilities};
use crate::{EfiGuid, EfiHandle, EfiPhysicalAddress, EfiStatus, Tpl};

#[derive(Default)]
pub(crate) struct State {
    /// Descriptors reported by `GetMemoryMap`.
    pub map: Vec<u8>,
    pub descriptor_size: usize,
    pub map_key: usize,
    /// `ExitBootServices` calls to reject as stale before accepting one.
    pub stale_exits: usize,
    /// Descriptors added to the map by each stale rejection.
    pub growth_on_stale_exit: usize,
    /// Keys passed to `ExitBootServices`.
    pub exit_keys: Vec<usize>,
    /// `FreePool` calls made after `ExitBootServices` was first called.
    pub frees_after_exit: usize,
    pub pools: Vec<(usize, usize)>,
    /// Raised levels followed by restored ones, in call order.
    pub tpl_calls: Vec<(bool, Tpl)>,
    /// Strings passed to `OutputString`, terminator stripped.
    pub output: Vec<Vec<u16>>,
    /// Status `OutputString` fails with, if any.
    pub output_fails: Option<EfiStatus>,
    pub attributes: Vec<usize>,
    /// Statuses returned by successive `ReadKeyStroke` calls; `None` yields
    /// a key.
    pub key_script: Vec<Option<EfiStatus>>,
    /// The clock; `None` reads as `EfiTime::default()`.
    pub time: Option<EfiTime>,
    pub variables: Vec<Variable>,
    /// Contents of the single fake file.
    pub file_data: Vec<u8>,
    pub file_position: usize,
    /// Names passed to `Open`.
    pub opened: Vec<String>,
    pub closed: usize,
    pub deleted: usize,
    pub delete_fails: bool,
    pub file: usize,
}

pub(crate) struct Variable {
    pub name: Vec<u16>,
    pub vendor: EfiGuid,
    pub attributes: u32,
    pub data: Vec<u8>,
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

pub(crate) fn reset(state: State) {
    STATE.with(|s| *s.borrow_mut() = state);
}

pub(crate) fn with<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|s| f(&mut s.borrow_mut()))
}

/// Number of pool buffers not yet freed.
pub(crate) fn live_pools() -> usize {
    with(|s| s.pools.len())
}

/// `count` descriptors of `stride` bytes, one page each.
pub(crate) fn descriptors(count: usize, stride: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; count * stride];
    for (i, chunk) in bytes.chunks_exact_mut(stride).enumerate() {
        let descriptor = EfiMemoryDescriptor {
            memory_type: EfiMemoryType::CONVENTIONAL,
            pad: 0,
            physical_start: (i as u64) << 12,
            virtual_start: 0,
            number_of_pages: 1,
            attribute: crate::memory::EfiMemoryAttributes::WB,
        };
        // SAFETY: `chunk` is at least 40 bytes and the write is unaligned.
        unsafe {
            chunk
                .as_mut_ptr()
                .cast::<EfiMemoryDescriptor>()
                .write_unaligned(descriptor);
        }
    }
    bytes
}

// ---------------------------------------------------------------------------
// Boot services
// ---------------------------------------------------------------------------

unsafe extern "efiapi" fn unused_slot() -> ! {
    std::process::abort()
}

unsafe extern "efiapi" fn raise_tpl(new_tpl: Tpl) -> Tpl {
    with(|s| s.tpl_calls.push((true, new_tpl)));
    Tpl::APPLICATION
}

unsafe extern "efiapi" fn restore_tpl(old_tpl: Tpl) {
    with(|s| s.tpl_calls.push((false, old_tpl)));
}

unsafe extern "efiapi" fn allocate_pages(
    _alloc_type: EfiAllocateType,
    _memory_type: EfiMemoryType,
    _pages: usize,
    _memory: *mut EfiPhysicalAddress,
) -> EfiStatus {
    EfiStatus::OUT_OF_RESOURCES
}

unsafe extern "efiapi" fn get_memory_map(
    size: *mut usize,
    buffer: *mut u8,
    map_key: *mut usize,
    descriptor_size: *mut usize,
    descriptor_version: *mut u32,
) -> EfiStatus {
    with(|s| {
        // SAFETY: the wrapper passes valid out-pointers and a buffer of
        // `*size` bytes.
        unsafe {
            *descriptor_size = s.descriptor_size;
            *descriptor_version = 1;
            if buffer.is_null() || *size < s.map.len() {
                *size = s.map.len();
                return EfiStatus::BUFFER_TOO_SMALL;
            }
            ptr::copy_nonoverlapping(s.map.as_ptr(), buffer, s.map.len());
            *size = s.map.len();
            *map_key = s.map_key;
        }
        EfiStatus::SUCCESS
    })
}

unsafe extern "efiapi" fn allocate_pool(
    _pool_type: EfiMemoryType,
    size: usize,
    buffer: *mut *mut c_void,
) -> EfiStatus {
    let words = size.div_ceil(size_of::<u64>()).max(1);
    let pool = Box::into_raw(vec![0u64; words].into_boxed_slice());
    with(|s| s.pools.push((pool.cast::<u64>() as usize, words)));
    // SAFETY: `buffer` is a valid out-pointer.
    unsafe { *buffer = pool.cast() };
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn free_pool(buffer: *mut c_void) -> EfiStatus {
    let found = with(|s| {
        if !s.exit_keys.is_empty() {
            s.frees_after_exit += 1;
        }
        let index = s.pools.iter().position(|&(addr, _)| addr == buffer as usize)?;
        Some(s.pools.swap_remove(index))
    });
    match found {
        Some((addr, words)) => {
            let pool = ptr::slice_from_raw_parts_mut(addr as *mut u64, words);
            // SAFETY: the pool was leaked from a boxed slice of `words` words.
            drop(unsafe { Box::from_raw(pool) });
            EfiStatus::SUCCESS
        }
        None => EfiStatus::INVALID_PARAMETER,
    }
}

unsafe extern "efiapi" fn exit_boot_services(_image: EfiHandle, map_key: usize) -> EfiStatus {
    with(|s| {
        s.exit_keys.push(map_key);
        if map_key != s.map_key {
            return EfiStatus::INVALID_PARAMETER;
        }
        if s.stale_exits > 0 {
            s.stale_exits -= 1;
            s.map_key += 1;
            if s.growth_on_stale_exit > 0 {
                let grown = descriptors(s.growth_on_stale_exit, s.descriptor_size);
                s.map.extend_from_slice(&grown);
            }
            return EfiStatus::INVALID_PARAMETER;
        }
        EfiStatus::SUCCESS
    })
}

unsafe extern "efiapi" fn calculate_crc32(
    data: *const c_void,
    data_size: usize,
    crc32: *mut u32,
) -> EfiStatus {
    if data.is_null() || data_size == 0 {
        return EfiStatus::INVALID_PARAMETER;
    }
    // SAFETY: the wrapper passes a live slice.
    let bytes = unsafe { core::slice::from_raw_parts(data.cast::<u8>(), data_size) };
    // SAFETY: valid out-pointer.
    unsafe { *crc32 = crate::crc32::checksum(bytes) };
    EfiStatus::SUCCESS
}

const BOOT_WORDS: usize = size_of::<table::BootServices>() / size_of::<usize>();

/// A boot services table whose unused slots abort if called.
pub(crate) fn boot_services() -> Box<table::BootServices> {
    let words = [unused_slot as usize; BOOT_WORDS];
    // SAFETY: every field is pointer-sized and receives a function address;
    // the header is overwritten below.
    let mut bs = Box::new(unsafe {
        core::mem::transmute::<[usize; BOOT_WORDS], table::BootServices>(words)
    });
    bs.header = header(Signature::BOOT_SERVICES, size_of::<table::BootServices>());
    bs.raise_tpl = raise_tpl;
    bs.restore_tpl = restore_tpl;
    bs.allocate_pages = allocate_pages;
    bs.get_memory_map = get_memory_map;
    bs.allocate_pool = allocate_pool;
    bs.free_pool = free_pool;
    bs.exit_boot_services = exit_boot_services;
    bs.calculate_crc32 = calculate_crc32;
    // SAFETY: the header size is the size of the table.
    unsafe { bs.update_crc32() };
    bs
}

// ---------------------------------------------------------------------------
// Runtime services
// ---------------------------------------------------------------------------

const VARIABLE_STORE: u64 = 64 * 1024;

/// Reads a null-terminated UCS-2 string, terminator excluded.
unsafe fn read_ucs2(mut cursor: *const u16) -> Vec<u16> {
    let mut units = Vec::new();
    // SAFETY: guaranteed by the caller.
    unsafe {
        while *cursor != 0 {
            units.push(*cursor);
            cursor = cursor.add(1);
        }
    }
    units
}

unsafe extern "efiapi" fn get_time(
    time: *mut EfiTime,
    capabilities: *mut EfiTimeCapabilities,
) -> EfiStatus {
    let now = with(|s| s.time.unwrap_or_default());
    // SAFETY: valid out-pointers.
    unsafe {
        *time = now;
        *capabilities = EfiTimeCapabilities {
            resolution: 1,
            accuracy: 50_000_000,
            sets_to_zero: false,
        };
    }
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn set_time(time: *const EfiTime) -> EfiStatus {
    // SAFETY: valid pointer.
    let time = unsafe { *time };
    with(|s| s.time = Some(time));
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn get_variable(
    variable_name: *const u16,
    vendor_guid: *const EfiGuid,
    attributes: *mut u32,
    data_size: *mut usize,
    data: *mut c_void,
) -> EfiStatus {
    // SAFETY: the wrapper passes a terminated name and valid pointers.
    let (name, vendor) = unsafe { (read_ucs2(variable_name), *vendor_guid) };
    with(|s| {
        let Some(var) = s.variables.iter().find(|v| v.name == name && v.vendor == vendor) else {
            return EfiStatus::NOT_FOUND;
        };
        // SAFETY: `data` is valid for `*data_size` bytes.
        unsafe {
            *attributes = var.attributes;
            if *data_size < var.data.len() {
                *data_size = var.data.len();
                return EfiStatus::BUFFER_TOO_SMALL;
            }
            ptr::copy_nonoverlapping(var.data.as_ptr(), data.cast::<u8>(), var.data.len());
            *data_size = var.data.len();
        }
        EfiStatus::SUCCESS
    })
}

unsafe extern "efiapi" fn get_next_variable_name(
    variable_name_size: *mut usize,
    variable_name: *mut u16,
    vendor_guid: *mut EfiGuid,
) -> EfiStatus {
    // SAFETY: the wrapper passes a terminated name and valid pointers.
    let (current, vendor) = unsafe { (read_ucs2(variable_name), *vendor_guid) };
    with(|s| {
        let next = if current.is_empty() {
            0
        } else {
            match s
                .variables
                .iter()
                .position(|v| v.name == current && v.vendor == vendor)
            {
                Some(index) => index + 1,
                None => return EfiStatus::INVALID_PARAMETER,
            }
        };
        let Some(var) = s.variables.get(next) else {
            return EfiStatus::NOT_FOUND;
        };
        let needed = (var.name.len() + 1) * size_of::<u16>();
        // SAFETY: `variable_name` is valid for `*variable_name_size` bytes.
        unsafe {
            if *variable_name_size < needed {
                *variable_name_size = needed;
                return EfiStatus::BUFFER_TOO_SMALL;
            }
            ptr::copy_nonoverlapping(var.name.as_ptr(), variable_name, var.name.len());
            *variable_name.add(var.name.len()) = 0;
            *variable_name_size = needed;
            *vendor_guid = var.vendor;
        }
        EfiStatus::SUCCESS
    })
}

unsafe extern "efiapi" fn set_variable(
    variable_name: *const u16,
    vendor_guid: *const EfiGuid,
    attributes: u32,
    data_size: usize,
    data: *const c_void,
) -> EfiStatus {
    // SAFETY: the wrapper passes a terminated name, a valid GUID, and
    // `data_size` readable bytes.
    let (name, vendor, bytes) = unsafe {
        (
            read_ucs2(variable_name),
            *vendor_guid,
            core::slice::from_raw_parts(data.cast::<u8>(), data_size).to_vec(),
        )
    };
    with(|s| {
        let existing = s
            .variables
            .iter()
            .position(|v| v.name == name && v.vendor == vendor);
        match (existing, bytes.is_empty()) {
            (Some(index), true) => {
                s.variables.remove(index);
            }
            (None, true) => return EfiStatus::NOT_FOUND,
            (Some(index), false) => {
                s.variables[index].attributes = attributes;
                s.variables[index].data = bytes;
            }
            (None, false) => s.variables.push(Variable {
                name,
                vendor,
                attributes,
                data: bytes,
            }),
        }
        EfiStatus::SUCCESS
    })
}

unsafe extern "efiapi" fn query_variable_info(
    _attributes: u32,
    maximum_variable_storage_size: *mut u64,
    remaining_variable_storage_size: *mut u64,
    maximum_variable_size: *mut u64,
) -> EfiStatus {
    let used: usize = with(|s| s.variables.iter().map(|v| v.data.len()).sum());
    // SAFETY: valid out-pointers.
    unsafe {
        *maximum_variable_storage_size = VARIABLE_STORE;
        *remaining_variable_storage_size = VARIABLE_STORE - used as u64;
        *maximum_variable_size = 1024;
    }
    EfiStatus::SUCCESS
}

const RUNTIME_WORDS: usize = size_of::<table::RuntimeServices>() / size_of::<usize>();

/// A runtime services table with a clock and an in-memory variable store.
pub(crate) fn runtime_services() -> Box<table::RuntimeServices> {
    let words = [unused_slot as usize; RUNTIME_WORDS];
    // SAFETY: as for `boot_services`.
    let mut rt = Box::new(unsafe {
        core::mem::transmute::<[usize; RUNTIME_WORDS], table::RuntimeServices>(words)
    });
    rt.header = header(Signature::RUNTIME_SERVICES, size_of::<table::RuntimeServices>());
    rt.get_time = get_time;
    rt.set_time = set_time;
    rt.get_variable = get_variable;
    rt.get_next_variable_name = get_next_variable_name;
    rt.set_variable = set_variable;
    rt.query_variable_info = query_variable_info;
    // SAFETY: the header size is the size of the table.
    unsafe { rt.update_crc32() };
    rt
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

unsafe extern "efiapi" fn output_reset(
    _this: *mut SimpleTextOutputProtocol,
    _extended_verification: bool,
) -> EfiStatus {
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn output_string(
    _this: *mut SimpleTextOutputProtocol,
    string: *const u16,
) -> EfiStatus {
    if let Some(status) = with(|s| s.output_fails) {
        return status;
    }
    let mut units = Vec::new();
    // SAFETY: the wrapper always passes a null-terminated string.
    unsafe {
        let mut cursor = string;
        while *cursor != 0 {
            units.push(*cursor);
            cursor = cursor.add(1);
        }
    }
    with(|s| s.output.push(units));
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn test_string(
    _this: *mut SimpleTextOutputProtocol,
    _string: *const u16,
) -> EfiStatus {
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn query_mode(
    _this: *mut SimpleTextOutputProtocol,
    mode_number: usize,
    columns: *mut usize,
    rows: *mut usize,
) -> EfiStatus {
    if mode_number != 0 {
        return EfiStatus::UNSUPPORTED;
    }
    // SAFETY: valid out-pointers.
    unsafe {
        *columns = 80;
        *rows = 25;
    }
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn set_mode(
    _this: *mut SimpleTextOutputProtocol,
    mode_number: usize,
) -> EfiStatus {
    if mode_number == 0 {
        EfiStatus::SUCCESS
    } else {
        EfiStatus::UNSUPPORTED
    }
}

unsafe extern "efiapi" fn set_attribute(
    _this: *mut SimpleTextOutputProtocol,
    attribute: usize,
) -> EfiStatus {
    with(|s| s.attributes.push(attribute));
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn clear_screen(_this: *mut SimpleTextOutputProtocol) -> EfiStatus {
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn set_cursor_position(
    this: *mut SimpleTextOutputProtocol,
    column: usize,
    row: usize,
) -> EfiStatus {
    if column >= 80 || row >= 25 {
        return EfiStatus::UNSUPPORTED;
    }
    // SAFETY: `mode` points at the fake's boxed mode.
    unsafe {
        (*(*this).mode).cursor_column = column as i32;
        (*(*this).mode).cursor_row = row as i32;
    }
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn enable_cursor(
    this: *mut SimpleTextOutputProtocol,
    visible: bool,
) -> EfiStatus {
    // SAFETY: `mode` points at the fake's boxed mode.
    unsafe { (*(*this).mode).cursor_visible = visible };
    EfiStatus::SUCCESS
}

/// A text output device with an 80x25 mode 0.
pub(crate) struct FakeConsole {
    pub protocol: Box<SimpleTextOutputProtocol>,
    _mode: Box<TextOutputMode>,
}

pub(crate) fn console() -> FakeConsole {
    let mut mode = Box::new(TextOutputMode {
        max_mode: 1,
        mode: 0,
        attribute: 0x07,
        cursor_column: 0,
        cursor_row: 0,
        cursor_visible: true,
    });
    let protocol = Box::new(SimpleTextOutputProtocol {
        reset: output_reset,
        output_string,
        test_string,
        query_mode,
        set_mode,
        set_attribute,
        clear_screen,
        set_cursor_position,
        enable_cursor,
        mode: &raw mut *mode,
    });
    FakeConsole {
        protocol,
        _mode: mode,
    }
}

unsafe extern "efiapi" fn input_reset(
    _this: *mut SimpleTextInputProtocol,
    _extended_verification: bool,
) -> EfiStatus {
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn read_key_stroke(
    _this: *mut SimpleTextInputProtocol,
    key: *mut InputKey,
) -> EfiStatus {
    let next = with(|s| {
        if s.key_script.is_empty() {
            Some(EfiStatus::NOT_READY)
        } else {
            s.key_script.remove(0)
        }
    });
    if let Some(status) = next {
        return status;
    }
    // SAFETY: valid out-pointer.
    unsafe {
        *key = InputKey {
            scan_code: ScanCode::NULL,
            unicode_char: u16::from(b'y'),
        };
    }
    EfiStatus::SUCCESS
}

pub(crate) fn keyboard() -> Box<SimpleTextInputProtocol> {
    Box::new(SimpleTextInputProtocol {
        reset: input_reset,
        read_key_stroke,
        wait_for_key: ptr::null_mut(),
    })
}

// ---------------------------------------------------------------------------
// System table
// ---------------------------------------------------------------------------

fn header(signature: Signature, size: usize) -> TableHeader {
    TableHeader {
        signature,
        revision: Revision::UEFI_2_7,
        size: u32::try_from(size).unwrap(),
        crc32: 0,
        reserved: 0,
    }
}

/// A checksummed system table pointing at `bs` and `console_out`.
pub(crate) fn system_table(
    bs: &mut table::BootServices,
    console_out: &mut SimpleTextOutputProtocol,
    console_in: &mut SimpleTextInputProtocol,
) -> Box<table::SystemTable> {
    let mut st = Box::new(table::SystemTable {
        header: header(Signature::SYSTEM_TABLE, size_of::<table::SystemTable>()),
        firmware_vendor: ptr::null(),
        firmware_revision: 0x0001_0000,
        console_in_handle: ptr::null_mut(),
        console_in,
        console_out_handle: ptr::null_mut(),
        console_out,
        standard_error_handle: ptr::null_mut(),
        standard_error: ptr::null_mut(),
        runtime_services: ptr::null_mut(),
        boot_services: bs,
        number_of_table_entries: 0,
        configuration_table: ptr::null_mut(),
    });
    // SAFETY: the header size is the size of the table.
    unsafe { st.update_crc32() };
    st
}

// ---------------------------------------------------------------------------
// File system
// ---------------------------------------------------------------------------
//
// One `FileProtocol` serves as both the root directory and every file opened
// from it; all handles share the file contents and position in `State`.

fn ucs2_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(core::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn file_info_record(len: usize) -> Vec<u8> {
    let name = ucs2_bytes("kernel.elf");
    let header = FileInfoHeader {
        size: (size_of::<FileInfoHeader>() + name.len()) as u64,
        file_size: len as u64,
        physical_size: len.next_multiple_of(512) as u64,
        create_time: EfiTime::default(),
        last_access_time: EfiTime::default(),
        modification_time: EfiTime::default(),
        attribute: FileAttributes::ARCHIVE,
    };
    let mut record = vec![0u8; size_of::<FileInfoHeader>()];
    // SAFETY: `record` holds a full header; the write is unaligned.
    unsafe {
        record
            .as_mut_ptr()
            .cast::<FileInfoHeader>()
            .write_unaligned(header);
    }
    record.extend_from_slice(&name);
    record
}

fn file_system_info_record() -> Vec<u8> {
    let label = ucs2_bytes("ESP");
    let mut record = vec![0u8; FileSystemInfo::LABEL_OFFSET];
    let size = (FileSystemInfo::LABEL_OFFSET + label.len()) as u64;
    record[0..8].copy_from_slice(&size.to_le_bytes());
    record[16..24].copy_from_slice(&(64u64 << 20).to_le_bytes());
    record[24..32].copy_from_slice(&(60u64 << 20).to_le_bytes());
    record[32..36].copy_from_slice(&512u32.to_le_bytes());
    record.extend_from_slice(&label);
    record
}

unsafe extern "efiapi" fn file_open(
    this: *mut FileProtocol,
    new_handle: *mut *mut FileProtocol,
    file_name: *const u16,
    _open_mode: FileMode,
    _attributes: FileAttributes,
) -> EfiStatus {
    // SAFETY: the wrapper passes a terminated name.
    let name = String::from_utf16_lossy(&unsafe { read_ucs2(file_name) });
    with(|s| {
        s.opened.push(name);
        s.file_position = 0;
    });
    // SAFETY: valid out-pointer.
    unsafe { *new_handle = this };
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn file_close(_this: *mut FileProtocol) -> EfiStatus {
    with(|s| s.closed += 1);
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn file_delete(_this: *mut FileProtocol) -> EfiStatus {
    with(|s| {
        s.deleted += 1;
        if s.delete_fails {
            EfiStatus::WARN_DELETE_FAILURE
        } else {
            s.file_data.clear();
            EfiStatus::SUCCESS
        }
    })
}

unsafe extern "efiapi" fn file_read(
    _this: *mut FileProtocol,
    buffer_size: *mut usize,
    buffer: *mut u8,
) -> EfiStatus {
    with(|s| {
        let remaining = &s.file_data[s.file_position.min(s.file_data.len())..];
        // SAFETY: `buffer` is valid for `*buffer_size` bytes.
        unsafe {
            let n = remaining.len().min(*buffer_size);
            ptr::copy_nonoverlapping(remaining.as_ptr(), buffer, n);
            *buffer_size = n;
            s.file_position += n;
        }
        EfiStatus::SUCCESS
    })
}

unsafe extern "efiapi" fn file_write(
    _this: *mut FileProtocol,
    buffer_size: *mut usize,
    buffer: *const u8,
) -> EfiStatus {
    // SAFETY: `buffer` is valid for `*buffer_size` bytes.
    let data = unsafe { core::slice::from_raw_parts(buffer, *buffer_size) };
    with(|s| {
        let end = s.file_position + data.len();
        if s.file_data.len() < end {
            s.file_data.resize(end, 0);
        }
        s.file_data[s.file_position..end].copy_from_slice(data);
        s.file_position = end;
    });
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn file_get_position(
    _this: *mut FileProtocol,
    position: *mut u64,
) -> EfiStatus {
    // SAFETY: valid out-pointer.
    unsafe { *position = with(|s| s.file_position) as u64 };
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn file_set_position(_this: *mut FileProtocol, position: u64) -> EfiStatus {
    with(|s| {
        s.file_position = if position == u64::MAX {
            s.file_data.len()
        } else {
            usize::try_from(position).unwrap()
        };
    });
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn file_get_info(
    _this: *mut FileProtocol,
    information_type: *const EfiGuid,
    buffer_size: *mut usize,
    buffer: *mut u8,
) -> EfiStatus {
    // SAFETY: valid pointer.
    let record = match unsafe { *information_type } {
        EfiGuid::FILE_INFO => file_info_record(with(|s| s.file_data.len())),
        EfiGuid::FILE_SYSTEM_INFO => file_system_info_record(),
        _ => return EfiStatus::UNSUPPORTED,
    };
    // SAFETY: `buffer` is valid for `*buffer_size` bytes.
    unsafe {
        if *buffer_size < record.len() {
            *buffer_size = record.len();
            return EfiStatus::BUFFER_TOO_SMALL;
        }
        ptr::copy_nonoverlapping(record.as_ptr(), buffer, record.len());
        *buffer_size = record.len();
    }
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn file_set_info(
    _this: *mut FileProtocol,
    _information_type: *const EfiGuid,
    _buffer_size: usize,
    _buffer: *const u8,
) -> EfiStatus {
    EfiStatus::WRITE_PROTECTED
}

unsafe extern "efiapi" fn file_flush(_this: *mut FileProtocol) -> EfiStatus {
    EfiStatus::SUCCESS
}

unsafe extern "efiapi" fn open_volume(
    _this: *mut SimpleFileSystemProtocol,
    root: *mut *mut FileProtocol,
) -> EfiStatus {
    let file = with(|s| {
        s.file_position = 0;
        s.file
    });
    // SAFETY: valid out-pointer.
    unsafe { *root = file as *mut FileProtocol };
    EfiStatus::SUCCESS
}

/// A volume whose root directory doubles as its only file.
pub(crate) struct FakeVolume {
    pub protocol: Box<SimpleFileSystemProtocol>,
    _file: Box<FileProtocol>,
}

/// Builds a volume and registers its file in the current state.
pub(crate) fn volume() -> FakeVolume {
    let mut file = Box::new(FileProtocol {
        revision: 0x0001_0000,
        open: file_open,
        close: file_close,
        delete: file_delete,
        read: file_read,
        write: file_write,
        get_position: file_get_position,
        set_position: file_set_position,
        get_info: file_get_info,
        set_info: file_set_info,
        flush: file_flush,
    });
    let file_ptr: *mut FileProtocol = &raw mut *file;
    with(|s| s.file = file_ptr as usize);
    FakeVolume {
        protocol: Box::new(SimpleFileSystemProtocol {
            revision: 0x0001_0000,
            open_volume,
        }),
        _file: file,
    }
}
