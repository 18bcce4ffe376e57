use core::ffi::c_void;
use core::ops::Deref;
use core::ptr::{self, NonNull};

use crate::memory::{EfiAllocateType, EfiMemoryType};
use crate::table::{self, LocateSearchType, OpenProtocolAttributes};
use crate::{EfiHandle, EfiPhysicalAddress, EfiStatus, Tpl};

use super::Protocol;
use super::memory::{MemoryMap, MemoryMapConfig, MemoryMapError, MemoryServices};

/// Safe wrapper around the boot services table.
///
/// Borrowed from a [`SystemTable<Boot>`](super::SystemTable), so it cannot
/// outlive `ExitBootServices`.
#[derive(Clone, Copy)]
pub struct BootServices<'st> {
    raw: &'st table::BootServices,
    image_handle: EfiHandle,
}

impl<'st> BootServices<'st> {
    pub(crate) fn new(raw: &'st table::BootServices, image_handle: EfiHandle) -> Self {
        Self { raw, image_handle }
    }

    /// The raw table.
    #[must_use]
    pub fn raw(&self) -> &'st table::BootServices {
        self.raw
    }

    /// The handle of the running image.
    #[must_use]
    pub fn image_handle(&self) -> EfiHandle {
        self.image_handle
    }

    // ── Task priority ────────────────────────────────────────────

    /// Raises the task priority level until the guard is dropped.
    ///
    /// `tpl` must not be below the current level; the firmware does not
    /// report that case.
    #[must_use = "the previous level is restored when the guard is dropped"]
    pub fn raise_tpl(&self, tpl: Tpl) -> TplGuard<'st> {
        // SAFETY: `raise_tpl` has no preconditions beyond a valid level.
        let previous = unsafe { (self.raw.raise_tpl)(tpl) };
        TplGuard {
            raw: self.raw,
            previous,
        }
    }

    // ── Memory ───────────────────────────────────────────────────

    /// Allocates `pages` 4 KiB pages.
    ///
    /// # Errors
    ///
    /// `OUT_OF_RESOURCES`, `NOT_FOUND` if the requested address range is
    /// unavailable, or `INVALID_PARAMETER`.
    pub fn allocate_pages(
        &self,
        alloc_type: EfiAllocateType,
        memory_type: EfiMemoryType,
        pages: usize,
        address: EfiPhysicalAddress,
    ) -> Result<EfiPhysicalAddress, EfiStatus> {
        let mut address = address;
        // SAFETY: `address` is a valid out-pointer for the call.
        let status =
            unsafe { (self.raw.allocate_pages)(alloc_type, memory_type, pages, &raw mut address) };
        status.to_result().map(|()| address)
    }

    /// Frees pages from [`allocate_pages`](Self::allocate_pages).
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` if the range was not allocated.
    ///
    /// # Safety
    ///
    /// Nothing may use the pages afterwards.
    pub unsafe fn free_pages(
        &self,
        address: EfiPhysicalAddress,
        pages: usize,
    ) -> Result<(), EfiStatus> {
        // SAFETY: guaranteed by the caller.
        unsafe { (self.raw.free_pages)(address, pages) }.to_result()
    }

    /// Acquires the current memory map into pool memory.
    ///
    /// # Errors
    ///
    /// See [`MemoryMap::try_acquire`].
    pub fn memory_map(
        &self,
        config: &MemoryMapConfig,
    ) -> Result<MemoryMap<'_, Self>, MemoryMapError> {
        MemoryMap::try_acquire(self, config)
    }

    // ── Protocols ────────────────────────────────────────────────

    /// Looks up `P` on `handle`.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` if the handle does not carry the protocol.
    pub fn handle_protocol<P: Protocol>(
        &self,
        handle: EfiHandle,
    ) -> Result<NonNull<P::Raw>, EfiStatus> {
        let mut interface: *mut c_void = ptr::null_mut();
        // SAFETY: the GUID and out-pointer are valid for the call.
        let status = unsafe { (self.raw.handle_protocol)(handle, &P::GUID, &raw mut interface) };
        status.to_result()?;
        NonNull::new(interface.cast()).ok_or(EfiStatus::UNSUPPORTED)
    }

    /// Opens `P` on `handle` on behalf of `agent`.
    ///
    /// Pair with [`close_protocol`](Self::close_protocol) unless opened with
    /// [`OpenProtocolAttributes::GET_PROTOCOL`]. `TEST_PROTOCOL` returns no
    /// interface and so reports `UNSUPPORTED` here.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED`, `ACCESS_DENIED`, or `ALREADY_STARTED` as reported by
    /// the firmware.
    pub fn open_protocol<P: Protocol>(
        &self,
        handle: EfiHandle,
        agent: EfiHandle,
        controller: EfiHandle,
        attributes: OpenProtocolAttributes,
    ) -> Result<NonNull<P::Raw>, EfiStatus> {
        let mut interface: *mut c_void = ptr::null_mut();
        // SAFETY: the GUID and out-pointer are valid for the call.
        let status = unsafe {
            (self.raw.open_protocol)(
                handle,
                &P::GUID,
                &raw mut interface,
                agent,
                controller,
                attributes,
            )
        };
        status.to_result()?;
        NonNull::new(interface.cast()).ok_or(EfiStatus::UNSUPPORTED)
    }

    /// Closes a protocol opened with [`open_protocol`](Self::open_protocol).
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` if the agent does not hold the protocol open.
    pub fn close_protocol<P: Protocol>(
        &self,
        handle: EfiHandle,
        agent: EfiHandle,
        controller: EfiHandle,
    ) -> Result<(), EfiStatus> {
        // SAFETY: the GUID is valid for the call.
        unsafe { (self.raw.close_protocol)(handle, &P::GUID, agent, controller) }.to_result()
    }

    /// Returns the first installed instance of `P`.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` if no handle carries the protocol.
    pub fn locate_protocol<P: Protocol>(&self) -> Result<NonNull<P::Raw>, EfiStatus> {
        let mut interface: *mut c_void = ptr::null_mut();
        // SAFETY: the GUID and out-pointer are valid for the call.
        let status =
            unsafe { (self.raw.locate_protocol)(&P::GUID, ptr::null_mut(), &raw mut interface) };
        status.to_result()?;
        NonNull::new(interface.cast()).ok_or(EfiStatus::NOT_FOUND)
    }

    /// Lists every handle carrying `P`.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` if there are none, `OUT_OF_RESOURCES` if the list cannot
    /// be allocated.
    pub fn locate_handle_buffer<P: Protocol>(&self) -> Result<HandleBuffer<'st>, EfiStatus> {
        let mut count = 0;
        let mut buffer: *mut EfiHandle = ptr::null_mut();
        // SAFETY: the GUID and out-pointers are valid for the call.
        let status = unsafe {
            (self.raw.locate_handle_buffer)(
                LocateSearchType::ByProtocol,
                &P::GUID,
                ptr::null_mut(),
                &raw mut count,
                &raw mut buffer,
            )
        };
        status.to_result()?;
        let buffer = NonNull::new(buffer).ok_or(EfiStatus::NOT_FOUND)?;
        Ok(HandleBuffer {
            raw: self.raw,
            buffer,
            count,
        })
    }

    // ── Miscellaneous ────────────────────────────────────────────

    /// Busy-waits for at least `microseconds`.
    ///
    /// # Errors
    ///
    /// Propagates the firmware status.
    pub fn stall(&self, microseconds: usize) -> Result<(), EfiStatus> {
        // SAFETY: no preconditions.
        unsafe { (self.raw.stall)(microseconds) }.to_result()
    }

    /// Arms the watchdog for `seconds`, or disarms it with zero.
    ///
    /// The firmware arms a five-minute watchdog before starting an image.
    ///
    /// # Errors
    ///
    /// `INVALID_PARAMETER` for reserved watchdog codes.
    pub fn set_watchdog_timer(&self, seconds: usize, watchdog_code: u64) -> Result<(), EfiStatus> {
        // SAFETY: no watchdog data is passed.
        unsafe { (self.raw.set_watchdog_timer)(seconds, watchdog_code, 0, ptr::null()) }
            .to_result()
    }

    /// Computes a CRC-32 with the firmware's implementation.
    ///
    /// Produces the same value as [`crc32::checksum`](crate::crc32::checksum).
    ///
    /// # Errors
    ///
    /// `INVALID_PARAMETER` for an empty buffer.
    pub fn calculate_crc32(&self, data: &[u8]) -> Result<u32, EfiStatus> {
        let mut crc = 0;
        // SAFETY: `data` is valid for reads of its length.
        let status = unsafe {
            (self.raw.calculate_crc32)(data.as_ptr().cast(), data.len(), &raw mut crc)
        };
        status.to_result().map(|()| crc)
    }

    /// `ExitBootServices` with the given map key.
    ///
    /// # Safety
    ///
    /// On success boot services are gone: nothing borrowed from them may be
    /// used again.
    pub(crate) unsafe fn exit_boot_services(&self, map_key: usize) -> EfiStatus {
        // SAFETY: guaranteed by the caller.
        unsafe { (self.raw.exit_boot_services)(self.image_handle, map_key) }
    }
}

impl MemoryServices for BootServices<'_> {
    unsafe fn get_memory_map(
        &self,
        size: &mut usize,
        buffer: *mut u8,
        map_key: &mut usize,
        descriptor_size: &mut usize,
        descriptor_version: &mut u32,
    ) -> EfiStatus {
        // SAFETY: the buffer contract is the caller's; the rest are
        // references.
        unsafe {
            (self.raw.get_memory_map)(
                size,
                buffer,
                map_key,
                descriptor_size,
                descriptor_version,
            )
        }
    }

    fn allocate_pool(
        &self,
        memory_type: EfiMemoryType,
        size: usize,
    ) -> Result<NonNull<u8>, EfiStatus> {
        let mut buffer: *mut c_void = ptr::null_mut();
        // SAFETY: `buffer` is a valid out-pointer.
        let status = unsafe { (self.raw.allocate_pool)(memory_type, size, &raw mut buffer) };
        status.to_result()?;
        NonNull::new(buffer.cast()).ok_or(EfiStatus::OUT_OF_RESOURCES)
    }

    unsafe fn free_pool(&self, buffer: NonNull<u8>) -> Result<(), EfiStatus> {
        // SAFETY: guaranteed by the caller.
        unsafe { (self.raw.free_pool)(buffer.as_ptr().cast()) }.to_result()
    }
}

/// Restores the previous task priority level on drop.
pub struct TplGuard<'st> {
    raw: &'st table::BootServices,
    previous: Tpl,
}

impl TplGuard<'_> {
    /// The level in effect before the raise.
    #[must_use]
    pub fn previous(&self) -> Tpl {
        self.previous
    }
}

impl Drop for TplGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: `previous` came from the matching `raise_tpl`.
        unsafe { (self.raw.restore_tpl)(self.previous) };
    }
}

/// A pool-allocated list of handles, freed on drop.
pub struct HandleBuffer<'st> {
    raw: &'st table::BootServices,
    buffer: NonNull<EfiHandle>,
    count: usize,
}

impl Deref for HandleBuffer<'_> {
    type Target = [EfiHandle];

    fn deref(&self) -> &[EfiHandle] {
        // SAFETY: the firmware wrote `count` handles into `buffer`.
        unsafe { core::slice::from_raw_parts(self.buffer.as_ptr(), self.count) }
    }
}

impl Drop for HandleBuffer<'_> {
    fn drop(&mut self) {
        // SAFETY: `buffer` was pool-allocated by `LocateHandleBuffer`.
        let status = unsafe { (self.raw.free_pool)(self.buffer.as_ptr().cast()) };
        if status.is_error() {
            log::warn!("failed to free handle buffer: {status}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock;
    use crate::memory::EfiMemoryDescriptor;

    #[test]
    fn tpl_guard_restores_on_drop() {
        mock::reset(mock::State::default());
        let raw = mock::boot_services();
        let bs = BootServices::new(&raw, ptr::null_mut());
        {
            let guard = bs.raise_tpl(Tpl::NOTIFY);
            assert_eq!(guard.previous(), Tpl::APPLICATION);
            assert_eq!(mock::with(|s| s.tpl_calls.len()), 1);
        }
        assert_eq!(
            mock::with(|s| s.tpl_calls.clone()),
            [(true, Tpl::NOTIFY), (false, Tpl::APPLICATION)]
        );
    }

    #[test]
    fn firmware_crc_matches_the_engine() {
        mock::reset(mock::State::default());
        let raw = mock::boot_services();
        let bs = BootServices::new(&raw, ptr::null_mut());
        assert_eq!(bs.calculate_crc32(b"123456789"), Ok(0xCBF4_3926));
        assert_eq!(bs.calculate_crc32(&[]), Err(EfiStatus::INVALID_PARAMETER));
    }

    #[test]
    fn page_allocation_failure_is_reported() {
        mock::reset(mock::State::default());
        let raw = mock::boot_services();
        let bs = BootServices::new(&raw, ptr::null_mut());
        assert_eq!(
            bs.allocate_pages(EfiAllocateType::AnyPages, EfiMemoryType::LOADER_DATA, 4, 0),
            Err(EfiStatus::OUT_OF_RESOURCES)
        );
    }

    #[test]
    fn memory_map_through_the_raw_table() {
        mock::reset(mock::State {
            map: mock::descriptors(3, 48),
            descriptor_size: 48,
            map_key: 7,
            ..mock::State::default()
        });
        let raw = mock::boot_services();
        let bs = BootServices::new(&raw, ptr::null_mut());
        {
            let map = bs.memory_map(&MemoryMapConfig::DEFAULT).unwrap();
            assert_eq!(map.len(), 3);
            assert_eq!(map.map_key(), 7);
            let last: EfiMemoryDescriptor = map.get(2).unwrap();
            assert_eq!(last.physical_start, 0x2000);
            assert_eq!(mock::live_pools(), 1);
        }
        assert_eq!(mock::live_pools(), 0);
    }

    #[test]
    fn pool_round_trip() {
        mock::reset(mock::State::default());
        let raw = mock::boot_services();
        let bs = BootServices::new(&raw, ptr::null_mut());
        let buffer = bs.allocate_pool(EfiMemoryType::LOADER_DATA, 100).unwrap();
        assert_eq!(mock::live_pools(), 1);
        // SAFETY: allocated above and not used again.
        unsafe { bs.free_pool(buffer) }.unwrap();
        assert_eq!(mock::live_pools(), 0);
    }
}
