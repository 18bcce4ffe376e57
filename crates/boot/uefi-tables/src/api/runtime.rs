use core::ffi::c_void;
use core::ptr;

use bitflags::bitflags;

use crate::table::{self, ResetType};
use crate::time::{EfiTime, EfiTimeCapabilities};
use crate::{EfiGuid, EfiStatus, ucs2};

/// Longest variable name accepted by the name-taking methods, in UCS-2
/// units including the terminator.
pub const MAX_VARIABLE_NAME: usize = 256;

bitflags! {
    /// Attributes of a firmware variable.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VariableAttributes: u32 {
        /// Survives a reset.
        const NON_VOLATILE = 0x0000_0001;
        /// Visible during boot services.
        const BOOTSERVICE_ACCESS = 0x0000_0002;
        /// Visible after `ExitBootServices`. Requires `BOOTSERVICE_ACCESS`.
        const RUNTIME_ACCESS = 0x0000_0004;
        /// Hardware error record.
        const HARDWARE_ERROR_RECORD = 0x0000_0008;
        /// Deprecated count-based authentication.
        const AUTHENTICATED_WRITE_ACCESS = 0x0000_0010;
        /// Time-based authentication.
        const TIME_BASED_AUTHENTICATED_WRITE_ACCESS = 0x0000_0020;
        /// Writes append to the existing value.
        const APPEND_WRITE = 0x0000_0040;
        /// Enhanced authentication.
        const ENHANCED_AUTHENTICATED_ACCESS = 0x0000_0080;
    }
}

/// Variable storage usage reported by `QueryVariableInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableStorageInfo {
    /// Storage available for variables with the queried attributes.
    pub maximum_storage_size: u64,
    /// Storage left.
    pub remaining_storage_size: u64,
    /// Largest single variable.
    pub maximum_variable_size: u64,
}

/// Safe wrapper around the runtime services table.
///
/// Usable before and after `ExitBootServices`.
#[derive(Clone, Copy)]
pub struct RuntimeServices<'st> {
    raw: &'st table::RuntimeServices,
}

fn encode_name(name: &str) -> Result<[u16; MAX_VARIABLE_NAME], EfiStatus> {
    let mut buf = [0; MAX_VARIABLE_NAME];
    ucs2::encode_into(name, &mut buf)?;
    Ok(buf)
}

impl<'st> RuntimeServices<'st> {
    pub(crate) fn new(raw: &'st table::RuntimeServices) -> Self {
        Self { raw }
    }

    /// The raw table.
    #[must_use]
    pub fn raw(&self) -> &'st table::RuntimeServices {
        self.raw
    }

    // ── Time ─────────────────────────────────────────────────────

    /// Reads the real-time clock and its capabilities.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR` on a clock failure, `UNSUPPORTED` after
    /// `ExitBootServices` on platforms without a runtime clock.
    pub fn get_time(&self) -> Result<(EfiTime, EfiTimeCapabilities), EfiStatus> {
        let mut time = EfiTime::default();
        let mut capabilities = EfiTimeCapabilities {
            resolution: 0,
            accuracy: 0,
            sets_to_zero: false,
        };
        // SAFETY: both out-pointers are valid.
        unsafe { (self.raw.get_time)(&raw mut time, &raw mut capabilities) }.to_result()?;
        Ok((time, capabilities))
    }

    /// Sets the real-time clock.
    ///
    /// # Errors
    ///
    /// `INVALID_PARAMETER` if a field is out of range (checked before the
    /// call), `DEVICE_ERROR` on a clock failure.
    pub fn set_time(&self, time: &EfiTime) -> Result<(), EfiStatus> {
        if !time.is_valid() {
            return Err(EfiStatus::INVALID_PARAMETER);
        }
        // SAFETY: `time` is a valid pointer.
        unsafe { (self.raw.set_time)(time) }.to_result()
    }

    // ── Variables ────────────────────────────────────────────────

    /// Returns the size and attributes of a variable without reading it.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` if the variable does not exist, `BUFFER_TOO_SMALL` if
    /// `name` is longer than [`MAX_VARIABLE_NAME`].
    pub fn variable_size(
        &self,
        name: &str,
        vendor: &EfiGuid,
    ) -> Result<(usize, VariableAttributes), EfiStatus> {
        let name = encode_name(name)?;
        let mut attributes = 0;
        let mut size = 0;
        // SAFETY: a zero-sized request never writes to the null data pointer.
        let status = unsafe {
            (self.raw.get_variable)(
                name.as_ptr(),
                vendor,
                &raw mut attributes,
                &raw mut size,
                ptr::null_mut(),
            )
        };
        match status {
            EfiStatus::SUCCESS | EfiStatus::BUFFER_TOO_SMALL => {
                Ok((size, VariableAttributes::from_bits_retain(attributes)))
            }
            status => Err(status),
        }
    }

    /// Reads a variable into `buf`.
    ///
    /// Returns the number of bytes written and the variable's attributes.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND`, or `BUFFER_TOO_SMALL` if `buf` cannot hold the value; use
    /// [`variable_size`](Self::variable_size) to size it.
    pub fn get_variable(
        &self,
        name: &str,
        vendor: &EfiGuid,
        buf: &mut [u8],
    ) -> Result<(usize, VariableAttributes), EfiStatus> {
        let name = encode_name(name)?;
        let mut attributes = 0;
        let mut size = buf.len();
        // SAFETY: `buf` is valid for `size` bytes.
        unsafe {
            (self.raw.get_variable)(
                name.as_ptr(),
                vendor,
                &raw mut attributes,
                &raw mut size,
                buf.as_mut_ptr().cast(),
            )
        }
        .to_result()?;
        Ok((size, VariableAttributes::from_bits_retain(attributes)))
    }

    /// Creates or replaces a variable.
    ///
    /// # Errors
    ///
    /// `INVALID_PARAMETER` for an invalid attribute combination,
    /// `OUT_OF_RESOURCES` if storage is full, `WRITE_PROTECTED` for
    /// read-only variables.
    pub fn set_variable(
        &self,
        name: &str,
        vendor: &EfiGuid,
        attributes: VariableAttributes,
        data: &[u8],
    ) -> Result<(), EfiStatus> {
        let name = encode_name(name)?;
        // SAFETY: `data` is valid for its length.
        unsafe {
            (self.raw.set_variable)(
                name.as_ptr(),
                vendor,
                attributes.bits(),
                data.len(),
                data.as_ptr().cast::<c_void>(),
            )
        }
        .to_result()
    }

    /// Deletes a variable.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` if it does not exist.
    pub fn delete_variable(&self, name: &str, vendor: &EfiGuid) -> Result<(), EfiStatus> {
        self.set_variable(name, vendor, VariableAttributes::empty(), &[])
    }

    /// Advances a variable name enumeration.
    ///
    /// Start with an empty string in `name`; each call replaces `name` and
    /// `vendor` with the next variable. Returns `false` once every variable
    /// has been visited.
    ///
    /// # Errors
    ///
    /// `BUFFER_TOO_SMALL` if the next name does not fit in `name`.
    pub fn next_variable_name(
        &self,
        name: &mut [u16],
        vendor: &mut EfiGuid,
    ) -> Result<bool, EfiStatus> {
        let mut size = core::mem::size_of_val(name);
        // SAFETY: `name` is valid for `size` bytes and `vendor` is a valid
        // pointer.
        let status =
            unsafe { (self.raw.get_next_variable_name)(&raw mut size, name.as_mut_ptr(), vendor) };
        match status {
            EfiStatus::NOT_FOUND => Ok(false),
            status => status.to_result().map(|()| true),
        }
    }

    /// Reports storage usage for variables with `attributes`.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` for attribute combinations the platform lacks.
    pub fn query_variable_info(
        &self,
        attributes: VariableAttributes,
    ) -> Result<VariableStorageInfo, EfiStatus> {
        let mut info = VariableStorageInfo {
            maximum_storage_size: 0,
            remaining_storage_size: 0,
            maximum_variable_size: 0,
        };
        // SAFETY: the out-pointers are valid.
        unsafe {
            (self.raw.query_variable_info)(
                attributes.bits(),
                &raw mut info.maximum_storage_size,
                &raw mut info.remaining_storage_size,
                &raw mut info.maximum_variable_size,
            )
        }
        .to_result()?;
        Ok(info)
    }

    // ── Miscellaneous ────────────────────────────────────────────

    /// Reads the high half of the monotonic counter, incrementing it.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR`.
    pub fn next_high_monotonic_count(&self) -> Result<u32, EfiStatus> {
        let mut count = 0;
        // SAFETY: valid out-pointer.
        unsafe { (self.raw.get_next_high_monotonic_count)(&raw mut count) }.to_result()?;
        Ok(count)
    }

    /// Resets the platform.
    pub fn reset(&self, reset_type: ResetType, status: EfiStatus) -> ! {
        // SAFETY: no reset data is passed.
        unsafe { (self.raw.reset_system)(reset_type, status, 0, ptr::null()) }
    }
}
