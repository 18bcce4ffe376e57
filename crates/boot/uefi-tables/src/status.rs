//! UEFI status codes.
//!
//! Every firmware service returns an [`EfiStatus`]. The value space is split
//! by the high bit of `usize`:
//!
//! - `0` is success,
//! - `1..HIGH_BIT` are warnings (the operation completed, with a caveat),
//! - values with the high bit set are errors.
//!
//! Firmware wrappers in [`api`](crate::api) turn statuses into `Result`s with
//! [`EfiStatus::to_result`], which treats warnings as success.

use core::fmt;

/// The high bit of `usize`, which marks a status as an error.
const ERROR_BIT: usize = 1 << (usize::BITS - 1);

const fn error(code: usize) -> EfiStatus {
    EfiStatus(ERROR_BIT | code)
}

const fn warning(code: usize) -> EfiStatus {
    EfiStatus(code)
}

/// A UEFI status code (`EFI_STATUS`).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EfiStatus(pub usize);

/// Declares the known status codes and their `EFI_*` names in one place.
macro_rules! status_codes {
    ($($(#[$doc:meta])* $name:ident = $value:expr;)*) => {
        impl EfiStatus {
            $(
                $(#[$doc])*
                pub const $name: Self = $value;
            )*

            /// Returns the UEFI name of this status, if it is a known code.
            #[must_use]
            pub const fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$name => Some(concat!("EFI_", stringify!($name))),)*
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    /// The operation completed successfully.
    SUCCESS = EfiStatus(0);

    /// Some characters of a string could not be rendered and were skipped.
    WARN_UNKNOWN_GLYPH = warning(1);
    /// The handle was closed, but the file was not deleted.
    WARN_DELETE_FAILURE = warning(2);
    /// The handle was closed, but the data was not flushed properly.
    WARN_WRITE_FAILURE = warning(3);
    /// The buffer was too small and the data was truncated.
    WARN_BUFFER_TOO_SMALL = warning(4);
    /// The data has not been updated within the timeframe set by local policy.
    WARN_STALE_DATA = warning(5);
    /// The buffer contains a UEFI-compliant file system.
    WARN_FILE_SYSTEM = warning(6);
    /// The operation will be processed across a system reset.
    WARN_RESET_REQUIRED = warning(7);

    /// The image failed to load.
    LOAD_ERROR = error(1);
    /// A parameter was incorrect.
    INVALID_PARAMETER = error(2);
    /// The operation is not supported.
    UNSUPPORTED = error(3);
    /// The buffer was not the proper size for the request.
    BAD_BUFFER_SIZE = error(4);
    /// The buffer is not large enough; the required size is reported alongside.
    BUFFER_TOO_SMALL = error(5);
    /// There is no data pending upon return.
    NOT_READY = error(6);
    /// The physical device reported an error.
    DEVICE_ERROR = error(7);
    /// The device cannot be written to.
    WRITE_PROTECTED = error(8);
    /// A resource has run out.
    OUT_OF_RESOURCES = error(9);
    /// An inconsistency was detected on the file system.
    VOLUME_CORRUPTED = error(10);
    /// There is no more space on the file system.
    VOLUME_FULL = error(11);
    /// The device does not contain any medium.
    NO_MEDIA = error(12);
    /// The medium in the device has changed since the last access.
    MEDIA_CHANGED = error(13);
    /// The item was not found.
    NOT_FOUND = error(14);
    /// Access was denied.
    ACCESS_DENIED = error(15);
    /// The server was not found or did not respond.
    NO_RESPONSE = error(16);
    /// A mapping to a device does not exist.
    NO_MAPPING = error(17);
    /// The timeout expired.
    TIMEOUT = error(18);
    /// The protocol has not been started.
    NOT_STARTED = error(19);
    /// The protocol has already been started.
    ALREADY_STARTED = error(20);
    /// The operation was aborted.
    ABORTED = error(21);
    /// An ICMP error occurred during a network operation.
    ICMP_ERROR = error(22);
    /// A TFTP error occurred during a network operation.
    TFTP_ERROR = error(23);
    /// A protocol error occurred during a network operation.
    PROTOCOL_ERROR = error(24);
    /// An internal version was incompatible.
    INCOMPATIBLE_VERSION = error(25);
    /// The operation was refused for security reasons.
    SECURITY_VIOLATION = error(26);
    /// A CRC error was detected.
    CRC_ERROR = error(27);
    /// The beginning or end of the media was reached.
    END_OF_MEDIA = error(28);
    /// The end of the file was reached.
    END_OF_FILE = error(31);
    /// The language specified was invalid.
    INVALID_LANGUAGE = error(32);
    /// The security status of the data is unknown or compromised.
    COMPROMISED_DATA = error(33);
    /// An address conflict was detected during IP configuration.
    IP_ADDRESS_CONFLICT = error(34);
    /// An HTTP error occurred during a network operation.
    HTTP_ERROR = error(35);
}

impl EfiStatus {
    /// Returns `true` for [`EfiStatus::SUCCESS`].
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the high bit is set.
    #[inline]
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 & ERROR_BIT != 0
    }

    /// Returns `true` for non-zero codes without the high bit.
    #[inline]
    #[must_use]
    pub const fn is_warning(self) -> bool {
        !self.is_success() && !self.is_error()
    }

    /// The code with the error bit stripped.
    #[inline]
    #[must_use]
    pub const fn code(self) -> usize {
        self.0 & !ERROR_BIT
    }

    /// Converts the status into a `Result`, treating warnings as success.
    ///
    /// # Errors
    ///
    /// Returns `Err(self)` if this is an error code.
    #[inline]
    pub const fn to_result(self) -> Result<(), Self> {
        if self.is_error() { Err(self) } else { Ok(()) }
    }
}

impl fmt::Debug for EfiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "EfiStatus({name})"),
            None => write!(f, "EfiStatus({:#x})", self.0),
        }
    }
}

impl fmt::Display for EfiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None if self.is_error() => write!(f, "unknown error {}", self.code()),
            None => write!(f, "unknown warning {}", self.code()),
        }
    }
}

impl core::error::Error for EfiStatus {}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<EfiStatus>() == 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(EfiStatus::SUCCESS.is_success());
        assert!(!EfiStatus::SUCCESS.is_error());
        assert!(EfiStatus::WARN_STALE_DATA.is_warning());
        assert!(EfiStatus::BUFFER_TOO_SMALL.is_error());
        assert!(!EfiStatus::BUFFER_TOO_SMALL.is_warning());
    }

    #[test]
    fn warnings_are_not_errors_in_results() {
        assert_eq!(EfiStatus::WARN_UNKNOWN_GLYPH.to_result(), Ok(()));
        assert_eq!(
            EfiStatus::OUT_OF_RESOURCES.to_result(),
            Err(EfiStatus::OUT_OF_RESOURCES)
        );
    }

    #[test]
    fn error_codes_carry_the_high_bit() {
        assert_eq!(EfiStatus::BUFFER_TOO_SMALL.code(), 5);
        assert_eq!(EfiStatus::BUFFER_TOO_SMALL.0, ERROR_BIT | 5);
        assert_eq!(EfiStatus::SECURITY_VIOLATION.code(), 26);
    }

    #[test]
    fn names_come_from_the_code_table() {
        assert_eq!(EfiStatus::NOT_FOUND.name(), Some("EFI_NOT_FOUND"));
        assert_eq!(
            EfiStatus::WARN_BUFFER_TOO_SMALL.name(),
            Some("EFI_WARN_BUFFER_TOO_SMALL")
        );
        assert_eq!(EfiStatus(ERROR_BIT | 0x1d).name(), None);
    }

    #[test]
    fn display_and_debug() {
        assert_eq!(format!("{}", EfiStatus::LOAD_ERROR), "EFI_LOAD_ERROR");
        assert_eq!(format!("{}", EfiStatus(ERROR_BIT | 99)), "unknown error 99");
        assert_eq!(format!("{}", EfiStatus(42)), "unknown warning 42");
        assert_eq!(format!("{:?}", EfiStatus::SUCCESS), "EfiStatus(EFI_SUCCESS)");
    }
}
