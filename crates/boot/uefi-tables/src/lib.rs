//! Binary-compatible UEFI tables with thin, safe wrappers.
//!
//! This crate describes the firmware tables a UEFI application receives at its
//! entry point (the system table, boot services, runtime services, and the
//! console and file protocols) as `#[repr(C)]` types, and layers safe wrappers
//! on top of them. Two pieces carry real logic:
//!
//! - [`crc32`] - the CRC-32 engine used to compute and verify the checksum
//!   embedded in every [`TableHeader`](table::TableHeader).
//! - [`api::memory`] - the `GetMemoryMap` size negotiation that produces an
//!   owned, stride-aware [`MemoryMap`](api::MemoryMap).
//!
//! # Layering
//!
//! - [`status`], [`guid`], [`time`], [`memory`] - plain data types.
//! - [`ucs2`] - conversion between Rust strings and firmware strings.
//! - [`table`], [`protocol`] - raw firmware layouts and function tables.
//! - [`api`] - the only place that calls through firmware function pointers.
//!   The memory map acquirer depends on the [`MemoryServices`](api::MemoryServices)
//!   trait rather than on the raw boot services table, so it can be driven by
//!   a mock on the host.
//!
//! # Execution model
//!
//! UEFI boot-time code is single-threaded. None of the wrappers lock anything,
//! and none of the raw types are `Send` or `Sync`.

#![cfg_attr(not(test), no_std)]

pub mod api;
pub mod crc32;
pub mod guid;
pub mod memory;
pub mod protocol;
pub mod status;
pub mod table;
pub mod time;
pub mod ucs2;

use core::ffi::c_void;
use core::fmt;

pub use guid::EfiGuid;
pub use status::EfiStatus;

/// An opaque handle to a UEFI object (image, device, protocol owner).
pub type EfiHandle = *mut c_void;

/// An opaque handle to a UEFI event.
pub type EfiEvent = *mut c_void;

/// A physical memory address.
pub type EfiPhysicalAddress = u64;

/// A virtual memory address.
pub type EfiVirtualAddress = u64;

/// A task priority level.
///
/// Raising the level masks notifications registered at or below it until the
/// previous level is restored. Normal code runs at [`Tpl::APPLICATION`].
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tpl(pub usize);

impl Tpl {
    /// Where all normal execution occurs.
    pub const APPLICATION: Self = Self(4);
    /// Level used by most notification functions.
    pub const CALLBACK: Self = Self(8);
    /// Level of synchronous blocking I/O.
    pub const NOTIFY: Self = Self(16);
    /// Interrupts masked. Reserved for the firmware.
    pub const HIGH_LEVEL: Self = Self(31);
}

impl fmt::Debug for Tpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::APPLICATION => f.write_str("Tpl::APPLICATION"),
            Self::CALLBACK => f.write_str("Tpl::CALLBACK"),
            Self::NOTIFY => f.write_str("Tpl::NOTIFY"),
            Self::HIGH_LEVEL => f.write_str("Tpl::HIGH_LEVEL"),
            Self(level) => write!(f, "Tpl({level})"),
        }
    }
}
