//! Memory types, allocation types, and memory descriptors.
//!
//! # Descriptor stride
//!
//! `GetMemoryMap` returns an array whose entries are `descriptor_size` bytes
//! apart. That stride may be larger than [`EfiMemoryDescriptor`]; the extra
//! bytes are reserved for future fields and are never interpreted here. Walk
//! a map through [`RawMemoryMap`](crate::api::RawMemoryMap), which always
//! indexes by the firmware-reported stride.

use core::fmt;

use bitflags::bitflags;

use crate::{EfiPhysicalAddress, EfiVirtualAddress};

/// Size of the pages counted by [`EfiMemoryDescriptor::number_of_pages`].
pub const PAGE_SIZE: u64 = 4096;

/// How `AllocatePages` chooses the address of an allocation.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfiAllocateType {
    /// Any range that satisfies the request.
    AnyPages = 0,
    /// Any range whose last byte is at or below the given address.
    MaxAddress = 1,
    /// Exactly the given address.
    Address = 2,
}

/// The type of a memory region (`EFI_MEMORY_TYPE`).
///
/// Stored as a raw `u32`: firmware and operating systems may place OEM
/// (`0x7000_0000..`) and OS-defined (`0x8000_0000..`) values in a map, and
/// those must round-trip unchanged.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EfiMemoryType(pub u32);

impl EfiMemoryType {
    /// Not usable.
    pub const RESERVED: Self = Self(0);
    /// Code of a loaded UEFI application.
    pub const LOADER_CODE: Self = Self(1);
    /// Data of a loaded UEFI application; the default pool type for loaders.
    pub const LOADER_DATA: Self = Self(2);
    /// Code of a boot services driver.
    pub const BOOT_SERVICES_CODE: Self = Self(3);
    /// Data of a boot services driver.
    pub const BOOT_SERVICES_DATA: Self = Self(4);
    /// Code of a runtime services driver.
    pub const RUNTIME_SERVICES_CODE: Self = Self(5);
    /// Data of a runtime services driver.
    pub const RUNTIME_SERVICES_DATA: Self = Self(6);
    /// Free memory.
    pub const CONVENTIONAL: Self = Self(7);
    /// Memory with detected errors.
    pub const UNUSABLE: Self = Self(8);
    /// Holds ACPI tables; reclaimable once they are parsed.
    pub const ACPI_RECLAIM: Self = Self(9);
    /// Reserved for firmware ACPI non-volatile storage.
    pub const ACPI_NON_VOLATILE: Self = Self(10);
    /// Memory-mapped I/O requested by the firmware.
    pub const MMIO: Self = Self(11);
    /// Memory-mapped I/O port space.
    pub const MMIO_PORT_SPACE: Self = Self(12);
    /// Reserved for processor code.
    pub const PAL_CODE: Self = Self(13);
    /// Byte-addressable non-volatile memory.
    pub const PERSISTENT: Self = Self(14);
    /// Memory not yet accepted by the isolation architecture.
    pub const UNACCEPTED: Self = Self(15);

    /// First OEM-defined type.
    pub const OEM_START: u32 = 0x7000_0000;
    /// First OS-loader-defined type.
    pub const OS_START: u32 = 0x8000_0000;

    /// Returns `true` for regions an OS may use freely once boot services
    /// have been exited.
    #[must_use]
    pub const fn is_free_after_exit(self) -> bool {
        matches!(
            self,
            Self::CONVENTIONAL
                | Self::LOADER_CODE
                | Self::LOADER_DATA
                | Self::BOOT_SERVICES_CODE
                | Self::BOOT_SERVICES_DATA
        )
    }

    /// Returns `true` for regions that must stay mapped for runtime services.
    #[must_use]
    pub const fn is_runtime(self) -> bool {
        matches!(self, Self::RUNTIME_SERVICES_CODE | Self::RUNTIME_SERVICES_DATA)
    }

    /// The UEFI name of a standard type.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::RESERVED => "EfiReservedMemoryType",
            Self::LOADER_CODE => "EfiLoaderCode",
            Self::LOADER_DATA => "EfiLoaderData",
            Self::BOOT_SERVICES_CODE => "EfiBootServicesCode",
            Self::BOOT_SERVICES_DATA => "EfiBootServicesData",
            Self::RUNTIME_SERVICES_CODE => "EfiRuntimeServicesCode",
            Self::RUNTIME_SERVICES_DATA => "EfiRuntimeServicesData",
            Self::CONVENTIONAL => "EfiConventionalMemory",
            Self::UNUSABLE => "EfiUnusableMemory",
            Self::ACPI_RECLAIM => "EfiACPIReclaimMemory",
            Self::ACPI_NON_VOLATILE => "EfiACPIMemoryNVS",
            Self::MMIO => "EfiMemoryMappedIO",
            Self::MMIO_PORT_SPACE => "EfiMemoryMappedIOPortSpace",
            Self::PAL_CODE => "EfiPalCode",
            Self::PERSISTENT => "EfiPersistentMemory",
            Self::UNACCEPTED => "EfiUnacceptedMemoryType",
            _ => return None,
        })
    }
}

impl fmt::Debug for EfiMemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None if self.0 >= Self::OS_START => write!(f, "OsDefined({:#x})", self.0),
            None if self.0 >= Self::OEM_START => write!(f, "OemDefined({:#x})", self.0),
            None => write!(f, "EfiMemoryType({:#x})", self.0),
        }
    }
}

bitflags! {
    /// Capabilities of a memory region. A set bit means the region *can* be
    /// configured that way, not that it currently is.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EfiMemoryAttributes: u64 {
        /// Uncacheable.
        const UC = 0x0000_0000_0000_0001;
        /// Write-combining.
        const WC = 0x0000_0000_0000_0002;
        /// Write-through.
        const WT = 0x0000_0000_0000_0004;
        /// Write-back.
        const WB = 0x0000_0000_0000_0008;
        /// Uncacheable, exported, supports fetch-and-add.
        const UCE = 0x0000_0000_0000_0010;
        /// Write-protected.
        const WP = 0x0000_0000_0000_1000;
        /// Read-protected.
        const RP = 0x0000_0000_0000_2000;
        /// Execute-protected.
        const XP = 0x0000_0000_0000_4000;
        /// Non-volatile.
        const NV = 0x0000_0000_0000_8000;
        /// Higher reliability than other memory.
        const MORE_RELIABLE = 0x0000_0000_0001_0000;
        /// Supports read-only protection.
        const RO = 0x0000_0000_0002_0000;
        /// Specific-purpose memory.
        const SP = 0x0000_0000_0004_0000;
        /// Supports CPU cryptographic protection.
        const CPU_CRYPTO = 0x0000_0000_0008_0000;
        /// Needs a virtual mapping for runtime services.
        const RUNTIME = 0x8000_0000_0000_0000;

        // Firmware may set bits this crate does not name.
        const _ = !0;
    }
}

/// One entry of the memory map: a contiguous range of physical memory.
///
/// This is the fixed 40-byte prefix of each entry. Entries in a map may be
/// longer; see the module documentation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfiMemoryDescriptor {
    /// Type of the region.
    pub memory_type: EfiMemoryType,
    /// Explicit alignment padding.
    pub pad: u32,
    /// First byte of the region. 4 KiB aligned.
    pub physical_start: EfiPhysicalAddress,
    /// Virtual address of the first byte. Only meaningful after
    /// `SetVirtualAddressMap`.
    pub virtual_start: EfiVirtualAddress,
    /// Number of 4 KiB pages.
    pub number_of_pages: u64,
    /// Capability mask.
    pub attribute: EfiMemoryAttributes,
}

impl EfiMemoryDescriptor {
    /// Size of the region in bytes, saturating on nonsense page counts.
    #[must_use]
    pub const fn size_in_bytes(&self) -> u64 {
        self.number_of_pages.saturating_mul(PAGE_SIZE)
    }

    /// One past the last physical byte of the region.
    #[must_use]
    pub const fn physical_end(&self) -> EfiPhysicalAddress {
        self.physical_start.saturating_add(self.size_in_bytes())
    }

    /// Returns `true` if `address` lies inside the region.
    #[must_use]
    pub const fn contains(&self, address: EfiPhysicalAddress) -> bool {
        address >= self.physical_start && address < self.physical_end()
    }
}

// Descriptors contain no pointers, so the layout is the same on every target.
const _: () = {
    assert!(core::mem::size_of::<EfiMemoryDescriptor>() == 40);
    assert!(core::mem::align_of::<EfiMemoryDescriptor>() == 8);
    assert!(core::mem::offset_of!(EfiMemoryDescriptor, memory_type) == 0);
    assert!(core::mem::offset_of!(EfiMemoryDescriptor, pad) == 4);
    assert!(core::mem::offset_of!(EfiMemoryDescriptor, physical_start) == 8);
    assert!(core::mem::offset_of!(EfiMemoryDescriptor, virtual_start) == 16);
    assert!(core::mem::offset_of!(EfiMemoryDescriptor, number_of_pages) == 24);
    assert!(core::mem::offset_of!(EfiMemoryDescriptor, attribute) == 32);
};
