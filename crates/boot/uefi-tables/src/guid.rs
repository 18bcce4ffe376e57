//! UEFI GUIDs.
//!
//! An [`EfiGuid`] names protocols, configuration tables, information types,
//! and variable namespaces. In memory the first three fields are little-endian
//! integers and the last eight bytes are stored as written, so the byte form
//! differs from the canonical text form.

use core::fmt;

/// A 128-bit UEFI globally unique identifier.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EfiGuid {
    /// First group, stored little-endian.
    pub data1: u32,
    /// Second group, stored little-endian.
    pub data2: u16,
    /// Third group, stored little-endian.
    pub data3: u16,
    /// Final eight bytes, stored in order.
    pub data4: [u8; 8],
}

#[expect(
    clippy::unreadable_literal,
    reason = "GUID groups are written as in the UEFI standard"
)]
impl EfiGuid {
    /// The all-zero GUID.
    pub const NULL: Self = Self::new(0, 0, 0, [0; 8]);

    /// Builds a GUID from its text-form groups.
    #[must_use]
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Decodes the 16-byte in-memory representation.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        let [a0, a1, a2, a3, b0, b1, c0, c1, d0, d1, d2, d3, d4, d5, d6, d7] = bytes;
        Self {
            data1: u32::from_le_bytes([a0, a1, a2, a3]),
            data2: u16::from_le_bytes([b0, b1]),
            data3: u16::from_le_bytes([c0, c1]),
            data4: [d0, d1, d2, d3, d4, d5, d6, d7],
        }
    }

    /// Encodes the GUID into its 16-byte in-memory representation.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 16] {
        let [a0, a1, a2, a3] = self.data1.to_le_bytes();
        let [b0, b1] = self.data2.to_le_bytes();
        let [c0, c1] = self.data3.to_le_bytes();
        let [d0, d1, d2, d3, d4, d5, d6, d7] = self.data4;
        [
            a0, a1, a2, a3, b0, b1, c0, c1, d0, d1, d2, d3, d4, d5, d6, d7,
        ]
    }

    // ── Protocols ────────────────────────────────────────────────────

    /// `EFI_SIMPLE_TEXT_INPUT_PROTOCOL`.
    pub const SIMPLE_TEXT_INPUT_PROTOCOL: Self = Self::new(
        0x387477c1,
        0x69c7,
        0x11d2,
        [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
    );

    /// `EFI_SIMPLE_TEXT_OUTPUT_PROTOCOL`.
    pub const SIMPLE_TEXT_OUTPUT_PROTOCOL: Self = Self::new(
        0x387477c2,
        0x69c7,
        0x11d2,
        [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
    );

    /// `EFI_SIMPLE_FILE_SYSTEM_PROTOCOL`.
    pub const SIMPLE_FILE_SYSTEM_PROTOCOL: Self = Self::new(
        0x964e5b22,
        0x6459,
        0x11d2,
        [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
    );

    /// `EFI_LOADED_IMAGE_PROTOCOL`.
    pub const LOADED_IMAGE_PROTOCOL: Self = Self::new(
        0x5b1b31a1,
        0x9562,
        0x11d2,
        [0x8e, 0x3f, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
    );

    // ── File information types ───────────────────────────────────────

    /// `EFI_FILE_INFO_ID`, used with `GetInfo` on a file handle.
    pub const FILE_INFO: Self = Self::new(
        0x09576e92,
        0x6d3f,
        0x11d2,
        [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
    );

    /// `EFI_FILE_SYSTEM_INFO_ID`, used with `GetInfo` on a volume root.
    pub const FILE_SYSTEM_INFO: Self = Self::new(
        0x09576e93,
        0x6d3f,
        0x11d2,
        [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
    );

    /// `EFI_FILE_SYSTEM_VOLUME_LABEL_ID`.
    pub const FILE_SYSTEM_VOLUME_LABEL: Self = Self::new(
        0xdb47d7d3,
        0xfe81,
        0x11d3,
        [0x9a, 0x35, 0x00, 0x90, 0x27, 0x3f, 0xc1, 0x4d],
    );

    // ── Variable namespaces ──────────────────────────────────────────

    /// `EFI_GLOBAL_VARIABLE`, the namespace of architecturally defined variables.
    pub const GLOBAL_VARIABLE: Self = Self::new(
        0x8be4df61,
        0x93ca,
        0x11d2,
        [0xaa, 0x0d, 0x00, 0xe0, 0x98, 0x03, 0x2b, 0x8c],
    );
}

impl fmt::Display for EfiGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for EfiGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EfiGuid({self})")
    }
}

const _: () = assert!(core::mem::size_of::<EfiGuid>() == 16);
