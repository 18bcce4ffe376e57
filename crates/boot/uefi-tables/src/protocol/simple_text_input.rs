//! `EFI_SIMPLE_TEXT_INPUT_PROTOCOL`.

use crate::{EfiEvent, EfiStatus};

/// Function table of a keyboard-like input device.
#[repr(C)]
pub struct SimpleTextInputProtocol {
    /// Resets the device.
    pub reset: unsafe extern "efiapi" fn(
        this: *mut SimpleTextInputProtocol,
        extended_verification: bool,
    ) -> EfiStatus,
    /// Reads the next keystroke, or returns `NOT_READY`.
    pub read_key_stroke: unsafe extern "efiapi" fn(
        this: *mut SimpleTextInputProtocol,
        key: *mut InputKey,
    ) -> EfiStatus,
    /// Signaled when a keystroke is available.
    pub wait_for_key: EfiEvent,
}

/// A keystroke: either a special key or a character.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputKey {
    /// Non-null for keys without a character.
    pub scan_code: ScanCode,
    /// The UCS-2 character, or zero.
    pub unicode_char: u16,
}

impl InputKey {
    /// The typed character, if the key produced one.
    #[must_use]
    pub fn char(self) -> Option<char> {
        match self.unicode_char {
            0 => None,
            unit => char::from_u32(u32::from(unit)),
        }
    }
}

/// Code of a key that has no character.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScanCode(pub u16);

#[expect(missing_docs, reason = "key names are self-describing")]
impl ScanCode {
    /// The key produced a character instead.
    pub const NULL: Self = Self(0x00);
    pub const UP: Self = Self(0x01);
    pub const DOWN: Self = Self(0x02);
    pub const RIGHT: Self = Self(0x03);
    pub const LEFT: Self = Self(0x04);
    pub const HOME: Self = Self(0x05);
    pub const END: Self = Self(0x06);
    pub const INSERT: Self = Self(0x07);
    pub const DELETE: Self = Self(0x08);
    pub const PAGE_UP: Self = Self(0x09);
    pub const PAGE_DOWN: Self = Self(0x0A);
    pub const F1: Self = Self(0x0B);
    pub const F2: Self = Self(0x0C);
    pub const F3: Self = Self(0x0D);
    pub const F4: Self = Self(0x0E);
    pub const F5: Self = Self(0x0F);
    pub const F6: Self = Self(0x10);
    pub const F7: Self = Self(0x11);
    pub const F8: Self = Self(0x12);
    pub const F9: Self = Self(0x13);
    pub const F10: Self = Self(0x14);
    pub const F11: Self = Self(0x15);
    pub const F12: Self = Self(0x16);
    pub const ESCAPE: Self = Self(0x17);
}

const _: () = assert!(core::mem::size_of::<InputKey>() == 4);

#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<SimpleTextInputProtocol>() == 24);
