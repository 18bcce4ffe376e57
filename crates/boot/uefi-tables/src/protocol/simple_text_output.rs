//! `EFI_SIMPLE_TEXT_OUTPUT_PROTOCOL`.

use crate::EfiStatus;

/// Function table of a text output device.
#[repr(C)]
pub struct SimpleTextOutputProtocol {
    /// Resets the device.
    pub reset: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        extended_verification: bool,
    ) -> EfiStatus,
    /// Writes a null-terminated UCS-2 string at the cursor.
    pub output_string: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        string: *const u16,
    ) -> EfiStatus,
    /// Checks that every character of a string can be rendered.
    pub test_string: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        string: *const u16,
    ) -> EfiStatus,
    /// Reports the geometry of a text mode.
    pub query_mode: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        mode_number: usize,
        columns: *mut usize,
        rows: *mut usize,
    ) -> EfiStatus,
    /// Switches to a text mode.
    pub set_mode: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        mode_number: usize,
    ) -> EfiStatus,
    /// Sets the colors used by later output.
    pub set_attribute: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        attribute: usize,
    ) -> EfiStatus,
    /// Clears the display to the current background color.
    pub clear_screen: unsafe extern "efiapi" fn(this: *mut SimpleTextOutputProtocol) -> EfiStatus,
    /// Moves the cursor.
    pub set_cursor_position: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        column: usize,
        row: usize,
    ) -> EfiStatus,
    /// Shows or hides the cursor.
    pub enable_cursor: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        visible: bool,
    ) -> EfiStatus,
    /// The device's current state.
    pub mode: *mut TextOutputMode,
}

/// State of a text output device, owned by the firmware.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TextOutputMode {
    /// Number of modes accepted by `query_mode` and `set_mode`.
    pub max_mode: i32,
    /// Current mode.
    pub mode: i32,
    /// Current attribute, as passed to `set_attribute`.
    pub attribute: i32,
    /// Cursor column.
    pub cursor_column: i32,
    /// Cursor row.
    pub cursor_row: i32,
    /// Whether the cursor is shown.
    pub cursor_visible: bool,
}

/// The sixteen console colors.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[expect(missing_docs, reason = "color names are self-describing")]
pub enum Color {
    Black = 0x0,
    Blue = 0x1,
    Green = 0x2,
    Cyan = 0x3,
    Red = 0x4,
    Magenta = 0x5,
    Brown = 0x6,
    LightGray = 0x7,
    DarkGray = 0x8,
    LightBlue = 0x9,
    LightGreen = 0xA,
    LightCyan = 0xB,
    LightRed = 0xC,
    LightMagenta = 0xD,
    Yellow = 0xE,
    White = 0xF,
}

/// A foreground/background pair for `set_attribute`.
///
/// Only the eight dark colors are valid backgrounds; the high bit of a
/// background is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextAttribute {
    /// Foreground color.
    pub foreground: Color,
    /// Background color.
    pub background: Color,
}

impl TextAttribute {
    /// Light gray on black, the firmware default.
    pub const DEFAULT: Self = Self::new(Color::LightGray, Color::Black);

    /// Pairs two colors.
    #[must_use]
    pub const fn new(foreground: Color, background: Color) -> Self {
        Self {
            foreground,
            background,
        }
    }

    /// The packed value `set_attribute` expects.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        ((self.background as usize & 0x7) << 4) | self.foreground as usize
    }
}

impl Default for TextAttribute {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const _: () = assert!(core::mem::size_of::<TextOutputMode>() == 24);

#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<SimpleTextOutputProtocol>() == 80);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_packing() {
        assert_eq!(TextAttribute::DEFAULT.as_usize(), 0x07);
        assert_eq!(TextAttribute::new(Color::Yellow, Color::Blue).as_usize(), 0x1E);
    }

    #[test]
    fn bright_backgrounds_are_dimmed() {
        let attr = TextAttribute::new(Color::White, Color::LightRed);
        assert_eq!(attr.as_usize(), 0x4F);
    }
}
