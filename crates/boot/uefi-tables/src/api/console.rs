use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::EfiStatus;
use crate::protocol::simple_text_input::{InputKey, SimpleTextInputProtocol};
use crate::protocol::simple_text_output::{SimpleTextOutputProtocol, TextAttribute, TextOutputMode};
use crate::ucs2;

/// A text output device.
///
/// All methods take `&self`; the device state lives behind the firmware
/// pointer.
pub struct Console<'st> {
    raw: NonNull<SimpleTextOutputProtocol>,
    _lifetime: PhantomData<&'st ()>,
}

impl Console<'_> {
    pub(crate) fn new(raw: NonNull<SimpleTextOutputProtocol>) -> Self {
        Self {
            raw,
            _lifetime: PhantomData,
        }
    }

    /// Wraps a located output protocol.
    ///
    /// # Safety
    ///
    /// `raw` must stay valid for the chosen lifetime.
    pub unsafe fn from_raw(raw: NonNull<SimpleTextOutputProtocol>) -> Self {
        Self::new(raw)
    }

    fn protocol(&self) -> &SimpleTextOutputProtocol {
        // SAFETY: the pointer is valid for `'st`.
        unsafe { self.raw.as_ref() }
    }

    /// Writes a UTF-8 string at the cursor.
    ///
    /// The string is converted to UCS-2 in 128-unit chunks on the stack and
    /// `\n` becomes `\r\n`.
    ///
    /// # Errors
    ///
    /// The first error from `OutputString`; earlier chunks stay written.
    pub fn output_string(&self, s: &str) -> Result<(), EfiStatus> {
        let output_string = self.protocol().output_string;
        ucs2::encode_chunked(s, true, |chunk| {
            // SAFETY: `chunk` is null-terminated.
            unsafe { output_string(self.raw.as_ptr(), chunk.as_ptr()) }.to_result()
        })
    }

    /// Clears the screen to the current background color.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR` or `UNSUPPORTED`.
    pub fn clear_screen(&self) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.protocol().clear_screen)(self.raw.as_ptr()) }.to_result()
    }

    /// Sets the colors of later output.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR`.
    pub fn set_attribute(&self, attribute: TextAttribute) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.protocol().set_attribute)(self.raw.as_ptr(), attribute.as_usize()) }
            .to_result()
    }

    /// Moves the cursor.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` if the position is outside the current mode.
    pub fn set_cursor_position(&self, column: usize, row: usize) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.protocol().set_cursor_position)(self.raw.as_ptr(), column, row) }
            .to_result()
    }

    /// Shows or hides the cursor.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` if the device cannot hide its cursor.
    pub fn enable_cursor(&self, visible: bool) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.protocol().enable_cursor)(self.raw.as_ptr(), visible) }.to_result()
    }

    /// Returns `(columns, rows)` of text mode `mode`.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` for an unknown mode.
    pub fn query_mode(&self, mode: usize) -> Result<(usize, usize), EfiStatus> {
        let (mut columns, mut rows) = (0, 0);
        // SAFETY: `this` is the protocol's own pointer; out-pointers are valid.
        unsafe {
            (self.protocol().query_mode)(self.raw.as_ptr(), mode, &raw mut columns, &raw mut rows)
        }
        .to_result()
        .map(|()| (columns, rows))
    }

    /// Switches to text mode `mode` and clears the screen.
    ///
    /// # Errors
    ///
    /// `UNSUPPORTED` for an unknown mode.
    pub fn set_mode(&self, mode: usize) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.protocol().set_mode)(self.raw.as_ptr(), mode) }.to_result()
    }

    /// Resets the device.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR`.
    pub fn reset(&self, extended_verification: bool) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.protocol().reset)(self.raw.as_ptr(), extended_verification) }.to_result()
    }

    /// A snapshot of the device state.
    #[must_use]
    pub fn mode(&self) -> Option<TextOutputMode> {
        // SAFETY: a non-null mode pointer refers to the firmware's record.
        unsafe { self.protocol().mode.as_ref().copied() }
    }

    /// Writes `value` formatted by `format`.
    ///
    /// # Errors
    ///
    /// As for [`output_string`](Self::output_string).
    pub fn write_number(&mut self, format: NumberFormat, value: u64) -> Result<(), EfiStatus> {
        let mut buf = [0u8; FormattedNumber::MAX_LEN];
        self.output_string(format.number(value).encode(&mut buf))
    }
}

impl fmt::Write for Console<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output_string(s).map_err(|_| fmt::Error)
    }
}

// ---------------------------------------------------------------------------
// Number formatting
// ---------------------------------------------------------------------------

/// A numeric base between 2 and 36.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Radix(u8);

impl Radix {
    /// Base 2, printed with a `0b` prefix.
    pub const BINARY: Self = Self(2);
    /// Base 8, printed with a `0` prefix.
    pub const OCTAL: Self = Self(8);
    /// Base 10.
    pub const DECIMAL: Self = Self(10);
    /// Base 16, printed with a `0x` prefix.
    pub const HEX: Self = Self(16);

    /// Returns `None` unless `2 <= base <= 36`.
    #[must_use]
    pub const fn new(base: u8) -> Option<Self> {
        if matches!(base, 2..=36) {
            Some(Self(base))
        } else {
            None
        }
    }

    /// The base.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    const fn prefix(self) -> &'static str {
        match self.0 {
            2 => "0b",
            8 => "0",
            16 => "0x",
            _ => "",
        }
    }
}

/// How numbers and booleans are printed on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    /// Base of integers.
    pub radix: Radix,
    /// Print booleans as `true`/`false` instead of `1`/`0`.
    pub alpha_bools: bool,
}

impl NumberFormat {
    /// Decimal with `true`/`false`.
    pub const DEFAULT: Self = Self {
        radix: Radix::DECIMAL,
        alpha_bools: true,
    };

    /// Same format in another base.
    #[must_use]
    pub const fn with_radix(mut self, radix: Radix) -> Self {
        self.radix = radix;
        self
    }

    /// Same format with booleans as `true`/`false` or `1`/`0`.
    #[must_use]
    pub const fn with_alpha_bools(mut self, alpha_bools: bool) -> Self {
        self.alpha_bools = alpha_bools;
        self
    }

    /// A [`Display`](fmt::Display) adapter for `value`.
    #[must_use]
    pub const fn number(self, value: u64) -> FormattedNumber {
        FormattedNumber {
            value,
            radix: self.radix,
        }
    }

    /// The text for `value`.
    #[must_use]
    pub const fn boolean(self, value: bool) -> &'static str {
        match (self.alpha_bools, value) {
            (true, true) => "true",
            (true, false) => "false",
            (false, true) => "1",
            (false, false) => "0",
        }
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An integer printed in a [`Radix`] with its prefix and uppercase digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattedNumber {
    value: u64,
    radix: Radix,
}

impl FormattedNumber {
    /// Longest possible text: `u64::MAX` in base 2 with its `0b` prefix.
    const MAX_LEN: usize = 66;

    /// Writes the text right-aligned into `buf` and returns it.
    #[expect(clippy::cast_possible_truncation, reason = "a digit is below 36")]
    fn encode(self, buf: &mut [u8; Self::MAX_LEN]) -> &str {
        const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

        let base = u64::from(self.radix.0);
        let mut value = self.value;
        let mut start = buf.len();
        loop {
            start -= 1;
            buf[start] = DIGITS[(value % base) as usize];
            value /= base;
            if value == 0 {
                break;
            }
        }
        let prefix = self.radix.prefix().as_bytes();
        start -= prefix.len();
        buf[start..start + prefix.len()].copy_from_slice(prefix);

        core::str::from_utf8(&buf[start..]).unwrap_or_default()
    }
}

impl fmt::Display for FormattedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; Self::MAX_LEN];
        f.write_str(self.encode(&mut buf))
    }
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

/// A keyboard.
pub struct TextInput<'st> {
    raw: NonNull<SimpleTextInputProtocol>,
    _lifetime: PhantomData<&'st ()>,
}

impl TextInput<'_> {
    pub(crate) fn new(raw: NonNull<SimpleTextInputProtocol>) -> Self {
        Self {
            raw,
            _lifetime: PhantomData,
        }
    }

    /// Wraps a located input protocol.
    ///
    /// # Safety
    ///
    /// `raw` must stay valid for the chosen lifetime.
    pub unsafe fn from_raw(raw: NonNull<SimpleTextInputProtocol>) -> Self {
        Self::new(raw)
    }

    /// Returns the next keystroke, or `None` if none is waiting.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR` if the keyboard failed.
    pub fn read_key(&self) -> Result<Option<InputKey>, EfiStatus> {
        let mut key = InputKey::default();
        // SAFETY: `this` is the protocol's own pointer; `key` is a valid
        // out-pointer.
        let status =
            unsafe { (self.raw.as_ref().read_key_stroke)(self.raw.as_ptr(), &raw mut key) };
        match status {
            EfiStatus::NOT_READY => Ok(None),
            status => status.to_result().map(|()| Some(key)),
        }
    }

    /// Spins until a key arrives.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR` if the keyboard failed; the loop does not retry it.
    pub fn read_key_blocking(&self) -> Result<InputKey, EfiStatus> {
        loop {
            if let Some(key) = self.read_key()? {
                return Ok(key);
            }
            core::hint::spin_loop();
        }
    }

    /// Discards pending keystrokes.
    ///
    /// # Errors
    ///
    /// `DEVICE_ERROR`.
    pub fn reset(&self) -> Result<(), EfiStatus> {
        // SAFETY: `this` is the protocol's own pointer.
        unsafe { (self.raw.as_ref().reset)(self.raw.as_ptr(), false) }.to_result()
    }
}
