//! UTF-8 to UCS-2 conversion for firmware strings.
//!
//! Firmware strings are null-terminated arrays of UCS-2 code units. Code
//! points outside the Basic Multilingual Plane have no UCS-2 encoding and
//! are replaced with U+FFFD.

use core::fmt;

use crate::EfiStatus;

/// Code units per chunk handed to [`encode_chunked`]'s sink, terminator
/// included.
pub const CHUNK_LEN: usize = 128;

const REPLACEMENT: u16 = 0xFFFD;

fn encode_char(ch: char) -> u16 {
    u16::try_from(u32::from(ch)).unwrap_or(REPLACEMENT)
}

/// Encodes `s` into `buf` as a null-terminated UCS-2 string.
///
/// Returns the number of code units written, terminator included.
///
/// # Errors
///
/// Returns [`EfiStatus::BUFFER_TOO_SMALL`] if `s` and its terminator do not
/// fit in `buf`.
pub fn encode_into(s: &str, buf: &mut [u16]) -> Result<usize, EfiStatus> {
    let mut len = 0;
    for ch in s.chars() {
        if len + 1 >= buf.len() {
            return Err(EfiStatus::BUFFER_TOO_SMALL);
        }
        buf[len] = encode_char(ch);
        len += 1;
    }
    let terminator = buf.get_mut(len).ok_or(EfiStatus::BUFFER_TOO_SMALL)?;
    *terminator = 0;
    Ok(len + 1)
}

/// Encodes `s` in null-terminated chunks of at most [`CHUNK_LEN`] units.
///
/// Each chunk is passed to `sink`, terminator included, and the first error
/// stops the encoding. With `crlf` set, every `\n` becomes `\r\n`; the pair
/// is never split across chunks.
///
/// # Errors
///
/// Returns the first error reported by `sink`.
pub fn encode_chunked<F>(s: &str, crlf: bool, mut sink: F) -> Result<(), EfiStatus>
where
    F: FnMut(&[u16]) -> Result<(), EfiStatus>,
{
    let mut buf = [0u16; CHUNK_LEN];
    let mut len = 0;

    for ch in s.chars() {
        let needed = if crlf && ch == '\n' { 2 } else { 1 };
        if len + needed >= CHUNK_LEN {
            buf[len] = 0;
            sink(&buf[..=len])?;
            len = 0;
        }
        if needed == 2 {
            buf[len] = u16::from(b'\r');
            len += 1;
        }
        buf[len] = encode_char(ch);
        len += 1;
    }

    if len > 0 {
        buf[len] = 0;
        sink(&buf[..=len])?;
    }
    Ok(())
}

/// Displays a UCS-2 string, stopping at the first null.
///
/// Unpaired surrogates are shown as U+FFFD.
#[derive(Clone, Copy)]
pub struct Ucs2Display<'a>(pub &'a [u16]);

impl fmt::Display for Ucs2Display<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.iter().position(|&unit| unit == 0).unwrap_or(self.0.len());
        char::decode_utf16(self.0[..end].iter().copied())
            .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
            .try_for_each(|ch| fmt::Write::write_char(f, ch))
    }
}

impl fmt::Debug for Ucs2Display<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
