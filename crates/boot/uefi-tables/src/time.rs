//! Calendar time as exchanged with the runtime clock services.

use core::fmt;

use bitflags::bitflags;

/// `time_zone` value meaning "local time, offset unknown".
pub const UNSPECIFIED_TIMEZONE: i16 = 0x07FF;

bitflags! {
    /// Daylight saving flags of [`EfiTime`].
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Daylight: u8 {
        /// The time should be adjusted for daylight saving time.
        const ADJUST_DAYLIGHT = 0x01;
        /// The time has been adjusted for daylight saving time.
        const IN_DAYLIGHT = 0x02;
    }
}

/// `EFI_TIME`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfiTime {
    /// 1900 through 9999.
    pub year: u16,
    /// 1 through 12.
    pub month: u8,
    /// 1 through 31, bounded by the month.
    pub day: u8,
    /// 0 through 23.
    pub hour: u8,
    /// 0 through 59.
    pub minute: u8,
    /// 0 through 59.
    pub second: u8,
    /// Padding.
    pub pad1: u8,
    /// 0 through 999,999,999.
    pub nanosecond: u32,
    /// Offset from UTC in minutes (-1440 through 1440), or [`UNSPECIFIED_TIMEZONE`].
    pub time_zone: i16,
    /// Daylight saving flags.
    pub daylight: Daylight,
    /// Padding.
    pub pad2: u8,
}

impl EfiTime {
    /// A time in an unspecified time zone with no daylight adjustment.
    #[must_use]
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            pad1: 0,
            nanosecond: 0,
            time_zone: UNSPECIFIED_TIMEZONE,
            daylight: Daylight::empty(),
            pad2: 0,
        }
    }

    /// Returns `true` if every field is within the range `SetTime` accepts.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.year >= 1900
            && self.year <= 9999
            && self.month >= 1
            && self.month <= 12
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
            && self.nanosecond < 1_000_000_000
            && (self.time_zone == UNSPECIFIED_TIMEZONE
                || (self.time_zone >= -1440 && self.time_zone <= 1440))
    }

    /// The UTC offset in minutes, or `None` if the clock runs in local time.
    #[must_use]
    pub const fn utc_offset(&self) -> Option<i16> {
        if self.time_zone == UNSPECIFIED_TIMEZONE {
            None
        } else {
            Some(self.time_zone)
        }
    }
}

impl Default for EfiTime {
    fn default() -> Self {
        Self::new(1900, 1, 1, 0, 0, 0)
    }
}

impl fmt::Display for EfiTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )?;
        match self.utc_offset() {
            Some(offset) => {
                let sign = if offset < 0 { '-' } else { '+' };
                let minutes = offset.unsigned_abs();
                write!(f, " UTC{sign}{:02}:{:02}", minutes / 60, minutes % 60)
            }
            None => Ok(()),
        }
    }
}

const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// `EFI_TIME_CAPABILITIES`, the real-time clock's characteristics.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EfiTimeCapabilities {
    /// Counts per second.
    pub resolution: u32,
    /// Error rate in parts per million.
    pub accuracy: u32,
    /// Whether setting the time clears sub-resolution state.
    pub sets_to_zero: bool,
}

const _: () = {
    assert!(core::mem::size_of::<EfiTime>() == 16);
    assert!(core::mem::offset_of!(EfiTime, nanosecond) == 8);
    assert!(core::mem::offset_of!(EfiTime, time_zone) == 12);
    assert!(core::mem::size_of::<EfiTimeCapabilities>() == 12);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leap_days() {
        assert!(EfiTime::new(2024, 2, 29, 0, 0, 0).is_valid());
        assert!(!EfiTime::new(2023, 2, 29, 0, 0, 0).is_valid());
        assert!(!EfiTime::new(1900, 2, 29, 0, 0, 0).is_valid());
        assert!(EfiTime::new(2000, 2, 29, 0, 0, 0).is_valid());
    }

    #[test]
    fn field_ranges() {
        assert!(!EfiTime::new(1899, 12, 31, 0, 0, 0).is_valid());
        assert!(!EfiTime::new(2024, 13, 1, 0, 0, 0).is_valid());
        assert!(!EfiTime::new(2024, 4, 31, 0, 0, 0).is_valid());
        assert!(!EfiTime::new(2024, 1, 1, 24, 0, 0).is_valid());

        let mut time = EfiTime::new(2024, 1, 1, 12, 0, 0);
        time.time_zone = 1441;
        assert!(!time.is_valid());
        time.time_zone = -60;
        assert!(time.is_valid());
        time.nanosecond = 1_000_000_000;
        assert!(!time.is_valid());
    }

    #[test]
    fn default_is_local_time() {
        let time = EfiTime::default();
        assert!(time.is_valid());
        assert_eq!(time.utc_offset(), None);
    }

    #[test]
    fn display_includes_known_offsets() {
        let mut time = EfiTime::new(2024, 3, 9, 7, 5, 1);
        assert_eq!(time.to_string(), "2024-03-09 07:05:01");
        time.time_zone = -330;
        assert_eq!(time.to_string(), "2024-03-09 07:05:01 UTC-05:30");
        time.time_zone = -30;
        assert_eq!(time.to_string(), "2024-03-09 07:05:01 UTC-00:30");
    }
}
