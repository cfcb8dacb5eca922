//! Conversions between the RTC's seconds counter and a Gregorian calendar date and time.
//!
//! The counter holds seconds since the epoch, 1970-01-01 00:00:00. Years are walked one at a
//! time from the epoch, and months one at a time from January, using a fixed month length
//! table with a separate leap-day correction. That keeps `seconds_since_epoch` and
//! `calendar_from_seconds` exact structural inverses of each other over 1970 to 2099.
//!
//! Everything here is in plain binary; BCD is handled at the edges by [`bcd2_to_byte`] and
//! [`byte_to_bcd2`].

/// First year representable by the counter.
pub const EPOCH_YEAR: u16 = 1970;
/// Last year accepted when converting a date to a counter value. Later years are clamped.
pub const MAX_YEAR: u16 = 2099;

pub const SECS_PER_MIN: u32 = 60;
pub const SECS_PER_HOUR: u32 = 3_600;
pub const SECS_PER_DAY: u32 = 86_400;
pub const SECS_PER_YEAR: u32 = 365 * SECS_PER_DAY;
pub const SECS_PER_LEAP_YEAR: u32 = 366 * SECS_PER_DAY;

/// Days per month, with February at 28. Leap days are accounted for separately.
const MONTH_TABLE: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A time of day, in binary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, defmt::Format)]
pub struct WallTime {
    /// 0 - 23
    pub hours: u8,
    /// 0 - 59
    pub minutes: u8,
    /// 0 - 59
    pub seconds: u8,
}

impl WallTime {
    pub const fn new(hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// `true` if all fields are in their 24-hour range.
    pub fn is_valid(&self) -> bool {
        self.hours < 24 && self.minutes < 60 && self.seconds < 60
    }

    /// Seconds elapsed since midnight.
    pub fn secs_into_day(&self) -> u32 {
        self.hours as u32 * SECS_PER_HOUR + self.minutes as u32 * SECS_PER_MIN + self.seconds as u32
    }
}

/// A calendar date, in binary, with the full 4-digit year.
#[derive(Clone, Copy, Debug, Eq, PartialEq, defmt::Format)]
pub struct CalendarDate {
    /// 1970 - 2099
    pub year: u16,
    /// 1 - 12
    pub month: u8,
    /// 1 - 31, depending on the month and year.
    pub day: u8,
    /// 0 = Sunday, 1 = Monday, ... 6 = Saturday. Derived; ignored when converting to seconds.
    pub weekday: u8,
}

impl CalendarDate {
    /// Create a date, computing its weekday.
    pub fn new(year: u16, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            weekday: weekday_of(year, month, day),
        }
    }
}

impl Default for CalendarDate {
    /// The epoch; a Thursday.
    fn default() -> Self {
        Self::new(EPOCH_YEAR, 1, 1)
    }
}

/// Check if year is a leap year (Gregorian calendar): divisible by 4, except
/// centuries that aren't divisible by 400.
pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1 - 12) of `year`. Returns 0 for an invalid month.
pub fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        1..=12 => MONTH_TABLE[month as usize - 1],
        _ => 0,
    }
}

/// Clamp a full year into the range the counter conversion supports, 1970 - 2099.
pub fn clamp_year(year: i32) -> u16 {
    year.clamp(EPOCH_YEAR as i32, MAX_YEAR as i32) as u16
}

/// Convert a date and time to a counter value: seconds since 1970-01-01 00:00:00.
///
/// The year is clamped to 1970 - 2099. `date.weekday` is ignored. The month and day are
/// expected to be valid for the year; see [`days_in_month`].
pub fn seconds_since_epoch(date: &CalendarDate, time: &WallTime) -> u32 {
    let year = clamp_year(date.year as i32);

    let mut counts: u32 = 0;

    for y in EPOCH_YEAR..year {
        counts += if is_leap_year(y) {
            SECS_PER_LEAP_YEAR
        } else {
            SECS_PER_YEAR
        };
    }

    let months_elapsed = (date.month.saturating_sub(1) as usize).min(MONTH_TABLE.len());
    for len in &MONTH_TABLE[..months_elapsed] {
        counts += *len as u32 * SECS_PER_DAY;
    }

    // February 29th is already behind us.
    if is_leap_year(year) && date.month > 2 {
        counts += SECS_PER_DAY;
    }

    counts += date.day.saturating_sub(1) as u32 * SECS_PER_DAY;
    counts + time.secs_into_day()
}

/// Time of day from a counter value. Any whole days in the counter are discarded.
pub fn wall_time_from_seconds(total: u32) -> WallTime {
    let secs_today = total % SECS_PER_DAY;

    WallTime {
        hours: (secs_today / SECS_PER_HOUR) as u8,
        minutes: ((secs_today % SECS_PER_HOUR) / SECS_PER_MIN) as u8,
        seconds: (secs_today % SECS_PER_MIN) as u8,
    }
}

/// Date from a whole number of days since the epoch.
pub fn date_from_days(days_since_epoch: u32) -> CalendarDate {
    let mut days = days_since_epoch;

    let mut year = EPOCH_YEAR;
    while days >= 365 {
        if is_leap_year(year) {
            if days >= 366 {
                days -= 366;
            } else {
                // Dec 31st of a leap year.
                break;
            }
        } else {
            days -= 365;
        }
        year += 1;
    }

    let leap = is_leap_year(year);
    let mut month_i = 0;
    while days >= 28 {
        let len = if month_i == 1 && leap {
            29
        } else {
            MONTH_TABLE[month_i] as u32
        };

        if days < len {
            break;
        }
        days -= len;
        month_i += 1;
    }

    CalendarDate::new(year, month_i as u8 + 1, days as u8 + 1)
}

/// Convert a counter value to a date and time. The inverse of [`seconds_since_epoch`].
pub fn calendar_from_seconds(total: u32) -> (CalendarDate, WallTime) {
    (
        date_from_days(total / SECS_PER_DAY),
        wall_time_from_seconds(total),
    )
}

/// Day of the week, using a closed-form congruence. 0 = Sunday, 1 = Monday, ... 6 = Saturday.
///
/// `year` is the full year, eg 2024; not an offset from 2000.
pub fn weekday_of(year: u16, month: u8, day: u8) -> u8 {
    let year = year as u32;
    let month = month as u32;
    let day = day as u32;

    let weekday = if month < 3 {
        let prev = year.saturating_sub(1);
        // D = { [(23 x month)/9] + day + 4 + year + [(year-1)/4] - [(year-1)/100] + [(year-1)/400] } mod 7
        ((23 * month) / 9 + day + 4 + year + prev / 4 - prev / 100 + prev / 400) % 7
    } else {
        // D = { [(23 x month)/9] + day + 4 + year + [year/4] - [year/100] + [year/400] - 2 } mod 7
        ((23 * month) / 9 + day + 4 + year + year / 4 - year / 100 + year / 400 - 2) % 7
    };

    weekday as u8
}

// Each nibble of a packed BCD byte holds one decimal digit.

/// Convert a 2-digit packed BCD value to binary, eg `0x59` to `59`.
pub fn bcd2_to_byte(value: u8) -> u8 {
    ((value >> 4) & 0xf) * 10 + (value & 0xf)
}

/// Convert a binary value (0 - 99) to 2-digit packed BCD, eg `59` to `0x59`.
pub fn byte_to_bcd2(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// `true` if both nibbles hold a decimal digit.
pub fn is_bcd(value: u8) -> bool {
    (value >> 4) <= 9 && (value & 0xf) <= 9
}
