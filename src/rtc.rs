//! Real Time Clock
//!
//! Interface to the STM32F1 real time clock. See STM32F1 reference manual (RM0008), section 18.
//!
//! Unlike the RTC on later families, this one has no calendar registers: only a 32-bit
//! seconds counter, prescaler, and alarm. We keep the calendar in software, treating the
//! counter as seconds since 1970-01-01 00:00:00. Dates from 1970 to 2099 are supported.
//!
//! Clock source and prescaler setup (LSE, and a prescaler giving a 1Hz counter) is assumed
//! to be done already, eg after a backup-domain reset at power on.
//!
//! ## Concurrency
//! `set_time`, `set_date`, `set_datetime` and `set_counter` take an advisory lock for the
//! whole configuration mode sequence; a second writer gets `RtcError::Busy`. Reads are
//! lock-free by default. They're protected against the counter's own increments, but not
//! against a concurrent software write of the whole counter: a read racing `set_*` may see
//! the value from before or after the write. Set `RtcConfig::locked_reads` to have reads
//! return `Busy` instead while a write is in progress.

use core::cell::Cell;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use critical_section::Mutex;

use crate::{
    calendar::{
        self, CalendarDate, SECS_PER_DAY, WallTime, bcd2_to_byte, byte_to_bcd2, clamp_year,
        days_in_month, is_bcd,
    },
    counter,
    error::{Error, Result},
    traits::RtcRegs,
    util::MAX_ITERS,
};

/// Years are exchanged as an offset from this.
const YEAR_BASE: i32 = 2000;

/// RTC error type
#[derive(Debug, Clone, Copy, Eq, PartialEq, defmt::Format)]
pub enum RtcError {
    /// The counter overflow flag is set: the counter wrapped, or was never set. Cleared by
    /// setting the time.
    Overflow,
    /// Invalid input error, eg an hour of 24, a month of 13, or a BCD field with a
    /// non-decimal digit.
    InvalidInputData,
    /// Another write is in progress.
    Busy,
    /// The year can't be expressed in BCD format: it's before 2000, or the counter has run
    /// past 2099.
    YearOutOfRange,
}

/// Field format for times and dates passed to, and returned from, the RTC.
#[derive(Clone, Copy, Debug, Eq, PartialEq, defmt::Format)]
#[repr(u8)]
pub enum Format {
    /// Plain binary.
    Bin = 0,
    /// 2-digit packed BCD, eg `0x59` for 59.
    Bcd = 1,
}

impl TryFrom<u32> for Format {
    type Error = Error;

    /// From the numeric format constant: 0 for binary, 1 for BCD.
    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Bin),
            1 => Ok(Self::Bcd),
            _ => Err(RtcError::InvalidInputData.into()),
        }
    }
}

/// Whether a write is in progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq, defmt::Format)]
pub enum RtcState {
    Ready,
    Busy,
}

/// A time of day, with fields in binary or BCD depending on the `Format` it's used with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, defmt::Format)]
pub struct Time {
    /// 0 - 23
    pub hours: u8,
    /// 0 - 59
    pub minutes: u8,
    /// 0 - 59
    pub seconds: u8,
}

impl Time {
    pub const fn new(hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// Decode and validate.
    fn to_binary(&self, format: Format) -> Result<WallTime> {
        let result = WallTime::new(
            field_to_binary(self.hours, format)?,
            field_to_binary(self.minutes, format)?,
            field_to_binary(self.seconds, format)?,
        );

        if !result.is_valid() {
            return Err(RtcError::InvalidInputData.into());
        }
        Ok(result)
    }

    fn from_binary(time: &WallTime, format: Format) -> Self {
        Self {
            hours: field_from_binary(time.hours, format),
            minutes: field_from_binary(time.minutes, format),
            seconds: field_from_binary(time.seconds, format),
        }
    }
}

/// A date, with fields in binary or BCD depending on the `Format` it's used with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, defmt::Format)]
pub struct Date {
    /// Offset from 2000. In binary, -30 - 99 (1970 - 2099); values outside that are clamped
    /// when setting. In BCD, 0x00 - 0x99 (2000 - 2099).
    pub year: i16,
    /// 1 - 12
    pub month: u8,
    /// 1 - 31
    pub day: u8,
    /// 0 = Sunday, 1 = Monday, ... 6 = Saturday. Only filled in by `get_date`; ignored when
    /// setting.
    pub weekday: u8,
}

impl Date {
    pub const fn new(year: i16, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            weekday: 0,
        }
    }

    /// The day of the week, as a `chrono` type.
    pub fn chrono_weekday(&self) -> Weekday {
        match self.weekday % 7 {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            _ => Weekday::Sat,
        }
    }

    /// Decode to a full year, month and day. The year isn't clamped yet.
    fn to_binary(&self, format: Format) -> Result<(i32, u8, u8)> {
        let year = match format {
            Format::Bin => self.year as i32,
            Format::Bcd => {
                if !(0..=0xff).contains(&self.year) {
                    return Err(RtcError::InvalidInputData.into());
                }
                field_to_binary(self.year as u8, format)? as i32
            }
        };

        Ok((
            YEAR_BASE + year,
            field_to_binary(self.month, format)?,
            field_to_binary(self.day, format)?,
        ))
    }

    fn from_binary(date: &CalendarDate, format: Format) -> Result<Self> {
        let year = date.year as i32 - YEAR_BASE;

        let year = match format {
            Format::Bin => year as i16,
            Format::Bcd => {
                if !(0..=99).contains(&year) {
                    return Err(RtcError::YearOutOfRange.into());
                }
                byte_to_bcd2(year as u8) as i16
            }
        };

        Ok(Self {
            year,
            month: field_from_binary(date.month, format),
            day: field_from_binary(date.day, format),
            weekday: date.weekday,
        })
    }
}

fn field_to_binary(value: u8, format: Format) -> Result<u8> {
    match format {
        Format::Bin => Ok(value),
        Format::Bcd => {
            if !is_bcd(value) {
                return Err(RtcError::InvalidInputData.into());
            }
            Ok(bcd2_to_byte(value))
        }
    }
}

fn field_from_binary(value: u8, format: Format) -> u8 {
    match format {
        Format::Bin => value,
        Format::Bcd => byte_to_bcd2(value),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, defmt::Format)]
pub struct RtcConfig {
    /// Number of polls of the RTOFF flag before giving up when entering or leaving
    /// configuration mode.
    pub timeout_iters: u32,
    /// If `true`, `get_time` and `get_date` return `RtcError::Busy` while a write is in
    /// progress, instead of racing it.
    pub locked_reads: bool,
    /// Skip the date conversion when the counter is still on the same day as the previous
    /// `get_date`.
    pub cache_date: bool,
}

impl Default for RtcConfig {
    fn default() -> Self {
        RtcConfig {
            timeout_iters: MAX_ITERS,
            locked_reads: false,
            cache_date: true,
        }
    }
}

impl RtcConfig {
    /// Set the configuration mode timeout, in polls.
    pub fn timeout_iters(mut self, iters: u32) -> Self {
        self.timeout_iters = iters;
        self
    }

    /// Choose whether reads fail with `Busy` during a write.
    pub fn locked_reads(mut self, locked: bool) -> Self {
        self.locked_reads = locked;
        self
    }

    /// Choose whether to memoize the date conversion.
    pub fn cache_date(mut self, cache: bool) -> Self {
        self.cache_date = cache;
        self
    }
}

/// Releases the advisory lock when dropped.
struct WriteGuard<'a> {
    locked: &'a Mutex<Cell<bool>>,
    state: &'a Mutex<Cell<RtcState>>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        critical_section::with(|cs| {
            self.state.borrow(cs).set(RtcState::Ready);
            self.locked.borrow(cs).set(false);
        });
    }
}

/// Real Time Clock peripheral
pub struct Rtc<R> {
    /// RTC Peripheral register definition
    regs: R,
    config: RtcConfig,
    locked: Mutex<Cell<bool>>,
    state: Mutex<Cell<RtcState>>,
    /// Day index (counter / 86,400) of the last date conversion, and its result.
    date_cache: Mutex<Cell<Option<(u32, CalendarDate)>>>,
}

impl<R: RtcRegs> Rtc<R> {
    /// Create a new RTC abstraction. The peripheral's clock and prescaler must already be set
    /// up; the counter is left as it is.
    pub fn new(regs: R, config: RtcConfig) -> Self {
        Self {
            regs,
            config,
            locked: Mutex::new(Cell::new(false)),
            state: Mutex::new(Cell::new(RtcState::Ready)),
            date_cache: Mutex::new(Cell::new(None)),
        }
    }

    /// Release the register block.
    pub fn free(self) -> R {
        self.regs
    }

    /// The configuration this driver was created with.
    pub fn config(&self) -> &RtcConfig {
        &self.config
    }

    /// `Busy` while a write holds the lock.
    pub fn state(&self) -> RtcState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// `true` if the counter has overflowed, or was never set since the backup domain reset.
    pub fn overflow_flag(&self) -> bool {
        self.regs.overflow_flag()
    }

    /// `true` if a second has ticked since the flag was last cleared.
    pub fn second_flag(&self) -> bool {
        self.regs.second_flag()
    }

    /// Clear the overflow and second flags.
    pub fn clear_flags(&self) {
        self.regs.clear_overflow_and_second_flags();
    }

    /// Read the raw counter: seconds since 1970-01-01 00:00:00.
    pub fn counter(&self) -> u32 {
        counter::read_counter(&self.regs)
    }

    /// Overwrite the raw counter. Flags are left as they are.
    pub fn set_counter(&self, value: u32) -> Result<()> {
        let _guard = self.lock()?;
        counter::write_counter(&self.regs, value, self.config.timeout_iters)
    }

    /// Set the time of day, keeping the date.
    pub fn set_time(&self, time: &Time, format: Format) -> Result<()> {
        let time = time.to_binary(format)?;

        let _guard = self.lock()?;

        // Keep any whole days already on the counter.
        let days = counter::read_counter(&self.regs) / SECS_PER_DAY;
        let value = (days * SECS_PER_DAY).wrapping_add(time.secs_into_day());

        counter::write_counter(&self.regs, value, self.config.timeout_iters)?;
        self.regs.clear_overflow_and_second_flags();

        Ok(())
    }

    /// Get the time of day.
    pub fn get_time(&self, format: Format) -> Result<Time> {
        let counter = self.read_checked()?;
        Ok(Time::from_binary(
            &calendar::wall_time_from_seconds(counter),
            format,
        ))
    }

    /// Set the date, keeping the time of day. The year is clamped to 1970 - 2099; the month
    /// and day must be valid for the resulting year. `date.weekday` is ignored.
    pub fn set_date(&self, date: &Date, format: Format) -> Result<()> {
        let (year, month, day) = date.to_binary(format)?;
        let date = valid_date(year, month, day)?;

        let _guard = self.lock()?;

        let time = calendar::wall_time_from_seconds(counter::read_counter(&self.regs));
        let value = calendar::seconds_since_epoch(&date, &time);

        counter::write_counter(&self.regs, value, self.config.timeout_iters)
    }

    /// Get the date, including the day of the week.
    pub fn get_date(&self, format: Format) -> Result<Date> {
        let counter = self.read_checked()?;
        Date::from_binary(&self.date_from_counter(counter), format)
    }

    /// Get the date and time from a single counter read.
    pub fn get_datetime(&self) -> Result<NaiveDateTime> {
        let counter = self.read_checked()?;
        let date = self.date_from_counter(counter);
        let time = calendar::wall_time_from_seconds(counter);

        Ok(to_naive_date(&date)?.and_time(to_naive_time(&time)?))
    }

    /// Get the date, as a `chrono` type.
    pub fn get_naive_date(&self) -> Result<NaiveDate> {
        let counter = self.read_checked()?;
        to_naive_date(&self.date_from_counter(counter))
    }

    /// Get the time of day, as a `chrono` type.
    pub fn get_naive_time(&self) -> Result<NaiveTime> {
        let counter = self.read_checked()?;
        to_naive_time(&calendar::wall_time_from_seconds(counter))
    }

    /// Set the date and time. The year is clamped to 1970 - 2099. Clears the overflow and
    /// second flags, as `set_time` does.
    pub fn set_datetime(&self, dt: &NaiveDateTime) -> Result<()> {
        let date = valid_date(dt.year(), dt.month() as u8, dt.day() as u8)?;
        let time = WallTime::new(dt.hour() as u8, dt.minute() as u8, dt.second() as u8);
        let value = calendar::seconds_since_epoch(&date, &time);

        let _guard = self.lock()?;

        counter::write_counter(&self.regs, value, self.config.timeout_iters)?;
        self.regs.clear_overflow_and_second_flags();

        Ok(())
    }

    /// Take the advisory write lock, moving to `Busy`.
    fn lock(&self) -> Result<WriteGuard<'_>> {
        critical_section::with(|cs| -> Result<()> {
            let locked = self.locked.borrow(cs);
            if locked.get() {
                return Err(RtcError::Busy.into());
            }
            locked.set(true);
            self.state.borrow(cs).set(RtcState::Busy);
            Ok(())
        })
        .inspect_err(|_| {
            rtc_debug!("RTC: write attempted while busy");
        })?;

        Ok(WriteGuard {
            locked: &self.locked,
            state: &self.state,
        })
    }

    /// Read the counter for a time or date query, after the overflow and lock checks.
    fn read_checked(&self) -> Result<u32> {
        if self.config.locked_reads && self.state() == RtcState::Busy {
            return Err(RtcError::Busy.into());
        }

        if self.regs.overflow_flag() {
            rtc_warn!("RTC: counter overflow flag set");
            return Err(RtcError::Overflow.into());
        }

        Ok(counter::read_counter(&self.regs))
    }

    /// Convert to a date, reusing the previous result if we're still on the same day.
    fn date_from_counter(&self, counter: u32) -> CalendarDate {
        let day_index = counter / SECS_PER_DAY;

        if !self.config.cache_date {
            return calendar::date_from_days(day_index);
        }

        let cached = critical_section::with(|cs| self.date_cache.borrow(cs).get());
        if let Some((cached_day, date)) = cached {
            if cached_day == day_index {
                return date;
            }
        }

        let date = calendar::date_from_days(day_index);
        critical_section::with(|cs| self.date_cache.borrow(cs).set(Some((day_index, date))));
        date
    }
}

/// Clamp the year, then check the month and day against it.
fn valid_date(year: i32, month: u8, day: u8) -> Result<CalendarDate> {
    let clamped = clamp_year(year);
    if clamped as i32 != year {
        rtc_debug!("RTC: year {=i32} clamped to {=u16}", year, clamped);
    }

    if day == 0 || day > days_in_month(clamped, month) {
        return Err(RtcError::InvalidInputData.into());
    }

    Ok(CalendarDate::new(clamped, month, day))
}

fn to_naive_date(date: &CalendarDate) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year as i32, date.month as u32, date.day as u32)
        .ok_or(Error::RtcError(RtcError::InvalidInputData))
}

fn to_naive_time(time: &WallTime) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(time.hours as u32, time.minutes as u32, time.seconds as u32)
        .ok_or(Error::RtcError(RtcError::InvalidInputData))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A counter that only changes when written.
    #[derive(Default)]
    struct StaticRegs {
        counter: Cell<u32>,
        writes: Cell<u32>,
    }

    impl RtcRegs for StaticRegs {
        fn counter_high(&self) -> u16 {
            (self.counter.get() >> 16) as u16
        }

        fn counter_low(&self) -> u16 {
            self.counter.get() as u16
        }

        fn set_counter_high(&self, value: u16) {
            self.writes.set(self.writes.get() + 1);
            self.counter
                .set((self.counter.get() & 0xffff) | ((value as u32) << 16));
        }

        fn set_counter_low(&self, value: u16) {
            self.counter
                .set((self.counter.get() & 0xffff_0000) | value as u32);
        }

        fn write_op_complete(&self) -> bool {
            true
        }

        fn set_config_mode(&self, _enabled: bool) {}

        fn overflow_flag(&self) -> bool {
            false
        }

        fn second_flag(&self) -> bool {
            false
        }

        fn clear_overflow_and_second_flags(&self) {}
    }

    #[test]
    fn lock_rejects_second_writer() {
        let rtc = Rtc::new(StaticRegs::default(), RtcConfig::default());
        assert_eq!(rtc.state(), RtcState::Ready);

        let guard = rtc.lock().unwrap();
        assert_eq!(rtc.state(), RtcState::Busy);

        assert_eq!(
            rtc.set_time(&Time::new(1, 2, 3), Format::Bin),
            Err(Error::RtcError(RtcError::Busy))
        );
        assert_eq!(
            rtc.set_date(&Date::new(24, 1, 1), Format::Bin),
            Err(Error::RtcError(RtcError::Busy))
        );
        assert_eq!(rtc.regs.writes.get(), 0);

        // Reads are lock-free by default.
        assert!(rtc.get_time(Format::Bin).is_ok());

        drop(guard);
        assert_eq!(rtc.state(), RtcState::Ready);
        rtc.set_time(&Time::new(1, 2, 3), Format::Bin).unwrap();
        assert_eq!(rtc.counter(), 3_723);
    }

    #[test]
    fn locked_reads_fail_while_busy() {
        let rtc = Rtc::new(
            StaticRegs::default(),
            RtcConfig::default().locked_reads(true),
        );

        let guard = rtc.lock().unwrap();
        assert_eq!(
            rtc.get_time(Format::Bin),
            Err(Error::RtcError(RtcError::Busy))
        );
        assert_eq!(
            rtc.get_date(Format::Bin),
            Err(Error::RtcError(RtcError::Busy))
        );

        drop(guard);
        assert_eq!(rtc.get_time(Format::Bin), Ok(Time::new(0, 0, 0)));
    }

    #[test]
    fn lock_released_after_failed_write() {
        let rtc = Rtc::new(StaticRegs::default(), RtcConfig::default());

        assert!(rtc.set_time(&Time::new(24, 0, 0), Format::Bin).is_err());
        assert_eq!(rtc.state(), RtcState::Ready);
        assert!(rtc.set_time(&Time::new(23, 0, 0), Format::Bin).is_ok());
    }

    #[test]
    fn date_cache_follows_day_index() {
        let rtc = Rtc::new(StaticRegs::default(), RtcConfig::default());

        rtc.set_counter(5 * SECS_PER_DAY + 10).unwrap();
        assert_eq!(
            rtc.get_date(Format::Bin).unwrap(),
            Date {
                year: -30,
                month: 1,
                day: 6,
                weekday: 2,
            }
        );
        assert_eq!(
            critical_section::with(|cs| rtc.date_cache.borrow(cs).get()).map(|c| c.0),
            Some(5)
        );

        // Same day, later time: still correct.
        rtc.set_counter(6 * SECS_PER_DAY - 1).unwrap();
        assert_eq!(rtc.get_date(Format::Bin).unwrap().day, 6);

        // Next day invalidates it.
        rtc.set_counter(6 * SECS_PER_DAY).unwrap();
        assert_eq!(rtc.get_date(Format::Bin).unwrap().day, 7);
        assert_eq!(
            critical_section::with(|cs| rtc.date_cache.borrow(cs).get()).map(|c| c.0),
            Some(6)
        );
    }

    #[test]
    fn format_from_constant() {
        assert_eq!(Format::try_from(0u32), Ok(Format::Bin));
        assert_eq!(Format::try_from(1u32), Ok(Format::Bcd));
        assert_eq!(
            Format::try_from(2u32),
            Err(Error::RtcError(RtcError::InvalidInputData))
        );
    }

    #[test]
    fn bcd_fields() {
        assert_eq!(
            Time::new(0x23, 0x59, 0x58).to_binary(Format::Bcd),
            Ok(WallTime::new(23, 59, 58))
        );
        // Valid BCD, out of range.
        assert!(Time::new(0x24, 0, 0).to_binary(Format::Bcd).is_err());
        // Not BCD.
        assert!(Time::new(0x1a, 0, 0).to_binary(Format::Bcd).is_err());

        assert_eq!(
            Date::new(0x24, 0x12, 0x31).to_binary(Format::Bcd),
            Ok((2024, 12, 31))
        );
        assert!(Date::new(-1, 1, 1).to_binary(Format::Bcd).is_err());
        assert_eq!(
            Date::from_binary(&CalendarDate::new(1999, 1, 1), Format::Bcd),
            Err(Error::RtcError(RtcError::YearOutOfRange))
        );
    }
}
