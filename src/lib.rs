//! A real-time calendar for RTC peripherals that only provide a free-running seconds
//! counter, such as the one on STM32F1. The hardware has no date or time-of-day registers;
//! this library keeps the calendar in software, converting between the 32-bit counter
//! (seconds since 1970-01-01 00:00:00) and a Gregorian date and time.
//!
//! The layers, lowest first:
//! - [`counter`]: torn-read-safe reads of the split counter, and writes through the
//!   peripheral's configuration mode handshake.
//! - [`calendar`]: pure conversions between a seconds count and a date/time.
//! - [`rtc`]: the [`Rtc`](rtc::Rtc) driver with `set_time`, `get_time`, `set_date` and
//!   `get_date`, in binary or BCD format.
//!
//! Register access goes through the [`RtcRegs`](traits::RtcRegs) trait. With one of the
//! `f1xx` features enabled, it's implemented for the PAC's `RTC` peripheral.
//!
//! ```rust,ignore
//! let rtc = Rtc::new(dp.RTC, RtcConfig::default());
//!
//! rtc.set_date(&Date::new(24, 2, 29), Format::Bin)?;
//! rtc.set_time(&Time::new(13, 37, 0), Format::Bin)?;
//!
//! let time = rtc.get_time(Format::Bcd)?; // eg `hours == 0x13`
//! let dt = rtc.get_datetime()?; // `chrono::NaiveDateTime`
//! ```

#![cfg_attr(not(test), no_std)]

// F1 PAC
#[cfg(feature = "f100")]
pub use stm32f1::stm32f100 as pac;

#[cfg(feature = "f101")]
pub use stm32f1::stm32f101 as pac;

#[cfg(feature = "f102")]
pub use stm32f1::stm32f102 as pac;

#[cfg(feature = "f103")]
pub use stm32f1::stm32f103 as pac;

#[cfg(feature = "f107")]
pub use stm32f1::stm32f107 as pac;

// Links in the single-core critical-section implementation.
#[cfg(feature = "f1")]
use cortex_m as _;

#[macro_use]
mod util;

pub mod calendar;
pub mod counter;
pub mod error;
pub mod rtc;
pub mod traits;

pub use crate::{
    error::{Error, Result},
    rtc::{Date, Format, Rtc, RtcConfig, RtcError, RtcState, Time},
    traits::RtcRegs,
};
