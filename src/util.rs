//! This is an internal module that contains utility functionality used by other modules.

/// Default iteration budget for `bounded_loop!`.
///
/// The RTC's write operations complete within 3 RTCCLK cycles; at a 32.768kHz clock that's
/// roughly 100µs, well under this many register polls at any system clock.
pub const MAX_ITERS: u32 = 300_000;

/// Spin while `$cond` holds, returning `Err($err)` from the enclosing function if it's
/// still true after `MAX_ITERS` (or `$max`) iterations.
macro_rules! bounded_loop {
    ($cond:expr, $err:expr $(,)?) => {
        bounded_loop!($cond, $err, $crate::util::MAX_ITERS)
    };
    ($cond:expr, $err:expr, $max:expr $(,)?) => {{
        let max: u32 = $max;
        let mut iters: u32 = 0;
        while $cond {
            iters += 1;
            if iters >= max {
                return Err($err);
            }
            core::hint::spin_loop();
        }
    }};
}

// Diagnostics. These forward to `defmt` with the `defmt-log` feature, and expand to nothing
// otherwise, so the library doesn't require a global logger.

macro_rules! rtc_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt-log")]
        defmt::trace!($($arg)*);
    };
}

macro_rules! rtc_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt-log")]
        defmt::debug!($($arg)*);
    };
}

macro_rules! rtc_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt-log")]
        defmt::warn!($($arg)*);
    };
}
