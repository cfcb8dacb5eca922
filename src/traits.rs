// Traits used across the library.

/// Register-level access to an RTC with a split 32-bit seconds counter. See STM32F1 RM0008,
/// section 18.4: "RTC registers".
///
/// Implementations are thin; all sequencing (configuration mode, the torn-read guard, flag
/// handling) lives in [`counter`](crate::counter) and [`rtc`](crate::rtc). Methods take
/// `&self`, as register access is volatile and the peripheral may be shared with interrupt
/// handlers.
pub trait RtcRegs {
    /// Read the upper 16 bits of the counter. (RTC_CNTH)
    fn counter_high(&self) -> u16;

    /// Read the lower 16 bits of the counter. (RTC_CNTL)
    fn counter_low(&self) -> u16;

    /// Write the upper 16 bits of the counter. Only takes effect in configuration mode.
    fn set_counter_high(&self, value: u16);

    /// Write the lower 16 bits of the counter. Only takes effect in configuration mode.
    fn set_counter_low(&self, value: u16);

    /// `true` once the last write operation on RTC registers has completed. (RTOFF)
    fn write_op_complete(&self) -> bool;

    /// Enter or leave configuration mode. While in it, write protection is lifted and the
    /// counter is writable. (CNF)
    fn set_config_mode(&self, enabled: bool);

    /// The counter overflow flag. (OWF)
    fn overflow_flag(&self) -> bool;

    /// The once-per-second tick flag. (SECF)
    fn second_flag(&self) -> bool;

    /// Clear the overflow and second flags.
    fn clear_overflow_and_second_flags(&self);
}

impl<T: RtcRegs + ?Sized> RtcRegs for &T {
    fn counter_high(&self) -> u16 {
        (**self).counter_high()
    }

    fn counter_low(&self) -> u16 {
        (**self).counter_low()
    }

    fn set_counter_high(&self, value: u16) {
        (**self).set_counter_high(value)
    }

    fn set_counter_low(&self, value: u16) {
        (**self).set_counter_low(value)
    }

    fn write_op_complete(&self) -> bool {
        (**self).write_op_complete()
    }

    fn set_config_mode(&self, enabled: bool) {
        (**self).set_config_mode(enabled)
    }

    fn overflow_flag(&self) -> bool {
        (**self).overflow_flag()
    }

    fn second_flag(&self) -> bool {
        (**self).second_flag()
    }

    fn clear_overflow_and_second_flags(&self) {
        (**self).clear_overflow_and_second_flags()
    }
}
