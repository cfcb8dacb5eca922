//! Access to the RTC's 32-bit seconds counter, which is split across two 16-bit registers
//! (RTC_CNTH and RTC_CNTL). See STM32F1 RM0008, section 18.3.4: "Configuring RTC registers".
//!
//! The counter keeps running while we read and write it, so reads use a torn-read guard,
//! and writes go through configuration mode: wait for the previous write operation to finish
//! (RTOFF), set CNF, write, clear CNF, then wait for RTOFF again.

use crate::{
    error::{Error, Result},
    traits::RtcRegs,
};

/// Enter configuration mode. Waits, for at most `max_iters` polls, for any ongoing write
/// operation to complete, then lifts write protection. On timeout, nothing is changed.
pub fn enter_config_mode<R: RtcRegs>(regs: &R, max_iters: u32) -> Result<()> {
    bounded_loop!(
        !regs.write_op_complete(),
        Error::RegisterUnchanged,
        max_iters
    );

    regs.set_config_mode(true);
    Ok(())
}

/// Leave configuration mode, re-enabling write protection, then wait for the peripheral to
/// commit the pending write. A write is only durable once this returns `Ok`.
pub fn exit_config_mode<R: RtcRegs>(regs: &R, max_iters: u32) -> Result<()> {
    regs.set_config_mode(false);

    bounded_loop!(
        !regs.write_op_complete(),
        Error::RegisterUnchanged,
        max_iters
    );

    Ok(())
}

/// Overwrite the counter. MSB word first, then LSB.
///
/// If entering configuration mode times out, no register is written. If leaving it times
/// out, the write was issued but isn't confirmed as committed.
pub fn write_counter<R: RtcRegs>(regs: &R, value: u32, max_iters: u32) -> Result<()> {
    enter_config_mode(regs, max_iters).inspect_err(|_| {
        rtc_warn!("RTC: timeout entering configuration mode");
    })?;

    regs.set_counter_high((value >> 16) as u16);
    regs.set_counter_low((value & 0xffff) as u16);

    exit_config_mode(regs, max_iters).inspect_err(|_| {
        rtc_warn!("RTC: timeout committing counter write");
    })?;

    rtc_trace!("RTC: counter set to {=u32}", value);
    Ok(())
}

/// Read the counter, guarding against the low word rolling over between the two register
/// reads. Never blocks.
///
/// If the high word changed while reading, the low word is read again, after the new
/// high word; that combination is consistent. Otherwise, the first reads are.
pub fn read_counter<R: RtcRegs>(regs: &R) -> u32 {
    let high1 = regs.counter_high();
    let low = regs.counter_low();
    let high2 = regs.counter_high();

    if high1 != high2 {
        ((high2 as u32) << 16) | regs.counter_low() as u32
    } else {
        ((high1 as u32) << 16) | low as u32
    }
}

#[cfg(feature = "f1")]
mod f1 {
    use crate::{pac::RTC, traits::RtcRegs};

    // The RTC_CRL flags are rc_w0. `modify` writes 1 to those we don't touch, so only the
    // ones cleared here change.
    impl RtcRegs for RTC {
        fn counter_high(&self) -> u16 {
            self.cnth().read().cnth().bits()
        }

        fn counter_low(&self) -> u16 {
            self.cntl().read().cntl().bits()
        }

        fn set_counter_high(&self, value: u16) {
            self.cnth().write(|w| w.cnth().set(value));
        }

        fn set_counter_low(&self, value: u16) {
            self.cntl().write(|w| w.cntl().set(value));
        }

        fn write_op_complete(&self) -> bool {
            self.crl().read().rtoff().bit_is_set()
        }

        fn set_config_mode(&self, enabled: bool) {
            if enabled {
                self.crl().modify(|_, w| w.cnf().enter());
            } else {
                self.crl().modify(|_, w| w.cnf().exit());
            }
        }

        fn overflow_flag(&self) -> bool {
            self.crl().read().owf().bit_is_set()
        }

        fn second_flag(&self) -> bool {
            self.crl().read().secf().bit_is_set()
        }

        fn clear_overflow_and_second_flags(&self) {
            self.crl().modify(|_, w| w.secf().clear().owf().clear());
        }
    }
}
