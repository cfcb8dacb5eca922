//! A simulated STM32F1 RTC, for running the driver on the host.

#![allow(dead_code)]

use core::cell::Cell;

use stm32f1_rtc_cal::RtcRegs;

/// Models the split counter, the CNF/RTOFF handshake, and the OWF and SECF flags. Counter
/// writes made in configuration mode are committed when it's left, after which RTOFF reads
/// low for `write_latency` polls.
#[derive(Default)]
pub struct SimRtc {
    counter: Cell<u32>,
    pending_high: Cell<Option<u16>>,
    pending_low: Cell<Option<u16>>,
    cnf: Cell<bool>,
    busy_polls: Cell<u32>,
    /// RTOFF polls that read low after each committed write.
    pub write_latency: Cell<u32>,
    /// RTOFF never goes high again.
    pub stuck: Cell<bool>,
    /// Get stuck right after the next write is committed.
    pub stall_after_write: Cell<bool>,
    /// Advance the counter by one after every read of the low word.
    pub ripple: Cell<bool>,
    /// The counter wraps while the next write is being committed, setting OWF.
    pub overflow_during_write: Cell<bool>,
    owf: Cell<bool>,
    secf: Cell<bool>,
    /// Number of committed counter writes.
    pub writes: Cell<u32>,
}

impl SimRtc {
    pub fn new(counter: u32) -> Self {
        let result = Self::default();
        result.counter.set(counter);
        result
    }

    pub fn counter(&self) -> u32 {
        self.counter.get()
    }

    /// Let `secs` seconds pass.
    pub fn tick(&self, secs: u32) {
        let (value, wrapped) = self.counter.get().overflowing_add(secs);
        self.counter.set(value);
        if wrapped {
            self.owf.set(true);
        }
        if secs > 0 {
            self.secf.set(true);
        }
    }

    pub fn set_overflow(&self, set: bool) {
        self.owf.set(set);
    }

    pub fn in_config_mode(&self) -> bool {
        self.cnf.get()
    }
}

impl RtcRegs for SimRtc {
    fn counter_high(&self) -> u16 {
        (self.counter.get() >> 16) as u16
    }

    fn counter_low(&self) -> u16 {
        let low = self.counter.get() as u16;
        if self.ripple.get() {
            self.counter.set(self.counter.get().wrapping_add(1));
        }
        low
    }

    fn set_counter_high(&self, value: u16) {
        if self.cnf.get() {
            self.pending_high.set(Some(value));
        }
    }

    fn set_counter_low(&self, value: u16) {
        if self.cnf.get() {
            self.pending_low.set(Some(value));
        }
    }

    fn write_op_complete(&self) -> bool {
        if self.stuck.get() {
            return false;
        }
        match self.busy_polls.get() {
            0 => true,
            n => {
                self.busy_polls.set(n - 1);
                false
            }
        }
    }

    fn set_config_mode(&self, enabled: bool) {
        let was_enabled = self.cnf.replace(enabled);
        if enabled || !was_enabled {
            return;
        }

        let high = self.pending_high.take();
        let low = self.pending_low.take();
        if high.is_none() && low.is_none() {
            return;
        }

        let mut value = self.counter.get();
        if let Some(h) = high {
            value = (value & 0xffff) | ((h as u32) << 16);
        }
        if let Some(l) = low {
            value = (value & 0xffff_0000) | l as u32;
        }
        self.counter.set(value);
        self.writes.set(self.writes.get() + 1);
        self.busy_polls.set(self.write_latency.get());

        if self.overflow_during_write.take() {
            self.owf.set(true);
        }
        if self.stall_after_write.get() {
            self.stuck.set(true);
        }
    }

    fn overflow_flag(&self) -> bool {
        self.owf.get()
    }

    fn second_flag(&self) -> bool {
        self.secf.get()
    }

    fn clear_overflow_and_second_flags(&self) {
        self.owf.set(false);
        self.secf.set(false);
    }
}
