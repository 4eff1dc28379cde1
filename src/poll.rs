//! Bounded busy-waiting.

use {
    crate::error::{Error, Stage},
    embedded_hal::blocking::delay::DelayUs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// How many times the condition is checked before giving up.
    pub max_attempts: u32,
    /// Pause between two checks. 0 spins without calling the delay source.
    pub interval_us: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1_000_000,
            interval_us: 0,
        }
    }
}

impl PollConfig {
    /// Checks `ready` until it reports `true`, it fails, or the attempts run
    /// out. Returns the number of checks made.
    pub fn poll<D, F>(&self, delay: &mut D, stage: Stage, mut ready: F) -> Result<u32, Error>
    where
        D: DelayUs<u32>,
        F: FnMut() -> Result<bool, Error>,
    {
        for attempt in 1..=self.max_attempts {
            if ready()? {
                return Ok(attempt);
            }
            if self.interval_us > 0 {
                delay.delay_us(self.interval_us);
            } else {
                core::hint::spin_loop();
            }
        }

        log::warn!(
            "gave up on the {} after {} attempts",
            stage,
            self.max_attempts
        );
        Err(Error::HardwareTimeout(stage))
    }
}

/// Delay source for chips without a timer set up: burns a fixed number of
/// spin iterations per microsecond.
#[derive(Debug, Clone, Copy)]
pub struct SpinDelay {
    spins_per_us: u32,
}

impl SpinDelay {
    pub const fn new(spins_per_us: u32) -> Self {
        Self { spins_per_us }
    }
}

impl DelayUs<u32> for SpinDelay {
    fn delay_us(&mut self, us: u32) {
        for _ in 0..us.saturating_mul(self.spins_per_us) {
            core::hint::spin_loop();
        }
    }
}
