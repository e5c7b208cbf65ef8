//! Busy-wait delays for bit-banging the link port.
//!
//! The Embassy time driver ticks at 32.768 kHz, far too coarse for the link's microsecond edges, so these delays
//! count core cycles instead.

use embedded_hal::delay::DelayNs;

/// Core clock frequency, as configured in `main`.
pub const SYSCLK_HZ: u32 = 216_000_000;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A [`DelayNs`] implementation that spins the core.
///
/// Interrupts lengthen the wait, never shorten it.
#[derive(Clone, Copy, Debug, Default)]
pub struct CycleDelay;

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = u64::from(ns) * u64::from(SYSCLK_HZ) / NANOS_PER_SEC;
        cortex_m::asm::delay(u32::try_from(cycles).unwrap_or(u32::MAX));
    }
}
