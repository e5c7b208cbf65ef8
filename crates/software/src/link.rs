//! Provides [`LinkReader`], which clocks bytes in from the console's link port.
//!
//! The console acts as the clock follower: the reader drives the clock line and samples the console's serial output
//! after each rising edge. A byte is eight bits, most-significant bit first, and the tracker always sets the top bit.
//! The first sample therefore doubles as a "byte ready" flag, which lets the reader abandon the transfer after a
//! single pulse when the console has nothing queued.

use core::convert::Infallible;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

/// Number of bits clocked per transfer.
const BITS_PER_BYTE: u8 = 8;

/// Delays used while clocking the link port, in microseconds.
///
/// These are tuning parameters for the attached console rather than part of the protocol, but they must be generous
/// enough for the console to load and shift out its next byte.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkTiming {
    /// Idle time before each transfer begins.
    pub settle_us: u32,
    /// Time spent in each phase of a clock pulse.
    pub edge_us: u32,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            settle_us: 80,
            edge_us: 2,
        }
    }
}

/// Clocks bytes in from the link port.
///
/// Pins must be infallible, as is the case for typical microcontroller GPIO; there is no sensible recovery from a pin
/// that can't be driven mid-transfer.
pub struct LinkReader<CLK, SI, D> {
    clock: CLK,
    serial_in: SI,
    delay: D,
    timing: LinkTiming,
}

impl<CLK, SI, D> LinkReader<CLK, SI, D>
where
    CLK: OutputPin<Error = Infallible>,
    SI: InputPin<Error = Infallible>,
    D: DelayNs,
{
    /// Constructs a [`LinkReader`], idling the clock line high.
    pub fn new(mut clock: CLK, serial_in: SI, delay: D, timing: LinkTiming) -> Self {
        infallible(clock.set_high());
        Self {
            clock,
            serial_in,
            delay,
            timing,
        }
    }

    /// Attempts to clock in one byte.
    ///
    /// Returns `None`, after a single clock pulse, if the console signals it has nothing to send. Otherwise all eight
    /// bits are clocked in and returned with the ready bit in the most-significant position.
    pub fn try_read_byte(&mut self) -> Option<u8> {
        self.delay.delay_us(self.timing.settle_us);
        if !self.pulse() {
            return None;
        }

        let byte = (1..BITS_PER_BYTE).fold(1_u8, |byte, _| (byte << 1) | u8::from(self.pulse()));
        trace!("Link byte received: {=u8:#x}", byte);
        Some(byte)
    }

    /// Timing in use.
    pub fn timing(&self) -> LinkTiming {
        self.timing
    }

    /// Releases the pins and delay provider.
    pub fn release(self) -> (CLK, SI, D) {
        (self.clock, self.serial_in, self.delay)
    }

    /// Drives one low/high clock cycle and samples the serial line after the rising edge.
    fn pulse(&mut self) -> bool {
        infallible(self.clock.set_low());
        self.delay.delay_us(self.timing.edge_us);
        infallible(self.clock.set_high());
        self.delay.delay_us(self.timing.edge_us);
        infallible(self.serial_in.is_high())
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}
