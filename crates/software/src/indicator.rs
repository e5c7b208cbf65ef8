//! Provides [`ActivityIndicator`], the timer behind the status LED.
//!
//! The LED lights briefly whenever MIDI goes out. Rather than sleeping, the polling loop asks the indicator once per
//! cycle whether the LED should currently be lit, so link reads are never delayed by the blink.

use embassy_time::{Duration, Instant};

/// How long the LED stays lit after activity, unless configured otherwise.
pub const DEFAULT_HOLD: Duration = Duration::from_millis(20);

/// Tracks when the status LED should go dark.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivityIndicator {
    hold: Duration,
    lit_until: Option<Instant>,
}

impl Default for ActivityIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD)
    }
}

impl ActivityIndicator {
    /// Constructs an unlit `ActivityIndicator` which stays lit for `hold` after each blink.
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            lit_until: None,
        }
    }

    /// Lights the indicator, extending the current blink if it is already lit.
    pub fn blink(&mut self, now: Instant) {
        self.lit_until = Some(now + self.hold);
    }

    /// Returns `true` if the indicator should be lit at `now`, going dark once the hold period has passed.
    pub fn service(&mut self, now: Instant) -> bool {
        match self.lit_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.lit_until = None;
                false
            }
            None => false,
        }
    }
}
