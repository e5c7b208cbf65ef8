//! This module contains the per-channel settings the tracker can rewrite at runtime, along with the in-band sequence
//! used to rewrite them (see [`ConfigState`]).
//!
//! Settings are volatile; they return to their defaults on power-up.

mod sequence;
pub use sequence::*;

use wmidi::{Channel, ControlFunction};

/// Number of Control Change destinations a single channel can address.
pub const CC_SLOT_CNT: usize = 7;

/// Largest value the tracker sends as a command argument. Arguments are rescaled from `0..=PROTOCOL_VALUE_MAX` to the
/// full MIDI data range.
pub const PROTOCOL_VALUE_MAX: u8 = 0x6F;

/// Determines how Control Change commands are interpreted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcMode {
    /// Every command targets slot 0 and the whole argument is the value.
    #[default]
    Single,
    /// The argument's high nibble selects a slot and its low nibble is the value.
    Scaled,
}

/// Settings belonging to one tracker channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelSettings {
    pub(crate) midi_channel: Channel,
    pub(crate) cc_mode: CcMode,
    pub(crate) cc_numbers: [Option<ControlFunction>; CC_SLOT_CNT],
    pub(crate) velocity: u8,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            midi_channel: Channel::Ch1,
            cc_mode: CcMode::default(),
            cc_numbers: [None; CC_SLOT_CNT],
            velocity: PROTOCOL_VALUE_MAX,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelSettings {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "ChannelSettings {{ midi_channel: {}, cc_mode: {}, cc_numbers: [",
            self.midi_channel.number(),
            self.cc_mode
        );
        for (i, cc) in self.cc_numbers.iter().enumerate() {
            if i != 0 {
                defmt::write!(fmt, ", ");
            }
            defmt::write!(fmt, "{}", cc.map(|cc| u8::from(cc.0)));
        }
        defmt::write!(fmt, "], velocity: {} }}", self.velocity);
    }
}

impl ChannelSettings {
    /// MIDI channel all messages from this tracker channel are sent on.
    pub fn midi_channel(&self) -> Channel {
        self.midi_channel
    }

    /// How Control Change commands are interpreted.
    pub fn cc_mode(&self) -> CcMode {
        self.cc_mode
    }

    /// The controller assigned to `slot`, or `None` if the slot is unset or out of range.
    pub fn cc_number(&self, slot: usize) -> Option<ControlFunction> {
        self.cc_numbers.get(slot).copied().flatten()
    }

    /// Note velocity, expressed in the tracker's `0..=0x6F` range.
    pub fn velocity(&self) -> u8 {
        self.velocity
    }
}
