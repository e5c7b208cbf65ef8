//! Per-source state: the settings the in-band configuration writes, plus what the source is doing right now.

use crate::configuration::{ChannelSettings, ConfigState};
use wmidi::Note;

/// Number of sources the tracker streams.
pub const SOURCE_CNT: usize = 4;

/// One of the tracker's four sound sources, addressed by the low two bits of a command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// First pulse channel.
    Pulse1,
    /// Second pulse channel.
    Pulse2,
    /// Wave channel.
    Wave,
    /// Noise channel.
    Noise,
}

impl Source {
    /// Every source, in wire order.
    pub const ALL: [Source; SOURCE_CNT] = [Self::Pulse1, Self::Pulse2, Self::Wave, Self::Noise];

    /// Position of the source in wire order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Decodes a source from the low two bits of `bits`; higher bits are ignored.
    pub fn from_bits(bits: u8) -> Self {
        Self::ALL[usize::from(bits & 0b11)]
    }
}

/// Everything the receiver tracks for a single [`Source`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelState {
    pub(crate) settings: ChannelSettings,
    pub(crate) current_note: Option<Note>,
    pub(crate) config: ConfigState,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelState {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "ChannelState {{ settings: {}, current_note: {}, config: {} }}",
            self.settings,
            self.current_note.map(u8::from),
            self.config
        );
    }
}

impl ChannelState {
    /// Settings currently in effect.
    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    /// The sounding [`Note`], if any.
    pub fn current_note(&self) -> Option<Note> {
        self.current_note
    }

    /// Progress through the configuration sequence.
    pub fn config_state(&self) -> ConfigState {
        self.config
    }
}
