//! The in-band configuration sequence.
//!
//! A Program Change carrying [`CONFIGURATION_ENTRY`] doesn't change program; it tells the receiver that the channel's
//! following Control Change arguments are settings:
//!
//! 1. mode and channel: high nibble is the number of CC assignments to follow, low nibble is the MIDI channel
//! 2. CC assignments, one per byte, announced from the highest slot down to slot 0
//! 3. velocity
//!
//! Note and Program Change commands abandon a sequence midway, as do Start and Stop. Whatever was written before the
//! interruption stays written.

use super::{CC_SLOT_CNT, CcMode};
use crate::{channel::ChannelState, midi_out::MidiSink};
use wmidi::{Channel, ControlFunction, U7};

/// Program number which begins a configuration sequence rather than changing program.
pub const CONFIGURATION_ENTRY: u8 = 0x6F;

/// Progress through the configuration sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigState {
    /// No sequence in progress; Control Change commands are played.
    #[default]
    Idle,
    /// Awaiting the byte holding the CC count and MIDI channel.
    AwaitingModeAndChannel,
    /// Awaiting CC assignments. The next one is stored in slot `remaining - 1`.
    AwaitingCc {
        /// Assignments still expected, always at least 1.
        remaining: u8,
    },
    /// Awaiting the velocity byte which completes the sequence.
    AwaitingVelocity,
}

impl ConfigState {
    /// Returns `true` when no sequence is in progress.
    pub fn is_idle(&self) -> bool {
        *self == Self::Idle
    }
}

impl ChannelState {
    /// Begins a configuration sequence, discarding any sequence already in progress.
    pub(crate) fn enter_configuration(&mut self) {
        if !self.config.is_idle() {
            debug!("Restarting configuration sequence from {}", self.config);
        }
        self.config = ConfigState::AwaitingModeAndChannel;
    }

    /// Abandons any sequence in progress. Returns `true` if there was one.
    pub(crate) fn abandon_configuration(&mut self) -> bool {
        if self.config.is_idle() {
            return false;
        }
        info!("Configuration sequence abandoned at {}", self.config);
        self.config = ConfigState::Idle;
        true
    }

    /// Feeds a Control Change argument to the sequence in progress.
    ///
    /// Returns `false`, leaving everything untouched, if no sequence is in progress; the argument should then be
    /// played as an ordinary Control Change.
    pub(crate) fn configure(&mut self, data: u8, out: &mut impl MidiSink) -> bool {
        let state = self.config;
        self.config = match state {
            ConfigState::Idle => return false,
            ConfigState::AwaitingModeAndChannel => self.apply_mode_and_channel(data, out),
            ConfigState::AwaitingCc { remaining } => {
                let slot = remaining - 1;
                self.settings.cc_numbers[usize::from(slot)] =
                    Some(ControlFunction(U7::from_u8_lossy(data)));
                debug!("CC slot {} assigned controller {}", slot, data);
                match slot {
                    0 => ConfigState::AwaitingVelocity,
                    _ => ConfigState::AwaitingCc { remaining: slot },
                }
            }
            ConfigState::AwaitingVelocity => {
                self.settings.velocity = data;
                info!("Configuration complete: {}", self.settings);
                ConfigState::Idle
            }
        };
        true
    }

    /// Applies the byte holding the CC count (high nibble) and MIDI channel (low nibble).
    ///
    /// Arguments from the link are below `0x70`, so at most 6 CCs can be announced that way. The clamp to
    /// [`CC_SLOT_CNT`] only matters for bytes fed in directly.
    fn apply_mode_and_channel(&mut self, data: u8, out: &mut impl MidiSink) -> ConfigState {
        let midi_channel = midi_channel_from_nibble(data);
        if midi_channel != self.settings.midi_channel {
            // the sounding note was started on the old channel and must be stopped there
            self.stop_note(out);
            self.settings.midi_channel = midi_channel;
        }

        let announced = data >> 4;
        let cc_cnt = announced.min(CC_SLOT_CNT as u8);
        if cc_cnt != announced {
            warn!(
                "CC count {} exceeds {} slots; clamping",
                announced, CC_SLOT_CNT
            );
        }

        self.settings.cc_numbers = [None; CC_SLOT_CNT];
        debug!(
            "Configuring MIDI channel {} with {} CC slot(s)",
            midi_channel.number(),
            cc_cnt
        );

        match cc_cnt {
            0 => ConfigState::AwaitingVelocity,
            1 => {
                self.settings.cc_mode = CcMode::Single;
                ConfigState::AwaitingCc { remaining: 1 }
            }
            _ => {
                self.settings.cc_mode = CcMode::Scaled;
                ConfigState::AwaitingCc { remaining: cc_cnt }
            }
        }
    }
}

fn midi_channel_from_nibble(data: u8) -> Channel {
    // masked to four bits, so every value maps to a channel
    Channel::from_index(data & 0x0F).unwrap_or(Channel::Ch1)
}
