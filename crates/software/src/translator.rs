//! Translates tracker commands into MIDI messages for a single channel.

use crate::{
    channel::ChannelState,
    configuration::{CcMode, PROTOCOL_VALUE_MAX},
    midi_out::MidiSink,
};
use wmidi::{MidiMessage, Note, U7};

/// Velocity sent with every Note Off.
const NOTE_OFF_VELOCITY: u8 = 0x40;

/// Largest value of a nibble-sized argument in [`CcMode::Scaled`].
const NIBBLE_MAX: u8 = 0x0F;

/// Largest MIDI data value.
const MIDI_DATA_MAX: u16 = 0x7F;

/// Rescales `value` from `0..=max` to the MIDI data range, truncating.
fn rescale(value: u8, max: u8) -> U7 {
    let scaled = u16::from(value) * MIDI_DATA_MAX / u16::from(max);
    U7::from_u8_lossy(scaled.min(MIDI_DATA_MAX) as u8)
}

/// Rescales a tracker argument (`0..=0x6F`) to a MIDI data value.
pub(crate) fn scale_protocol_value(value: u8) -> U7 {
    rescale(value, PROTOCOL_VALUE_MAX)
}

/// Rescales a nibble (`0..=0xF`) to a MIDI data value.
pub(crate) fn scale_nibble(value: u8) -> U7 {
    rescale(value & NIBBLE_MAX, NIBBLE_MAX)
}

impl ChannelState {
    /// Silences the current note, if any. Returns `true` if a Note Off was sent.
    pub(crate) fn stop_note(&mut self, out: &mut impl MidiSink) -> bool {
        let Some(note) = self.current_note.take() else {
            return false;
        };
        out.send(MidiMessage::NoteOff(
            self.settings.midi_channel,
            note,
            U7::from_u8_lossy(NOTE_OFF_VELOCITY),
        ));
        true
    }

    /// Handles a Note command: the current note always stops, and a non-zero `data` starts a new one.
    pub(crate) fn play_note(&mut self, data: u8, out: &mut impl MidiSink) {
        self.stop_note(out);
        if data == 0 {
            return;
        }

        let note = Note::from(U7::from_u8_lossy(data));
        self.current_note = Some(note);
        out.send(MidiMessage::NoteOn(
            self.settings.midi_channel,
            note,
            scale_protocol_value(self.settings.velocity),
        ));
    }

    /// Handles a Control Change command. Nothing is sent if the addressed slot is unset.
    pub(crate) fn control_change(&self, data: u8, out: &mut impl MidiSink) {
        let (slot, value) = match self.settings.cc_mode {
            CcMode::Single => (0, scale_protocol_value(data)),
            CcMode::Scaled => (usize::from(data >> 4), scale_nibble(data)),
        };

        match self.settings.cc_number(slot) {
            Some(control_function) => out.send(MidiMessage::ControlChange(
                self.settings.midi_channel,
                control_function,
                value,
            )),
            None => debug!("CC slot {} unset, suppressing {=u8:#x}", slot, data),
        }
    }

    /// Handles a Program Change command; the program number passes through unscaled.
    pub(crate) fn program_change(&self, data: u8, out: &mut impl MidiSink) {
        out.send(MidiMessage::ProgramChange(
            self.settings.midi_channel,
            U7::from_u8_lossy(data),
        ));
    }
}
