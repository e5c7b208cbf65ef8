//! Provides the [`MidiSink`] trait through which translated messages leave the receiver, and [`MidiOutBuffer`], a sink
//! that encodes them for a serial MIDI port.

use tinyvec::ArrayVec;
use wmidi::MidiMessage;

/// Large enough for the worst case produced by a single received byte: a Stop silencing all four channels.
const MIDI_OUT_BUFFER_SIZE: usize = 32;

/// Longest channel message the receiver produces.
const MAX_MESSAGE_LEN: usize = 3;

/// A destination for outbound MIDI messages.
pub trait MidiSink {
    /// Accepts a single message.
    fn send(&mut self, msg: MidiMessage<'static>);
}

/// Collects outbound messages as raw MIDI bytes, ready to be written to a UART.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiOutBuffer {
    data: ArrayVec<[u8; MIDI_OUT_BUFFER_SIZE]>,
}

impl MidiOutBuffer {
    /// Construct an empty `MidiOutBuffer`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The encoded bytes collected so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns `true` if nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Discards everything collected, typically after the bytes have been written out.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl MidiSink for MidiOutBuffer {
    fn send(&mut self, msg: MidiMessage<'static>) {
        let mut encoded = [0_u8; MAX_MESSAGE_LEN];
        let len = match msg.copy_to_slice(&mut encoded) {
            Ok(len) => len,
            Err(_) => {
                error!("Outbound MIDI message does not fit in {} bytes", MAX_MESSAGE_LEN);
                return;
            }
        };

        // messages are never split
        if self.data.capacity() - self.data.len() < len {
            error!("MIDI out buffer full, dropping message");
            return;
        }
        self.data.extend_from_slice(&encoded[..len]);
    }
}

#[cfg(test)]
impl MidiSink for std::vec::Vec<MidiMessage<'static>> {
    fn send(&mut self, msg: MidiMessage<'static>) {
        self.push(msg);
    }
}
