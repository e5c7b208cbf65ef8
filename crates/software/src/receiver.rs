//! Provides [`Receiver`], which consumes link bytes and emits MIDI.

use crate::{
    channel::{ChannelState, SOURCE_CNT, Source},
    configuration::CONFIGURATION_ENTRY,
    frame::{ChannelEvent, CommandKind, Frame, FrameClassifier, FrameState},
    midi_out::MidiSink,
};
use bitmask_enum::bitmask;
use wmidi::MidiMessage;

/// Operations that may be performed while receiving a byte.
#[bitmask(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// The transport started or stopped.
    TransportChange,
    /// At least one MIDI message was sent.
    MidiOut,
    /// A configuration sequence was entered, advanced, or abandoned.
    Configuration,
}

/// The receiving end of the link: frames bytes, keeps per-channel state, and translates commands into MIDI.
///
/// Nothing is sent while the transport is stopped, though bytes are still framed so the receiver is in step with the
/// tracker as soon as playback starts.
#[derive(Clone, Debug, Default)]
pub struct Receiver {
    classifier: FrameClassifier,
    started: bool,
    channels: [ChannelState; SOURCE_CNT],
}

impl Receiver {
    /// Constructs a stopped `Receiver` with every channel at its defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while the tracker is playing.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// State of the given tracker channel.
    pub fn channel(&self, source: Source) -> &ChannelState {
        &self.channels[source.index()]
    }

    /// Where the framing layer is within a frame.
    pub fn frame_state(&self) -> FrameState {
        self.classifier.state()
    }

    /// Processes a single link byte, sending any resulting MIDI messages to `out`. Returns the [`Operation`]s the
    /// byte caused.
    pub fn receive(&mut self, byte: u8, out: &mut impl MidiSink) -> Operation {
        let mut out = Tally::new(out);
        let mut operation = match self.classifier.advance(byte) {
            None => Operation::none(),
            Some(Frame::Start) => self.start(),
            Some(Frame::Stop) => self.stop(&mut out),
            Some(Frame::Event(event)) if self.started => self.dispatch(event, &mut out),
            Some(Frame::Event(event)) => {
                trace!("Transport stopped, dropping {}", event);
                Operation::none()
            }
        };

        if out.sent > 0 {
            operation |= Operation::MidiOut;
        }
        operation
    }

    fn start(&mut self) -> Operation {
        let mut operation = self.abandon_all_configuration();
        if !self.started {
            info!("Transport started");
            self.started = true;
            operation |= Operation::TransportChange;
        }
        operation
    }

    fn stop(&mut self, out: &mut impl MidiSink) -> Operation {
        let mut operation = self.abandon_all_configuration();
        for channel in self.channels.iter_mut() {
            channel.stop_note(out);
        }
        if self.started {
            info!("Transport stopped");
            self.started = false;
            operation |= Operation::TransportChange;
        }
        operation
    }

    fn abandon_all_configuration(&mut self) -> Operation {
        self.channels
            .iter_mut()
            .fold(Operation::none(), |operation, channel| {
                if channel.abandon_configuration() {
                    operation | Operation::Configuration
                } else {
                    operation
                }
            })
    }

    fn dispatch(&mut self, event: ChannelEvent, out: &mut impl MidiSink) -> Operation {
        debug!("Received {}", event);
        let channel = &mut self.channels[event.source.index()];
        let mut operation = Operation::none();

        match event.kind {
            CommandKind::Note => {
                if channel.abandon_configuration() {
                    operation |= Operation::Configuration;
                }
                channel.play_note(event.data, out);
            }
            CommandKind::ControlChange => {
                if channel.configure(event.data, out) {
                    operation |= Operation::Configuration;
                } else {
                    channel.control_change(event.data, out);
                }
            }
            CommandKind::ProgramChange if event.data == CONFIGURATION_ENTRY => {
                info!("Configuration sequence entered on {}", event.source);
                channel.enter_configuration();
                operation |= Operation::Configuration;
            }
            CommandKind::ProgramChange => {
                if channel.abandon_configuration() {
                    operation |= Operation::Configuration;
                }
                channel.program_change(event.data, out);
            }
        }
        operation
    }
}

/// Counts messages on their way to the wrapped sink.
struct Tally<'a, S> {
    inner: &'a mut S,
    sent: usize,
}

impl<'a, S: MidiSink> Tally<'a, S> {
    fn new(inner: &'a mut S) -> Self {
        Self { inner, sent: 0 }
    }
}

impl<S: MidiSink> MidiSink for Tally<'_, S> {
    fn send(&mut self, msg: MidiMessage<'static>) {
        self.sent += 1;
        self.inner.send(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        configuration::{CcMode, ConfigState},
        midi_out::MidiOutBuffer,
    };
    use std::{vec, vec::Vec};
    use wmidi::{Channel, ControlFunction, Note, U7};

    const START: u8 = 0xFD;
    const STOP: u8 = 0xFE;
    const TICK: u8 = 0xFF;

    fn note(source: u8, data: u8) -> [u8; 2] {
        [0xF0 | source, 0x80 | data]
    }

    fn cc(source: u8, data: u8) -> [u8; 2] {
        [0xF4 | source, 0x80 | data]
    }

    fn pc(source: u8, data: u8) -> [u8; 2] {
        [0xF8 | source, 0x80 | data]
    }

    fn u7(n: u8) -> U7 {
        U7::from_u8_lossy(n)
    }

    fn note_on(channel: Channel, n: u8) -> MidiMessage<'static> {
        MidiMessage::NoteOn(channel, Note::from(u7(n)), u7(127))
    }

    fn note_off(channel: Channel, n: u8) -> MidiMessage<'static> {
        MidiMessage::NoteOff(channel, Note::from(u7(n)), u7(0x40))
    }

    fn send(receiver: &mut Receiver, bytes: &[u8]) -> Vec<MidiMessage<'static>> {
        let mut out: Vec<MidiMessage> = Vec::new();
        for &byte in bytes {
            receiver.receive(byte, &mut out);
        }
        out
    }

    fn started() -> Receiver {
        let mut receiver = Receiver::new();
        send(&mut receiver, &[START]);
        receiver
    }

    /// Configures `source` to MIDI channel index 2, a single CC (74), velocity 0x37.
    fn configured(source: u8) -> Receiver {
        let mut receiver = started();
        send(&mut receiver, &pc(source, 0x6F));
        send(&mut receiver, &cc(source, 0x12));
        send(&mut receiver, &cc(source, 74));
        send(&mut receiver, &cc(source, 0x37));
        receiver
    }

    #[test]
    fn new_receiver_is_stopped() {
        let receiver = Receiver::new();
        assert!(!receiver.is_started(), "Should start stopped");
        for source in Source::ALL {
            assert_eq!(
                &ChannelState::default(),
                receiver.channel(source),
                "Expected left but got right"
            );
        }
    }

    #[test]
    fn note_on_for_every_note() {
        let mut receiver = started();
        let mut previous = None;
        for n in 1..=0x6F {
            let out = send(&mut receiver, &note(0, n));
            let expected = match previous {
                Some(m) => vec![note_off(Channel::Ch1, m), note_on(Channel::Ch1, n)],
                None => vec![note_on(Channel::Ch1, n)],
            };
            assert_eq!(expected, out, "Expected left but got right for note {n}");
            previous = Some(n);
        }
    }

    #[test]
    fn note_zero_stops_sounding_note() {
        let mut receiver = started();
        send(&mut receiver, &note(1, 60));
        let out = send(&mut receiver, &note(1, 0));
        assert_eq!(vec![note_off(Channel::Ch1, 60)], out, "Expected left but got right");
        assert_eq!(
            None,
            receiver.channel(Source::Pulse2).current_note(),
            "Expected left but got right"
        );
    }

    #[test]
    fn stop_silences_only_sounding_channels_once() {
        let mut receiver = started();
        send(&mut receiver, &note(0, 60));
        send(&mut receiver, &note(2, 64));

        let mut out: Vec<MidiMessage> = Vec::new();
        let operation = receiver.receive(STOP, &mut out);
        assert_eq!(
            vec![note_off(Channel::Ch1, 60), note_off(Channel::Ch1, 64)],
            out,
            "Expected left but got right"
        );
        assert!(operation.contains(Operation::TransportChange), "Transport should change");
        assert!(operation.contains(Operation::MidiOut), "Notes should be stopped");

        let mut out: Vec<MidiMessage> = Vec::new();
        let operation = receiver.receive(STOP, &mut out);
        assert!(out.is_empty(), "Second Stop should send nothing");
        assert!(operation.is_none(), "Second Stop should do nothing");
    }

    #[test]
    fn start_is_idempotent() {
        let mut receiver = started();
        let mut out: Vec<MidiMessage> = Vec::new();
        let operation = receiver.receive(START, &mut out);
        assert!(operation.is_none(), "Expected no operation");
        assert!(receiver.is_started(), "Should still be started");
    }

    #[test]
    fn nothing_sent_while_stopped() {
        let mut receiver = Receiver::new();
        let mut bytes = Vec::new();
        bytes.extend(note(0, 60));
        bytes.extend(cc(1, 0x20));
        bytes.extend(pc(2, 5));
        bytes.extend(pc(3, 0x6F));
        bytes.extend(cc(3, 0x12));
        let out = send(&mut receiver, &bytes);

        assert!(out.is_empty(), "Nothing should be sent while stopped");
        assert_eq!(
            &ChannelState::default(),
            receiver.channel(Source::Noise),
            "Configuration should not happen while stopped"
        );
    }

    #[test]
    fn framing_survives_stopped_period() {
        let mut receiver = Receiver::new();
        // the note command's argument is consumed while stopped, leaving a stray argument for after Start
        send(&mut receiver, &note(0, 60));
        assert_eq!(
            FrameState::AwaitingCommand,
            receiver.frame_state(),
            "Expected left but got right"
        );
        let out = send(&mut receiver, &[START, 0x80 | 62]);
        assert!(out.is_empty(), "Stray argument should be discarded");

        let out = send(&mut receiver, &note(0, 62));
        assert_eq!(vec![note_on(Channel::Ch1, 62)], out, "Expected left but got right");
    }

    #[test]
    fn ticks_between_command_and_argument() {
        let mut receiver = started();
        let out = send(&mut receiver, &[0xF0, TICK, 0x80 | 60]);
        assert_eq!(vec![note_on(Channel::Ch1, 60)], out, "Expected left but got right");
    }

    #[test]
    fn program_change_passes_through() {
        let mut receiver = started();
        let out = send(&mut receiver, &pc(0, 0x6E));
        assert_eq!(
            vec![MidiMessage::ProgramChange(Channel::Ch1, u7(0x6E))],
            out,
            "Expected left but got right"
        );
    }

    #[test]
    fn configuration_round_trip() {
        let mut receiver = started();
        let mut out: Vec<MidiMessage> = Vec::new();
        let mut operation = Operation::none();
        for byte in [pc(0, 0x6F), cc(0, 0x12), cc(0, 74), cc(0, 0x37)]
            .iter()
            .flatten()
        {
            operation |= receiver.receive(*byte, &mut out);
        }
        assert!(out.is_empty(), "Configuration should send nothing");
        assert_eq!(
            Operation::Configuration,
            operation,
            "Expected left but got right"
        );

        let settings = receiver.channel(Source::Pulse1).settings();
        assert_eq!(Channel::Ch3, settings.midi_channel(), "Expected left but got right");
        assert_eq!(CcMode::Single, settings.cc_mode(), "Expected left but got right");
        assert_eq!(
            Some(ControlFunction(u7(74))),
            settings.cc_number(0),
            "Expected left but got right"
        );
        assert_eq!(0x37, settings.velocity(), "Expected left but got right");
        assert_eq!(
            ConfigState::Idle,
            receiver.channel(Source::Pulse1).config_state(),
            "Expected left but got right"
        );

        let out = send(&mut receiver, &[note(0, 60), cc(0, 0x6F)].concat());
        assert_eq!(
            vec![
                MidiMessage::NoteOn(Channel::Ch3, Note::C4, u7(62)),
                MidiMessage::ControlChange(Channel::Ch3, ControlFunction(u7(74)), u7(127)),
            ],
            out,
            "New settings should apply immediately"
        );
    }

    #[test]
    fn configuration_is_per_channel() {
        let mut receiver = configured(1);
        assert_eq!(
            &ChannelState::default(),
            receiver.channel(Source::Pulse1),
            "Other channels should be untouched"
        );

        // a sequence in progress on one channel doesn't capture another channel's CCs
        send(&mut receiver, &pc(2, 0x6F));
        let out = send(&mut receiver, &cc(1, 0x00));
        assert_eq!(
            vec![MidiMessage::ControlChange(
                Channel::Ch3,
                ControlFunction(u7(74)),
                u7(0)
            )],
            out,
            "Expected left but got right"
        );
        assert_eq!(
            ConfigState::AwaitingModeAndChannel,
            receiver.channel(Source::Wave).config_state(),
            "Expected left but got right"
        );
    }

    #[test]
    fn interrupted_configuration_keeps_applied_fields() {
        let mut receiver = started();
        send(&mut receiver, &pc(0, 0x6F));
        send(&mut receiver, &cc(0, 0x32));
        send(&mut receiver, &cc(0, 0x0A));

        let out = send(&mut receiver, &note(0, 60));
        assert_eq!(
            vec![note_on(Channel::Ch3, 60)],
            out,
            "Note should be played with the partially applied settings"
        );

        let channel = receiver.channel(Source::Pulse1);
        assert!(channel.config_state().is_idle(), "Sequence should be abandoned");
        assert_eq!(CcMode::Scaled, channel.settings().cc_mode(), "Expected left but got right");
        assert_eq!(
            Some(ControlFunction(u7(0x0A))),
            channel.settings().cc_number(2),
            "Expected left but got right"
        );
        assert_eq!(None, channel.settings().cc_number(1), "Expected left but got right");

        // CCs are played again once the sequence is abandoned
        let out = send(&mut receiver, &cc(0, 0x2F));
        assert_eq!(
            vec![MidiMessage::ControlChange(
                Channel::Ch3,
                ControlFunction(u7(0x0A)),
                u7(127)
            )],
            out,
            "Expected left but got right"
        );
    }

    #[test]
    fn program_change_interrupts_configuration() {
        let mut receiver = started();
        send(&mut receiver, &pc(0, 0x6F));
        let out = send(&mut receiver, &pc(0, 3));
        assert_eq!(
            vec![MidiMessage::ProgramChange(Channel::Ch1, u7(3))],
            out,
            "Expected left but got right"
        );
        assert!(
            receiver.channel(Source::Pulse1).config_state().is_idle(),
            "Sequence should be abandoned"
        );
    }

    #[test]
    fn transport_interrupts_configuration_everywhere() {
        let mut receiver = started();
        send(&mut receiver, &pc(0, 0x6F));
        send(&mut receiver, &pc(3, 0x6F));
        send(&mut receiver, &cc(3, 0x20));

        let mut out: Vec<MidiMessage> = Vec::new();
        let operation = receiver.receive(START, &mut out);
        assert_eq!(
            Operation::Configuration,
            operation,
            "Expected left but got right"
        );
        for source in Source::ALL {
            assert!(
                receiver.channel(source).config_state().is_idle(),
                "Sequence should be abandoned"
            );
        }
    }

    #[test]
    fn stop_interrupts_configuration_everywhere() {
        let mut receiver = started();
        send(&mut receiver, &note(0, 60));
        send(&mut receiver, &[pc(0, 0x6F), cc(0, 0x35), cc(0, 0x0A)].concat());
        send(&mut receiver, &pc(2, 0x6F));
        assert_eq!(
            ConfigState::AwaitingCc { remaining: 2 },
            receiver.channel(Source::Pulse1).config_state(),
            "Expected left but got right"
        );

        let mut out: Vec<MidiMessage> = Vec::new();
        let operation = receiver.receive(STOP, &mut out);
        assert!(
            operation.contains(Operation::Configuration),
            "Sequences should be abandoned"
        );
        assert!(
            operation.contains(Operation::TransportChange),
            "Transport should change"
        );
        for source in Source::ALL {
            assert!(
                receiver.channel(source).config_state().is_idle(),
                "Sequence should be abandoned"
            );
        }

        // once playing again, CCs are played rather than fed to the abandoned sequence
        let out = send(&mut receiver, &[START, 0xF4, 0x80 | 0x2F]);
        assert_eq!(
            vec![MidiMessage::ControlChange(
                Channel::Ch6,
                ControlFunction(u7(0x0A)),
                u7(127)
            )],
            out,
            "Expected left but got right"
        );
    }

    #[test]
    fn scaled_cc_with_unset_slot_is_suppressed() {
        let mut receiver = started();
        // two slots: 0x0B in slot 1, 0x0C in slot 0
        send(&mut receiver, &[pc(0, 0x6F), cc(0, 0x20), cc(0, 0x0B), cc(0, 0x0C), cc(0, 0x6F)].concat());

        let out = send(&mut receiver, &[cc(0, 0x55), cc(0, 0x1F), cc(0, 0x00)].concat());
        assert_eq!(
            vec![
                MidiMessage::ControlChange(Channel::Ch1, ControlFunction(u7(0x0B)), u7(127)),
                MidiMessage::ControlChange(Channel::Ch1, ControlFunction(u7(0x0C)), u7(0)),
            ],
            out,
            "Expected left but got right"
        );
    }

    #[test]
    fn channel_reassignment_stops_note_on_old_channel() {
        let mut receiver = started();
        send(&mut receiver, &note(0, 60));
        let out = send(&mut receiver, &[pc(0, 0x6F), cc(0, 0x05)].concat());
        assert_eq!(vec![note_off(Channel::Ch1, 60)], out, "Expected left but got right");

        let out = send(&mut receiver, &[cc(0, 0x6F), note(0, 62)].concat());
        assert_eq!(
            vec![note_on(Channel::Ch6, 62)],
            out,
            "No stale Note Off should follow"
        );
    }

    #[test]
    fn repeated_configuration_is_stable() {
        let once = configured(0);
        let mut twice = configured(0);
        send(&mut twice, &[pc(0, 0x6F), cc(0, 0x12), cc(0, 74), cc(0, 0x37)].concat());
        assert_eq!(
            once.channel(Source::Pulse1),
            twice.channel(Source::Pulse1),
            "Expected left but got right"
        );
    }

    #[test]
    fn bit_exact_output() {
        let mut receiver = configured(3);
        let mut out = MidiOutBuffer::new();
        for byte in [note(3, 60), note(3, 0), cc(3, 0x6F), pc(3, 9)].iter().flatten() {
            receiver.receive(*byte, &mut out);
        }
        receiver.receive(STOP, &mut out);
        assert_eq!(
            &[
                0x92, 0x3C, 0x3E, //
                0x82, 0x3C, 0x40, //
                0xB2, 0x4A, 0x7F, //
                0xC2, 0x09,
            ],
            out.as_bytes(),
            "Expected left but got right"
        );
    }
}
