//! Provides [`FrameClassifier`], which splits the link byte stream into transport events and channel commands.
//!
//! The tracker sends a 7-bit payload in every byte; payloads from `0x70` up are commands, the rest are arguments.
//! Channel commands take exactly one argument:
//!
//! | payload       | meaning                                    |
//! |---------------|--------------------------------------------|
//! | `0x70..=0x73` | Note on channel `payload & 3`              |
//! | `0x74..=0x77` | Control Change on channel `payload & 3`    |
//! | `0x78..=0x7B` | Program Change on channel `payload & 3`    |
//! | `0x7C`        | reserved                                   |
//! | `0x7D`        | Start                                      |
//! | `0x7E`        | Stop                                       |
//! | `0x7F`        | clock tick                                 |

use crate::channel::Source;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Payloads at or above this value are commands.
const COMMAND_BASE: u8 = 0x70;
const RESERVED: u8 = 0x7C;
const START: u8 = 0x7D;
const STOP: u8 = 0x7E;
const CLOCK_TICK: u8 = 0x7F;
const PAYLOAD_MASK: u8 = 0x7F;

/// The kind of channel command, encoded in bits 3–2 of the command payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    /// Start a note, or stop the current one when the argument is 0.
    Note,
    /// Send a controller value, or feed the configuration sequence.
    ControlChange,
    /// Change program, or begin the configuration sequence.
    ProgramChange,
}

/// A channel command together with its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelEvent {
    /// The tracker channel the command belongs to.
    pub source: Source,
    /// What to do.
    pub kind: CommandKind,
    /// The argument, a 7-bit value.
    pub data: u8,
}

/// A complete unit of meaning from the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    /// The tracker started playing.
    Start,
    /// The tracker stopped playing.
    Stop,
    /// A channel command with its argument.
    Event(ChannelEvent),
}

/// Where the classifier is within a frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameState {
    /// Arguments are discarded until a command arrives.
    #[default]
    AwaitingCommand,
    /// A channel command arrived; the next argument completes it.
    AwaitingData {
        /// The channel the pending command belongs to.
        source: Source,
        /// The pending command.
        kind: CommandKind,
    },
}

/// Two-state machine turning link bytes into [`Frame`]s.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FrameClassifier {
    state: FrameState,
}

impl FrameClassifier {
    /// Constructs a `FrameClassifier` awaiting a command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Advances the classifier by one link byte, returning a [`Frame`] if the byte completed one.
    ///
    /// The top bit of `byte` is ignored. Arguments arriving without a pending command are discarded, which is how
    /// the classifier resynchronizes after joining a stream midway.
    pub fn advance(&mut self, byte: u8) -> Option<Frame> {
        let payload = byte & PAYLOAD_MASK;

        if payload < COMMAND_BASE {
            return match core::mem::take(&mut self.state) {
                FrameState::AwaitingCommand => {
                    trace!("Discarding argument {=u8:#x} with no pending command", payload);
                    None
                }
                FrameState::AwaitingData { source, kind } => Some(Frame::Event(ChannelEvent {
                    source,
                    kind,
                    data: payload,
                })),
            };
        }

        match payload {
            // neither affects framing; ticks may arrive between a command and its argument
            CLOCK_TICK | RESERVED => None,
            START => {
                self.state = FrameState::AwaitingCommand;
                Some(Frame::Start)
            }
            STOP => {
                self.state = FrameState::AwaitingCommand;
                Some(Frame::Stop)
            }
            _ => {
                let command = payload - COMMAND_BASE;
                // `command` is at most 0x0B here, so bits 3–2 are 0, 1 or 2
                self.state = match CommandKind::from_u8(command >> 2) {
                    Some(kind) => FrameState::AwaitingData {
                        source: Source::from_bits(command),
                        kind,
                    },
                    None => FrameState::AwaitingCommand,
                };
                None
            }
        }
    }
}
