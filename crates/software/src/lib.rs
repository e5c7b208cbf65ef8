//! This crate contains architecture-agnostic logic for `gb_link_midi`, a device which lets a handheld console running
//! a music tracker drive modern music equipment. The tracker's MIDI-out mode streams a compact command set over the
//! console's link port; this crate clocks that stream in, frames it, and translates it into
//! [MIDI](https://midi.org/midi-1-0) channel messages.
//!
//! The pieces, from the wire up:
//! - [`link::LinkReader`] clocks bytes in over the link port.
//! - [`frame::FrameClassifier`] turns bytes into transport events and per-channel commands.
//! - [`configuration`] holds per-channel settings and the in-band sequence that rewrites them.
//! - [`receiver::Receiver`] ties it together and emits MIDI through a [`midi_out::MidiSink`].

#![deny(missing_docs)]
#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod channel;
pub mod configuration;
pub mod frame;
pub mod indicator;
pub mod link;
pub mod midi_out;
pub mod receiver;
mod translator;
