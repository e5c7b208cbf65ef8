//! The task that moves bytes from the link port to the MIDI port.

use crate::delay::CycleDelay;
use embassy_stm32::{
    gpio::{Input, Level, Output},
    mode::Blocking,
    usart::UartTx,
};
use embassy_time::Instant;
use gb_link_midi_lib::{
    indicator::ActivityIndicator,
    link::LinkReader,
    midi_out::MidiOutBuffer,
    receiver::{Operation, Receiver},
};

/// Link reader wired to the board's pins.
pub type BoardLinkReader = LinkReader<Output<'static>, Input<'static>, CycleDelay>;

/// Polls the link, translating whatever arrives and writing the result to the MIDI port.
///
/// Each pass services the status LED, tries to read one byte, and yields so other tasks may run. MIDI is written
/// out before the next byte is read, keeping output in the same order as the tracker's commands.
///
/// `_serial_out` is held here so the pin keeps driving low for as long as the task runs.
#[embassy_executor::task]
pub async fn bridge_task(
    mut reader: BoardLinkReader,
    _serial_out: Output<'static>,
    mut midi_out: UartTx<'static, Blocking>,
    mut led: Output<'static>,
    mut indicator: ActivityIndicator,
) -> ! {
    let mut receiver = Receiver::new();
    let mut buffer = MidiOutBuffer::new();

    loop {
        led.set_level(Level::from(indicator.service(Instant::now())));

        if let Some(byte) = reader.try_read_byte() {
            let operation = receiver.receive(byte, &mut buffer);

            if !buffer.is_empty() {
                debug!("Writing {=[u8]:#x} to MIDI out", buffer.as_bytes());
                if let Err(e) = midi_out.blocking_write(buffer.as_bytes()) {
                    error!("MIDI out write failed: {}", e);
                }
                buffer.clear();
            }

            if operation.contains(Operation::MidiOut) {
                indicator.blink(Instant::now());
            }
        }

        embassy_futures::yield_now().await;
    }
}
