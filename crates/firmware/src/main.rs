//! `gb_link_midi` is [Embassy](https://embassy.dev)-based firmware that turns a handheld console running a music
//! tracker into a MIDI controller. The tracker's MIDI-out mode streams commands over the console's link port; the
//! firmware clocks them in, translates them, and writes standard MIDI to a 5-pin DIN port. It runs on the
//! [Nucleo-F767ZI development board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html).
//!
//! Pin assignments:
//!
//! | signal                 | pin   |
//! |------------------------|-------|
//! | link clock (out)       | `PF13`|
//! | link serial in         | `PE9` |
//! | link serial out (low)  | `PF14`|
//! | MIDI out (USART2 TX)   | `PD5` |
//! | status LED (green LD1) | `PB0` |
//!
//! For details about the hardware or how to use the device, see the `README`.

#![no_std]
#![no_main]

#[macro_use]
mod fmt;

mod bridge;
mod delay;

use crate::{bridge::bridge_task, delay::CycleDelay};
use embassy_executor::Spawner;
use embassy_stm32::{
    Config,
    gpio::{Input, Level, Output, Pull, Speed},
    time::Hertz,
    usart::{self, UartTx},
};
use gb_link_midi_lib::{
    indicator::ActivityIndicator,
    link::{LinkReader, LinkTiming},
};

#[cfg(feature = "debug")]
use {defmt_rtt as _, panic_probe as _};

#[cfg(not(feature = "debug"))]
use panic_halt as _;

/// MIDI 1.0 DIN baud rate.
const MIDI_BAUD: u32 = 31_250;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing gb_link_midi");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock, supplied by the on-board ST-LINK
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz, see `delay::SYSCLK_HZ`
            divq: None,
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
    }
    let p = embassy_stm32::init(config);

    // the console drives nothing until the clock idles high, which `LinkReader::new` takes care of
    let link_clock = Output::new(p.PF13, Level::High, Speed::VeryHigh);
    let link_serial_in = Input::new(p.PE9, Pull::None);
    // only ever read from the console, so its serial in sees zeros
    let link_serial_out = Output::new(p.PF14, Level::Low, Speed::Low);
    let reader = LinkReader::new(link_clock, link_serial_in, CycleDelay, LinkTiming::default());

    let mut uart_config = usart::Config::default();
    uart_config.baudrate = MIDI_BAUD;
    let midi_out = unwrap!(UartTx::new_blocking(p.USART2, p.PD5, uart_config));

    let led = Output::new(p.PB0, Level::Low, Speed::Low);

    unwrap!(spawner.spawn(bridge_task(
        reader,
        link_serial_out,
        midi_out,
        led,
        ActivityIndicator::default()
    )));
}
