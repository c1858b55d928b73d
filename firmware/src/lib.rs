#![no_std]

//! Firmware library: TM4C123 board support and the statics shared between
//! the control loop and the interrupt handlers

pub use askpad_core::*;

pub use crate::tm4c123_hardware::*;

// TM4C123 hardware module
pub mod tm4c123_hardware;

/// Key handed from the row-edge handler to the control loop
pub static MAILBOX: KeyMailbox = KeyMailbox::new();

/// Keypad column rotation and row decoding
pub static SCANNER: KeypadScanner = KeypadScanner::new(DEFAULT_KEYMAP);

/// Frame emitter driven by the bit tick
pub static SEQUENCER: BitSequencer<'static> = BitSequencer::new(DEFAULT_FRAMES);

/// Row edge handler body
pub fn on_row_edge() {
    let mut rows = PortARows;
    // Register access cannot fail
    let _ = SCANNER.on_row_edge(&mut rows, &MAILBOX);
}

/// Column tick handler body
pub fn on_column_tick() {
    ack_column_tick();
    let mut columns = PortEColumns;
    let _ = SCANNER.on_column_tick(&mut columns);
}

/// Bit tick handler body
pub fn on_bit_tick() {
    ack_bit_tick();
    let mut tx = PortBTx;
    let _ = SEQUENCER.on_bit_tick(&mut tx);
}
