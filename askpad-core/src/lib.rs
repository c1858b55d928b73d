#![cfg_attr(not(feature = "std"), no_std)]

//! # Askpad Core
//!
//! Keypad-driven remote control transmitter logic for embedded systems.
//! A 4x4 matrix keypad selects one of a fixed set of RadioHead ASK packets,
//! which is clocked out one bit per timer tick on a single output line.

pub mod types;
pub mod hal;
pub mod mailbox;
pub mod frame;
pub mod radiohead;
pub mod keypad;
pub mod sequencer;
pub mod dispatcher;

#[cfg(feature = "test-utils")]
pub mod sim;


pub use types::*;
pub use hal::{*, Instant, Duration};
pub use mailbox::KeyMailbox;
pub use frame::{FrameTable, DEFAULT_FRAMES};
pub use radiohead::{DecodeError, Header, Packet};
pub use keypad::KeypadScanner;
pub use sequencer::{BitSequencer, SequencerError, TickOutcome};
pub use dispatcher::{command_index, CommandDispatcher, DispatchOutcome};

/// Askpad library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration: 2000 bit/s, 5 ms columns, 1 s guard
pub fn default_config() -> AskConfig {
    AskConfig {
        bit_period: Duration::from_micros(500),
        column_period: Duration::from_millis(5),
        guard_interval: Duration::from_millis(1000),
        priorities: Priorities::default(),
        invalid_key_policy: InvalidKeyPolicy::RetainPending,
    }
}
