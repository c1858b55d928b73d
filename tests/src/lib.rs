//! Host-based integration tests for the keypad ASK transmitter
//!
//! Everything runs against `askpad_core::sim::SimBoard`, which plays the
//! three interrupt sources from a virtual microsecond clock.

use askpad_core::sim::SimBoard;
use askpad_core::{AskConfig, BitSequencer, KeyMailbox, KeypadScanner, DEFAULT_FRAMES, DEFAULT_KEYMAP};

mod dispatcher_tests;
mod frame_tests;
mod keypad_tests;

/// Shared state a board and a dispatcher borrow from
pub struct Rig {
    pub mailbox: KeyMailbox,
    pub scanner: KeypadScanner,
    pub sequencer: BitSequencer<'static>,
    pub config: AskConfig,
}

impl Rig {
    pub fn new(config: AskConfig) -> Self {
        Self {
            mailbox: KeyMailbox::new(),
            scanner: KeypadScanner::new(DEFAULT_KEYMAP),
            sequencer: BitSequencer::new(DEFAULT_FRAMES),
            config,
        }
    }

    pub fn board(&self) -> SimBoard<'_, 'static> {
        SimBoard::new(&self.mailbox, &self.scanner, &self.sequencer, &self.config)
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new(AskConfig::default())
    }
}
