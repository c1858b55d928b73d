//! Control loop: key in, frame out
//!
//! ```text
//! WaitingForKey -> Transmitting(cmd) -> GuardInterval -> WaitingForKey
//! ```
//!
//! The keypad is suspended from the moment a key is picked up until the guard
//! interval has elapsed, so no scan transients reach the transmit line and no
//! second press is decoded mid-frame.

use crate::hal::{InterruptControl, IrqSource, Platform};
use crate::keypad::KeypadScanner;
use crate::mailbox::KeyMailbox;
use crate::sequencer::BitSequencer;
use crate::types::{AskConfig, DispatcherState, InvalidKeyPolicy, Priorities};

/// Table row selected by a key: its offset from `'0'`, wrapping for
/// characters below it
pub fn command_index(key: char) -> u8 {
    (key as u32 as u8).wrapping_sub(b'0')
}

/// How one dispatch cycle ended
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchOutcome {
    /// Full frame sent for `command`
    Sent { key: char, command: u8 },
    /// Key had no table row; nothing sent
    Skipped { key: char, command: u8 },
}

/// Apply the configured priorities to all three sources
pub fn configure_priorities<I: InterruptControl>(
    interrupts: &mut I,
    priorities: &Priorities,
) -> Result<(), I::Error> {
    interrupts.set_priority(IrqSource::BitTick, priorities.bit_tick)?;
    interrupts.set_priority(IrqSource::RowEdge, priorities.row_edge)?;
    interrupts.set_priority(IrqSource::ColumnTick, priorities.column_tick)?;
    Ok(())
}

/// Main dispatcher implementation
pub struct CommandDispatcher<'a, 'f> {
    mailbox: &'a KeyMailbox,
    scanner: &'a KeypadScanner,
    sequencer: &'a BitSequencer<'f>,
    config: AskConfig,
    state: DispatcherState,
}

impl<'a, 'f> CommandDispatcher<'a, 'f> {
    pub fn new(
        mailbox: &'a KeyMailbox,
        scanner: &'a KeypadScanner,
        sequencer: &'a BitSequencer<'f>,
        config: AskConfig,
    ) -> Self {
        Self {
            mailbox,
            scanner,
            sequencer,
            config,
            state: DispatcherState::WaitingForKey,
        }
    }

    /// Get current dispatcher state
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Get current configuration
    pub fn config(&self) -> &AskConfig {
        &self.config
    }

    /// Set priorities and start the keypad
    pub fn start<P: Platform>(&mut self, platform: &mut P) -> Result<(), P::Error> {
        configure_priorities(platform.interrupts(), &self.config.priorities)?;
        platform.interrupts().disable(IrqSource::BitTick)?;
        let (columns, interrupts) = platform.keypad_control();
        self.scanner.enable::<_, _, P::Error>(columns, interrupts)?;
        self.state = DispatcherState::WaitingForKey;

        #[cfg(feature = "defmt")]
        defmt::info!("Dispatcher started, {} commands", self.sequencer.frames().len());

        Ok(())
    }

    /// Run one WaitingForKey -> ... -> WaitingForKey cycle
    pub fn run_once<P: Platform>(&mut self, platform: &mut P) -> Result<DispatchOutcome, P::Error> {
        self.state = DispatcherState::WaitingForKey;
        while !self.mailbox.is_pending() {
            platform.wait_for_interrupt()?;
        }

        let (columns, interrupts) = platform.keypad_control();
        self.scanner.disable::<_, _, P::Error>(columns, interrupts)?;

        let key = self.mailbox.key();
        let command = command_index(key);

        let outcome = if self.sequencer.frames().contains(command) {
            self.transmit(platform, command)?;
            self.mailbox.clear();
            DispatchOutcome::Sent { key, command }
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("Key {} has no command, dropped", key);

            if self.config.invalid_key_policy == InvalidKeyPolicy::ClearAndIgnore {
                self.mailbox.clear();
            }
            DispatchOutcome::Skipped { key, command }
        };

        self.state = DispatcherState::GuardInterval;
        platform.guard_delay(self.config.guard_interval)?;

        let (columns, interrupts) = platform.keypad_control();
        self.scanner.enable::<_, _, P::Error>(columns, interrupts)?;
        self.state = DispatcherState::WaitingForKey;

        Ok(outcome)
    }

    /// Loop forever
    pub fn run<P: Platform>(&mut self, platform: &mut P) -> Result<core::convert::Infallible, P::Error> {
        loop {
            self.run_once(platform)?;
        }
    }

    fn transmit<P: Platform>(&mut self, platform: &mut P, command: u8) -> Result<(), P::Error> {
        self.state = DispatcherState::Transmitting(command);
        // Only armed from here, and only after the previous frame was observed
        // done, so Busy cannot occur; InvalidCommand was ruled out by the caller.
        if self.sequencer.arm(command).is_err() {
            return Err(crate::hal::HalError::InvalidConfig.into());
        }
        platform.interrupts().enable(IrqSource::BitTick)?;
        while !self.sequencer.is_done() {
            platform.wait_for_interrupt()?;
        }
        platform.interrupts().disable(IrqSource::BitTick)?;

        #[cfg(feature = "defmt")]
        defmt::info!("Sent command {}", command);

        Ok(())
    }
}
