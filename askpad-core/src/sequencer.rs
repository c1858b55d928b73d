//! Timer-driven bit sequencer for the ASK link
//!
//! Once armed, every bit-tick interrupt emits one bit of the selected frame,
//! MSB-first within each nibble. After the 192nd bit the next tick drives the
//! line low, raises the single-shot done flag and stops advancing.

use portable_atomic::{AtomicU8, Ordering};

use crate::frame::{nibble_bit, FrameTable};
use crate::hal::TxLine;
use crate::types::{SequencerPhase, TransmissionState, FRAME_NIBBLES};

const PHASE_IDLE: u8 = 0;
const PHASE_RUNNING: u8 = 1;
const PHASE_DONE: u8 = 2;

/// Why an arm request was refused
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencerError {
    /// A frame is on air, or the last one has not been observed yet
    Busy,
    /// Selector has no row in the frame table
    InvalidCommand(u8),
}

#[cfg(feature = "std")]
impl core::fmt::Display for SequencerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SequencerError::Busy => write!(f, "Transmission already in progress"),
            SequencerError::InvalidCommand(cmd) => write!(f, "No frame for command {}", cmd),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SequencerError {}

/// Result of one bit tick
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Not armed
    Idle,
    /// Level for this bit period
    Bit(bool),
    /// Terminal tick, line returned low
    Finished,
}

impl TickOutcome {
    /// Line level for this tick
    pub const fn level(&self) -> bool {
        match self {
            TickOutcome::Bit(level) => *level,
            TickOutcome::Idle | TickOutcome::Finished => false,
        }
    }
}

/// Bit sequencer state
/// Safe for use in interrupt contexts
///
/// The control loop only arms while the phase is Idle, and the tick handler
/// only advances while it is Running; the phase store/load pair (Release /
/// Acquire) hands the indices from one side to the other.
pub struct BitSequencer<'a> {
    frames: FrameTable<'a>,
    phase: AtomicU8,
    nibble_index: AtomicU8,
    bit_index: AtomicU8,
    command: AtomicU8,
}

impl<'a> BitSequencer<'a> {
    pub const fn new(frames: FrameTable<'a>) -> Self {
        Self {
            frames,
            phase: AtomicU8::new(PHASE_IDLE),
            nibble_index: AtomicU8::new(0),
            bit_index: AtomicU8::new(0),
            command: AtomicU8::new(0),
        }
    }

    pub fn frames(&self) -> &FrameTable<'a> {
        &self.frames
    }

    /// Select a frame and start emitting on the next tick
    pub fn arm(&self, command: u8) -> Result<(), SequencerError> {
        if self.phase.load(Ordering::Acquire) != PHASE_IDLE {
            return Err(SequencerError::Busy);
        }
        if !self.frames.contains(command) {
            return Err(SequencerError::InvalidCommand(command));
        }
        self.nibble_index.store(0, Ordering::Relaxed);
        self.bit_index.store(0, Ordering::Relaxed);
        self.command.store(command, Ordering::Relaxed);
        self.phase.store(PHASE_RUNNING, Ordering::Release);

        #[cfg(feature = "defmt")]
        defmt::debug!("Armed command {}", command);

        Ok(())
    }

    /// Advance one bit period (called from bit timer interrupt)
    pub fn step(&self) -> TickOutcome {
        if self.phase.load(Ordering::Acquire) != PHASE_RUNNING {
            return TickOutcome::Idle;
        }

        let nibble_index = self.nibble_index.load(Ordering::Relaxed);
        if nibble_index as usize >= FRAME_NIBBLES {
            self.nibble_index.store(0, Ordering::Relaxed);
            self.bit_index.store(0, Ordering::Relaxed);
            self.phase.store(PHASE_DONE, Ordering::Release);
            return TickOutcome::Finished;
        }

        let bit_index = self.bit_index.load(Ordering::Relaxed);
        let command = self.command.load(Ordering::Relaxed);
        // Selector was validated by `arm`
        let nibble = self
            .frames
            .nibble(command, nibble_index as usize)
            .unwrap_or(0);
        let level = nibble_bit(nibble, bit_index);

        if bit_index >= 3 {
            self.bit_index.store(0, Ordering::Relaxed);
            self.nibble_index.store(nibble_index + 1, Ordering::Relaxed);
        } else {
            self.bit_index.store(bit_index + 1, Ordering::Relaxed);
        }

        TickOutcome::Bit(level)
    }

    /// Step and drive the output line (called from bit timer interrupt)
    pub fn on_bit_tick<T: TxLine>(&self, tx: &mut T) -> Result<TickOutcome, T::Error> {
        let outcome = self.step();
        tx.set_level(outcome.level())?;
        Ok(outcome)
    }

    /// Single-shot completion check: true once per finished frame
    pub fn is_done(&self) -> bool {
        self.phase
            .compare_exchange(PHASE_DONE, PHASE_IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn phase(&self) -> SequencerPhase {
        match self.phase.load(Ordering::Acquire) {
            PHASE_RUNNING => SequencerPhase::Running,
            PHASE_DONE => SequencerPhase::Done,
            _ => SequencerPhase::Idle,
        }
    }

    /// Position snapshot
    pub fn state(&self) -> TransmissionState {
        TransmissionState {
            nibble_index: self.nibble_index.load(Ordering::Relaxed),
            bit_index: self.bit_index.load(Ordering::Relaxed),
            command: self.command.load(Ordering::Relaxed),
            done: self.phase.load(Ordering::Acquire) == PHASE_DONE,
        }
    }

    /// Back to power-on state
    pub fn reset(&self) {
        self.phase.store(PHASE_IDLE, Ordering::Release);
        self.nibble_index.store(0, Ordering::Relaxed);
        self.bit_index.store(0, Ordering::Relaxed);
        self.command.store(0, Ordering::Relaxed);
    }
}
