//! Deterministic host simulation of the board
//!
//! A virtual microsecond clock drives the bit tick and column tick at fixed
//! multiples of their periods. When several sources are due at the same
//! instant they are serviced in priority order: bit tick, column tick, row
//! edge. Key presses are modelled electrically: a row reads high while a held
//! key connects it to a driven column, and a low-to-high change latches the
//! row's edge status, which fires the row interrupt once it is unmasked.
//!
//! `wait_for_interrupt` fails with [`HalError::TimingError`] when no source
//! can fire again, or none fires before the optional deadline.

use std::vec::Vec;

use crate::frame::pack_bits;
use crate::hal::mock::{MockColumns, MockInterrupts, MockRows, MockTxLine};
use crate::hal::{Duration, HalError, Instant, IrqSource, Platform};
use crate::keypad::KeypadScanner;
use crate::mailbox::KeyMailbox;
use crate::sequencer::{BitSequencer, TickOutcome};
use crate::types::{AskConfig, KeyPress, FRAME_NIBBLES};

/// A scripted key hold
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScriptedPress {
    pub row: usize,
    pub col: usize,
    pub start_us: u64,
    pub end_us: u64,
}

impl ScriptedPress {
    fn is_held(&self, now_us: u64) -> bool {
        self.start_us <= now_us && now_us < self.end_us
    }
}

/// One captured frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transmission {
    pub command: u8,
    pub started: Instant,
    pub finished: Option<Instant>,
    pub bits: Vec<bool>,
}

impl Transmission {
    /// Bits re-packed into nibbles
    pub fn nibbles(&self) -> heapless::Vec<u8, FRAME_NIBBLES> {
        pack_bits(self.bits.iter().copied())
    }
}

/// Simulated board implementing [`Platform`]
pub struct SimBoard<'a, 'f> {
    mailbox: &'a KeyMailbox,
    scanner: &'a KeypadScanner,
    sequencer: &'a BitSequencer<'f>,
    bit_period_us: u64,
    column_period_us: u64,
    now_us: u64,
    columns: MockColumns,
    rows: MockRows,
    tx: MockTxLine,
    interrupts: MockInterrupts,
    presses: Vec<ScriptedPress>,
    row_levels: u8,
    current: Option<Transmission>,
    transmissions: Vec<Transmission>,
    decoded: Vec<(Instant, KeyPress)>,
    one_hot_violations: u32,
    keypad_active_during_tx: bool,
    deadline_us: Option<u64>,
}

impl<'a, 'f> SimBoard<'a, 'f> {
    pub fn new(
        mailbox: &'a KeyMailbox,
        scanner: &'a KeypadScanner,
        sequencer: &'a BitSequencer<'f>,
        config: &AskConfig,
    ) -> Self {
        Self {
            mailbox,
            scanner,
            sequencer,
            bit_period_us: config.bit_period.as_micros().max(1),
            column_period_us: config.column_period.as_micros().max(1),
            now_us: 0,
            columns: MockColumns::new(),
            rows: MockRows::new(),
            tx: MockTxLine::new(),
            interrupts: MockInterrupts::new(),
            presses: Vec::new(),
            row_levels: 0,
            current: None,
            transmissions: Vec::new(),
            decoded: Vec::new(),
            one_hot_violations: 0,
            keypad_active_during_tx: false,
            deadline_us: None,
        }
    }

    /// Hold the key at (row, col) from `at` for `hold`
    pub fn press_at(&mut self, row: usize, col: usize, at: Duration, hold: Duration) {
        let start_us = at.as_micros();
        self.presses.push(ScriptedPress {
            row,
            col,
            start_us,
            end_us: start_us + hold.as_micros(),
        });
    }

    /// Hold `key` (looked up in the scanner's key map); false if unmapped
    pub fn press(&mut self, key: char, at: Duration, hold: Duration) -> bool {
        match self.scanner.keymap().position(key) {
            Some((row, col)) => {
                self.press_at(row, col, at, hold);
                true
            }
            None => false,
        }
    }

    /// Make `wait_for_interrupt` fail once nothing fires before `at`
    pub fn set_deadline(&mut self, at: Duration) {
        self.deadline_us = Some(at.as_micros());
    }

    pub fn now(&self) -> Instant {
        Instant::from_micros(self.now_us)
    }

    pub fn columns_ref(&self) -> &MockColumns {
        &self.columns
    }

    pub fn rows_ref(&self) -> &MockRows {
        &self.rows
    }

    pub fn tx_ref(&self) -> &MockTxLine {
        &self.tx
    }

    pub fn interrupts_ref(&self) -> &MockInterrupts {
        &self.interrupts
    }

    /// Completed frames, oldest first
    pub fn transmissions(&self) -> &[Transmission] {
        &self.transmissions
    }

    /// Every key the row handler decoded, with its time
    pub fn decoded_keys(&self) -> &[(Instant, KeyPress)] {
        &self.decoded
    }

    /// Column ticks that left zero or several columns driven
    pub fn one_hot_violations(&self) -> u32 {
        self.one_hot_violations
    }

    /// True if any bit went out while the keypad was scanning
    pub fn keypad_active_during_tx(&self) -> bool {
        self.keypad_active_during_tx
    }

    /// Service events until the clock reaches `until`
    pub fn run_until(&mut self, until: Duration) -> Result<(), HalError> {
        let limit = until.as_micros();
        while self.service_next(Some(limit))? {}
        self.now_us = self.now_us.max(limit);
        self.sample_rows();
        Ok(())
    }

    fn next_multiple(&self, period: u64) -> u64 {
        (self.now_us / period + 1) * period
    }

    fn next_event_time(&self) -> Option<u64> {
        let mut next: Option<u64> = None;
        let mut consider = |t: u64| {
            next = Some(next.map_or(t, |n| n.min(t)));
        };
        if self.interrupts.is_enabled(IrqSource::BitTick) {
            consider(self.next_multiple(self.bit_period_us));
        }
        if self.interrupts.is_enabled(IrqSource::ColumnTick) {
            consider(self.next_multiple(self.column_period_us));
        }
        for press in &self.presses {
            for t in [press.start_us, press.end_us] {
                if t > self.now_us {
                    consider(t);
                }
            }
        }
        next
    }

    /// Recompute row levels and latch rising edges
    fn sample_rows(&mut self) {
        let driven = self.columns.pattern();
        let levels = self
            .presses
            .iter()
            .filter(|p| p.is_held(self.now_us) && driven & (1 << p.col) != 0)
            .fold(0u8, |acc, p| acc | 1 << p.row);
        let rising = levels & !self.row_levels;
        for row in 0..4 {
            if rising & (1 << row) != 0 {
                self.rows.raise(row);
            }
        }
        self.row_levels = levels;
    }

    fn service_rows(&mut self) -> Result<bool, HalError> {
        if self.rows.pending() == 0 || !self.interrupts.is_enabled(IrqSource::RowEdge) {
            return Ok(false);
        }
        if let Some(press) = self.scanner.on_row_edge(&mut self.rows, self.mailbox)? {
            self.decoded.push((self.now(), press));
        }
        Ok(true)
    }

    fn service_bit_tick(&mut self) -> Result<(), HalError> {
        let command = self.sequencer.state().command;
        match self.sequencer.on_bit_tick(&mut self.tx)? {
            TickOutcome::Idle => {}
            TickOutcome::Bit(level) => {
                if self.scanner.is_enabled() || self.columns.pattern() != 0 {
                    self.keypad_active_during_tx = true;
                }
                let now = self.now();
                self.current
                    .get_or_insert_with(|| Transmission {
                        command,
                        started: now,
                        finished: None,
                        bits: Vec::new(),
                    })
                    .bits
                    .push(level);
            }
            TickOutcome::Finished => {
                if let Some(mut done) = self.current.take() {
                    done.finished = Some(self.now());
                    self.transmissions.push(done);
                }
            }
        }
        Ok(())
    }

    fn service_column_tick(&mut self) -> Result<(), HalError> {
        let was_enabled = self.scanner.is_enabled();
        self.scanner.on_column_tick(&mut self.columns)?;
        if was_enabled && self.columns.pattern().count_ones() != 1 {
            self.one_hot_violations += 1;
        }
        Ok(())
    }

    /// Advance to the next event at or before `limit` and service it.
    /// Returns false when no interrupt can run before the limit.
    fn service_next(&mut self, limit: Option<u64>) -> Result<bool, HalError> {
        loop {
            let Some(next) = self.next_event_time() else {
                return Ok(false);
            };
            if limit.is_some_and(|l| next > l) {
                return Ok(false);
            }
            self.now_us = next;

            let mut serviced = false;
            if self.interrupts.is_enabled(IrqSource::BitTick) && next % self.bit_period_us == 0 {
                self.service_bit_tick()?;
                serviced = true;
            }
            if self.interrupts.is_enabled(IrqSource::ColumnTick) && next % self.column_period_us == 0 {
                self.service_column_tick()?;
                serviced = true;
            }
            self.sample_rows();
            if self.service_rows()? {
                serviced = true;
            }
            if serviced {
                return Ok(true);
            }
        }
    }
}

impl Platform for SimBoard<'_, '_> {
    type Columns = MockColumns;
    type Interrupts = MockInterrupts;
    type Error = HalError;

    fn keypad_control(&mut self) -> (&mut MockColumns, &mut MockInterrupts) {
        (&mut self.columns, &mut self.interrupts)
    }

    fn interrupts(&mut self) -> &mut MockInterrupts {
        &mut self.interrupts
    }

    fn wait_for_interrupt(&mut self) -> Result<(), HalError> {
        // Lines may have changed from the main context since the last event
        self.sample_rows();
        if self.service_rows()? {
            return Ok(());
        }
        if self.service_next(self.deadline_us)? {
            Ok(())
        } else {
            Err(HalError::TimingError)
        }
    }

    fn guard_delay(&mut self, duration: Duration) -> Result<(), HalError> {
        // Interrupts are held off: ticks due in the window are lost
        self.now_us += duration.as_micros();
        self.sample_rows();
        Ok(())
    }
}
