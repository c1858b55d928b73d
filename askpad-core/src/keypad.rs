//! Interrupt-driven 4x4 matrix keypad scanner
//!
//! A periodic tick walks a single high bit across the four column outputs.
//! Rows are inputs with rising-edge interrupts: pressing a key connects its
//! row to its column, so the row edge arrives while that column is driven.
//! The row-edge handler decodes (row, active column) through the key map and
//! posts the character to the [`KeyMailbox`].
//!
//! No debounce and no multi-key handling: one row bit is assumed per edge
//! interrupt, and bounce can re-post the same key.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::hal::{ColumnLines, InterruptControl, IrqSource, RowLines};
use crate::mailbox::KeyMailbox;
use crate::types::{KeyMap, KeyPress, COLS};

const COLUMN_MASK: u8 = (1 << COLS) - 1;

/// Index of the highest set bit, found by shifting right until the value is
/// at most one. Exact for one-hot input; 0 for 0.
pub fn decode_line(bits: u8) -> usize {
    let mut value = bits;
    let mut index = 0;
    while value / 2 != 0 {
        value /= 2;
        index += 1;
    }
    index
}

/// Keypad scanner state
/// Safe for use in interrupt contexts
pub struct KeypadScanner {
    keymap: KeyMap,
    columns: AtomicU8,
    enabled: AtomicBool,
}

impl KeypadScanner {
    /// Create a scanner; columns stay low until `init`
    pub const fn new(keymap: KeyMap) -> Self {
        Self {
            keymap,
            columns: AtomicU8::new(0),
            enabled: AtomicBool::new(false),
        }
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    /// Drive column 0 and start scanning
    pub fn init<C: ColumnLines>(&self, columns: &mut C) -> Result<(), C::Error> {
        columns.write_columns(0x01)?;
        self.columns.store(0x01, Ordering::Relaxed);
        self.enabled.store(true, Ordering::Release);
        Ok(())
    }

    /// Advance to the next column (called from column timer interrupt)
    pub fn on_column_tick<C: ColumnLines>(&self, columns: &mut C) -> Result<(), C::Error> {
        if !self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }
        // Pins switch before the recorded column does: a row edge landing in
        // between still decodes against the column that is actually driven
        let next = next_column(self.columns.load(Ordering::Relaxed));
        columns.write_columns(next)?;
        self.columns.store(next, Ordering::Release);
        Ok(())
    }

    /// Decode a row edge and post the key (called from row edge interrupt)
    ///
    /// The edge status is cleared even when nothing could be decoded.
    pub fn on_row_edge<R: RowLines>(
        &self,
        rows: &mut R,
        mailbox: &KeyMailbox,
    ) -> Result<Option<KeyPress>, R::Error> {
        let status = rows.edge_status()?;
        let pattern = self.columns.load(Ordering::Acquire);
        rows.clear_edges()?;

        if status == 0 || pattern == 0 {
            return Ok(None);
        }

        let row = decode_line(status);
        let col = decode_line(pattern);
        let Some(key) = self.keymap.get(row, col) else {
            return Ok(None);
        };

        mailbox.post(key);

        #[cfg(feature = "defmt")]
        defmt::debug!("Key {} at row {} col {}", key, row, col);

        Ok(Some(KeyPress { row, col, key }))
    }

    /// Stop column rotation and row interrupts, drive every column low
    pub fn disable<C, I, E>(&self, columns: &mut C, interrupts: &mut I) -> Result<(), E>
    where
        C: ColumnLines,
        I: InterruptControl,
        E: From<C::Error> + From<I::Error>,
    {
        interrupts.disable(IrqSource::ColumnTick)?;
        interrupts.disable(IrqSource::RowEdge)?;
        self.enabled.store(false, Ordering::Release);
        self.columns.store(0, Ordering::Relaxed);
        columns.write_columns(0)?;

        #[cfg(feature = "defmt")]
        defmt::trace!("Keypad suspended");

        Ok(())
    }

    /// Drive column 0, then resume column rotation and row interrupts
    pub fn enable<C, I, E>(&self, columns: &mut C, interrupts: &mut I) -> Result<(), E>
    where
        C: ColumnLines,
        I: InterruptControl,
        E: From<C::Error> + From<I::Error>,
    {
        columns.write_columns(0x01)?;
        self.columns.store(0x01, Ordering::Relaxed);
        self.enabled.store(true, Ordering::Release);
        interrupts.enable(IrqSource::RowEdge)?;
        interrupts.enable(IrqSource::ColumnTick)?;

        #[cfg(feature = "defmt")]
        defmt::trace!("Keypad resumed");

        Ok(())
    }

    /// Is the column tick advancing
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// One-hot column pattern as last driven
    pub fn column_pattern(&self) -> u8 {
        self.columns.load(Ordering::Relaxed)
    }

    /// Index of the driven column, `None` while suspended
    pub fn active_column(&self) -> Option<usize> {
        match self.column_pattern() {
            0 => None,
            pattern => Some(decode_line(pattern)),
        }
    }
}

impl Default for KeypadScanner {
    fn default() -> Self {
        Self::new(KeyMap::default())
    }
}

/// Shift the one-hot pattern left, wrapping to column 0 after column 3
fn next_column(pattern: u8) -> u8 {
    match (pattern << 1) & COLUMN_MASK {
        0 => 0x01,
        next => next,
    }
}
