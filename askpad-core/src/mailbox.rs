//! Single-slot key hand-off from the row-edge interrupt to the control loop

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Atomic key mailbox
/// Safe for use in interrupt contexts
///
/// One producer (row-edge handler) and one consumer (control loop). The key is
/// written before `pending` is published with Release; the consumer reads
/// `pending` with Acquire before the key, so it never sees a half-written slot.
/// A press that lands while `pending` is still set overwrites the held key.
pub struct KeyMailbox {
    key: AtomicU32,
    pending: AtomicBool,
}

impl KeyMailbox {
    /// Create an empty mailbox
    pub const fn new() -> Self {
        Self {
            key: AtomicU32::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// Store a key and mark it pending (called from interrupt handler)
    pub fn post(&self, key: char) {
        self.key.store(key as u32, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    /// Check if a key is waiting
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Last posted key; `'\0'` before the first press
    pub fn key(&self) -> char {
        char::from_u32(self.key.load(Ordering::Relaxed)).unwrap_or('\0')
    }

    /// Mark the held key as consumed
    pub fn clear(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Fetch and consume the held key, if any
    pub fn take(&self) -> Option<char> {
        if self.pending.swap(false, Ordering::AcqRel) {
            Some(self.key())
        } else {
            None
        }
    }

    /// Reset to power-on state
    pub fn reset(&self) {
        self.pending.store(false, Ordering::Relaxed);
        self.key.store(0, Ordering::Relaxed);
    }
}

impl Default for KeyMailbox {
    fn default() -> Self {
        Self::new()
    }
}
