//! Core data types for the keypad transmitter

use crate::hal::Duration;

/// Keypad rows
pub const ROWS: usize = 4;
/// Keypad columns
pub const COLS: usize = 4;

/// Nibbles per transmitted frame
pub const FRAME_NIBBLES: usize = 48;
/// Leading nibbles shared by every command (training, start symbol, length, headers)
pub const PREAMBLE_NIBBLES: usize = 27;
/// Trailing per-command nibbles (payload and checksum)
pub const COMMAND_NIBBLES: usize = FRAME_NIBBLES - PREAMBLE_NIBBLES;
/// Bits per transmitted frame
pub const FRAME_BITS: usize = FRAME_NIBBLES * 4;

/// Row x column to character lookup
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyMap(pub [[char; COLS]; ROWS]);

/// Standard 4x4 membrane keypad layout
pub const DEFAULT_KEYMAP: KeyMap = KeyMap([
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
]);

impl KeyMap {
    /// Character at (row, col); `None` outside the 4x4 grid
    pub fn get(&self, row: usize, col: usize) -> Option<char> {
        self.0.get(row).and_then(|r| r.get(col)).copied()
    }

    /// First (row, col) carrying `key`
    pub fn position(&self, key: char) -> Option<(usize, usize)> {
        self.0.iter().enumerate().find_map(|(row, keys)| {
            keys.iter().position(|&k| k == key).map(|col| (row, col))
        })
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        DEFAULT_KEYMAP
    }
}

/// A decoded key press
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyPress {
    pub row: usize,
    pub col: usize,
    pub key: char,
}

/// Commands carried by the reference frame table, in table order
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "std", derive(Hash))]
pub enum Command {
    Hello,
    OnOff,
    Menus,
    Netflix,
    Muted,
    Power,
    Switch,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Hello,
        Command::OnOff,
        Command::Menus,
        Command::Netflix,
        Command::Muted,
        Command::Power,
        Command::Switch,
    ];

    /// Row in the frame table
    pub const fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: u8) -> Option<Command> {
        Self::ALL.get(index as usize).copied()
    }

    /// Payload text the receiver sees
    pub const fn label(&self) -> &'static str {
        match self {
            Command::Hello => "hello",
            Command::OnOff => "OnOff",
            Command::Menus => "Menus",
            Command::Netflix => "Ntflx",
            Command::Muted => "Muted",
            Command::Power => "Power",
            Command::Switch => "Swtch",
        }
    }
}

/// Sequencer lifecycle
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencerPhase {
    /// Nothing to send, output held low
    Idle,
    /// Armed, one bit per tick
    Running,
    /// Frame complete, waiting to be observed
    Done,
}

/// Snapshot of the sequencer's position
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmissionState {
    pub nibble_index: u8,
    pub bit_index: u8,
    pub command: u8,
    pub done: bool,
}

/// Control loop states
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatcherState {
    /// Scanner running, sleeping until a key is posted
    WaitingForKey,
    /// Scanner suspended, frame for this table row on air
    Transmitting(u8),
    /// Scanner suspended, letting the link settle
    GuardInterval,
}

/// What to do with a key that does not map to a table row
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidKeyPolicy {
    /// Leave the mailbox pending, so the next wait returns at once with the
    /// same key until a valid key overwrites it
    #[default]
    RetainPending,
    /// Clear the mailbox and wait for a fresh press
    ClearAndIgnore,
}

/// Interrupt priorities, lower number is more urgent
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priorities {
    pub bit_tick: u8,
    pub row_edge: u8,
    pub column_tick: u8,
}

impl Default for Priorities {
    fn default() -> Self {
        Self {
            bit_tick: 1,
            row_edge: 2,
            column_tick: 3,
        }
    }
}

impl Priorities {
    /// Bit tick must preempt both keypad sources
    pub fn is_valid(&self) -> bool {
        self.bit_tick < self.row_edge && self.bit_tick < self.column_tick
    }
}

/// Transmitter configuration parameters
#[derive(Copy, Clone, Debug)]
pub struct AskConfig {
    /// Time per transmitted bit
    pub bit_period: Duration,
    /// Time each keypad column stays active
    pub column_period: Duration,
    /// Quiet time after each transmission before the keypad is re-armed
    pub guard_interval: Duration,
    /// Interrupt priorities
    pub priorities: Priorities,
    /// Handling of keys outside the command table
    pub invalid_key_policy: InvalidKeyPolicy,
}

impl Default for AskConfig {
    fn default() -> Self {
        Self {
            bit_period: Duration::from_micros(500), // 2000 bit/s
            column_period: Duration::from_millis(5),
            guard_interval: Duration::from_millis(1000),
            priorities: Priorities::default(),
            invalid_key_policy: InvalidKeyPolicy::RetainPending,
        }
    }
}

impl AskConfig {
    /// Create a new configuration with validation
    pub fn new(
        bit_rate_hz: u32,
        column_period: Duration,
        guard_interval: Duration,
        priorities: Priorities,
        invalid_key_policy: InvalidKeyPolicy,
    ) -> Result<Self, &'static str> {
        if bit_rate_hz == 0 || bit_rate_hz > 100_000 {
            return Err("Bit rate must be between 1 and 100000 bit/s");
        }
        if column_period.as_micros() == 0 {
            return Err("Column period must be non-zero");
        }
        if !priorities.is_valid() {
            return Err("Bit tick priority must be more urgent than keypad priorities");
        }

        Ok(Self {
            bit_period: Duration::from_micros(1_000_000 / bit_rate_hz as u64),
            column_period,
            guard_interval,
            priorities,
            invalid_key_policy,
        })
    }

    /// Bits per second on the radio link
    pub fn bit_rate_hz(&self) -> u32 {
        (1_000_000 / self.bit_period.as_micros().max(1)) as u32
    }

    /// Air time of one full frame
    pub fn frame_duration(&self) -> Duration {
        self.bit_period * FRAME_BITS as u32
    }

    /// Periodic timer reload for the bit tick at `clock_hz`
    pub fn bit_timer_reload(&self, clock_hz: u32) -> u32 {
        timer_reload(clock_hz, self.bit_period, 1)
    }

    /// Periodic timer reload for the column tick at `clock_hz` behind a `prescale` divider
    pub fn column_timer_reload(&self, clock_hz: u32, prescale: u32) -> u32 {
        timer_reload(clock_hz, self.column_period, prescale)
    }
}

fn timer_reload(clock_hz: u32, period: Duration, prescale: u32) -> u32 {
    let cycles = clock_hz as u64 * period.as_micros() / 1_000_000;
    (cycles / prescale.max(1) as u64) as u32
}
