//! Static frame tables for the packet sequencer
//!
//! Every frame is 48 nibbles sent MSB-first: a 27-nibble block shared by all
//! commands (training run, start symbol, length, to/from/id/flags headers)
//! followed by a 21-nibble block holding the command payload and checksum.
//! The nibbles are the on-air bit stream of a RadioHead RH_ASK packet; see
//! [`crate::radiohead`] for the codec that reproduces them.

use heapless::Vec;

use crate::types::{Command, COMMAND_NIBBLES, FRAME_BITS, FRAME_NIBBLES, PREAMBLE_NIBBLES};

/// Shared leading block of every frame
pub const RADIOHEAD_PREAMBLE: [u8; PREAMBLE_NIBBLES] = [
    0x5, 0x5, 0x5, 0x5, 0x5, 0x5, 0x5, 0x5, 0x5, // training
    0x1, 0xc, 0xd, // start symbol
    0xb, 0x1, 0x5, // length
    0x2, 0xc, 0xb, // to
    0x2, 0xc, 0xb, // from
    0xb, 0x2, 0xc, // id
    0xb, 0x2, 0xc, // flags
];

/// Payload and checksum block per command, indexed by [`Command::index`]
pub const REMOTE_COMMANDS: [[u8; COMMAND_NIBBLES]; 7] = [
    // hello
    [0x5, 0xb, 0x1, 0x5, 0xa, 0x6, 0x5, 0x9, 0x5, 0x5, 0x9, 0x5, 0x5, 0x8, 0xb, 0x7, 0x0, 0xb, 0xb, 0x0, 0xb],
    // OnOff
    [0x6, 0x8, 0xb, 0x5, 0x9, 0x3, 0x6, 0x8, 0xb, 0x5, 0x9, 0x6, 0x5, 0x9, 0x6, 0x6, 0x6, 0x9, 0x7, 0x2, 0xa],
    // Menus
    [0x6, 0x8, 0xd, 0x5, 0xa, 0x6, 0x5, 0x9, 0x3, 0x3, 0xa, 0x6, 0x3, 0xa, 0xa, 0xb, 0x1, 0x6, 0x5, 0x9, 0xa],
    // Ntflx
    [0x6, 0x9, 0x3, 0x3, 0x9, 0xa, 0x5, 0x9, 0x6, 0x5, 0x9, 0x5, 0x3, 0xb, 0x1, 0x6, 0xb, 0x1, 0xa, 0x5, 0x5],
    // Muted
    [0x6, 0x8, 0xd, 0x3, 0xa, 0x6, 0x3, 0x9, 0xa, 0x5, 0xa, 0x6, 0x5, 0x9, 0xa, 0x4, 0xc, 0xe, 0x6, 0x6, 0xc],
    // Power
    [0x9, 0xa, 0xc, 0x5, 0x8, 0xb, 0x3, 0x8, 0xe, 0x5, 0xa, 0x6, 0x3, 0xb, 0x2, 0xb, 0x0, 0xb, 0x4, 0xc, 0xd],
    // Swtch
    [0x9, 0xa, 0xa, 0x3, 0x8, 0xe, 0x3, 0x9, 0xa, 0x5, 0xa, 0xa, 0x5, 0xb, 0x1, 0x3, 0x6, 0x6, 0x3, 0x7, 0x2],
];

/// Reference table
pub const DEFAULT_FRAMES: FrameTable<'static> = FrameTable::new(&RADIOHEAD_PREAMBLE, &REMOTE_COMMANDS);

/// Immutable preamble plus per-command rows
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameTable<'a> {
    preamble: &'a [u8; PREAMBLE_NIBBLES],
    commands: &'a [[u8; COMMAND_NIBBLES]],
}

impl<'a> FrameTable<'a> {
    pub const fn new(
        preamble: &'a [u8; PREAMBLE_NIBBLES],
        commands: &'a [[u8; COMMAND_NIBBLES]],
    ) -> Self {
        Self { preamble, commands }
    }

    /// Number of command rows
    pub const fn len(&self) -> usize {
        self.commands.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn contains(&self, command: u8) -> bool {
        (command as usize) < self.commands.len()
    }

    pub fn preamble(&self) -> &'a [u8; PREAMBLE_NIBBLES] {
        self.preamble
    }

    /// Payload and checksum row for `command`
    pub fn command_row(&self, command: u8) -> Option<&'a [u8; COMMAND_NIBBLES]> {
        self.commands.get(command as usize)
    }

    /// Nibble `index` (0..48) of the frame for `command`
    ///
    /// No bounds check on `command` beyond the slice lookup: callers validate
    /// the selector before arming.
    pub fn nibble(&self, command: u8, index: usize) -> Option<u8> {
        if index < PREAMBLE_NIBBLES {
            Some(self.preamble[index])
        } else if index < FRAME_NIBBLES {
            self.command_row(command).map(|row| row[index - PREAMBLE_NIBBLES])
        } else {
            None
        }
    }

    /// Nibbles of the frame for `command`, in transmit order
    pub fn nibbles(&self, command: u8) -> Option<impl Iterator<Item = u8> + 'a> {
        let preamble = self.preamble;
        self.command_row(command)
            .map(move |row| preamble.iter().chain(row.iter()).copied())
    }

    /// All 48 nibbles for `command`
    pub fn frame(&self, command: u8) -> Option<Vec<u8, FRAME_NIBBLES>> {
        let mut frame = Vec::new();
        for n in self.nibbles(command)? {
            frame.push(n).ok()?;
        }
        Some(frame)
    }

    /// Frame for a named command
    pub fn frame_for(&self, command: Command) -> Option<Vec<u8, FRAME_NIBBLES>> {
        self.frame(command.index())
    }

    /// MSB-first bit expansion of the frame for `command`
    pub fn bits(&self, command: u8) -> Option<FrameBits<'a>> {
        self.command_row(command).map(|row| FrameBits {
            preamble: self.preamble,
            row,
            position: 0,
        })
    }
}

/// Iterator over the 192 bits of one frame
#[derive(Clone, Debug)]
pub struct FrameBits<'a> {
    preamble: &'a [u8; PREAMBLE_NIBBLES],
    row: &'a [u8; COMMAND_NIBBLES],
    position: usize,
}

impl Iterator for FrameBits<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.position >= FRAME_BITS {
            return None;
        }
        let index = self.position / 4;
        let nibble = if index < PREAMBLE_NIBBLES {
            self.preamble[index]
        } else {
            self.row[index - PREAMBLE_NIBBLES]
        };
        let bit = nibble_bit(nibble, (self.position % 4) as u8);
        self.position += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = FRAME_BITS - self.position.min(FRAME_BITS);
        (left, Some(left))
    }
}

impl ExactSizeIterator for FrameBits<'_> {}

/// Bit `bit_index` of a nibble counted from the MSB
#[inline]
pub const fn nibble_bit(nibble: u8, bit_index: u8) -> bool {
    (nibble >> (3 - bit_index)) & 0x01 != 0
}

/// Re-pack MSB-first bits into nibbles; a trailing partial nibble is dropped
pub fn pack_bits<I>(bits: I) -> Vec<u8, FRAME_NIBBLES>
where
    I: IntoIterator<Item = bool>,
{
    let mut nibbles = Vec::new();
    let mut acc = 0u8;
    let mut count = 0;
    for bit in bits {
        acc = (acc << 1) | bit as u8;
        count += 1;
        if count == 4 {
            if nibbles.push(acc).is_err() {
                break;
            }
            acc = 0;
            count = 0;
        }
    }
    nibbles
}
