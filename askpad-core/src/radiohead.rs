//! RadioHead RH_ASK framing
//!
//! Reproduces the on-air bit stream the static frame tables were captured
//! from, so tables can be authored and checked on the host. Bytes travel as
//! two 4b6b symbols (high nibble first), each symbol sent LSB-first, after a
//! training run and a 12-bit start symbol. The sequencer never calls into
//! this module; it transmits from [`crate::frame::FrameTable`] directly.

use heapless::Vec;

use crate::types::FRAME_NIBBLES;

/// DC-balanced 6-bit symbols for each nibble value
pub const SYMBOLS: [u8; 16] = [
    0x0d, 0x0e, 0x13, 0x15, 0x16, 0x19, 0x1a, 0x1c, 0x23, 0x25, 0x26, 0x29, 0x2a, 0x2c, 0x32, 0x34,
];

/// Training symbol, repeated to settle the receiver PLL
pub const TRAINING_SYMBOL: u8 = 0x2a;
/// Training symbols before the start symbol
pub const TRAINING_LEN: usize = 6;
/// 12-bit start symbol
pub const START_SYMBOL: u16 = 0xb38;
/// Header bytes: to, from, id, flags
pub const HEADER_LEN: usize = 4;
/// Broadcast address
pub const BROADCAST_ADDRESS: u8 = 0xff;
/// Largest payload that still fits a 48-nibble frame
pub const MAX_PAYLOAD: usize = 5;

const PREFIX_BITS: usize = TRAINING_LEN * 6 + 12;
const MAX_BYTES: usize = 1 + HEADER_LEN + MAX_PAYLOAD + 2;

/// RadioHead message header
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub to: u8,
    pub from: u8,
    pub id: u8,
    pub flags: u8,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            to: BROADCAST_ADDRESS,
            from: BROADCAST_ADDRESS,
            id: 0,
            flags: 0,
        }
    }
}

/// A decoded message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

/// Codec failures
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Training run or start symbol missing
    BadPreamble,
    /// A 6-bit group is not in the symbol table
    BadSymbol,
    /// Length byte disagrees with the frame size
    BadLength,
    /// Checksum mismatch
    BadChecksum,
    /// Payload does not fit the frame
    PayloadTooLong,
}

#[cfg(feature = "std")]
impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::BadPreamble => write!(f, "Missing training run or start symbol"),
            DecodeError::BadSymbol => write!(f, "Invalid 4b6b symbol"),
            DecodeError::BadLength => write!(f, "Length byte does not match frame"),
            DecodeError::BadChecksum => write!(f, "Checksum mismatch"),
            DecodeError::PayloadTooLong => write!(f, "Payload too long for one frame"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/// One step of CRC-CCITT as used by RadioHead
pub fn crc_ccitt_update(crc: u16, data: u8) -> u16 {
    let mut data = data ^ (crc & 0xff) as u8;
    data ^= data << 4;
    ((data as u16) << 8 | (crc >> 8)) ^ (data >> 4) as u16 ^ ((data as u16) << 3)
}

/// Complemented CRC over length, header and payload bytes
pub fn checksum(bytes: &[u8]) -> u16 {
    !bytes.iter().fold(0xffff, |crc, &b| crc_ccitt_update(crc, b))
}

/// Encode `payload` into the nibble stream the sequencer transmits
///
/// Only payloads that fill exactly 48 nibbles are frame-table compatible; a
/// shorter payload yields a shorter stream.
pub fn encode_frame(header: Header, payload: &[u8]) -> Result<Vec<u8, FRAME_NIBBLES>, DecodeError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(DecodeError::PayloadTooLong);
    }

    let mut bytes: Vec<u8, MAX_BYTES> = Vec::new();
    let length = (payload.len() + HEADER_LEN + 3) as u8;
    for &b in [length, header.to, header.from, header.id, header.flags]
        .iter()
        .chain(payload.iter())
    {
        bytes.push(b).map_err(|_| DecodeError::PayloadTooLong)?;
    }
    let crc = checksum(&bytes);
    bytes.push((crc & 0xff) as u8).map_err(|_| DecodeError::PayloadTooLong)?;
    bytes.push((crc >> 8) as u8).map_err(|_| DecodeError::PayloadTooLong)?;

    let mut writer = NibbleWriter::new();
    for _ in 0..TRAINING_LEN {
        writer.push_lsb_first(TRAINING_SYMBOL as u16, 6);
    }
    writer.push_lsb_first(START_SYMBOL, 12);
    for &b in bytes.iter() {
        writer.push_lsb_first(SYMBOLS[(b >> 4) as usize] as u16, 6);
        writer.push_lsb_first(SYMBOLS[(b & 0x0f) as usize] as u16, 6);
    }
    Ok(writer.finish())
}

/// Decode a nibble stream back into header and payload
pub fn decode_frame(nibbles: &[u8]) -> Result<Packet, DecodeError> {
    let mut reader = BitReader::new(nibbles);

    for _ in 0..TRAINING_LEN {
        if reader.read_lsb_first(6) != Some(TRAINING_SYMBOL as u16) {
            return Err(DecodeError::BadPreamble);
        }
    }
    if reader.read_lsb_first(12) != Some(START_SYMBOL) {
        return Err(DecodeError::BadPreamble);
    }

    let mut bytes: Vec<u8, MAX_BYTES> = Vec::new();
    while reader.remaining() >= 12 {
        let high = reader.read_symbol()?;
        let low = reader.read_symbol()?;
        bytes.push(high << 4 | low).map_err(|_| DecodeError::BadLength)?;
    }

    let length = *bytes.first().ok_or(DecodeError::BadLength)? as usize;
    if length != bytes.len() || length < 1 + HEADER_LEN + 2 {
        return Err(DecodeError::BadLength);
    }

    let (body, crc) = bytes.split_at(length - 2);
    let received = crc[0] as u16 | (crc[1] as u16) << 8;
    if checksum(body) != received {
        return Err(DecodeError::BadChecksum);
    }

    let header = Header {
        to: body[1],
        from: body[2],
        id: body[3],
        flags: body[4],
    };
    let payload = Vec::from_slice(&body[1 + HEADER_LEN..]).map_err(|_| DecodeError::PayloadTooLong)?;
    Ok(Packet { header, payload })
}

struct NibbleWriter {
    nibbles: Vec<u8, FRAME_NIBBLES>,
    acc: u8,
    count: u8,
}

impl NibbleWriter {
    fn new() -> Self {
        Self {
            nibbles: Vec::new(),
            acc: 0,
            count: 0,
        }
    }

    fn push_lsb_first(&mut self, value: u16, width: u8) {
        for i in 0..width {
            self.acc = (self.acc << 1) | ((value >> i) & 1) as u8;
            self.count += 1;
            if self.count == 4 {
                // Bounded by MAX_PAYLOAD; overflow only for oversize input
                let _ = self.nibbles.push(self.acc);
                self.acc = 0;
                self.count = 0;
            }
        }
    }

    fn finish(self) -> Vec<u8, FRAME_NIBBLES> {
        self.nibbles
    }
}

struct BitReader<'a> {
    nibbles: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(nibbles: &'a [u8]) -> Self {
        Self { nibbles, position: 0 }
    }

    fn remaining(&self) -> usize {
        (self.nibbles.len() * 4).saturating_sub(self.position)
    }

    fn read_lsb_first(&mut self, width: u8) -> Option<u16> {
        if self.remaining() < width as usize {
            return None;
        }
        let mut value = 0u16;
        for i in 0..width {
            let nibble = self.nibbles[self.position / 4];
            let bit = (nibble >> (3 - self.position % 4)) & 1;
            value |= (bit as u16) << i;
            self.position += 1;
        }
        Some(value)
    }

    fn read_symbol(&mut self) -> Result<u8, DecodeError> {
        let symbol = self.read_lsb_first(6).ok_or(DecodeError::BadLength)? as u8;
        SYMBOLS
            .iter()
            .position(|&s| s == symbol)
            .map(|n| n as u8)
            .ok_or(DecodeError::BadSymbol)
    }
}

const _: () = assert!(PREFIX_BITS + MAX_BYTES * 12 == FRAME_NIBBLES * 4);
