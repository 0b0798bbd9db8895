//! VS1053 serial command interface sequences.
//!
//! Each SCI frame is `[op, register, high, low]`: op `0x02` writes a
//! register, `0x03` reads one (the value comes back in bytes 2..4).

/// SCI write opcode.
pub const SCI_WRITE: u8 = 0x02;
/// SCI read opcode.
pub const SCI_READ: u8 = 0x03;

const SCI_MODE: u8 = 0x00;
const SCI_CLOCKF: u8 = 0x03;
const SCI_DECODE_TIME: u8 = 0x04;
const SCI_VOL: u8 = 0x0B;

/// SM_SDINEW | SM_RESET: native SDI mode, software reset.
pub const SOFT_RESET: [u8; 4] = [SCI_WRITE, SCI_MODE, 0x08, 0x04];
/// 3.5x clock multiplier.
pub const CLOCK: [u8; 4] = [SCI_WRITE, SCI_CLOCKF, 0x98, 0x00];
/// -8 dB on both channels.
pub const VOLUME: [u8; 4] = [SCI_WRITE, SCI_VOL, 0x10, 0x10];
/// SM_SDINEW only: leave reset, ready for data.
pub const PLAY_MODE: [u8; 4] = [SCI_WRITE, SCI_MODE, 0x08, 0x00];
/// Read the decode-time register.
pub const READ_DECODE_TIME: [u8; 4] = [SCI_READ, SCI_DECODE_TIME, 0x00, 0x00];

/// Command-mode writes that bring the decoder up for a new stream.
pub const STREAM_OPEN: [[u8; 4]; 4] = [SOFT_RESET, CLOCK, VOLUME, PLAY_MODE];

/// Seconds decoded so far, from a [`READ_DECODE_TIME`] transfer.
pub fn decode_time(frame: [u8; 4]) -> u16 {
    let [_, _, high, low] = frame;
    u16::from_be_bytes([high, low])
}
