//! Sensirion CRC-8 (polynomial 0x31, init 0xFF) used by the SCD30 and
//! SGP30.  Every 16-bit word on the wire is followed by its CRC byte.

use crate::error::SensorError;

pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Big-endian word followed by its CRC.
pub fn word_with_crc(word: u16) -> [u8; 3] {
    let [hi, lo] = word.to_be_bytes();
    [hi, lo, crc8(&[hi, lo])]
}

/// Decode a `[hi, lo, crc]` triple.
pub fn checked_word(chunk: &[u8]) -> Result<u16, SensorError> {
    match chunk {
        [hi, lo, crc] if crc8(&[*hi, *lo]) == *crc => Ok(u16::from_be_bytes([*hi, *lo])),
        [_, _, _] => Err(SensorError::Checksum),
        _ => Err(SensorError::Bus),
    }
}
