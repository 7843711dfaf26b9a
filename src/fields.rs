//! In-place readers and writers for the clock fields of a packet.
//!
//! Only the value bits are touched: the six reserved bits between PCR base
//! and extension, and the prefix nibble and marker bits around a PES
//! timestamp, are carried over from the original bytes.

use crate::constants::{PCR_FIELD_SIZE, PCR_MODULUS, PCR_TO_PTS, PES_TIMESTAMP_SIZE, PTS_MODULUS};
use crate::error::{RetimeError, Result};

const PCR_BITS: u32 = 42;
const TIMESTAMP_BITS: u32 = 33;

fn check_len(bytes: &[u8], needed: usize) -> Result<()> {
    if bytes.len() < needed {
        return Err(RetimeError::FieldTooShort { needed, got: bytes.len() });
    }
    Ok(())
}

/// Reads the 6-byte adaptation-field PCR as a flattened 27 MHz value
/// (`base * 300 + extension`).
pub fn read_pcr(bytes: &[u8]) -> Result<u64> {
    check_len(bytes, PCR_FIELD_SIZE)?;
    let p = &bytes[..PCR_FIELD_SIZE];
    let base = ((p[0] as u64) << 25)
        | ((p[1] as u64) << 17)
        | ((p[2] as u64) << 9)
        | ((p[3] as u64) << 1)
        | ((p[4] as u64) >> 7);
    let ext = (((p[4] & 0x01) as u64) << 8) | (p[5] as u64);
    Ok(base * PCR_TO_PTS + ext)
}

/// Overwrites a PCR field with `pcr`, keeping the reserved bits.
pub fn write_pcr(bytes: &mut [u8], pcr: u64) -> Result<()> {
    check_len(bytes, PCR_FIELD_SIZE)?;
    if pcr >= PCR_MODULUS {
        return Err(RetimeError::FieldOverflow { value: pcr, bits: PCR_BITS });
    }
    let base = pcr / PCR_TO_PTS;
    let ext = pcr % PCR_TO_PTS;

    bytes[0] = (base >> 25) as u8;
    bytes[1] = (base >> 17) as u8;
    bytes[2] = (base >> 9) as u8;
    bytes[3] = (base >> 1) as u8;
    bytes[4] = (((base & 0x01) as u8) << 7) | (bytes[4] & 0x7E) | ((ext >> 8) as u8 & 0x01);
    bytes[5] = ext as u8;
    Ok(())
}

/// Reads a 5-byte PES PTS or DTS field.
pub fn read_timestamp(bytes: &[u8]) -> Result<u64> {
    check_len(bytes, PES_TIMESTAMP_SIZE)?;
    let p = &bytes[..PES_TIMESTAMP_SIZE];
    Ok(((p[0] as u64 & 0x0E) << 29)
        | ((p[1] as u64) << 22)
        | (((p[2] as u64 & 0xFE) >> 1) << 15)
        | ((p[3] as u64) << 7)
        | ((p[4] as u64) >> 1))
}

/// Overwrites a PES PTS or DTS field with `ts`, keeping the prefix nibble
/// and the three marker bits.
pub fn write_timestamp(bytes: &mut [u8], ts: u64) -> Result<()> {
    check_len(bytes, PES_TIMESTAMP_SIZE)?;
    if ts >= PTS_MODULUS {
        return Err(RetimeError::FieldOverflow { value: ts, bits: TIMESTAMP_BITS });
    }
    bytes[0] = (bytes[0] & 0xF1) | ((ts >> 29) as u8 & 0x0E);
    bytes[1] = (ts >> 22) as u8;
    bytes[2] = (bytes[2] & 0x01) | ((ts >> 14) as u8 & 0xFE);
    bytes[3] = (ts >> 7) as u8;
    bytes[4] = (bytes[4] & 0x01) | ((ts << 1) as u8 & 0xFE);
    Ok(())
}
