//! Clock sample extraction from individual TS packets
//!
//! Nothing here copies data: every extracted value carries the byte offset
//! of its encoded field so the caller can rewrite it in place.

use bitstream_io::{BigEndian, BitRead, BitReader};

use crate::constants::*;
use crate::error::{RetimeError, Result};
use crate::fields::{read_pcr, read_timestamp};
use crate::types::{ClockField, PesTimestamps};

/// Fixed 4-byte transport packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    pub payload_unit_start: bool,
    pub pid: u16,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
    /// Start of the payload, `None` when the packet carries none
    pub payload_offset: Option<usize>,
}

impl TsHeader {
    pub fn parse(chunk: &[u8]) -> Result<Self> {
        if chunk.len() < TS_PACKET_SIZE {
            return Err(RetimeError::invalid_packet(format!(
                "packet too short: {} bytes",
                chunk.len()
            )));
        }
        if chunk[0] != TS_SYNC_BYTE {
            return Err(RetimeError::invalid_packet(format!(
                "bad sync byte 0x{:02X}",
                chunk[0]
            )));
        }

        let pid = (((chunk[1] & 0x1F) as u16) << 8) | (chunk[2] as u16);
        let adaptation_field_control = (chunk[3] & 0x30) >> 4;

        let mut payload_offset = TS_HEADER_SIZE;
        if adaptation_field_control & 0x02 != 0 {
            let adap_len = chunk[4] as usize;
            payload_offset += 1 + adap_len;
            if payload_offset > TS_PACKET_SIZE {
                return Err(RetimeError::invalid_packet(format!(
                    "adaptation field length {adap_len} overruns packet on PID {pid}"
                )));
            }
        }
        let has_payload = adaptation_field_control & 0x01 != 0 && payload_offset < TS_PACKET_SIZE;

        Ok(Self {
            payload_unit_start: chunk[1] & 0x40 != 0,
            pid,
            adaptation_field_control,
            continuity_counter: chunk[3] & 0x0F,
            payload_offset: has_payload.then_some(payload_offset),
        })
    }

    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & 0x02 != 0
    }
}

/// Returns the PCR carried in the adaptation field, if any.
pub fn adaptation_pcr(chunk: &[u8], header: &TsHeader) -> Result<Option<ClockField>> {
    if !header.has_adaptation_field() {
        return Ok(None);
    }
    let ad_len = chunk[4] as usize;
    if ad_len == 0 || chunk[5] & 0x10 == 0 {
        return Ok(None);
    }
    // flags byte + 6 PCR bytes
    if ad_len < 1 + PCR_FIELD_SIZE {
        return Err(RetimeError::malformed_pcr(format!(
            "PCR flag set but adaptation field is only {ad_len} bytes on PID {}",
            header.pid
        )));
    }

    let value = read_pcr(&chunk[PCR_PACKET_OFFSET..PCR_PACKET_OFFSET + PCR_FIELD_SIZE])?;
    Ok(Some(ClockField { value, offset: PCR_PACKET_OFFSET }))
}

/// Stream ids whose PES packets have no optional header (and so no PTS)
fn has_optional_header(stream_id: u8) -> bool {
    !matches!(
        stream_id,
        0xBC // program_stream_map
            | 0xBE // padding_stream
            | 0xBF // private_stream_2
            | 0xF0 // ECM
            | 0xF1 // EMM
            | 0xF2 // DSMCC
            | 0xF8 // H.222.1 type E
            | 0xFF // program_stream_directory
    )
}

struct PesFlags {
    stream_id: u8,
    pts_dts_flags: u8,
    header_data_length: usize,
}

fn read_pes_flags(payload: &[u8]) -> std::io::Result<Option<PesFlags>> {
    let mut br = BitReader::endian(payload, BigEndian);

    br.skip(24)?; // packet_start_code_prefix
    let stream_id = br.read::<8, u8>()?;
    if !has_optional_header(stream_id) {
        return Ok(None);
    }
    br.skip(16)?; // PES_packet_length
    let marker = br.read::<2, u8>()?;
    if marker != 0b10 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("optional header marker {marker:#04b}"),
        ));
    }
    br.skip(6)?; // scrambling, priority, alignment, copyright, original
    let pts_dts_flags = br.read::<2, u8>()?;
    br.skip(6)?; // ESCR, ES_rate, trick mode, copy info, CRC, extension
    let header_data_length = br.read::<8, u8>()? as usize;

    Ok(Some(PesFlags { stream_id, pts_dts_flags, header_data_length }))
}

/// Returns the PTS (and DTS) of a PES header starting in this packet.
pub fn pes_timestamps(chunk: &[u8], header: &TsHeader) -> Result<Option<PesTimestamps>> {
    let Some(payload_offset) = header.payload_offset else { return Ok(None) };
    if !header.payload_unit_start {
        return Ok(None);
    }
    let payload = &chunk[payload_offset..TS_PACKET_SIZE];
    if !payload.starts_with(&PES_START_CODE) {
        return Ok(None);
    }
    if payload.len() < PES_FIXED_HEADER_SIZE {
        return Err(RetimeError::malformed_pes(format!(
            "header truncated to {} bytes on PID {}",
            payload.len(),
            header.pid
        )));
    }

    let flags = match read_pes_flags(payload) {
        Ok(Some(flags)) => flags,
        Ok(None) => return Ok(None),
        Err(e) => {
            return Err(RetimeError::malformed_pes(format!("{e} on PID {}", header.pid)));
        }
    };

    let fields = match flags.pts_dts_flags {
        0b00 => return Ok(None),
        0b01 => {
            return Err(RetimeError::malformed_pes(format!(
                "forbidden PTS_DTS_flags value on PID {}",
                header.pid
            )));
        }
        0b10 => 1,
        _ => 2,
    };
    let needed = fields * PES_TIMESTAMP_SIZE;
    if flags.header_data_length < needed || payload.len() < PES_FIXED_HEADER_SIZE + needed {
        return Err(RetimeError::malformed_pes(format!(
            "header data length {} too small for {fields} timestamp(s) on PID {}",
            flags.header_data_length, header.pid
        )));
    }

    let pts_offset = payload_offset + PES_FIXED_HEADER_SIZE;
    let pts = ClockField {
        value: read_timestamp(&chunk[pts_offset..])?,
        offset: pts_offset,
    };
    let dts = if fields == 2 {
        let dts_offset = pts_offset + PES_TIMESTAMP_SIZE;
        Some(ClockField {
            value: read_timestamp(&chunk[dts_offset..])?,
            offset: dts_offset,
        })
    } else {
        None
    };

    Ok(Some(PesTimestamps { stream_id: flags.stream_id, pts, dts }))
}
