//! Constants for MPEG-TS packet handling and clock rebasing

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_HEADER_SIZE: usize = 4;

/// Number of consecutive sync bytes required to accept a packet boundary
pub const SYNC_CONFIRMATIONS: usize = 3;
/// Bytes scanned at the head of the input while looking for sync
pub const SYNC_SEARCH_WINDOW: usize = TS_PACKET_SIZE * 64;

/// PES packet constants
pub const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
/// Start code + stream_id + PES_packet_length + flag bytes + PES_header_data_length
pub const PES_FIXED_HEADER_SIZE: usize = 9;
pub const PES_TIMESTAMP_SIZE: usize = 5;

/// PCR constants
pub const PCR_CLOCK_HZ: u64 = 27_000_000; // 27 MHz
pub const PCR_FIELD_SIZE: usize = 6;
/// Byte offset of the PCR inside a packet carrying one
pub const PCR_PACKET_OFFSET: usize = 6;
/// Flattened PCR wrap-around point (33-bit base * 300)
pub const PCR_MODULUS: u64 = (1u64 << 33) * PCR_TO_PTS;

/// PTS constants
pub const PTS_CLOCK_HZ: u64 = 90_000; // 90 kHz
pub const PTS_MODULUS: u64 = 1u64 << 33; // 33-bit PTS counter

/// PCR ticks per PTS tick
pub const PCR_TO_PTS: u64 = PCR_CLOCK_HZ / PTS_CLOCK_HZ;

/// Rebasing thresholds
pub const PCR_TIMELINE_START: u64 = PCR_CLOCK_HZ; // corrected timeline starts at 1 s
pub const PCR_JUMP_THRESHOLD: u64 = 2 * PCR_CLOCK_HZ; // forward jump > 2 s is a discontinuity
pub const SPLICE_GRACE: u64 = PCR_CLOCK_HZ / 4; // resume 0.25 s after the last corrected PCR
pub const PTS_JUMP_THRESHOLD: u64 = PTS_CLOCK_HZ; // +-1 s between PTS on one PID
pub const PTS_LEAD_LIMIT: u64 = 2 * PTS_CLOCK_HZ; // corrected PTS may lead corrected PCR by 2 s

/// Largest UDP datagram we accept (7 TS packets is the usual payload)
pub const MAX_DATAGRAM_SIZE: usize = 2048;
