//! Error types for packet extraction, field rewriting and packet sources.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetimeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No packet boundary found at the head of the input.
    #[error("no sync byte found in the first {searched} bytes")]
    SyncNotFound { searched: usize },

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("malformed PCR: {0}")]
    MalformedPcr(String),

    #[error("malformed PES header: {0}")]
    MalformedPes(String),

    #[error("field region too short: need {needed} bytes, got {got}")]
    FieldTooShort { needed: usize, got: usize },

    /// Writing a value that does not fit the target field. Never expected
    /// with values produced by the rebaser.
    #[error("value {value} does not fit in a {bits}-bit field")]
    FieldOverflow { value: u64, bits: u32 },

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl RetimeError {
    pub fn malformed_pcr(msg: impl Into<String>) -> Self {
        RetimeError::MalformedPcr(msg.into())
    }

    pub fn malformed_pes(msg: impl Into<String>) -> Self {
        RetimeError::MalformedPes(msg.into())
    }

    pub fn invalid_packet(msg: impl Into<String>) -> Self {
        RetimeError::InvalidPacket(msg.into())
    }

    /// Per-packet conditions that skip a sample rather than abort the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RetimeError::InvalidPacket(_)
                | RetimeError::MalformedPcr(_)
                | RetimeError::MalformedPes(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RetimeError>;
