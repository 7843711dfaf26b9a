use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{PCR_CLOCK_HZ, PTS_CLOCK_HZ};

/// Tick rates used by the clock fields of a transport stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDomain {
    /// 27 MHz program clock (flattened PCR base * 300 + extension)
    Pcr,
    /// 90 kHz presentation / decode clock
    Pts,
}

impl ClockDomain {
    pub fn hz(self) -> u64 {
        match self {
            ClockDomain::Pcr => PCR_CLOCK_HZ,
            ClockDomain::Pts => PTS_CLOCK_HZ,
        }
    }

    pub fn seconds(self, ticks: u64) -> f64 {
        ticks as f64 / self.hz() as f64
    }
}

/// A clock value read from a packet together with where it lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockField {
    pub value: u64,
    /// Byte offset of the encoded field from the start of the packet
    pub offset: usize,
}

/// PTS / DTS pair found in a PES header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesTimestamps {
    pub stream_id: u8,
    pub pts: ClockField,
    pub dts: Option<ClockField>,
}

/// A jump observed between two consecutive raw values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Discontinuity {
    pub previous: u64,
    pub current: u64,
}

/// Everything worth reporting about a single packet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimingEvent {
    PcrDiscontinuity { pid: u16, previous: u64, current: u64 },
    PtsDiscontinuity { pid: u16, previous: u64, current: u64 },
    Pcr { pid: u16, raw: u64, corrected: u64 },
    Pts { pid: u16, raw: u64, corrected: u64, fallback: bool },
    Dts { pid: u16, raw: u64, corrected: u64, fallback: bool },
}

impl TimingEvent {
    pub fn pid(&self) -> u16 {
        match *self {
            TimingEvent::PcrDiscontinuity { pid, .. }
            | TimingEvent::PtsDiscontinuity { pid, .. }
            | TimingEvent::Pcr { pid, .. }
            | TimingEvent::Pts { pid, .. }
            | TimingEvent::Dts { pid, .. } => pid,
        }
    }

    pub fn domain(&self) -> ClockDomain {
        match self {
            TimingEvent::PcrDiscontinuity { .. } | TimingEvent::Pcr { .. } => ClockDomain::Pcr,
            _ => ClockDomain::Pts,
        }
    }

    pub fn is_discontinuity(&self) -> bool {
        matches!(self, TimingEvent::PcrDiscontinuity { .. } | TimingEvent::PtsDiscontinuity { .. })
    }
}

/// Where packets come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Stdin,
    /// UDP unicast or multicast (IPv4)
    Udp(SocketAddr),
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::File(path) => write!(f, "{}", path.display()),
            Input::Stdin => f.write_str("stdin"),
            Input::Udp(addr) => write!(f, "udp://{addr}"),
        }
    }
}

/// How timing events are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
    None,
}

/// Configuration options for a retiming run
#[derive(Debug, Clone)]
pub struct Options {
    pub input: Input,
    pub output: Option<PathBuf>,
    pub report: ReportFormat,
    /// Rewrite clock fields; when false values are only reported
    pub retime: bool,
    /// Print the first packet seen on this PID as hex and stop
    pub dump_pid: Option<u16>,
    pub max_packets: Option<u64>,
    /// Give up on a UDP source after this long without a datagram
    pub udp_timeout: Option<Duration>,
}

impl Options {
    pub fn new(input: Input) -> Self {
        Self {
            input,
            output: None,
            report: ReportFormat::Text,
            retime: true,
            dump_pid: None,
            max_packets: None,
            udp_timeout: None,
        }
    }
}
