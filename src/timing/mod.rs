//! Clock continuity tracking and offset rebasing
//!
//! A single [`ContinuityState`] follows the program clock of the stream.
//! The first PCR (or, failing that, the first PTS) pins the output timeline
//! to start at one second. Whenever the raw PCR jumps backwards or more than
//! two seconds forwards, the offset is recomputed so the corrected clock
//! resumes a quarter second after the last corrected value. PTS and DTS are
//! shifted by the same offset converted to 90 kHz.

use std::collections::HashMap;

use crate::constants::*;
use crate::types::Discontinuity;

/// Last PCR seen, before and after correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcrPoint {
    pub raw: u64,
    pub corrected: u64,
}

/// Result of rebasing one PCR sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcrRebase {
    pub raw: u64,
    pub corrected: u64,
    pub discontinuity: Option<Discontinuity>,
}

/// Result of rebasing one PTS or DTS sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampRebase {
    pub raw: u64,
    pub corrected: u64,
    /// The previous offset was used because the active one put the value
    /// too far ahead of the corrected program clock
    pub fallback: bool,
    pub discontinuity: Option<Discontinuity>,
}

#[derive(Debug, Default, Clone)]
pub struct ContinuityState {
    previous_pcr: Option<PcrPoint>,
    active_offset: Option<i64>,
    previous_active_offset: i64,
    previous_raw_pts: HashMap<u16, u64>,
}

fn wrap(value: i64, modulus: u64) -> u64 {
    value.rem_euclid(modulus as i64) as u64
}

fn pcr_to_pts_offset(offset: i64) -> i64 {
    offset / PCR_TO_PTS as i64
}

impl ContinuityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_raw_pcr(&self) -> Option<u64> {
        self.previous_pcr.map(|p| p.raw)
    }

    pub fn previous_corrected_pcr(&self) -> Option<u64> {
        self.previous_pcr.map(|p| p.corrected)
    }

    /// Offset in 27 MHz ticks currently added to raw values
    pub fn active_offset(&self) -> Option<i64> {
        self.active_offset
    }

    pub fn previous_active_offset(&self) -> i64 {
        self.previous_active_offset
    }

    pub fn previous_raw_pts(&self, pid: u16) -> Option<u64> {
        self.previous_raw_pts.get(&pid).copied()
    }

    pub fn tracked_streams(&self) -> usize {
        self.previous_raw_pts.len()
    }

    fn is_uninitialized(&self) -> bool {
        self.previous_pcr.is_none() && self.active_offset.is_none()
    }

    /// Feeds one raw PCR and returns its corrected value.
    pub fn rebase_pcr(&mut self, raw: u64) -> PcrRebase {
        let mut discontinuity = None;

        match self.previous_pcr {
            None if self.active_offset.is_none() => {
                self.active_offset = Some(PCR_TIMELINE_START as i64 - raw as i64);
            }
            Some(prev) if raw > prev.raw + PCR_JUMP_THRESHOLD || raw < prev.raw => {
                discontinuity = Some(Discontinuity { previous: prev.raw, current: raw });
                self.previous_active_offset = self.active_offset.unwrap_or(0);
                self.active_offset =
                    Some(prev.corrected as i64 - raw as i64 + SPLICE_GRACE as i64);
            }
            _ => {}
        }

        let offset = self.active_offset.unwrap_or(0);
        let corrected = wrap(raw as i64 + offset, PCR_MODULUS);
        self.previous_pcr = Some(PcrPoint { raw, corrected });

        PcrRebase { raw, corrected, discontinuity }
    }

    /// Feeds one raw PTS of stream `pid` and returns its corrected value.
    pub fn rebase_pts(&mut self, pid: u16, raw: u64) -> TimestampRebase {
        if self.is_uninitialized() {
            self.active_offset =
                Some(PCR_TIMELINE_START as i64 - (raw * PCR_TO_PTS) as i64);
        }

        let discontinuity = self
            .previous_raw_pts
            .insert(pid, raw)
            .filter(|&prev| raw > prev + PTS_JUMP_THRESHOLD || raw + PTS_JUMP_THRESHOLD < prev)
            .map(|prev| Discontinuity { previous: prev, current: raw });

        let (corrected, fallback) = self.correct_timestamp(raw);
        TimestampRebase { raw, corrected, fallback, discontinuity }
    }

    /// Feeds one raw DTS. Decode timestamps are shifted exactly like PTS
    /// but are not tracked per stream.
    pub fn rebase_dts(&mut self, raw: u64) -> TimestampRebase {
        let (corrected, fallback) = self.correct_timestamp(raw);
        TimestampRebase { raw, corrected, fallback, discontinuity: None }
    }

    /// Upper bound for a corrected PTS/DTS, if a corrected PCR exists.
    pub fn timestamp_bound(&self) -> Option<u64> {
        self.previous_corrected_pcr()
            .map(|pcr| pcr / PCR_TO_PTS + PTS_LEAD_LIMIT)
    }

    fn correct_timestamp(&self, raw: u64) -> (u64, bool) {
        let offset = self.active_offset.unwrap_or(0);
        let candidate = wrap(raw as i64 + pcr_to_pts_offset(offset), PTS_MODULUS);

        match self.timestamp_bound() {
            Some(bound) if candidate > bound => {
                let fallback = wrap(
                    raw as i64 + pcr_to_pts_offset(self.previous_active_offset),
                    PTS_MODULUS,
                );
                (fallback, true)
            }
            _ => (candidate, false),
        }
    }
}
