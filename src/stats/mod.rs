//! Counters collected over a retiming run

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::TimingEvent;

/// Per-PID counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PidStats {
    pub packets: u64,
    pub pcr_samples: u64,
    pub pts_samples: u64,
    pub dts_samples: u64,
    pub pcr_discontinuities: u64,
    pub pts_discontinuities: u64,
    pub fallbacks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_corrected_pts: Option<u64>,
}

/// Run-wide counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RetimeStats {
    pub packets: u64,
    pub invalid_packets: u64,
    pub skipped_samples: u64,
    pub rewritten_fields: u64,
    pub pids: BTreeMap<u16, PidStats>,
}

impl RetimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_packet(&mut self, pid: u16) {
        self.packets += 1;
        self.pids.entry(pid).or_default().packets += 1;
    }

    pub fn on_invalid_packet(&mut self) {
        self.packets += 1;
        self.invalid_packets += 1;
    }

    pub fn on_skipped_sample(&mut self) {
        self.skipped_samples += 1;
    }

    pub fn on_rewrite(&mut self) {
        self.rewritten_fields += 1;
    }

    /// Update per-PID counters from a reported event
    pub fn on_event(&mut self, event: &TimingEvent) {
        let pid = self.pids.entry(event.pid()).or_default();
        match *event {
            TimingEvent::PcrDiscontinuity { .. } => pid.pcr_discontinuities += 1,
            TimingEvent::PtsDiscontinuity { .. } => pid.pts_discontinuities += 1,
            TimingEvent::Pcr { .. } => pid.pcr_samples += 1,
            TimingEvent::Pts { corrected, fallback, .. } => {
                pid.pts_samples += 1;
                pid.fallbacks += fallback as u64;
                pid.last_corrected_pts = Some(corrected);
            }
            TimingEvent::Dts { fallback, .. } => {
                pid.dts_samples += 1;
                pid.fallbacks += fallback as u64;
            }
        }
    }

    pub fn get(&self, pid: u16) -> Option<&PidStats> {
        self.pids.get(&pid)
    }

    pub fn pcr_discontinuities(&self) -> u64 {
        self.pids.values().map(|p| p.pcr_discontinuities).sum()
    }

    pub fn pts_discontinuities(&self) -> u64 {
        self.pids.values().map(|p| p.pts_discontinuities).sum()
    }

    pub fn fallbacks(&self) -> u64 {
        self.pids.values().map(|p| p.fallbacks).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_events_per_pid() {
        let mut stats = RetimeStats::new();
        stats.on_packet(0x100);
        stats.on_event(&TimingEvent::Pcr { pid: 0x100, raw: 1, corrected: 2 });
        stats.on_event(&TimingEvent::PcrDiscontinuity { pid: 0x100, previous: 5, current: 1 });
        stats.on_event(&TimingEvent::Pts { pid: 0x101, raw: 1, corrected: 9, fallback: true });
        stats.on_event(&TimingEvent::Dts { pid: 0x101, raw: 1, corrected: 8, fallback: false });

        assert_eq!(stats.packets, 1);
        assert_eq!(stats.pcr_discontinuities(), 1);
        assert_eq!(stats.fallbacks(), 1);
        let video = stats.get(0x101).unwrap();
        assert_eq!((video.pts_samples, video.dts_samples), (1, 1));
        assert_eq!(video.last_corrected_pts, Some(9));
    }
}
