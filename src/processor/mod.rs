//! Main packet processing logic

use log::{debug, warn};

use crate::constants::{PCR_FIELD_SIZE, PES_TIMESTAMP_SIZE};
use crate::error::Result;
use crate::fields::{write_pcr, write_timestamp};
use crate::packet::{adaptation_pcr, pes_timestamps, TsHeader};
use crate::stats::RetimeStats;
use crate::timing::{ContinuityState, TimestampRebase};
use crate::types::{ClockField, PesTimestamps, TimingEvent};

pub struct Retimer {
    state: ContinuityState,
    stats: RetimeStats,
    retime: bool,
}

impl Retimer {
    /// `retime = false` computes and reports corrected values without
    /// touching the packets.
    pub fn new(retime: bool) -> Self {
        Self {
            state: ContinuityState::new(),
            stats: RetimeStats::new(),
            retime,
        }
    }

    pub fn state(&self) -> &ContinuityState {
        &self.state
    }

    pub fn stats(&self) -> &RetimeStats {
        &self.stats
    }

    pub fn into_stats(self) -> RetimeStats {
        self.stats
    }

    /// Process a single TS packet
    ///
    /// PCR is handled before PTS/DTS so that a discontinuity carried by
    /// this packet's PCR already applies to its timestamps.
    pub fn process_packet(&mut self, chunk: &mut [u8]) -> Result<Vec<TimingEvent>> {
        let header = match TsHeader::parse(chunk) {
            Ok(header) => header,
            Err(e) if e.is_recoverable() => {
                warn!("packet {}: {e}, passed through untouched", self.stats.packets + 1);
                self.stats.on_invalid_packet();
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let pid = header.pid;
        self.stats.on_packet(pid);

        let mut events = Vec::new();

        match adaptation_pcr(chunk, &header) {
            Ok(Some(pcr)) => self.handle_pcr(chunk, pid, pcr, &mut events)?,
            Ok(None) => {}
            Err(e) if e.is_recoverable() => {
                debug!("packet {}: {e}, PCR skipped", self.stats.packets);
                self.stats.on_skipped_sample();
            }
            Err(e) => return Err(e),
        }

        match pes_timestamps(chunk, &header) {
            Ok(Some(ts)) => self.handle_timestamps(chunk, pid, ts, &mut events)?,
            Ok(None) => {}
            Err(e) if e.is_recoverable() => {
                debug!("packet {}: {e}, timestamps skipped", self.stats.packets);
                self.stats.on_skipped_sample();
            }
            Err(e) => return Err(e),
        }

        for event in &events {
            self.stats.on_event(event);
        }
        Ok(events)
    }

    fn handle_pcr(
        &mut self,
        chunk: &mut [u8],
        pid: u16,
        field: ClockField,
        events: &mut Vec<TimingEvent>,
    ) -> Result<()> {
        let pcr = self.state.rebase_pcr(field.value);
        if let Some(d) = pcr.discontinuity {
            warn!("pid {pid}: PCR discontinuity detected ({} -> {})", d.previous, d.current);
            events.push(TimingEvent::PcrDiscontinuity {
                pid,
                previous: d.previous,
                current: d.current,
            });
        }
        if self.retime {
            write_pcr(&mut chunk[field.offset..field.offset + PCR_FIELD_SIZE], pcr.corrected)?;
            self.stats.on_rewrite();
        }
        events.push(TimingEvent::Pcr { pid, raw: pcr.raw, corrected: pcr.corrected });
        Ok(())
    }

    fn handle_timestamps(
        &mut self,
        chunk: &mut [u8],
        pid: u16,
        ts: PesTimestamps,
        events: &mut Vec<TimingEvent>,
    ) -> Result<()> {
        let pts = self.state.rebase_pts(pid, ts.pts.value);
        if let Some(d) = pts.discontinuity {
            warn!("pid {pid}: PTS discontinuity detected ({} -> {})", d.previous, d.current);
            events.push(TimingEvent::PtsDiscontinuity {
                pid,
                previous: d.previous,
                current: d.current,
            });
        }
        self.store_timestamp(chunk, pid, ts.pts, &pts)?;
        events.push(TimingEvent::Pts {
            pid,
            raw: pts.raw,
            corrected: pts.corrected,
            fallback: pts.fallback,
        });

        if let Some(dts_field) = ts.dts {
            let dts = self.state.rebase_dts(dts_field.value);
            self.store_timestamp(chunk, pid, dts_field, &dts)?;
            events.push(TimingEvent::Dts {
                pid,
                raw: dts.raw,
                corrected: dts.corrected,
                fallback: dts.fallback,
            });
        }
        Ok(())
    }

    fn store_timestamp(
        &mut self,
        chunk: &mut [u8],
        pid: u16,
        field: ClockField,
        rebase: &TimestampRebase,
    ) -> Result<()> {
        if rebase.fallback {
            debug!(
                "pid {pid}: {} ran ahead of the program clock, using previous offset",
                rebase.raw
            );
        }
        if self.retime {
            let region = &mut chunk[field.offset..field.offset + PES_TIMESTAMP_SIZE];
            write_timestamp(region, rebase.corrected)?;
            self.stats.on_rewrite();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{PCR_CLOCK_HZ, PTS_CLOCK_HZ, SPLICE_GRACE};
    use crate::fields::{read_pcr, read_timestamp};
    use crate::test_support::PacketBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn rewrites_pcr_in_place() {
        let mut retimer = Retimer::new(true);
        let mut pkt = PacketBuilder::new(0x100).pcr(40 * PCR_CLOCK_HZ).build();
        let original = pkt;

        let events = retimer.process_packet(&mut pkt).unwrap();
        assert_eq!(
            events,
            vec![TimingEvent::Pcr { pid: 0x100, raw: 40 * PCR_CLOCK_HZ, corrected: PCR_CLOCK_HZ }]
        );
        assert_eq!(read_pcr(&pkt[6..12]).unwrap(), PCR_CLOCK_HZ);

        // only the PCR bytes changed, reserved bits included
        assert_eq!(&pkt[..6], &original[..6]);
        assert_eq!(&pkt[12..], &original[12..]);
        assert_eq!(pkt[10] & 0x7E, original[10] & 0x7E);
    }

    #[test]
    fn pcr_applies_before_pts_in_same_packet() {
        let mut retimer = Retimer::new(true);
        let mut first = PacketBuilder::new(0x100).pcr(100 * PCR_CLOCK_HZ).build();
        retimer.process_packet(&mut first).unwrap();

        // splice: PCR and PTS of the new segment arrive together
        let mut pkt = PacketBuilder::new(0x100)
            .pcr(10 * PCR_CLOCK_HZ)
            .pts(10 * PTS_CLOCK_HZ)
            .dts(10 * PTS_CLOCK_HZ - 3003)
            .build();
        let events = retimer.process_packet(&mut pkt).unwrap();

        let corrected_pcr = PCR_CLOCK_HZ + SPLICE_GRACE;
        let expected_pts = corrected_pcr / 300;
        assert_eq!(
            events,
            vec![
                TimingEvent::PcrDiscontinuity {
                    pid: 0x100,
                    previous: 100 * PCR_CLOCK_HZ,
                    current: 10 * PCR_CLOCK_HZ,
                },
                TimingEvent::Pcr { pid: 0x100, raw: 10 * PCR_CLOCK_HZ, corrected: corrected_pcr },
                TimingEvent::Pts {
                    pid: 0x100,
                    raw: 10 * PTS_CLOCK_HZ,
                    corrected: expected_pts,
                    fallback: false,
                },
                TimingEvent::Dts {
                    pid: 0x100,
                    raw: 10 * PTS_CLOCK_HZ - 3003,
                    corrected: expected_pts - 3003,
                    fallback: false,
                },
            ]
        );
        assert_eq!(read_timestamp(&pkt[12 + 9..]).unwrap(), expected_pts);
        assert_eq!(read_timestamp(&pkt[12 + 14..]).unwrap(), expected_pts - 3003);
        assert_eq!(pkt[12 + 9] & 0xF1, 0x31);
        assert_eq!(pkt[12 + 14] & 0xF1, 0x11);
    }

    #[test]
    fn report_only_leaves_packets_untouched() {
        let mut retimer = Retimer::new(false);
        let mut pkt = PacketBuilder::new(0x100)
            .pcr(40 * PCR_CLOCK_HZ)
            .pts(40 * PTS_CLOCK_HZ)
            .build();
        let original = pkt;
        let events = retimer.process_packet(&mut pkt).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(pkt, original);
        assert_eq!(retimer.stats().rewritten_fields, 0);
    }

    #[test]
    fn malformed_pes_is_skipped_but_pcr_kept() {
        let mut retimer = Retimer::new(true);
        let mut pkt = PacketBuilder::new(0x100).pcr(PCR_CLOCK_HZ).pts(1).build();
        pkt[12 + 7] = 0x40; // forbidden PTS_DTS_flags
        let events = retimer.process_packet(&mut pkt).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(retimer.stats().skipped_samples, 1);
    }

    #[test]
    fn invalid_packet_passes_through() {
        let mut retimer = Retimer::new(true);
        let mut pkt = PacketBuilder::new(0x100).pcr(PCR_CLOCK_HZ).build();
        pkt[0] = 0x00;
        let original = pkt;
        assert!(retimer.process_packet(&mut pkt).unwrap().is_empty());
        assert_eq!(pkt, original);
        assert_eq!(retimer.stats().invalid_packets, 1);
        assert_eq!(retimer.state().previous_raw_pcr(), None);
    }

    #[test]
    fn packets_without_clocks_produce_no_events() {
        let mut retimer = Retimer::new(true);
        let mut pkt = PacketBuilder::new(0x1FFF).build();
        assert!(retimer.process_packet(&mut pkt).unwrap().is_empty());
        assert_eq!(retimer.stats().get(0x1FFF).unwrap().packets, 1);
    }
}
