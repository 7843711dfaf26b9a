//! Synthetic packets for unit tests.

use crate::constants::TS_PACKET_SIZE;
use crate::fields::{write_pcr, write_timestamp};

pub struct PacketBuilder {
    pid: u16,
    continuity: u8,
    pcr: Option<u64>,
    pes: bool,
    pts: Option<u64>,
    dts: Option<u64>,
}

impl PacketBuilder {
    pub fn new(pid: u16) -> Self {
        Self { pid, continuity: 0, pcr: None, pes: false, pts: None, dts: None }
    }

    pub fn continuity(mut self, cc: u8) -> Self {
        self.continuity = cc & 0x0F;
        self
    }

    pub fn pcr(mut self, pcr: u64) -> Self {
        self.pcr = Some(pcr);
        self
    }

    pub fn pes_header(mut self) -> Self {
        self.pes = true;
        self
    }

    pub fn pts(mut self, pts: u64) -> Self {
        self.pes = true;
        self.pts = Some(pts);
        self
    }

    pub fn dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts);
        self
    }

    pub fn build(&self) -> [u8; TS_PACKET_SIZE] {
        let mut pkt = [0xABu8; TS_PACKET_SIZE];
        let afc: u8 = if self.pcr.is_some() { 3 } else { 1 };
        pkt[0] = 0x47;
        let pusi: u8 = if self.pes { 0x40 } else { 0x00 };
        pkt[1] = pusi | ((self.pid >> 8) as u8 & 0x1F);
        pkt[2] = self.pid as u8;
        pkt[3] = (afc << 4) | self.continuity;

        let mut idx = 4;
        if let Some(pcr) = self.pcr {
            pkt[4] = 7;
            pkt[5] = 0x10;
            pkt[6..12].fill(0xFF);
            write_pcr(&mut pkt[6..12], pcr).unwrap();
            idx = 12;
        }

        if self.pes {
            let flags = match (self.pts, self.dts) {
                (Some(_), Some(_)) => 0xC0,
                (Some(_), None) => 0x80,
                _ => 0x00,
            };
            let hdl = match flags {
                0xC0 => 10,
                0x80 => 5,
                _ => 0,
            };
            pkt[idx..idx + 9].copy_from_slice(&[0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x80, flags, hdl]);
            idx += 9;
            if let Some(pts) = self.pts {
                let prefix = if self.dts.is_some() { 0x31 } else { 0x21 };
                pkt[idx..idx + 5].copy_from_slice(&[prefix, 0x00, 0x01, 0x00, 0x01]);
                write_timestamp(&mut pkt[idx..idx + 5], pts).unwrap();
                idx += 5;
            }
            if let Some(dts) = self.dts {
                pkt[idx..idx + 5].copy_from_slice(&[0x11, 0x00, 0x01, 0x00, 0x01]);
                write_timestamp(&mut pkt[idx..idx + 5], dts).unwrap();
            }
        }
        pkt
    }
}
