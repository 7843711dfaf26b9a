//! Packet sources: sync search and fixed-size packet reads
//!
//! The retiming loop pulls one packet at a time, in arrival order, through
//! [`PacketSource`]. [`PacketReader`] wraps any byte stream (files, stdin);
//! the UDP source lives in [`crate::network`].

use std::io::{Chain, Cursor, ErrorKind, Read};

use log::{debug, warn};

use crate::constants::{SYNC_CONFIRMATIONS, SYNC_SEARCH_WINDOW, TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::error::{RetimeError, Result};

pub trait PacketSource {
    /// Fills `buf` with the next packet. `Ok(false)` means the input ended.
    fn read_packet(&mut self, buf: &mut [u8; TS_PACKET_SIZE]) -> Result<bool>;
}

fn is_boundary(data: &[u8], start: usize) -> bool {
    if data[start] != TS_SYNC_BYTE || start + TS_PACKET_SIZE > data.len() {
        return false;
    }
    (1..SYNC_CONFIRMATIONS)
        .map(|n| start + n * TS_PACKET_SIZE)
        .take_while(|&pos| pos < data.len())
        .all(|pos| data[pos] == TS_SYNC_BYTE)
}

/// Locates the first packet boundary in `data`.
///
/// A boundary is a sync byte repeated at every packet interval that fits
/// in the buffer, up to [`SYNC_CONFIRMATIONS`] packets, with at least one
/// complete packet after it.
pub fn find_sync(data: &[u8]) -> Option<usize> {
    (0..data.len()).find(|&i| is_boundary(data, i))
}

/// Reads packets from a byte stream, starting at the first verified
/// sync boundary.
pub struct PacketReader<R> {
    inner: Chain<Cursor<Vec<u8>>, R>,
    skipped: usize,
    packets: u64,
}

impl<R: Read> PacketReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut window = Vec::with_capacity(SYNC_SEARCH_WINDOW);
        reader
            .by_ref()
            .take(SYNC_SEARCH_WINDOW as u64)
            .read_to_end(&mut window)?;

        let start = find_sync(&window).ok_or(RetimeError::SyncNotFound { searched: window.len() })?;
        if start > 0 {
            warn!("skipped {start} bytes before the first sync byte");
        }
        debug!("sync found at byte {start}");

        let head = Cursor::new(window.split_off(start));
        Ok(Self { inner: head.chain(reader), skipped: start, packets: 0 })
    }

    /// Bytes discarded ahead of the first packet
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn packets_read(&self) -> u64 {
        self.packets
    }
}

impl<R: Read> PacketSource for PacketReader<R> {
    fn read_packet(&mut self, buf: &mut [u8; TS_PACKET_SIZE]) -> Result<bool> {
        let mut filled = 0;
        while filled < TS_PACKET_SIZE {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => Ok(false),
            TS_PACKET_SIZE => {
                self.packets += 1;
                Ok(true)
            }
            partial => {
                warn!("dropping {partial} trailing bytes after packet {}", self.packets);
                Ok(false)
            }
        }
    }
}
