use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use log::{debug, info, warn};
use socket2::{Domain, Protocol, Socket, Type};

use crate::constants::{MAX_DATAGRAM_SIZE, TS_PACKET_SIZE};
use crate::error::{RetimeError, Result};
use crate::source::PacketSource;

/// Creates and configures a blocking UDP socket for TS packet reception
/// Handles both unicast and multicast addresses
pub fn create_udp_socket(sock_addr: SocketAddr, read_timeout: Option<Duration>) -> Result<Socket> {
    let ip = match sock_addr.ip() {
        IpAddr::V4(v4) => v4,
        _ => {
            return Err(RetimeError::InvalidAddress(format!(
                "{sock_addr}: only IPv4 is supported"
            )));
        }
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&sock_addr.into())?;

    // Join multicast group if the address is multicast
    if ip.is_multicast() {
        let iface = Ipv4Addr::UNSPECIFIED; // default interface
        socket.join_multicast_v4(&ip, &iface)?;
        info!("joined multicast group {ip}");
    }

    socket.set_read_timeout(read_timeout)?;
    Ok(socket)
}

/// Packets received over UDP, several per datagram
pub struct UdpSource {
    socket: UdpSocket,
    pending: BytesMut,
    datagrams: u64,
}

impl UdpSource {
    pub fn bind(addr: SocketAddr, read_timeout: Option<Duration>) -> Result<Self> {
        let socket = create_udp_socket(addr, read_timeout)?;
        info!("listening on udp://{addr}");
        Ok(Self::from_socket(socket.into()))
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            pending: BytesMut::with_capacity(MAX_DATAGRAM_SIZE),
            datagrams: 0,
        }
    }

    pub fn datagrams(&self) -> u64 {
        self.datagrams
    }

    /// Blocks for one datagram; `Ok(false)` when the read timeout expired.
    fn receive(&mut self) -> Result<bool> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let n = match self.socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                info!("no datagram before the read timeout, stopping");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        self.datagrams += 1;

        let usable = n - n % TS_PACKET_SIZE;
        if usable != n {
            warn!("datagram {} has {} stray bytes, dropped", self.datagrams, n - usable);
        }
        debug!("datagram {}: {} packets", self.datagrams, usable / TS_PACKET_SIZE);
        self.pending.extend_from_slice(&buf[..usable]);
        Ok(true)
    }
}

impl PacketSource for UdpSource {
    fn read_packet(&mut self, buf: &mut [u8; TS_PACKET_SIZE]) -> Result<bool> {
        while self.pending.len() < TS_PACKET_SIZE {
            if !self.receive()? {
                return Ok(false);
            }
        }
        self.pending.copy_to_slice(buf);
        Ok(true)
    }
}
