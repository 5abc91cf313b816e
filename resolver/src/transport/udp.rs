//! The single non-blocking UDP socket, bound once at init.
//!
//! `EMSGSIZE` promotes the query to TCP; any other `sendto` failure is logged and otherwise
//! ignored, since the query's UDP retry timer expires normally, indistinguishable from a dropped
//! packet.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::os::fd::{AsRawFd, RawFd};

use log::warn;

pub const DNS_PORT: u16 = 53;

/// What happened when a datagram was handed to the kernel.
pub enum UdpSendOutcome {
	/// Accepted for transmission (or dropped transiently, the two are indistinguishable at this
	/// layer).
	Sent,
	/// The datagram was larger than the kernel would send over UDP (`EMSGSIZE`); the caller should
	/// promote the query to TCP.
	TooLarge,
}

pub struct UdpTransport {
	socket: UdpSocket,
}

impl UdpTransport {
	/// Binds an ephemeral, non-blocking UDP socket.
	pub fn bind() -> io::Result<Self> {
		let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
		socket.set_nonblocking(true)?;
		Ok(Self { socket })
	}

	pub fn fd(&self) -> RawFd {
		self.socket.as_raw_fd()
	}

	pub fn send_to(&self, datagram: &[u8], server: SocketAddrV4) -> UdpSendOutcome {
		match self.socket.send_to(datagram, SocketAddr::V4(server)) {
			Ok(_) => UdpSendOutcome::Sent,
			Err(e) if e.raw_os_error() == Some(libc::EMSGSIZE) => UdpSendOutcome::TooLarge,
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => UdpSendOutcome::Sent,
			Err(e) => {
				warn!("sendto {server} failed: {e}");
				UdpSendOutcome::Sent
			}
		}
	}

	/// Drains every datagram currently queued on the socket. Called from `afterSelect` once the
	/// host reports the UDP descriptor readable.
	pub fn recv_all(&self) -> Vec<Vec<u8>> {
		let mut out = Vec::new();
		let mut buf = [0u8; 65535];

		loop {
			match self.socket.recv(&mut buf) {
				Ok(n) => out.push(buf[..n].to_vec()),
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(e) => {
					warn!("recv on UDP socket failed: {e}");
					break;
				}
			}
		}

		out
	}
}
