//! The single opportunistic TCP connection: opened lazily on the first query that needs it, kept
//! open afterwards, framed with a 2-byte big-endian length prefix.
//!
//! One shared send buffer services every query waiting to write, in FIFO order, and a partial
//! write leaves the unsent remainder at the front of that buffer for the next writable-readiness
//! callback.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::mem;
use std::net::{SocketAddrV4, TcpStream};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::time::{Duration, Instant};

use log::warn;

use crate::transport::sigpipe;

/// The three-state lifecycle of the shared TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
	Disconnected,
	Connecting,
	Ok,
}

/// The resolver's one TCP connection and its shared send/receive buffers.
pub struct TcpConn {
	stream: Option<TcpStream>,
	state: TcpState,
	/// The index into the configured server list this connection is (or is becoming) connected to.
	pub server: usize,
	deadline: Option<Instant>,
	send_buf: VecDeque<u8>,
	recv_buf: Vec<u8>,
	sigpipe_protect: bool,
}

impl TcpConn {
	pub fn new(sigpipe_protect: bool) -> Self {
		Self {
			stream: None,
			state: TcpState::Disconnected,
			server: 0,
			deadline: None,
			send_buf: VecDeque::new(),
			recv_buf: Vec::new(),
			sigpipe_protect,
		}
	}

	pub fn state(&self) -> TcpState {
		self.state
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn fd(&self) -> Option<RawFd> {
		self.stream.as_ref().map(|s| s.as_raw_fd())
	}

	/// Whether the connection has outstanding bytes queued to write, i.e. whether the host should
	/// be asked to watch for write-readiness too.
	pub fn wants_write(&self) -> bool {
		self.state == TcpState::Connecting || (self.state == TcpState::Ok && !self.send_buf.is_empty())
	}

	/// Starts connecting to `server` if not already connected/connecting there. A no-op if a
	/// connection already exists.
	pub fn connect(&mut self, server: SocketAddrV4, server_index: usize, now: Instant, timeout_ms: u64) {
		if self.state != TcpState::Disconnected {
			return;
		}

		match raw_nonblocking_connect(server) {
			Ok((stream, connected)) => {
				self.stream = Some(stream);
				self.state = if connected { TcpState::Ok } else { TcpState::Connecting };
			}
			Err(e) => {
				warn!("TCP connect to {server} failed: {e}");
				return;
			}
		}

		self.server = server_index;
		self.deadline = Some(now + Duration::from_millis(timeout_ms));
	}

	/// Queues a length-prefixed query datagram for sending, appending to the shared FIFO buffer.
	pub fn queue(&mut self, datagram: &[u8]) {
		self.send_buf.extend((datagram.len() as u16).to_be_bytes());
		self.send_buf.extend(datagram.iter().copied());
	}

	/// Flushes as much of the send buffer as the socket will currently accept. SIGPIPE protection
	/// brackets the write when the connection's peer may have reset.
	pub fn flush(&mut self) -> io::Result<()> {
		let Some(stream) = self.stream.as_mut() else { return Ok(()) };

		let _guard = sigpipe::Guard::protect(self.sigpipe_protect);

		while !self.send_buf.is_empty() {
			let (front, _) = self.send_buf.as_slices();
			let chunk = if front.is_empty() { self.send_buf.make_contiguous() } else { front };

			match stream.write(chunk) {
				Ok(0) => break,
				Ok(n) => {
					self.send_buf.drain(..n);
				}
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(e) => return Err(e),
			}
		}

		Ok(())
	}

	/// Completes a `Connecting` socket once the host reports it writable.
	pub fn finish_connect(&mut self) -> io::Result<()> {
		if self.state != TcpState::Connecting {
			return Ok(());
		}
		let Some(stream) = self.stream.as_ref() else { return Ok(()) };
		match stream.take_error()? {
			Some(e) => Err(e),
			None => {
				self.state = TcpState::Ok;
				Ok(())
			}
		}
	}

	/// Reads any available bytes and returns every complete length-prefixed message framed out so
	/// far.
	pub fn read_messages(&mut self) -> io::Result<Vec<Vec<u8>>> {
		let Some(stream) = self.stream.as_mut() else { return Ok(Vec::new()) };

		let mut buf = [0u8; 65535];
		loop {
			match stream.read(&mut buf) {
				Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "TCP connection closed")),
				Ok(n) => self.recv_buf.extend_from_slice(&buf[..n]),
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(e) => return Err(e),
			}
		}

		let mut messages = Vec::new();
		loop {
			if self.recv_buf.len() < 2 {
				break;
			}
			let len = u16::from_be_bytes([self.recv_buf[0], self.recv_buf[1]]) as usize;
			if self.recv_buf.len() < 2 + len {
				break;
			}
			let message = self.recv_buf[2..2 + len].to_vec();
			self.recv_buf.drain(..2 + len);
			messages.push(message);
		}

		Ok(messages)
	}

	/// Tears down the connection after a framing error or reset: every query still waiting on it
	/// is the caller's responsibility to re-route to the next server.
	pub fn reset(&mut self) {
		self.stream = None;
		self.state = TcpState::Disconnected;
		self.deadline = None;
		self.send_buf.clear();
		self.recv_buf.clear();
	}
}

/// Issues a real non-blocking `connect(2)`: a raw `AF_INET`/`SOCK_STREAM` socket is put into
/// `O_NONBLOCK` before `connect` is called, so the call returns immediately with `EINPROGRESS`
/// rather than blocking the caller until the handshake completes (or fails). Returns the stream
/// plus whether it connected immediately (rare, but possible for loopback peers) — the caller
/// polls for writability via [`TcpConn::finish_connect`] in the `EINPROGRESS` case.
fn raw_nonblocking_connect(server: SocketAddrV4) -> io::Result<(TcpStream, bool)> {
	// SAFETY: a plain socket(2) call; the returned descriptor is owned exclusively by this
	// function and handed to `TcpStream::from_raw_fd` (which takes over closing it) below.
	let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
	if fd < 0 {
		return Err(io::Error::last_os_error());
	}

	// SAFETY: `fd` was just created above and is not yet shared with anything else; `fcntl` with
	// `F_GETFL`/`F_SETFL` is the standard way to flip `O_NONBLOCK` on an already-open descriptor.
	let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
	if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
		let err = io::Error::last_os_error();
		// SAFETY: `fd` is still exclusively owned here; nothing has wrapped it in a `TcpStream` yet.
		unsafe { libc::close(fd) };
		return Err(err);
	}

	let mut sockaddr: libc::sockaddr_in = unsafe { mem::zeroed() };
	sockaddr.sin_family = libc::AF_INET as libc::sa_family_t;
	sockaddr.sin_port = server.port().to_be();
	sockaddr.sin_addr.s_addr = u32::from_ne_bytes(server.ip().octets());

	// SAFETY: `sockaddr` is a fully initialized `sockaddr_in` of the size passed in, and `fd` is
	// the non-blocking socket set up above; a non-blocking `connect` returning `EINPROGRESS` is the
	// standard way to start an asynchronous TCP handshake rather than blocking until it resolves.
	let rc = unsafe {
		libc::connect(fd, &sockaddr as *const libc::sockaddr_in as *const libc::sockaddr, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
	};

	// SAFETY: `fd` is a valid, exclusively-owned descriptor; `TcpStream` takes ownership of it
	// from here on, including closing it on drop, regardless of how `connect` above returned.
	let stream = unsafe { TcpStream::from_raw_fd(fd) };

	if rc == 0 {
		return Ok((stream, true));
	}

	let err = io::Error::last_os_error();
	if err.raw_os_error() == Some(libc::EINPROGRESS) {
		Ok((stream, false))
	} else {
		Err(err)
	}
}
