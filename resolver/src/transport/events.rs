//! The readiness contract between the resolver and a host-owned event loop: what to watch, and
//! what the host observed. The resolver never owns the event loop, so it hands the host a small,
//! borrow-free description of what it wants and reads back a description of what happened.

use std::os::fd::RawFd;
use std::time::Instant;

/// Which directions of readiness a descriptor should be watched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
	pub readable: bool,
	pub writable: bool,
}

impl Interest {
	pub const NONE: Interest = Interest { readable: false, writable: false };
	pub const READ: Interest = Interest { readable: true, writable: false };

	pub const fn read_write() -> Self {
		Interest { readable: true, writable: true }
	}
}

/// One descriptor the resolver wants watched, and in which directions, mirroring one slot of a
/// `pollfd` array.
#[derive(Debug, Clone, Copy)]
pub struct PollEntry {
	pub fd: RawFd,
	pub interest: Interest,
}

/// What the resolver currently wants from the host's event loop: a set of descriptors plus, when
/// present, the soonest deadline the host's own wait should be clamped to.
#[derive(Debug, Clone, Default)]
pub struct WantSet {
	pub entries: Vec<PollEntry>,
	pub deadline: Option<Instant>,
}

impl WantSet {
	/// Returns `Err(needed_len)` if `out` is too small to hold every entry, so the host can
	/// resize and retry.
	pub fn fill_poll_array(&self, out: &mut [PollEntry]) -> Result<usize, usize> {
		if out.len() < self.entries.len() {
			return Err(self.entries.len());
		}
		out[..self.entries.len()].copy_from_slice(&self.entries);
		Ok(self.entries.len())
	}
}

/// What the host's event loop observed, handed back to `afterSelect`/`afterPoll`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadySet {
	pub readable: bool,
	pub writable: bool,
}

impl ReadySet {
	pub const NONE: ReadySet = ReadySet { readable: false, writable: false };

	pub fn any(self) -> bool {
		self.readable || self.writable
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fill_poll_array_reports_required_length_when_too_small() {
		let want = WantSet {
			entries: vec![
				PollEntry { fd: 3, interest: Interest::READ },
				PollEntry { fd: 4, interest: Interest::read_write() },
			],
			deadline: None,
		};
		let mut out = [PollEntry { fd: -1, interest: Interest::NONE }; 1];
		assert_eq!(want.fill_poll_array(&mut out), Err(2));
	}

	#[test]
	fn fill_poll_array_copies_every_entry() {
		let want = WantSet { entries: vec![PollEntry { fd: 7, interest: Interest::READ }], deadline: None };
		let mut out = [PollEntry { fd: -1, interest: Interest::NONE }; 4];
		assert_eq!(want.fill_poll_array(&mut out), Ok(1));
		assert_eq!(out[0].fd, 7);
	}
}
