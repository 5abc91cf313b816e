//! Reply decoding primitives: label iteration with pointer-following and loop detection, domain
//! name reconstruction, and resource-record framing.
//!
//! Loop detection bounds the cumulative number of octets a compression-pointer chase may traverse
//! by the length of the datagram itself, so a pointer cycle is caught rather than followed
//! forever.

use core::ops::Range;

use crate::status::Status;
use crate::wire::buffer::Buffer;
use crate::wire::header::{RrHeader, RR_HEADER_SIZE};
use utils::bytes::cast;

/// One week, in seconds, the TTL cap applied to every parsed resource record.
pub const MAX_TTL_SECS: u32 = 7 * 24 * 60 * 60;

/// The outcome of stepping the label iterator once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
	/// A literal label occupying `dgram[range]`.
	Literal(Range<usize>),
	/// The root label: iteration is complete.
	Root,
}

/// Walks the labels of a domain name starting at some offset in `dgram`, following compression
/// pointers. Bounds the cumulative number of octets considered by `dgram.len()`, so a pointer
/// cycle is detected rather than looping forever.
pub struct LabelIter<'a> {
	dgram: &'a [u8],
	cursor: usize,
	traversed: usize,
	/// Set the first time a pointer is followed (or the root terminator is read without ever
	/// following one): the offset immediately after the *uncompressed* portion of the name, i.e.
	/// where parsing of the rest of the enclosing record should resume.
	end: Option<usize>,
	done: bool,
}

/// A domain name turned out to run past the end of the datagram. This is a recoverable signal:
/// the caller should treat the containing message as truncated, not malformed.
pub struct Truncated;

impl<'a> LabelIter<'a> {
	pub fn new(dgram: &'a [u8], start: usize) -> Self {
		Self { dgram, cursor: start, traversed: 0, end: None, done: false }
	}

	/// The offset immediately following this name within `dgram`, valid once iteration has
	/// produced [`Label::Root`] (or truncated).
	pub fn end(&self) -> Option<usize> {
		self.end
	}

	fn charge(&mut self, n: usize) -> Result<(), Status> {
		self.traversed += n;
		if self.traversed > self.dgram.len() {
			return Err(Status::ServerFaulty);
		}
		Ok(())
	}

	/// Produces the next label, `Ok(Err(Truncated))` if the datagram runs out before the name
	/// does, or `Err(Status::ServerFaulty)` if a compression pointer cycle is detected (the
	/// cumulative traversal bound is exceeded).
	pub fn next_label(&mut self) -> Result<Result<Label, Truncated>, Status> {
		if self.done {
			return Ok(Ok(Label::Root));
		}

		loop {
			if self.cursor >= self.dgram.len() {
				return Ok(Err(Truncated));
			}

			let lablen = self.dgram[self.cursor];
			self.charge(1)?;

			match lablen {
				0 => {
					if self.end.is_none() {
						self.end = Some(self.cursor + 1);
					}
					self.done = true;
					return Ok(Ok(Label::Root));
				}
				1..=63 => {
					let start = self.cursor + 1;
					let stop = start + lablen as usize;
					if stop > self.dgram.len() {
						return Ok(Err(Truncated));
					}
					self.charge(lablen as usize)?;
					self.cursor = stop;
					return Ok(Ok(Label::Literal(start..stop)));
				}
				192..=255 => {
					if self.cursor + 1 >= self.dgram.len() {
						return Ok(Err(Truncated));
					}
					let lo = self.dgram[self.cursor + 1];
					self.charge(1)?;
					let ptr = (((lablen & 0x3f) as usize) << 8) | lo as usize;
					if self.end.is_none() {
						self.end = Some(self.cursor + 1);
					}
					if ptr >= self.dgram.len() {
						return Err(Status::ServerFaulty);
					}
					self.cursor = ptr;
				}
				64..=191 => return Err(Status::ServerFaulty),
			}
		}
	}
}

/// Reconstructs a dotted-form domain name starting at `start` in `dgram`, escaping characters
/// outside `[A-Za-z0-9-]` and `.` as `\DDD` unless `quote_ok` permits passing them through
/// literally. Returns the name (always with a trailing dot, matching the owner convention used
/// throughout this crate) and the offset immediately following the name in `dgram`.
///
/// A name that runs off the end of the datagram is reported as `Ok(Err(Truncated))`, a
/// recoverable signal rather than a hard parse error.
pub fn parse_domain(dgram: &[u8], start: usize, quote_ok: bool) -> Result<Result<(String, usize), Truncated>, Status> {
	let mut iter = LabelIter::new(dgram, start);
	let mut out = Buffer::new();

	loop {
		match iter.next_label()? {
			Err(Truncated) => return Ok(Err(Truncated)),
			Ok(Label::Root) => break,
			Ok(Label::Literal(range)) => {
				for &b in &dgram[range] {
					if quote_ok {
						out.push(b);
					} else {
						out.push_quoted(b);
					}
				}
				out.push(b'.');
			}
		}
	}

	if out.is_empty() {
		out.push(b'.');
	}

	let name = String::from_utf8(out.into_vec()).map_err(|_| Status::ServerFaulty)?;
	Ok(Ok((name, iter.end().expect("end set once Root is reached"))))
}

/// Compares the domain name at `dgram[start..]` against the reference name at
/// `reference[ref_start..]`, label-by-label, case-insensitively.
/// Returns `Ok(Err(Truncated))` if either name runs off the end of its datagram.
pub fn domain_matches(
	dgram: &[u8],
	start: usize,
	reference: &[u8],
	ref_start: usize,
) -> Result<Result<bool, Truncated>, Status> {
	let mut a = LabelIter::new(dgram, start);
	let mut b = LabelIter::new(reference, ref_start);

	loop {
		let la = match a.next_label()? {
			Err(Truncated) => return Ok(Err(Truncated)),
			Ok(l) => l,
		};
		let lb = match b.next_label()? {
			Err(Truncated) => return Ok(Err(Truncated)),
			Ok(l) => l,
		};

		match (la, lb) {
			(Label::Root, Label::Root) => return Ok(Ok(true)),
			(Label::Root, _) | (_, Label::Root) => return Ok(Ok(false)),
			(Label::Literal(ra), Label::Literal(rb)) => {
				let (sa, sb) = (&dgram[ra], &reference[rb]);
				if sa.len() != sb.len() || !sa.eq_ignore_ascii_case(sb) {
					return Ok(Ok(false));
				}
			}
		}
	}
}

/// A framed resource record: its owner's extent, type, class, capped TTL, and the location of its
/// RDATA, plus whether its owner matched a reference name (when one was supplied).
pub struct RrFrame {
	pub rtype: u16,
	pub rclass: u16,
	pub ttl: u32,
	pub rdata: Range<usize>,
	pub owner_matched: bool,
}

/// Frames one resource record starting at `*cbyte` in `dgram`, advancing `*cbyte` past it.
/// Optionally compares the record's owner against `reference`/`ref_start` (from the original
/// query or the current CNAME target).
///
/// Returns `Ok(Err(Truncated))` if the record runs past the end of the datagram, a recoverable
/// signal, not a parse error.
pub fn find_rr(
	dgram: &[u8],
	cbyte: &mut usize,
	reference: Option<(&[u8], usize)>,
) -> Result<Result<RrFrame, Truncated>, Status> {
	let owner_matched = match reference {
		Some((reference, ref_start)) => match domain_matches(dgram, *cbyte, reference, ref_start)? {
			Err(Truncated) => return Ok(Err(Truncated)),
			Ok(m) => m,
		},
		None => false,
	};

	let mut iter = LabelIter::new(dgram, *cbyte);
	loop {
		match iter.next_label()? {
			Err(Truncated) => return Ok(Err(Truncated)),
			Ok(Label::Root) => break,
			Ok(Label::Literal(_)) => continue,
		}
	}
	let after_owner = iter.end().expect("end set once Root is reached");

	if after_owner + RR_HEADER_SIZE > dgram.len() {
		return Ok(Err(Truncated));
	}

	let header: &RrHeader = cast(&dgram[after_owner..after_owner + RR_HEADER_SIZE]);
	let rtype = header.ty.get();
	let rclass = header.class.get();
	let ttl = header.ttl.get().min(MAX_TTL_SECS);
	let rdlength = header.rdlength.get() as usize;

	let rdata_start = after_owner + RR_HEADER_SIZE;
	let rdata_end = rdata_start + rdlength;
	if rdata_end > dgram.len() {
		return Ok(Err(Truncated));
	}

	*cbyte = rdata_end;

	Ok(Ok(RrFrame { rtype, rclass, ttl, rdata: rdata_start..rdata_end, owner_matched }))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn label(s: &str) -> Vec<u8> {
		let mut v = vec![s.len() as u8];
		v.extend_from_slice(s.as_bytes());
		v
	}

	#[test]
	fn decodes_encoded_domain_round_trip() {
		let mut dgram = Vec::new();
		dgram.extend(label("www"));
		dgram.extend(label("example"));
		dgram.extend(label("com"));
		dgram.push(0);

		let (name, end) = parse_domain(&dgram, 0, false).unwrap().ok().unwrap();
		assert_eq!(name, "www.example.com.");
		assert_eq!(end, dgram.len());
	}

	#[test]
	fn follows_a_single_compression_pointer() {
		let mut dgram = Vec::new();
		dgram.extend(label("example"));
		dgram.extend(label("com"));
		dgram.push(0);
		let target = 0usize;

		dgram.extend(label("www"));
		dgram.push(0xc0);
		dgram.push(target as u8);

		let start = 11; // offset of "www" label (7+4 bytes prefix)
		let (name, _) = parse_domain(&dgram, start, false).unwrap().ok().unwrap();
		assert_eq!(name, "www.example.com.");
	}

	#[test]
	fn detects_pointer_cycle() {
		// A pointer at offset 0 that points right back to offset 0.
		let dgram = [0xc0u8, 0x00];
		let mut iter = LabelIter::new(&dgram, 0);
		let err = iter.next_label();
		assert!(err.is_err());
	}

	#[test]
	fn rejects_reserved_length_byte() {
		let dgram = [65u8, 0, 0, 0];
		let mut iter = LabelIter::new(&dgram, 0);
		assert!(iter.next_label().is_err());
	}

	#[test]
	fn owner_match_is_case_insensitive() {
		let mut a = Vec::new();
		a.extend(label("WWW"));
		a.extend(label("Example"));
		a.push(0);

		let mut b = Vec::new();
		b.extend(label("www"));
		b.extend(label("example"));
		b.push(0);

		assert_eq!(domain_matches(&a, 0, &b, 0).unwrap().ok(), Some(true));
	}

	#[test]
	fn ttl_capped_at_seven_days() {
		let mut dgram = Vec::new();
		dgram.push(0); // root name
		dgram.extend(1u16.to_be_bytes()); // type A
		dgram.extend(1u16.to_be_bytes()); // class IN
		dgram.extend(u32::MAX.to_be_bytes()); // TTL
		dgram.extend(0u16.to_be_bytes()); // rdlength

		let mut cbyte = 0;
		let frame = find_rr(&dgram, &mut cbyte, None).unwrap().ok().unwrap();
		assert_eq!(frame.ttl, MAX_TTL_SECS);
	}
}
