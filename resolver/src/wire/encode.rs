//! Query datagram construction: header field order, a 63-label sanity bound, and per-character
//! validation of each owner label.

use crate::query::flags::QueryFlags;
use crate::status::Status;
use crate::wire::buffer::Buffer;
use crate::wire::header::{Flags, CLASS_IN};

/// The maximum number of labels a single owner may contain, independent of the 255-octet
/// total-length bound.
const MAX_LABELS: usize = 63;

/// The maximum length of one label, per RFC 1035.
const MAX_LABEL_LEN: usize = 63;

/// The maximum length of an owner name, pre-compression.
pub const MAX_OWNER_LEN: usize = 255;

/// Splits `owner` into its wire-format labels, honouring `\DDD`/`\c` escapes when
/// `flags` permits generous quoting, and validating the character-class rules otherwise.
///
/// A trailing unescaped dot marks the owner absolute; it is stripped before labelisation and is
/// not itself a label boundary that produces an empty label.
fn encode_labels(owner: &str, quote_ok: bool) -> Result<Vec<Vec<u8>>, Status> {
	let bytes = owner.as_bytes();

	let bytes = match bytes.last() {
		Some(b'.') => &bytes[..bytes.len() - 1],
		_ => bytes,
	};

	if bytes.is_empty() {
		return Err(Status::InvalidDomain);
	}

	let mut labels = Vec::new();
	let mut i = 0;

	while i < bytes.len() {
		let mut label = Vec::new();

		while i < bytes.len() && bytes[i] != b'.' {
			let mut c = bytes[i];
			i += 1;

			if c == b'\\' {
				if !quote_ok {
					return Err(Status::InvalidDomain);
				}

				if i >= bytes.len() {
					return Err(Status::InvalidDomain);
				}

				if bytes[i].is_ascii_digit() {
					if i + 2 >= bytes.len() || !bytes[i + 1].is_ascii_digit() || !bytes[i + 2].is_ascii_digit() {
						return Err(Status::InvalidDomain);
					}

					let value =
						(bytes[i] - b'0') as u32 * 100 + (bytes[i + 1] - b'0') as u32 * 10 + (bytes[i + 2] - b'0') as u32;
					if value >= 256 {
						return Err(Status::InvalidDomain);
					}

					c = value as u8;
					i += 3;
				} else {
					c = bytes[i];
					i += 1;
				}
			}

			if label.len() == MAX_LABEL_LEN {
				return Err(Status::InvalidDomain);
			}

			label.push(c);
		}

		if label.is_empty() {
			return Err(Status::InvalidDomain);
		}

		if !quote_ok {
			let last = label.len() - 1;

			for (idx, &b) in label.iter().enumerate() {
				let edge = idx == 0 || idx == last;

				if edge && (b.is_ascii_digit() || b == b'-') {
					return Err(Status::InvalidDomain);
				}

				if !(b.is_ascii_alphanumeric() || b == b'-') {
					return Err(Status::InvalidDomain);
				}
			}
		}

		labels.push(label);

		if labels.len() > MAX_LABELS {
			return Err(Status::InvalidDomain);
		}

		if i < bytes.len() {
			i += 1;
		}
	}

	Ok(labels)
}

/// Builds a query datagram for `owner`/`qtype` with a fresh header (`RD=1`, `QDCOUNT=1`,
/// everything else zero) and the given `id`. Fails with [`Status::QueryDomainTooLong`] for owners
/// over 255 octets pre-compression and [`Status::InvalidDomain`] for a syntactically invalid
/// owner.
pub fn encode_query(owner: &str, qtype: u16, flags: QueryFlags, id: u16) -> Result<Vec<u8>, Status> {
	if owner.len() > MAX_OWNER_LEN {
		return Err(Status::QueryDomainTooLong);
	}

	let labels = encode_labels(owner, flags.contains(QueryFlags::QUOTEOK_QUERY))?;

	let mut buf = Buffer::new();

	buf.push_u16be(id);
	buf.push_u16be(u16::from(Flags::query()));
	buf.push_u16be(1); // QDCOUNT
	buf.push_u16be(0); // ANCOUNT
	buf.push_u16be(0); // NSCOUNT
	buf.push_u16be(0); // ARCOUNT

	for label in &labels {
		buf.push(label.len() as u8);
		buf.extend(label);
	}
	buf.push(0);

	buf.push_u16be(qtype);
	buf.push_u16be(CLASS_IN);

	Ok(buf.into_vec())
}

/// Rebuilds a query datagram pointing at a CNAME target that lives inside an existing reply
/// datagram, preserving compression by referencing it with a pointer rather than re-spelling the
/// labels. Used by CNAME chasing to restart a query at its canonical name without
/// decompressing and re-encoding the target name.
///
/// `source` is the reply datagram the CNAME was found in; `target_offset` is the byte offset of
/// the CNAME's RDATA (the start of the target domain) within it.
pub fn encode_query_from_pointer(source: &[u8], target_offset: usize, qtype: u16, id: u16) -> Result<Vec<u8>, Status> {
	// The new header, a 2-byte pointer standing in for the question's owner name, and the
	// qtype/qclass pair, all precede the appended copy of `source` (see below); a pointer is a
	// message-relative offset (RFC 1035 §4.1.4), so one addressing into the appended copy must be
	// shifted by this prefix's length.
	const PREFIX_LEN: usize = 12 + 2 + 2 + 2;

	if PREFIX_LEN + target_offset > 0x3fff {
		return Err(Status::InvalidDomain);
	}

	let mut buf = Buffer::new();

	buf.push_u16be(id);
	buf.push_u16be(u16::from(Flags::query()));
	buf.push_u16be(1);
	buf.push_u16be(0);
	buf.push_u16be(0);
	buf.push_u16be(0);

	// `source` itself starts with its own 12-byte header; appending it whole after our own
	// 18-byte prefix keeps every *internal* pointer already inside it meaningless only if none
	// pointed outside the copied region, which holds here since `source` is a complete message in
	// its own right. The one pointer we add ourselves must reference the target's shifted position.
	let ptr = 0xc000u16 | ((PREFIX_LEN + target_offset) as u16 & 0x3fff);
	buf.push_u16be(ptr);

	buf.push_u16be(qtype);
	buf.push_u16be(CLASS_IN);

	let mut datagram = buf.into_vec();
	datagram.extend_from_slice(source);

	Ok(datagram)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_owner_over_255_bytes() {
		let owner = "a".repeat(256);
		assert_eq!(encode_query(&owner, 1, QueryFlags::empty(), 0), Err(Status::QueryDomainTooLong));
	}

	#[test]
	fn accepts_owner_exactly_255_bytes() {
		// 255 bytes total: 42 labels of "aaaaaa." (7 bytes) minus the trailing dot, then pad.
		let mut owner = "a".repeat(63);
		while owner.len() < 255 {
			owner.push('.');
			let remaining = 255 - owner.len();
			owner.push_str(&"a".repeat(remaining.min(63)));
		}
		assert_eq!(owner.len(), 255);
		assert!(encode_query(&owner, 1, QueryFlags::empty(), 0).is_ok());
	}

	#[test]
	fn label_exactly_63_ok_64_rejected() {
		let owner63 = format!("{}.example.", "a".repeat(63));
		assert!(encode_query(&owner63, 1, QueryFlags::empty(), 0).is_ok());

		let owner64 = format!("{}.example.", "a".repeat(64));
		assert_eq!(encode_query(&owner64, 1, QueryFlags::empty(), 0), Err(Status::InvalidDomain));
	}

	#[test]
	fn rejects_leading_hyphen_without_quoting() {
		assert_eq!(encode_query("-abc.example.", 1, QueryFlags::empty(), 0), Err(Status::InvalidDomain));
	}

	#[test]
	fn quote_ok_permits_escapes() {
		let owner = r"a\062b.example.";
		let datagram = encode_query(owner, 1, QueryFlags::QUOTEOK_QUERY, 0).unwrap();
		// label "a>b" (ascii 62 = '>'), length 3
		assert_eq!(&datagram[12..13], &[3]);
		assert_eq!(&datagram[13..16], b"a>b");
	}

	#[test]
	fn trailing_dot_is_stripped_not_an_empty_label() {
		let with_dot = encode_query("example.com.", 1, QueryFlags::empty(), 5).unwrap();
		let without_dot = encode_query("example.com", 1, QueryFlags::empty(), 5).unwrap();
		assert_eq!(with_dot, without_dot);
	}

	#[test]
	fn header_has_rd_set_and_one_question() {
		let datagram = encode_query("example.com.", 1, QueryFlags::empty(), 0x1234).unwrap();
		assert_eq!(&datagram[0..2], &[0x12, 0x34]);
		assert_eq!(datagram[2] & 0x01, 0x01); // RD
		assert_eq!(&datagram[4..6], &[0, 1]); // QDCOUNT
		assert_eq!(&datagram[6..8], &[0, 0]);
		assert_eq!(&datagram[8..10], &[0, 0]);
		assert_eq!(&datagram[10..12], &[0, 0]);
	}
}
