//! The fixed-size portions of the DNS wire format: the 12-byte message header and the fixed
//! prefix of a resource record (after its owner name).
//!
//! Field meanings follow RFC 1035 section 4.1.1.

use bilge::prelude::*;
use utils::bytes::Cast;
use utils::endian::{u16be, u32be, BigEndian};

#[bitsize(4)]
#[derive(FromBits, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Opcode {
	Query = 0,
	IQuery = 1,
	Status = 2,
	#[fallback]
	Reserved,
}

/// The response code occupying the low 4 bits of the second flags byte.
#[bitsize(4)]
#[derive(FromBits, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rcode {
	NoError = 0,
	FormatError = 1,
	ServFail = 2,
	NxDomain = 3,
	NotImplemented = 4,
	Refused = 5,
	#[fallback]
	Reserved,
}

#[bitsize(16)]
#[derive(FromBits, Clone, Copy, DebugBits)]
pub struct Flags {
	pub rcode: Rcode,
	z: u3,
	pub ra: bool,
	pub rd: bool,
	pub tc: bool,
	pub aa: bool,
	pub opcode: Opcode,
	pub qr: bool,
}

impl Flags {
	/// The flags byte pair sent on every outgoing query: `RD=1`, everything else clear.
	pub fn query() -> Self {
		Flags::new(Rcode::NoError, u3::new(0), false, true, false, false, Opcode::Query, false)
	}
}

/// The 12-byte message header, present at the start of every datagram.
#[derive(Cast)]
#[repr(C)]
pub struct Header {
	pub id: u16be,
	pub flags: BigEndian<Flags>,
	pub qdcount: u16be,
	pub ancount: u16be,
	pub nscount: u16be,
	pub arcount: u16be,
}

pub const HEADER_SIZE: usize = core::mem::size_of::<Header>();

/// The fixed-size tail of a resource record, following its owner name: type, class, TTL, and the
/// RDATA length.
#[derive(Cast)]
#[repr(C)]
pub struct RrHeader {
	pub ty: u16be,
	pub class: u16be,
	pub ttl: u32be,
	pub rdlength: u16be,
}

pub const RR_HEADER_SIZE: usize = core::mem::size_of::<RrHeader>();

pub const CLASS_IN: u16 = 1;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_size_is_twelve_bytes() {
		assert_eq!(HEADER_SIZE, 12);
	}

	#[test]
	fn query_flags_set_rd_only() {
		let flags = Flags::query();
		assert!(flags.rd());
		assert!(!flags.qr());
		assert!(!flags.tc());
		assert!(!flags.aa());
		assert!(!flags.ra());
	}
}
