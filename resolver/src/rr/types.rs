//! Wire type codes, the public [`Type`] enum a query is submitted with, and the [`Record`] shapes
//! a completed [`crate::Answer`] carries.
//!
//! Raw types give you the wire bytes reinterpreted minimally; cooked types additionally chase
//! any embedded hostname to its addresses via child queries.

use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::SortEntry;

/// Wire type code for `A`.
pub const TY_A: u16 = 1;
/// Wire type code for `NS`.
pub const TY_NS: u16 = 2;
/// Wire type code for `CNAME`.
pub const TY_CNAME: u16 = 5;
/// Wire type code for `SOA`.
pub const TY_SOA: u16 = 6;
/// Wire type code for `PTR`.
pub const TY_PTR: u16 = 12;
/// Wire type code for `HINFO`.
pub const TY_HINFO: u16 = 13;
/// Wire type code for `MX`.
pub const TY_MX: u16 = 15;
/// Wire type code for `TXT`.
pub const TY_TXT: u16 = 16;
/// Wire type code for `RP`.
pub const TY_RP: u16 = 17;
/// Wire type code for `AAAA`.
pub const TY_AAAA: u16 = 28;

/// The record type a query is submitted with. Raw forms decode the RDATA directly; cooked forms
/// additionally resolve any embedded hostname to its addresses via child queries.
/// `Addr` is the address pseudo-type: it has no wire representation of its own and is resolved as
/// an immediate `A` + `AAAA` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
	A,
	Aaaa,
	Cname,
	Txt,
	Hinfo,
	Ns,
	NsRaw,
	Ptr,
	PtrRaw,
	Mx,
	MxRaw,
	Soa,
	SoaRaw,
	Rp,
	RpRaw,
	Addr,
}

impl Type {
	/// The wire RR type this query type is sent/matched as. `None` only for [`Type::Addr`], which
	/// has no wire representation and is resolved as two immediate child queries instead.
	pub const fn wire_code(self) -> Option<u16> {
		use Type::*;
		match self {
			A => Some(TY_A),
			Aaaa => Some(TY_AAAA),
			Cname => Some(TY_CNAME),
			Txt => Some(TY_TXT),
			Hinfo => Some(TY_HINFO),
			Ns | NsRaw => Some(TY_NS),
			Ptr | PtrRaw => Some(TY_PTR),
			Mx | MxRaw => Some(TY_MX),
			Soa | SoaRaw => Some(TY_SOA),
			Rp | RpRaw => Some(TY_RP),
			Addr => None,
		}
	}

	/// Whether this type's parser chases an embedded hostname to its addresses via child queries.
	/// `Rp`'s two domain fields (a mailbox and a `TXT` reference) are never addresses, so despite
	/// appearing in the cooked group's name, `Type::Rp` and `Type::RpRaw` decode identically; see
	/// `rr::parse::parse_rdata`'s `Rp | RpRaw` arm and DESIGN.md.
	pub const fn is_cooked(self) -> bool {
		use Type::*;
		matches!(self, Ns | Ptr | Mx | Soa)
	}

	/// The mnemonic used in diagnostics, matching the RFC 1035 record name.
	pub const fn mnemonic(self) -> &'static str {
		use Type::*;
		match self {
			A => "A",
			Aaaa => "AAAA",
			Cname => "CNAME",
			Txt => "TXT",
			Hinfo => "HINFO",
			Ns | NsRaw => "NS",
			Ptr | PtrRaw => "PTR",
			Mx | MxRaw => "MX",
			Soa | SoaRaw => "SOA",
			Rp | RpRaw => "RP",
			Addr => "ADDR",
		}
	}
}

/// A hostname plus the addresses a cooked parser resolved it to, via the `Addr` child-query
/// mechanism. `addrs` is empty if the child queries failed or found nothing; a cooked
/// parser never fails its own record on account of a failed address lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostAddr {
	pub name: String,
	pub addrs: Vec<IpAddr>,
}

/// The fixed fields of an `SOA` record (RFC 1035 section 3.3.13).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoaData {
	pub mname: String,
	pub rname: String,
	pub serial: u32,
	pub refresh: u32,
	pub retry: u32,
	pub expire: u32,
	pub minimum: u32,
}

/// One materialized resource record, shaped after the query type that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
	A(Ipv4Addr),
	Aaaa(Ipv6Addr),
	Addr(IpAddr),
	Cname(String),
	Ns(String),
	NsCooked(HostAddr),
	Ptr(String),
	PtrCooked(HostAddr),
	Mx { priority: u16, name: String },
	MxCooked { priority: u16, host: HostAddr },
	Txt(Vec<Vec<u8>>),
	Hinfo { cpu: String, os: String },
	Soa(SoaData),
	SoaCooked { soa: SoaData, mname_host: HostAddr },
	Rp { mbox: String, txtdname: String },
}

impl Record {
	/// The nested [`HostAddr`] a cooked record carries, if any, so a completed child address
	/// query can patch its resolved addresses in place.
	pub fn host_addr_mut(&mut self) -> Option<&mut HostAddr> {
		match self {
			Record::NsCooked(h) | Record::PtrCooked(h) => Some(h),
			Record::MxCooked { host, .. } => Some(host),
			Record::SoaCooked { mname_host, .. } => Some(mname_host),
			_ => None,
		}
	}

	/// The address this record carries, for sort-list reordering; only address-bearing
	/// raw records (`A`/`Aaaa`/`Addr`) have one; cooked records carry their addresses on a nested
	/// [`HostAddr`] and are not themselves reordered.
	fn sort_address(&self) -> Option<IpAddr> {
		match self {
			Record::A(v4) => Some(IpAddr::V4(*v4)),
			Record::Aaaa(v6) => Some(IpAddr::V6(*v6)),
			Record::Addr(addr) => Some(*addr),
			_ => None,
		}
	}

	/// The interim-allocation cost of this record's heap-owned contents (domain-name strings, TXT
	/// segments, embedded address lists) — what a real bump allocator would have charged per
	/// allocation call while materializing it. Fixed-size raw address records carry no heap data
	/// of their own and charge nothing.
	pub fn interim_cost(&self) -> usize {
		match self {
			Record::A(_) | Record::Aaaa(_) | Record::Addr(_) => 0,
			Record::Cname(name) | Record::Ns(name) | Record::Ptr(name) => name.len(),
			Record::NsCooked(host) | Record::PtrCooked(host) => host_addr_cost(host),
			Record::Mx { name, .. } => name.len(),
			Record::MxCooked { host, .. } => host_addr_cost(host),
			Record::Txt(segments) => segments.iter().map(Vec::len).sum(),
			Record::Hinfo { cpu, os } => cpu.len() + os.len(),
			Record::Soa(soa) => soa.mname.len() + soa.rname.len(),
			Record::SoaCooked { soa, mname_host } => soa.mname.len() + soa.rname.len() + host_addr_cost(mname_host),
			Record::Rp { mbox, txtdname } => mbox.len() + txtdname.len(),
		}
	}
}

/// The interim cost of a [`HostAddr`]'s own heap data: its name plus one pointer-sized charge per
/// resolved address (the addresses themselves are stack data; what a real allocator would charge
/// for is the `Vec`'s storage).
fn host_addr_cost(host: &HostAddr) -> usize {
	host.name.len() + host.addrs.len() * core::mem::size_of::<IpAddr>()
}

/// The sort-list rank of `addr`: the index of the first matching entry, or `sortlist.len()` (last,
/// i.e. least preferred) if nothing matches.
fn sort_rank(addr: IpAddr, sortlist: &[SortEntry]) -> usize {
	for (i, entry) in sortlist.iter().enumerate() {
		if crate::addr::addr_match(to_addr(addr), crate::addr::Addr::V4(entry.base), entry.mask) {
			return i;
		}
	}
	sortlist.len()
}

fn to_addr(addr: IpAddr) -> crate::addr::Addr {
	match addr {
		IpAddr::V4(v4) => crate::addr::Addr::V4(v4),
		IpAddr::V6(v6) => crate::addr::Addr::V6(v6),
	}
}

/// Stable insertion sort of `records` by sort-list rank, strictly "after" comparison with ties
/// preserved. A no-op when `sortlist` is empty or fewer than 2 records carry addresses.
pub fn sort_by_sortlist(records: &mut [Record], sortlist: &[SortEntry]) {
	if sortlist.is_empty() || records.len() < 2 {
		return;
	}

	for i in 1..records.len() {
		let mut j = i;
		while j > 0 {
			let rank_j = records[j].sort_address().map(|a| sort_rank(a, sortlist));
			let rank_prev = records[j - 1].sort_address().map(|a| sort_rank(a, sortlist));

			match (rank_prev, rank_j) {
				(Some(p), Some(c)) if c < p => records.swap(j - 1, j),
				_ => break,
			}

			j -= 1;
		}
	}
}
