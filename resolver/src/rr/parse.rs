//! Per-RR-type RDATA parsing; field layouts follow RFC 1035 §3.3 and RFC 1183 (RP).
//!
//! Cooked types (NS, PTR, MX, SOA) are parsed here into the same shape as their raw counterpart
//! plus the hostname that needs a child address lookup; [`crate::dispatch`] is what actually
//! submits and stitches in those children, since that needs the query manager, not just the
//! datagram.

use core::net::{Ipv4Addr, Ipv6Addr};
use core::ops::Range;

use crate::rr::types::{HostAddr, Record, SoaData, Type};
use crate::status::Status;
use crate::wire::decode::{self, Truncated};

/// A parsed record, plus the hostname (if any) that still needs an `Addr` child query run against
/// it before the record is complete.
pub struct Parsed {
	pub record: Record,
	pub needs_addr: Option<String>,
}

impl Parsed {
	fn plain(record: Record) -> Self {
		Self { record, needs_addr: None }
	}
}

/// Parses the RDATA of one resource record of wire type `rtype`, located at `rdata` in `dgram`,
/// into the [`Record`] shape appropriate for query type `ty`. `quote_ok` controls whether
/// characters outside `[A-Za-z0-9-.]` in any embedded domain name are escaped as `\DDD` or passed
/// through unescaped.
///
/// A name that runs past the end of `dgram` is reported as `Ok(Err(Truncated))`; this is
/// recoverable at the caller (the whole reply is truncated, not malformed).
pub fn parse_rdata(
	ty: Type,
	dgram: &[u8],
	rdata: Range<usize>,
	quote_ok: bool,
) -> Result<Result<Parsed, Truncated>, Status> {
	match ty {
		Type::A => match parse_v4(dgram, rdata) {
			Ok(addr) => Ok(Ok(Parsed::plain(Record::A(addr)))),
			Err(Truncated) => Ok(Err(Truncated)),
		},
		Type::Aaaa => match parse_v6(dgram, rdata) {
			Ok(addr) => Ok(Ok(Parsed::plain(Record::Aaaa(addr)))),
			Err(Truncated) => Ok(Err(Truncated)),
		},
		Type::Cname => match decode::parse_domain(dgram, rdata.start, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((name, _)) => Ok(Ok(Parsed::plain(Record::Cname(name)))),
		},
		Type::Txt => Ok(Ok(Parsed::plain(Record::Txt(parse_txt(dgram, rdata))))),
		Type::Hinfo => match parse_hinfo(dgram, rdata)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((cpu, os)) => Ok(Ok(Parsed::plain(Record::Hinfo { cpu, os }))),
		},
		Type::NsRaw => match decode::parse_domain(dgram, rdata.start, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((name, _)) => Ok(Ok(Parsed::plain(Record::Ns(name)))),
		},
		Type::Ns => match decode::parse_domain(dgram, rdata.start, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((name, _)) => Ok(Ok(Parsed {
				record: Record::NsCooked(HostAddr { name: name.clone(), addrs: Vec::new() }),
				needs_addr: Some(name),
			})),
		},
		Type::PtrRaw => match decode::parse_domain(dgram, rdata.start, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((name, _)) => Ok(Ok(Parsed::plain(Record::Ptr(name)))),
		},
		Type::Ptr => match decode::parse_domain(dgram, rdata.start, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((name, _)) => Ok(Ok(Parsed {
				record: Record::PtrCooked(HostAddr { name: name.clone(), addrs: Vec::new() }),
				needs_addr: Some(name),
			})),
		},
		Type::MxRaw => match parse_mx(dgram, rdata, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((priority, name)) => Ok(Ok(Parsed::plain(Record::Mx { priority, name }))),
		},
		Type::Mx => match parse_mx(dgram, rdata, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((priority, name)) => Ok(Ok(Parsed {
				record: Record::MxCooked { priority, host: HostAddr { name: name.clone(), addrs: Vec::new() } },
				needs_addr: Some(name),
			})),
		},
		Type::SoaRaw => match parse_soa(dgram, rdata, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok(soa) => Ok(Ok(Parsed::plain(Record::Soa(soa)))),
		},
		Type::Soa => match parse_soa(dgram, rdata, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok(soa) => {
				let mname = soa.mname.clone();
				Ok(Ok(Parsed {
					record: Record::SoaCooked { soa, mname_host: HostAddr { name: mname.clone(), addrs: Vec::new() } },
					needs_addr: Some(mname),
				}))
			}
		},
		Type::Rp | Type::RpRaw => match parse_rp(dgram, rdata, quote_ok)? {
			Err(Truncated) => Ok(Err(Truncated)),
			Ok((mbox, txtdname)) => Ok(Ok(Parsed::plain(Record::Rp { mbox, txtdname }))),
		},
		Type::Addr => unreachable!("Addr has no wire RDATA form; resolved via child A/AAAA queries"),
	}
}

/// A well-formed `A` RDATA is always exactly 4 bytes; anything else is a malformed single record,
/// not a framing failure, so the mismatch is reported via the same skippable [`Truncated`] sentinel
/// other per-record parse issues use rather than a hard [`Status`] error.
fn parse_v4(dgram: &[u8], rdata: Range<usize>) -> Result<Ipv4Addr, Truncated> {
	let bytes: [u8; 4] = dgram.get(rdata.clone()).and_then(|s| s.try_into().ok()).ok_or(Truncated)?;
	Ok(Ipv4Addr::from(bytes))
}

/// See [`parse_v4`]: a well-formed `AAAA` RDATA is always exactly 16 bytes.
fn parse_v6(dgram: &[u8], rdata: Range<usize>) -> Result<Ipv6Addr, Truncated> {
	let bytes: [u8; 16] = dgram.get(rdata.clone()).and_then(|s| s.try_into().ok()).ok_or(Truncated)?;
	Ok(Ipv6Addr::from(bytes))
}

/// `TXT` RDATA is one or more length-prefixed character-strings; each is kept as its raw bytes
/// (not every TXT segment is meant to be UTF-8 text).
fn parse_txt(dgram: &[u8], rdata: Range<usize>) -> Vec<Vec<u8>> {
	let mut segments = Vec::new();
	let mut cursor = rdata.start;

	while cursor < rdata.end {
		let len = dgram[cursor] as usize;
		cursor += 1;
		let end = (cursor + len).min(rdata.end);
		segments.push(dgram[cursor..end].to_vec());
		cursor = end;
	}

	segments
}

fn parse_hinfo(dgram: &[u8], rdata: Range<usize>) -> Result<Result<(String, String), Truncated>, Status> {
	let mut cursor = rdata.start;
	let (cpu, next) = match read_charstring(dgram, cursor, rdata.end) {
		Some(v) => v,
		None => return Ok(Err(Truncated)),
	};
	cursor = next;
	let (os, _) = match read_charstring(dgram, cursor, rdata.end) {
		Some(v) => v,
		None => return Ok(Err(Truncated)),
	};
	Ok(Ok((cpu, os)))
}

fn read_charstring(dgram: &[u8], start: usize, limit: usize) -> Option<(String, usize)> {
	if start >= limit || start >= dgram.len() {
		return None;
	}
	let len = dgram[start] as usize;
	let end = start + 1 + len;
	if end > limit || end > dgram.len() {
		return None;
	}
	Some((String::from_utf8_lossy(&dgram[start + 1..end]).into_owned(), end))
}

fn parse_mx(
	dgram: &[u8],
	rdata: Range<usize>,
	quote_ok: bool,
) -> Result<Result<(u16, String), Truncated>, Status> {
	if rdata.end - rdata.start < 2 {
		return Ok(Err(Truncated));
	}
	let priority = u16::from_be_bytes([dgram[rdata.start], dgram[rdata.start + 1]]);
	match decode::parse_domain(dgram, rdata.start + 2, quote_ok)? {
		Err(Truncated) => Ok(Err(Truncated)),
		Ok((name, _)) => Ok(Ok((priority, name))),
	}
}

fn parse_soa(dgram: &[u8], rdata: Range<usize>, quote_ok: bool) -> Result<Result<SoaData, Truncated>, Status> {
	let (mname, next) = match decode::parse_domain(dgram, rdata.start, quote_ok)? {
		Err(Truncated) => return Ok(Err(Truncated)),
		Ok(v) => v,
	};
	let (rname, next) = match decode::parse_domain(dgram, next, quote_ok)? {
		Err(Truncated) => return Ok(Err(Truncated)),
		Ok(v) => v,
	};

	if next + 20 > dgram.len() {
		return Ok(Err(Truncated));
	}

	let read_u32 = |off: usize| u32::from_be_bytes(dgram[off..off + 4].try_into().unwrap());

	Ok(Ok(SoaData {
		mname,
		rname,
		serial: read_u32(next),
		refresh: read_u32(next + 4),
		retry: read_u32(next + 8),
		expire: read_u32(next + 12),
		minimum: read_u32(next + 16),
	}))
}

fn parse_rp(dgram: &[u8], rdata: Range<usize>, quote_ok: bool) -> Result<Result<(String, String), Truncated>, Status> {
	let (mbox, next) = match decode::parse_domain(dgram, rdata.start, quote_ok)? {
		Err(Truncated) => return Ok(Err(Truncated)),
		Ok(v) => v,
	};
	let (txtdname, _) = match decode::parse_domain(dgram, next, quote_ok)? {
		Err(Truncated) => return Ok(Err(Truncated)),
		Ok(v) => v,
	};
	Ok(Ok((mbox, txtdname)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_a_record() {
		let dgram = [192, 0, 2, 1];
		let Parsed { record, needs_addr } = parse_rdata(Type::A, &dgram, 0..4, false).unwrap().ok().unwrap();
		assert_eq!(record, Record::A(Ipv4Addr::new(192, 0, 2, 1)));
		assert!(needs_addr.is_none());
	}

	#[test]
	fn malformed_a_rdata_is_skippable_not_a_hard_error() {
		let dgram = [192, 0, 2]; // one byte short of a valid A record
		let result = parse_rdata(Type::A, &dgram, 0..3, false).unwrap();
		assert!(result.is_err(), "wrong-length A RDATA should signal a skippable record, not materialize");
	}

	#[test]
	fn parses_mx_and_flags_cooked_for_addr_chase() {
		let mut dgram = Vec::new();
		dgram.extend(10u16.to_be_bytes());
		dgram.push(3);
		dgram.extend(b"mx1");
		dgram.push(7);
		dgram.extend(b"example");
		dgram.push(0);

		let Parsed { record, needs_addr } = parse_rdata(Type::Mx, &dgram, 0..dgram.len(), false).unwrap().ok().unwrap();
		assert_eq!(needs_addr.as_deref(), Some("mx1.example."));
		match record {
			Record::MxCooked { priority, host } => {
				assert_eq!(priority, 10);
				assert_eq!(host.name, "mx1.example.");
			}
			_ => panic!("expected MxCooked"),
		}
	}

	#[test]
	fn parses_txt_multi_segment() {
		let mut dgram = Vec::new();
		dgram.push(5);
		dgram.extend(b"hello");
		dgram.push(5);
		dgram.extend(b"world");

		match parse_rdata(Type::Txt, &dgram, 0..dgram.len(), false).unwrap().ok().unwrap().record {
			Record::Txt(segments) => assert_eq!(segments, vec![b"hello".to_vec(), b"world".to_vec()]),
			_ => panic!("expected Txt"),
		}
	}
}
