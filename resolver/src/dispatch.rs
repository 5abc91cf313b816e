//! Reply dispatch: matches an inbound datagram against the query it answers, classifies its
//! result, and materializes the records the caller asked for.
//!
//! Header validation, question matching, rcode classification, a first pass over the answer
//! section that both counts records of the wanted type and absorbs at most one CNAME (chained
//! CNAMEs already present in the same reply keep being followed within that same pass, rather
//! than costing a round trip each), truncation detection, and a NODATA/referral classification
//! scanned from the authority section when no direct answer exists. The materializing (second)
//! pass defers to [`crate::rr::parse`].

use std::time::{Duration, Instant};

use log::debug;

use crate::config::SortEntry;
use crate::query::slot::{ChildRole, Query};
use crate::query::state::State;
use crate::rr::parse::parse_rdata;
use crate::rr::types::{self, sort_by_sortlist, Type};
use crate::query::flags::QueryFlags;
use crate::status::Status;
use crate::wire::decode::{self, find_rr, parse_domain, MAX_TTL_SECS, Truncated};
use crate::wire::header::{Header, Rcode, HEADER_SIZE};
use utils::bytes::cast;

/// A hostname embedded in a cooked record that still needs its own `A`/`AAAA` child queries run
/// against it, and where the result should be stitched back in once they complete.
pub struct ChildRequest {
	pub role: ChildRole,
	pub name: String,
}

/// What happened when an inbound datagram was matched against one query. None of these variants
/// move `query.state` themselves; [`crate::query::manager::Manager::transition`] is the sole place
/// queue membership changes, so the caller drives that transition from the variant it gets back.
pub enum Outcome {
	/// The query is complete; `query.answer` has been filled in. The caller should transition it
	/// to `State::Done`.
	Answered,
	/// The reply was truncated (`TC=1`); the caller should promote the query to TCP and resend.
	NeedsTcp,
	/// A CNAME chain led away from any directly usable answer; `query.query_dgram` has already
	/// been rebuilt to chase the target. The caller should transition it back to `State::Udp` and
	/// resend.
	Restarted,
	/// A direct answer contained cooked records whose embedded hostnames still need resolving;
	/// `query.answer` holds the cooked records (with empty address lists). The caller should
	/// submit one child query per request, link it to `role`, and transition the parent to
	/// `State::Child`.
	AwaitingChildren(Vec<ChildRequest>),
	/// The datagram did not match this query (wrong id, wrong question, or not a response) and
	/// should be silently dropped; the query's own retry/timeout schedule is unaffected.
	Ignored,
}

/// Processes `dgram` as a candidate reply to `query`, which must currently be in `State::Udp`,
/// `State::TcpWait`, or `State::TcpSent`. `next_id` is a freshly generated id to use if the reply
/// triggers a CNAME restart.
pub fn process_reply<C>(query: &mut Query<C>, dgram: &[u8], next_id: u16, sortlist: &[SortEntry]) -> Outcome {
	if dgram.len() < HEADER_SIZE {
		return Outcome::Ignored;
	}

	let header: &Header = cast(&dgram[..HEADER_SIZE]);
	if header.id.get() != query.dns_id {
		return Outcome::Ignored;
	}

	let flags = header.flags.get();
	if !flags.qr() {
		return Outcome::Ignored;
	}

	if header.qdcount.get() != 1 {
		return Outcome::Ignored;
	}

	let question_start = HEADER_SIZE;
	let (owner_name, question_end) = match parse_domain(dgram, question_start, true) {
		Ok(Ok(v)) => v,
		Ok(Err(Truncated)) => return Outcome::Ignored,
		Err(_) => return Outcome::Ignored,
	};

	match decode::domain_matches(dgram, question_start, &query.query_dgram, question_start) {
		Ok(Ok(true)) => {}
		_ => return Outcome::Ignored,
	}

	if question_end + 4 > dgram.len() {
		return Outcome::Ignored;
	}
	let mut cbyte = question_end + 4;

	let qwire = match query.ty.wire_code() {
		Some(w) => w,
		None => return Outcome::Ignored,
	};

	match flags.rcode() {
		Rcode::NoError => {}
		Rcode::NxDomain => return finish(query, Status::NxDomain, Some(&owner_name), None, None, None, sortlist),
		Rcode::ServFail => return finish(query, Status::ServFail, Some(&owner_name), None, None, None, sortlist),
		Rcode::NotImplemented => return finish(query, Status::NotImplemented, Some(&owner_name), None, None, None, sortlist),
		Rcode::Refused => return finish(query, Status::Refused, Some(&owner_name), None, None, None, sortlist),
		Rcode::FormatError | Rcode::Reserved => return finish(query, Status::ServerFaulty, Some(&owner_name), None, None, None, sortlist),
	}

	let ancount = header.ancount.get() as usize;
	let nscount = header.nscount.get() as usize;
	let already_tcp = matches!(query.state, State::TcpSent);

	if ancount == 0 {
		if flags.tc() && !already_tcp {
			return Outcome::NeedsTcp;
		}
		return finish(query, classify_nodata(dgram, cbyte, nscount), Some(&owner_name), None, None, None, sortlist);
	}

	let cname_quote = query.flags.contains(QueryFlags::QUOTEOK_CNAME);
	let anshost_quote = query.flags.contains(QueryFlags::QUOTEOK_ANSHOST);

	let mut reference_start = question_start;
	let mut cname_target: Option<String> = None;
	let mut wanted = Vec::new();
	let mut min_ttl = MAX_TTL_SECS;

	for _ in 0..ancount {
		if cbyte >= dgram.len() {
			if flags.tc() && !already_tcp {
				return Outcome::NeedsTcp;
			}
			break;
		}

		let frame = match find_rr(dgram, &mut cbyte, Some((dgram, reference_start))) {
			Ok(Ok(f)) => f,
			Ok(Err(Truncated)) => {
				if flags.tc() && !already_tcp {
					return Outcome::NeedsTcp;
				}
				break;
			}
			Err(status) => return finish(query, status, Some(&owner_name), None, None, None, sortlist),
		};

		if frame.rclass != crate::wire::header::CLASS_IN {
			continue;
		}

		if !frame.owner_matched {
			continue;
		}

		if frame.rtype == qwire {
			min_ttl = min_ttl.min(frame.ttl);
			wanted.push(frame.rdata);
			continue;
		}

		if frame.rtype == types::TY_CNAME && cname_target.is_none() && query.ty != Type::Cname {
			let target = match parse_domain(dgram, frame.rdata.start, cname_quote) {
				Ok(Ok((name, _))) => name,
				Ok(Err(Truncated)) => {
					if flags.tc() && !already_tcp {
						return Outcome::NeedsTcp;
					}
					break;
				}
				Err(status) => return finish(query, status, Some(&owner_name), None, None, None, sortlist),
			};
			min_ttl = min_ttl.min(frame.ttl);
			reference_start = frame.rdata.start;
			cname_target = Some(target);
		}
	}

	// Checked unconditionally here, not only when the answer section ran out early: a reply can
	// echo every wanted RR in full and still carry TC=1 (the server had more to say in a later
	// section), and that must still be discarded for a CNAME restart or a TCP re-send rather than
	// materialized as a complete answer.
	if flags.tc() && !already_tcp {
		if cname_target.is_some() {
			return restart_cname(query, dgram, reference_start, qwire, next_id, &owner_name, sortlist);
		}
		return Outcome::NeedsTcp;
	}

	if !wanted.is_empty() {
		let mut records = Vec::new();
		let mut requests = Vec::new();

		for rdata in wanted {
			match parse_rdata(query.ty, dgram, rdata, anshost_quote) {
				Ok(Ok(parsed)) => {
					query.arena.charge_interim(parsed.record.interim_cost());
					if let Some(hostname) = parsed.needs_addr {
						requests.push(ChildRequest { role: ChildRole::HostAddr { index: records.len() }, name: hostname });
					}
					records.push(parsed.record);
				}
				Ok(Err(Truncated)) => {
					// The unconditional TC check above already ruled out a truncated reply; a
					// record that still fails to frame here is malformed on its own (e.g. a
					// wrong-length A/AAAA RDATA), not a whole-message framing failure, so just the
					// one record is dropped.
					debug!("skipping malformed {} record in reply", query.ty.mnemonic());
				}
				Err(status) => return finish(query, status, Some(&owner_name), None, None, None, sortlist),
			}
		}

		if requests.is_empty() {
			return finish(query, Status::Ok, Some(&owner_name), cname_target, Some(records), Some(min_ttl), sortlist);
		}

		if query.flags.contains(QueryFlags::OWNER) {
			query.arena.charge_interim(owner_name.len());
		}
		if let Some(name) = &cname_target {
			query.arena.charge_interim(name.len());
		}
		query.answer.status = Status::Ok;
		query.answer.owner = owner_flag(query, &owner_name);
		query.answer.cname = cname_target;
		query.answer.expires = Some(Instant::now() + Duration::from_secs(min_ttl as u64));
		query.answer.records = records;
		return Outcome::AwaitingChildren(requests);
	}

	if cname_target.is_some() {
		return restart_cname(query, dgram, reference_start, qwire, next_id, &owner_name, sortlist);
	}

	finish(query, Status::NoData, Some(&owner_name), None, None, None, sortlist)
}

/// Rebuilds `query`'s datagram to chase `cname_target` (already absorbed during the counting
/// pass) and reports [`Outcome::Restarted`], or fails the whole query if the pointer rewrite
/// itself can't be encoded.
fn restart_cname<C>(
	query: &mut Query<C>,
	dgram: &[u8],
	reference_start: usize,
	qwire: u16,
	next_id: u16,
	owner_name: &str,
	sortlist: &[SortEntry],
) -> Outcome {
	let datagram = match crate::wire::encode::encode_query_from_pointer(dgram, reference_start, qwire, next_id) {
		Ok(d) => d,
		Err(status) => return finish(query, status, Some(owner_name), None, None, None, sortlist),
	};
	query.cname_source = Some((dgram.to_vec(), reference_start));
	query.query_dgram = datagram;
	query.dns_id = next_id;
	query.sent_udp = 0;
	query.udp_retries = 0;
	query.next_udp_server = 0;
	query.failed_tcp = 0;
	query.use_vc = false;
	Outcome::Restarted
}

fn owner_flag<C>(query: &Query<C>, owner_name: &str) -> Option<String> {
	if query.flags.contains(QueryFlags::OWNER) {
		Some(owner_name.to_string())
	} else {
		None
	}
}

/// Finalizes `query` with a terminal status, optionally carrying an owner/cname/record set and the
/// TTL they expire at, and moves it to `State::Done`.
fn finish<C>(
	query: &mut Query<C>,
	status: Status,
	owner_name: Option<&str>,
	cname: Option<String>,
	records: Option<Vec<crate::rr::Record>>,
	ttl: Option<u32>,
	sortlist: &[SortEntry],
) -> Outcome {
	let mut records = records.unwrap_or_default();
	sort_by_sortlist(&mut records, sortlist);
	if let Some(name) = owner_name.filter(|_| query.flags.contains(QueryFlags::OWNER)) {
		query.arena.charge_interim(name.len());
	}
	if let Some(name) = &cname {
		query.arena.charge_interim(name.len());
	}
	query.answer.status = status;
	query.answer.owner = owner_name.filter(|_| query.flags.contains(QueryFlags::OWNER)).map(str::to_string);
	query.answer.cname = cname;
	query.answer.records = records;
	query.answer.expires = ttl.map(|secs| Instant::now() + Duration::from_secs(secs as u64));
	Outcome::Answered
}

/// Classifies an empty answer section by scanning the authority section for an `SOA` (NODATA, the
/// name exists but has none of the requested type) versus anything else (treated conservatively as
/// NODATA too, since this resolver is a stub that expects its configured servers to be fully
/// recursive and never itself follows an NS referral).
fn classify_nodata(dgram: &[u8], mut cbyte: usize, nscount: usize) -> Status {
	for _ in 0..nscount {
		if cbyte >= dgram.len() {
			break;
		}
		match find_rr(dgram, &mut cbyte, None) {
			Ok(Ok(frame)) => {
				if frame.rtype == types::TY_SOA {
					return Status::NoData;
				}
			}
			_ => break,
		}
	}
	Status::NoData
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::query::arena::Arena;
	use crate::rr::types::Record;
	use crate::wire::encode::encode_query;

	fn blank_query(ty: Type, flags: QueryFlags, owner: &str, id: u16) -> Query<()> {
		let query_dgram = encode_query(owner, ty.wire_code().unwrap(), flags, id).unwrap();
		Query {
			state: State::Udp,
			ty,
			flags,
			query_dgram,
			dns_id: id,
			deadline: None,
			sent_udp: 0,
			failed_tcp: 0,
			udp_retries: 0,
			next_udp_server: 0,
			use_vc: false,
			cname_source: None,
			search: None,
			parent: None,
			child_role: None,
			children: Vec::new(),
			arena: Arena::new(),
			answer: crate::Answer::pending(ty),
			ctx: (),
		}
	}

	fn push_name(buf: &mut Vec<u8>, name: &str) {
		for label in name.split('.') {
			buf.push(label.len() as u8);
			buf.extend_from_slice(label.as_bytes());
		}
		buf.push(0);
	}

	fn reply_header(id: u16, rcode_bits: u8, ancount: u16, nscount: u16) -> Vec<u8> {
		let mut h = Vec::new();
		h.extend_from_slice(&id.to_be_bytes());
		h.push(0x81);
		h.push(0x80 | rcode_bits);
		h.extend_from_slice(&1u16.to_be_bytes());
		h.extend_from_slice(&ancount.to_be_bytes());
		h.extend_from_slice(&nscount.to_be_bytes());
		h.extend_from_slice(&0u16.to_be_bytes());
		h
	}

	#[test]
	fn nxdomain_rcode_finishes_without_touching_answer_section() {
		let mut query = blank_query(Type::A, QueryFlags::empty(), "example.com", 0x1234);

		let mut dgram = reply_header(0x1234, 3, 0, 0);
		push_name(&mut dgram, "example.com");
		dgram.extend_from_slice(&1u16.to_be_bytes());
		dgram.extend_from_slice(&1u16.to_be_bytes());

		match process_reply(&mut query, &dgram, 0xbeef, &[]) {
			Outcome::Answered => {}
			_ => panic!("expected Answered"),
		}
		assert_eq!(query.answer.status, Status::NxDomain);
		assert!(query.answer.records.is_empty());
	}

	#[test]
	fn direct_answer_is_materialized() {
		let mut query = blank_query(Type::A, QueryFlags::empty(), "example.com", 7);

		let mut dgram = reply_header(7, 0, 1, 0);
		push_name(&mut dgram, "example.com");
		dgram.extend_from_slice(&1u16.to_be_bytes());
		dgram.extend_from_slice(&1u16.to_be_bytes());

		push_name(&mut dgram, "example.com");
		dgram.extend_from_slice(&1u16.to_be_bytes());
		dgram.extend_from_slice(&1u16.to_be_bytes());
		dgram.extend_from_slice(&300u32.to_be_bytes());
		dgram.extend_from_slice(&4u16.to_be_bytes());
		dgram.extend_from_slice(&[93, 184, 216, 34]);

		match process_reply(&mut query, &dgram, 1, &[]) {
			Outcome::Answered => {}
			_ => panic!("expected Answered"),
		}
		assert_eq!(query.answer.status, Status::Ok);
		assert_eq!(query.answer.records.len(), 1);
		match &query.answer.records[0] {
			Record::A(addr) => assert_eq!(*addr, std::net::Ipv4Addr::new(93, 184, 216, 34)),
			other => panic!("unexpected record {other:?}"),
		}
	}

	#[test]
	fn cname_only_answer_restarts_the_query() {
		let mut query = blank_query(Type::A, QueryFlags::empty(), "alias.example.com", 42);

		let mut dgram = reply_header(42, 0, 1, 0);
		push_name(&mut dgram, "alias.example.com");
		dgram.extend_from_slice(&1u16.to_be_bytes());
		dgram.extend_from_slice(&1u16.to_be_bytes());

		push_name(&mut dgram, "alias.example.com");
		dgram.extend_from_slice(&5u16.to_be_bytes());
		dgram.extend_from_slice(&1u16.to_be_bytes());
		dgram.extend_from_slice(&300u32.to_be_bytes());
		let target_start = dgram.len() + 2;
		let mut target = Vec::new();
		push_name(&mut target, "canonical.example.com");
		dgram.extend_from_slice(&(target.len() as u16).to_be_bytes());
		dgram.extend_from_slice(&target);

		match process_reply(&mut query, &dgram, 99, &[]) {
			Outcome::Restarted => {}
			_ => panic!("expected Restarted"),
		}
		assert_eq!(query.dns_id, 99);
		assert_eq!(query.udp_retries, 0);
		assert_eq!(&query.query_dgram[0..2], &99u16.to_be_bytes());
		let ptr = u16::from_be_bytes([query.query_dgram[12], query.query_dgram[13]]);
		assert_eq!(ptr & 0xc000, 0xc000);
		assert_eq!((ptr & 0x3fff) as usize, target_start);
	}
}
