//! The completed-query result handed back by [`crate::Resolver::check`]/[`crate::Resolver::wait`].
//!
//! A typed, owned `Vec<Record>` stands in for a byte region sliced by a stride the caller would
//! otherwise have to track itself.

use std::time::Instant;

use crate::rr::{Record, Type};
use crate::status::Status;

/// The result of one completed query.
#[derive(Debug, Clone)]
pub struct Answer {
	pub status: Status,
	/// The matched owner name, present when the query's [`crate::query::flags::QueryFlags::OWNER`]
	/// flag was set.
	pub owner: Option<String>,
	/// The canonical name, if a CNAME was followed to reach this answer.
	pub cname: Option<String>,
	pub ty: Type,
	/// When this answer's records stop being valid to cache, derived from the minimum TTL
	/// consulted across every record (including any child queries), capped at 7 days.
	pub expires: Option<Instant>,
	pub records: Vec<Record>,
}

impl Answer {
	/// A freshly pre-allocated failure answer with no records, for the slot `submit()` must reserve
	/// up front so that out-of-memory during processing can still be reported.
	pub fn pending(ty: Type) -> Self {
		Self { status: Status::NoMemory, owner: None, cname: None, ty, expires: None, records: Vec::new() }
	}

	pub fn failed(ty: Type, status: Status) -> Self {
		Self { status, owner: None, cname: None, ty, expires: None, records: Vec::new() }
	}
}
