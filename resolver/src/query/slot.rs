//! The per-query record itself.
//!
//! Queries live in a generation-checked slab (`crate::query::manager::Manager`) and are
//! addressed by [`QueryHandle`], a non-owning index+generation pair, rather than an intrusive
//! doubly-linked list of raw pointers. Parent->child ownership is a `Vec<QueryHandle>` on the
//! parent; child->parent is a plain non-owning `QueryHandle` back-link, avoiding a
//! reference-counted cycle between them.

use std::time::Instant;

use crate::query::arena::Arena;
use crate::query::flags::QueryFlags;
use crate::query::state::State;
use crate::rr::Type;
use crate::Answer;

/// A non-owning reference to a query living in a [`crate::query::manager::Manager`]'s slab.
/// Generation-checked so a handle to a cancelled/completed query can never alias a later query
/// that reused its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryHandle {
	pub(crate) index: u32,
	pub(crate) generation: u32,
}

/// Which part of a parent's in-progress answer a completed `Addr` child query should patch. A
/// typed callback slot, rather than the parent reaching
/// into the child's type-specific knowledge (or vice versa), is what decouples "a hostname needs
/// resolving" from "what record shape the result gets folded into."
#[derive(Debug, Clone, Copy)]
pub enum ChildRole {
	/// The parent itself is a top-level `Addr` pseudo-query: the child's resolved addresses
	/// become `Record::Addr` entries appended directly to the parent's answer.
	AddrUnion,
	/// The parent's `answer.records[index]` holds a cooked record whose nested `HostAddr` should
	/// receive the child's resolved addresses (NS/PTR/MX-cooked, or SOA-cooked's `mname`).
	HostAddr { index: usize },
}

/// The search-list walker's three-valued "have we tried the absolute name yet" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsoluteTry {
	NotYet,
	Tried,
	MustTryNext,
}

/// Search-list expansion state, carried for the lifetime of a query that asked for it.
#[derive(Debug, Clone)]
pub struct SearchWalk {
	pub original: String,
	pub next_suffix: usize,
	pub absolute: AbsoluteTry,
}

/// One in-flight (or completed, briefly) query.
pub struct Query<C> {
	pub state: State,

	pub ty: Type,
	pub flags: QueryFlags,
	/// The assembled query datagram currently in flight; rebuilt in place by CNAME chasing.
	pub query_dgram: Vec<u8>,
	/// The DNS wire id in `query_dgram`'s header, used to match replies.
	pub dns_id: u16,

	pub deadline: Option<Instant>,
	/// Per-server bitmap (bit `i` set ⇒ server `i`) of UDP attempts already sent.
	pub sent_udp: u32,
	/// Per-server bitmap of servers whose TCP attempt has already failed.
	pub failed_tcp: u32,
	pub udp_retries: u32,
	pub next_udp_server: usize,
	pub use_vc: bool,

	/// The datagram a CNAME was absorbed from, and the RDATA offset of its target, kept so a
	/// restart can rebuild the query pointing at the compressed name in place.
	pub cname_source: Option<(Vec<u8>, usize)>,

	pub search: Option<SearchWalk>,

	pub parent: Option<QueryHandle>,
	pub child_role: Option<ChildRole>,
	pub children: Vec<QueryHandle>,

	pub arena: Arena,
	pub answer: Answer,
	pub ctx: C,
}

impl<C> Query<C> {
	pub fn is_child(&self) -> bool {
		self.parent.is_some()
	}
}
