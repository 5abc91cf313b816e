//! Per-query behaviour flags, passed to `submit` and consulted throughout encoding, search-list
//! walking, and decoding.

/// A bitset of the behaviour switches a single query carries for its whole lifetime (surviving
/// CNAME self-resets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFlags(u32);

impl QueryFlags {
	/// Walk the configured search list for a short owner.
	pub const SEARCH: QueryFlags = QueryFlags(1 << 0);
	/// Use TCP from the start rather than attempting UDP first.
	pub const USEVC: QueryFlags = QueryFlags(1 << 1);
	/// The caller wants the matched owner name included in the answer.
	pub const OWNER: QueryFlags = QueryFlags(1 << 2);
	/// Permit `\DDD`/`\c` escapes and relaxed character rules in the submitted owner.
	pub const QUOTEOK_QUERY: QueryFlags = QueryFlags(1 << 3);
	/// Permit relaxed quoting when decoding a CNAME target.
	pub const QUOTEOK_CNAME: QueryFlags = QueryFlags(1 << 4);
	/// Permit relaxed quoting when decoding a hostname embedded in an answer (e.g. NS, MX targets).
	pub const QUOTEOK_ANSHOST: QueryFlags = QueryFlags(1 << 5);

	pub const fn empty() -> Self {
		QueryFlags(0)
	}

	pub const fn contains(self, flag: QueryFlags) -> bool {
		self.0 & flag.0 == flag.0
	}

	pub const fn union(self, other: QueryFlags) -> Self {
		QueryFlags(self.0 | other.0)
	}
}

impl core::ops::BitOr for QueryFlags {
	type Output = QueryFlags;

	fn bitor(self, rhs: QueryFlags) -> QueryFlags {
		self.union(rhs)
	}
}
