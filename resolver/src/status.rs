//! Stable, numbered outcome codes for a completed query's [`Answer`](crate::Answer).
//!
//! Every failure mode a query can end in — local, remote, temporary, misconfiguration, or bad
//! input — has a `Status` counterpart here.
//! Unlike the plumbing-level `utils::error::Result<T, ()>` used internally for socket and
//! allocation failures, `Status` is public, stable, and carries both a short and a long textual
//! form.

use core::fmt;

/// The six severity bands a [`Status`] falls into, in ascending severity order:
/// `{ok, local-fail, remote-fail, temporary-fail, misconfig, misquery}`.
///
/// `Band::TemporaryFail` and below are worth retrying (the condition may clear on its own);
/// `Band::Misconfig` and above will not change no matter how many times the same query is
/// resubmitted. [`Status::MAX_TEMPORARY`] is the numeric boundary between the two halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Band {
	Ok,
	LocalFail,
	RemoteFail,
	TemporaryFail,
	Misconfig,
	Misquery,
}

macro_rules! statuses {
	( $( $variant:ident = $code:literal, $band:ident, $short:literal, $long:literal; )* ) => {
		/// The outcome of a completed query.
		#[derive(Debug, Clone, Copy, PartialEq, Eq)]
		#[non_exhaustive]
		pub enum Status {
			$( $variant, )*
		}

		impl Status {
			/// The stable numeric code for this status.
			pub const fn code(self) -> u16 {
				match self {
					$( Status::$variant => $code, )*
				}
			}

			/// The severity band this status falls into.
			pub const fn band(self) -> Band {
				match self {
					$( Status::$variant => Band::$band, )*
				}
			}

			/// A short, abbreviated form, e.g. `"nxdomain"`.
			pub const fn short(self) -> &'static str {
				match self {
					$( Status::$variant => $short, )*
				}
			}

			/// A long, human-readable sentence.
			pub const fn long(self) -> &'static str {
				match self {
					$( Status::$variant => $long, )*
				}
			}
		}
	};
}

statuses! {
	Ok = 0, Ok, "ok", "Query completed successfully";

	NoMemory = 100, LocalFail, "nomemory", "Out of memory while processing the answer";
	NoLocalMem = 101, LocalFail, "nolocalmem", "Out of memory while assembling the query";

	ServFail = 200, RemoteFail, "servfail", "Server failed to process the query (SERVFAIL)";
	NotImplemented = 201, RemoteFail, "notimplemented", "Server does not implement the requested query (NOTIMP)";
	Refused = 202, RemoteFail, "refused", "Server refused to answer the query (REFUSED)";
	ServerFaulty = 203, RemoteFail, "serverfaulty", "Server sent an invalid or self-contradictory response";
	NoRecurse = 204, RemoteFail, "norecurse", "Server does not support recursive queries";
	ReasonUnknown = 205, RemoteFail, "reasonunknown", "Server gave an unrecognised response code";
	NxDomain = 206, RemoteFail, "nxdomain", "The queried name does not exist";
	NoData = 207, RemoteFail, "nodata", "The queried name exists but has no records of the requested type";

	NotResponding = 300, TemporaryFail, "notresponding", "No server responded before the retry budget was exhausted";
	AllServersTcpFailed = 301, TemporaryFail, "alltrytcp", "The TCP connection failed on every configured server";

	NoServers = 400, Misconfig, "noservers", "No name servers are configured";

	InvalidDomain = 500, Misquery, "invaliddomain", "The owner name is not syntactically valid";
	QueryDomainTooLong = 501, Misquery, "querydomaintoolong", "The owner name is longer than 255 octets";
	UnknownRrType = 502, Misquery, "unknownrrtype", "The requested record type is not supported";
}

impl Status {
	/// The numeric boundary between bands worth retrying (`< MAX_TEMPORARY`) and bands that are
	/// definitely wrong no matter how many times the query is resubmitted (`>= MAX_TEMPORARY`).
	pub const MAX_TEMPORARY: u16 = 400;

	/// Whether this status indicates the answer was actually delivered (as opposed to a failure
	/// of any band).
	pub const fn is_ok(self) -> bool {
		matches!(self, Status::Ok)
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.long(), self.short())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bands_are_ascending_with_code() {
		assert!(Status::Ok.band() < Status::NoMemory.band());
		assert!(Status::NoMemory.band() < Status::ServFail.band());
		assert!(Status::ServFail.band() < Status::NotResponding.band());
		assert!(Status::NotResponding.band() < Status::NoServers.band());
		assert!(Status::NoServers.band() < Status::InvalidDomain.band());
	}

	#[test]
	fn max_temporary_splits_retryable_from_definite() {
		assert!(Status::NotResponding.code() < Status::MAX_TEMPORARY);
		assert!(Status::NoServers.code() >= Status::MAX_TEMPORARY);
		assert!(Status::InvalidDomain.code() >= Status::MAX_TEMPORARY);
	}
}
