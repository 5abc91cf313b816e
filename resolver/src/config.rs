//! The already-populated configuration structure a host constructs and hands to
//! [`crate::Resolver::init`]. Loading this from `/etc/resolv.conf`, the environment, or a command
//! line is explicitly out of scope here.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::addr::Mask;

/// Up to this many servers may be configured.
pub const MAX_SERVERS: usize = 5;

/// Up to this many sort-list entries may be configured.
pub const MAX_SORTLIST: usize = 15;

/// One `(base, mask)` entry of the sort list: addresses matching `base` under `mask` are
/// preferred when reordering a multi-address answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortEntry {
	pub base: Ipv4Addr,
	pub mask: Mask,
}

/// The suffix-appending search list, plus the dots threshold that decides whether the bare owner
/// is also tried as an absolute name.
#[derive(Debug, Clone, Default)]
pub struct SearchList {
	pub suffixes: Vec<String>,
	/// An owner with at least this many dots is also tried absolute.
	pub ndots: u32,
}

/// Per-instance behaviour switches, as a bitset over `u32`. Each flag's effect is local and
/// independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitFlags(u32);

impl InitFlags {
	/// Do not consult environment variables for configuration (irrelevant here, since config
	/// loading is out of scope, but kept for parity with the flag's identity).
	pub const NOENV: InitFlags = InitFlags(1 << 0);
	/// Suppress printing of diagnostic messages to the configured sink.
	pub const NOERRPRINT: InitFlags = InitFlags(1 << 1);
	/// Suppress warnings about individual servers misbehaving.
	pub const NOSERVERWARN: InitFlags = InitFlags(1 << 2);
	/// Emit debug-level diagnostics.
	pub const DEBUG: InitFlags = InitFlags(1 << 3);
	/// Include the process id in diagnostic output.
	pub const LOGPID: InitFlags = InitFlags(1 << 4);
	/// Do not automatically poll sockets from within blocking calls other than `wait`.
	pub const NOAUTOSYS: InitFlags = InitFlags(1 << 5);
	/// Check for consistency on every call (debug aid).
	pub const CHECKC_ENTEX: InitFlags = InitFlags(1 << 6);
	/// Perform that consistency check only periodically rather than on every call.
	pub const CHECKC_FREQ: InitFlags = InitFlags(1 << 7);
	/// Do not install SIGPIPE protection around TCP writes.
	pub const NOSIGPIPE: InitFlags = InitFlags(1 << 8);

	pub const fn empty() -> Self {
		InitFlags(0)
	}

	pub const fn contains(self, flag: InitFlags) -> bool {
		self.0 & flag.0 == flag.0
	}

	pub const fn union(self, other: InitFlags) -> Self {
		InitFlags(self.0 | other.0)
	}
}

impl core::ops::BitOr for InitFlags {
	type Output = InitFlags;

	fn bitor(self, rhs: InitFlags) -> InitFlags {
		self.union(rhs)
	}
}

/// The UDP retry schedule; the retry count is exposed as a configuration field rather than a
/// compile-time constant so a host can tune it without a rebuild (see DESIGN.md for the chosen
/// default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
	pub udp_retry_ms: u64,
	pub udp_max_retries: u32,
	pub tcp_ms: u64,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self { udp_retry_ms: 2_000, udp_max_retries: 15, tcp_ms: 30_000 }
	}
}

/// A fully populated resolver configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
	/// Up to [`MAX_SERVERS`] recursive name servers, tried in order. A `SocketAddrV4` rather than a
	/// bare `Ipv4Addr` so a test fixture (or a host proxying DNS through a non-standard port) isn't
	/// forced onto port 53.
	pub servers: Vec<SocketAddrV4>,
	/// Optional address-preference ordering for multi-address answers.
	pub sortlist: Vec<SortEntry>,
	/// Optional suffix list for unqualified owners.
	pub search: Option<SearchList>,
	pub flags: InitFlags,
	pub timeouts: Timeouts,
}

impl Config {
	/// A configuration pointed at a single server on the standard DNS port, with no search or sort
	/// list, the common case for simple hosts.
	pub fn single_server(server: Ipv4Addr) -> Self {
		Self { servers: vec![SocketAddrV4::new(server, crate::transport::udp::DNS_PORT)], ..Default::default() }
	}

	/// A configuration pointed at a single server/port pair, for test fixtures that bind a stub
	/// server on an ephemeral loopback port rather than the privileged standard one.
	pub fn single_server_addr(server: SocketAddrV4) -> Self {
		Self { servers: vec![server], ..Default::default() }
	}
}
