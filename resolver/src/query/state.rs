//! The per-query state tag.
//!
//! Which queue a query belongs to is a *derivable* invariant of its state, not a separately
//! stored field: [`State::queue`] is the single source of truth a debug assertion checks against
//! on every transition (see `Manager::assert_consistent` in `crate::query::manager`).

/// Which of the resolver's three queues a query is linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
	/// Awaiting network I/O or a timeout.
	TimeW,
	/// Waiting on child queries to complete.
	ChildW,
	/// Completed, not yet collected by `check`/`wait`.
	Output,
}

/// A query's current stage in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Udp,
	TcpWait,
	TcpSent,
	Child,
	Done,
}

impl State {
	/// The queue this state implies a query is linked into, an invariant, not a stored field.
	pub const fn queue(self) -> Queue {
		match self {
			State::Udp | State::TcpWait | State::TcpSent => Queue::TimeW,
			State::Child => Queue::ChildW,
			State::Done => Queue::Output,
		}
	}
}
