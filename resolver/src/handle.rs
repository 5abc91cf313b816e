//! The resolver handle: the one piece of process state a host embeds, and the orchestration that
//! ties the query slab, the wire codec, the reply dispatcher, and the transport together behind
//! `submit`/`cancel`/`check`/`wait`/`beforeSelect`/`afterSelect`.
//!
//! This resolver is the host's guest, not an actor with its own timers and reactor: every
//! suspension point is `wait`'s own internal poll, never an actor mailbox.

use core::time::Duration;
use std::os::fd::RawFd;
use std::time::Instant;

use log::{debug, warn};
use rand::Rng;

use crate::config::Config;
use crate::dispatch::{self, ChildRequest, Outcome};
use crate::query::arena::Arena;
use crate::query::flags::QueryFlags;
use crate::query::manager::Manager;
use crate::query::slot::{AbsoluteTry, ChildRole, Query, QueryHandle, SearchWalk};
use crate::query::state::State;
use crate::rr::types::Type;
use crate::status::Status;
use crate::transport::events::{Interest, PollEntry, ReadySet, WantSet};
use crate::transport::tcp::{TcpConn, TcpState};
use crate::transport::udp::UdpTransport;
use crate::Answer;

/// What `check`/`wait` hand back for one query.
pub enum CheckOutcome<C> {
	/// The query (or, for `check(None)`, the oldest completed query) is ready.
	Ready { handle: QueryHandle, answer: Answer, ctx: C },
	/// Nothing is ready yet; the caller should drive I/O (or call `wait`) and retry.
	WouldBlock,
	/// `check(Some(handle))` was called with a handle that no longer names a live query (already
	/// collected or cancelled).
	NoSuchQuery,
}

/// One resolver instance: configuration, the UDP socket, the opportunistic TCP connection, and
/// every in-flight query.
///
/// `C` is the caller's opaque per-query context, handed back unchanged by `check`/`wait`. Child
/// queries spawned internally for cooked record types carry `C::default()`, since they are
/// never observed by the caller; this is the one concession the slab's single context type makes,
/// recorded as an Open Question resolution in `DESIGN.md`.
pub struct Resolver<C> {
	config: Config,
	udp: UdpTransport,
	tcp: TcpConn,
	manager: Manager<C>,
}

impl<C: Default> Resolver<C> {
	/// Binds the UDP socket and validates `config`. Fails with [`Status::NoServers`] if no server
	/// is configured, the one misconfiguration the core itself (rather than config loading, which
	/// is out of scope here) can detect.
	pub fn init(config: Config) -> Result<Self, Status> {
		if config.servers.is_empty() {
			return Err(Status::NoServers);
		}

		let udp = UdpTransport::bind().map_err(|e| {
			warn!("failed to bind UDP socket: {e}");
			Status::NoLocalMem
		})?;

		let sigpipe_protect = !config.flags.contains(crate::config::InitFlags::NOSIGPIPE);

		Ok(Self { config, udp, tcp: TcpConn::new(sigpipe_protect), manager: Manager::new() })
	}

	/// Submits one query. `owner` is taken verbatim except for the trailing-dot/search-list
	/// handling described above. On success the returned handle's answer slot already exists
	/// (pre-allocated at submit time, so a later out-of-memory can still be reported).
	pub fn submit(&mut self, owner: &str, ty: Type, flags: QueryFlags, ctx: C) -> Result<QueryHandle, Status> {
		if ty == Type::Addr {
			return self.submit_addr(owner, flags, ctx);
		}

		let qwire = ty.wire_code().expect("non-Addr types always have a wire code");

		let (first_name, search) = self.initial_name(owner, flags);
		let id = self.next_id();
		let query_dgram = crate::wire::encode::encode_query(&first_name, qwire, flags, id)?;

		let mut query = Query {
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
			use_vc: flags.contains(QueryFlags::USEVC),
			cname_source: None,
			search,
			parent: None,
			child_role: None,
			children: Vec::new(),
			arena: Arena::new(),
			answer: Answer::pending(ty),
			ctx,
		};

		if query.use_vc {
			query.state = State::TcpWait;
		}

		let handle = self.manager.insert(query);
		let now = Instant::now();

		if self.manager.get(handle).map(|q| q.state) == Some(State::Udp) {
			self.send_udp(handle, now);
		} else {
			self.drive_tcp(now);
		}

		Ok(handle)
	}

	/// The `Addr` pseudo-type: a parent that never goes on the wire itself, immediately
	/// spawning an `A` and an `AAAA` child query and waiting for both.
	fn submit_addr(&mut self, owner: &str, flags: QueryFlags, ctx: C) -> Result<QueryHandle, Status> {
		let query = Query {
			state: State::Child,
			ty: Type::Addr,
			flags,
			query_dgram: Vec::new(),
			dns_id: 0,
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
			answer: Answer::pending(Type::Addr),
			ctx,
		};

		let handle = self.manager.insert(query);
		let requests = vec![
			ChildRequest { role: ChildRole::AddrUnion, name: owner.to_string() },
			ChildRequest { role: ChildRole::AddrUnion, name: owner.to_string() },
		];
		self.spawn_children(handle, requests, Instant::now());
		Ok(handle)
	}

	/// Cancels `handle` and every descendant. Legal in any state. Dropping the removed
	/// queries releases their arena storage (nothing left to do once the owning `Query<C>` is
	/// dropped).
	pub fn cancel(&mut self, handle: QueryHandle) {
		let removed = self.manager.cancel_tree(handle);
		for query in removed {
			if let Some(parent) = query.parent {
				if let Some(p) = self.manager.get_mut(parent) {
					p.children.retain(|&c| c != handle);
				}
			}
		}
	}

	/// Non-blocking collection. `None` returns the oldest completed query; `Some(handle)`
	/// returns that specific query only if it has reached `State::Done`.
	pub fn check(&mut self, handle: Option<QueryHandle>) -> CheckOutcome<C> {
		match handle {
			None => match self.manager.output_front() {
				Some(h) => {
					let query = self.manager.take_output(h).expect("output_front handle is always linked on output");
					CheckOutcome::Ready { handle: h, answer: query.answer, ctx: query.ctx }
				}
				None => CheckOutcome::WouldBlock,
			},
			Some(h) => match self.manager.get(h) {
				None => CheckOutcome::NoSuchQuery,
				Some(q) if q.state != State::Done => CheckOutcome::WouldBlock,
				Some(_) => {
					let query = self.manager.take_output(h).expect("state == Done implies linked on output");
					CheckOutcome::Ready { handle: h, answer: query.answer, ctx: query.ctx }
				}
			},
		}
	}

	/// Blocking collection, implemented purely on top of [`Self::before_poll`]/
	/// [`Self::after_poll`].
	pub fn wait(&mut self, handle: Option<QueryHandle>) -> Result<(QueryHandle, Answer, C), Status> {
		loop {
			match self.check(handle) {
				CheckOutcome::Ready { handle, answer, ctx } => return Ok((handle, answer, ctx)),
				CheckOutcome::NoSuchQuery => return Err(Status::NoServers),
				CheckOutcome::WouldBlock => {}
			}

			let now = Instant::now();
			let mut entries = [PollEntry { fd: -1, interest: Interest::NONE }; 2];
			let (n, timeout_ms) = match self.before_poll(&mut entries, now) {
				Ok(v) => v,
				Err(_) => unreachable!("two entries always suffice: one UDP socket, one TCP socket"),
			};

			let mut pollfds: Vec<libc::pollfd> = entries[..n]
				.iter()
				.map(|e| libc::pollfd { fd: e.fd, events: interest_to_events(e.interest), revents: 0 })
				.collect();

			let timeout = timeout_ms.map(|ms| ms.min(i32::MAX as u64) as i32).unwrap_or(-1);

			// SAFETY: `pollfds` is a valid, exclusively-held buffer of `n` initialized `pollfd`
			// entries for the duration of the call, matching `poll(2)`'s contract.
			let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout) };
			if rc < 0 {
				let err = std::io::Error::last_os_error();
				if err.kind() != std::io::ErrorKind::Interrupted {
					warn!("poll failed in wait(): {err}");
				}
			}

			let ready: Vec<(RawFd, Interest)> = pollfds
				.iter()
				.map(|p| {
					(
						p.fd,
						Interest { readable: p.revents & libc::POLLIN != 0, writable: p.revents & libc::POLLOUT != 0 },
					)
				})
				.collect();

			self.after_poll(&ready, Instant::now());
		}
	}

	/// Populates the readiness set the host's own event loop should wait on.
	pub fn before_select(&mut self, now: Instant) -> WantSet {
		let mut entries = vec![PollEntry { fd: self.udp.fd(), interest: Interest::READ }];
		if let Some(fd) = self.tcp.fd() {
			entries.push(PollEntry { fd, interest: if self.tcp.wants_write() { Interest::read_write() } else { Interest::READ } });
		}

		WantSet { entries, deadline: self.earliest_deadline(now) }
	}

	/// Ingests whatever the host's event loop observed.
	pub fn after_select(&mut self, udp_ready: ReadySet, tcp_ready: ReadySet, now: Instant) {
		if udp_ready.readable {
			self.process_udp_readable(now);
		}
		if tcp_ready.writable {
			self.drive_tcp(now);
		}
		if tcp_ready.readable {
			self.process_tcp_readable(now);
		}
		self.process_timeouts(now);
		self.assert_consistent();
	}

	/// The `pollfd`-array variant of [`Self::before_select`]: fills `out` with up to two
	/// entries (UDP, and TCP when connected/connecting) and returns how many were written plus the
	/// timeout in milliseconds the host should pass to `poll`. Returns `Err(needed_len)` if `out`
	/// is too small, so the host can resize and retry.
	pub fn before_poll(&mut self, out: &mut [PollEntry], now: Instant) -> Result<(usize, Option<u64>), usize> {
		let want = self.before_select(now);
		let n = want.fill_poll_array(out)?;
		let timeout_ms = want.deadline.map(|d| d.saturating_duration_since(now).as_millis() as u64);
		Ok((n, timeout_ms))
	}

	/// The `pollfd`-array variant of [`Self::after_select`]: `ready` pairs each watched fd with
	/// the readiness the host observed for it.
	pub fn after_poll(&mut self, ready: &[(RawFd, Interest)], now: Instant) {
		let mut udp_ready = ReadySet::NONE;
		let mut tcp_ready = ReadySet::NONE;

		for &(fd, interest) in ready {
			if fd == self.udp.fd() {
				udp_ready = ReadySet { readable: interest.readable, writable: interest.writable };
			} else if Some(fd) == self.tcp.fd() {
				tcp_ready = ReadySet { readable: interest.readable, writable: interest.writable };
			}
		}

		self.after_select(udp_ready, tcp_ready, now);
	}

	/// Restartable iteration over every in-flight query, for diagnostic tooling. The
	/// returned handles are a live snapshot; a handle that is cancelled or completes between taking
	/// this snapshot and the caller looking it up again simply stops resolving.
	pub fn for_all_queries(&self) -> Vec<QueryHandle> {
		self.manager.all_handles()
	}

	/// The current state of `handle`, if it still names a live query.
	pub fn state(&self, handle: QueryHandle) -> Option<State> {
		self.manager.get(handle).map(|q| q.state)
	}

	// ---- internal orchestration ----

	fn next_id(&mut self) -> u16 {
		let mut rng = rand::thread_rng();
		loop {
			let id: u16 = rng.gen();
			if !self.manager.id_in_use(id) {
				return id;
			}
		}
	}

	/// Computes the first name to query for a freshly submitted owner, and the search-list walker
	/// state to carry forward if search-list expansion applies.
	fn initial_name(&self, owner: &str, flags: QueryFlags) -> (String, Option<SearchWalk>) {
		let absolute_owner = owner.ends_with('.');

		if !flags.contains(QueryFlags::SEARCH) || absolute_owner {
			return (owner.to_string(), None);
		}

		let Some(list) = &self.config.search else {
			return (owner.to_string(), None);
		};

		let mut walk = SearchWalk { original: owner.to_string(), next_suffix: 0, absolute: AbsoluteTry::NotYet };
		let name = advance_search(&mut walk, list).unwrap_or_else(|| format!("{owner}."));
		(name, Some(walk))
	}

	fn send_udp(&mut self, handle: QueryHandle, now: Instant) {
		let Some(query) = self.manager.get_mut(handle) else { return };

		let server = self.config.servers[query.next_udp_server % self.config.servers.len()];

		match self.udp.send_to(&query.query_dgram, server) {
			crate::transport::udp::UdpSendOutcome::Sent => {
				query.sent_udp |= 1 << (query.next_udp_server % 32);
			}
			crate::transport::udp::UdpSendOutcome::TooLarge => {
				debug!("query too large for UDP, promoting to TCP");
				query.use_vc = true;
				self.manager.transition(handle, State::TcpWait);
				self.drive_tcp(now);
				return;
			}
		}

		let Some(query) = self.manager.get_mut(handle) else { return };
		query.next_udp_server = (query.next_udp_server + 1) % self.config.servers.len();
		query.udp_retries += 1;
		query.deadline = Some(now + Duration::from_millis(self.config.timeouts.udp_retry_ms));
	}

	fn earliest_deadline(&self, now: Instant) -> Option<Instant> {
		let manager_deadline = self.manager.earliest_deadline();
		let tcp_deadline = self.tcp.deadline();
		[manager_deadline, tcp_deadline].into_iter().flatten().min().map(|d| d.max(now))
	}

	fn process_timeouts(&mut self, now: Instant) {
		if self.tcp.state() == TcpState::Connecting {
			if let Some(deadline) = self.tcp.deadline() {
				if deadline <= now {
					self.tcp_broken(now);
				}
			}
		}

		for handle in self.manager.timew_handles() {
			let Some(query) = self.manager.get(handle) else { continue };
			let Some(deadline) = query.deadline else { continue };
			if deadline > now {
				continue;
			}

			match query.state {
				State::Udp => {
					if query.udp_retries >= self.config.timeouts.udp_max_retries {
						self.finish_with_status(handle, Status::NotResponding, now);
					} else {
						self.send_udp(handle, now);
					}
				}
				State::TcpWait | State::TcpSent => self.tcp_broken(now),
				State::Child | State::Done => {}
			}
		}
	}

	fn process_udp_readable(&mut self, now: Instant) {
		for dgram in self.udp.recv_all() {
			if dgram.len() < 2 {
				continue;
			}
			let id = u16::from_be_bytes([dgram[0], dgram[1]]);

			let candidates: Vec<QueryHandle> = self
				.manager
				.timew_handles()
				.into_iter()
				.filter(|&h| self.manager.get(h).map(|q| q.dns_id) == Some(id))
				.collect();

			let next_id = self.peek_next_id();
			let sortlist = self.config.sortlist.clone();

			for handle in candidates {
				let Some(query) = self.manager.get_mut(handle) else { continue };
				match dispatch::process_reply(query, &dgram, next_id, &sortlist) {
					Outcome::Ignored => continue,
					outcome => {
						self.apply_outcome(handle, outcome, now);
						break;
					}
				}
			}
		}
	}

	fn process_tcp_readable(&mut self, now: Instant) {
		let messages = match self.tcp.read_messages() {
			Ok(m) => m,
			Err(e) => {
				warn!("TCP connection broke while reading: {e}");
				self.tcp_broken(now);
				return;
			}
		};

		for dgram in messages {
			if dgram.len() < 2 {
				continue;
			}
			let id = u16::from_be_bytes([dgram[0], dgram[1]]);

			let candidates: Vec<QueryHandle> = self
				.manager
				.timew_handles()
				.into_iter()
				.filter(|&h| matches!(self.manager.get(h).map(|q| (q.state, q.dns_id)), Some((State::TcpSent, qid)) if qid == id))
				.collect();

			let next_id = self.peek_next_id();
			let sortlist = self.config.sortlist.clone();

			for handle in candidates {
				let Some(query) = self.manager.get_mut(handle) else { continue };
				match dispatch::process_reply(query, &dgram, next_id, &sortlist) {
					Outcome::Ignored => continue,
					outcome => {
						self.apply_outcome(handle, outcome, now);
						break;
					}
				}
			}
		}
	}

	/// A freshly generated id to offer [`dispatch::process_reply`] in case this datagram triggers a
	/// CNAME restart; unused (and simply dropped) if it doesn't.
	fn peek_next_id(&mut self) -> u16 {
		self.next_id()
	}

	fn apply_outcome(&mut self, handle: QueryHandle, outcome: Outcome, now: Instant) {
		match outcome {
			Outcome::Ignored => {}
			Outcome::Restarted => {
				self.manager.transition(handle, State::Udp);
				self.send_udp(handle, now);
			}
			Outcome::NeedsTcp => {
				if let Some(q) = self.manager.get_mut(handle) {
					q.use_vc = true;
				}
				self.manager.transition(handle, State::TcpWait);
				self.drive_tcp(now);
			}
			Outcome::AwaitingChildren(requests) => {
				self.manager.transition(handle, State::Child);
				self.spawn_children(handle, requests, now);
			}
			Outcome::Answered => self.complete_query(handle, now),
		}
	}

	/// Finalizes a query whose answer is ready to leave *timew*/*childw*, handling search-list
	/// continuation and child-completion stitching before it reaches *output*.
	fn complete_query(&mut self, handle: QueryHandle, now: Instant) {
		if self.try_search_restart(handle, now) {
			return;
		}

		if self.manager.get(handle).map(|q| q.is_child()).unwrap_or(false) {
			self.complete_child(handle, now);
			return;
		}

		// Every interim byte charged while materializing this answer (owner/CNAME names, record
		// contents) is promoted to the arena's single final total as the query leaves *timew*/
		// *childw* for good; `finish_with_status` reaches this same point through `complete_query`,
		// so this is the one place a top-level query's arena is ever promoted.
		if let Some(query) = self.manager.get_mut(handle) {
			query.arena.promote();
		}

		self.manager.transition(handle, State::Done);
	}

	/// A negative result (`NxDomain`) on a query still walking its search list advances to the
	/// next suffix and resends. Returns `true` if a restart was issued.
	fn try_search_restart(&mut self, handle: QueryHandle, now: Instant) -> bool {
		let Some(query) = self.manager.get(handle) else { return false };
		if query.answer.status != Status::NxDomain {
			return false;
		}
		let Some(search) = query.search.clone() else { return false };
		let Some(list) = self.config.search.clone() else { return false };

		let mut walk = search;
		let Some(next_name) = advance_search(&mut walk, &list) else { return false };

		let qwire = query.ty.wire_code().expect("search-list queries always have a wire type");
		let id = self.next_id();
		let Ok(query_dgram) = crate::wire::encode::encode_query(&next_name, qwire, query.flags, id) else { return false };

		let Some(query) = self.manager.get_mut(handle) else { return false };
		query.search = Some(walk);
		query.query_dgram = query_dgram;
		query.dns_id = id;
		query.sent_udp = 0;
		query.udp_retries = 0;
		query.next_udp_server = 0;
		query.failed_tcp = 0;
		query.use_vc = false;
		query.answer = Answer::pending(query.ty);

		self.manager.transition(handle, State::Udp);
		self.send_udp(handle, now);
		true
	}

	/// Submits one child query per `requests`, linking each to `parent` with its stitching role.
	/// If `parent` was mid-processing of an earlier batch of children, new ones are
	/// simply appended.
	fn spawn_children(&mut self, parent: QueryHandle, requests: Vec<ChildRequest>, now: Instant) {
		for request in requests {
			// Child addresses are always resolved as an A/AAAA pair; submit one query of
			// each wire type so both address families are attempted.
			for ty in [Type::A, Type::Aaaa] {
				let qwire = ty.wire_code().unwrap();
				let id = self.next_id();
				let Ok(query_dgram) =
					crate::wire::encode::encode_query(&request.name, qwire, QueryFlags::empty(), id)
				else {
					continue;
				};

				let child = Query {
					state: State::Udp,
					ty,
					flags: QueryFlags::empty(),
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
					parent: Some(parent),
					child_role: Some(request.role),
					children: Vec::new(),
					arena: Arena::new(),
					answer: Answer::pending(ty),
					ctx: C::default(),
				};

				let child_handle = self.manager.insert(child);
				if let Some(p) = self.manager.get_mut(parent) {
					p.children.push(child_handle);
				}
				self.send_udp(child_handle, now);
			}
		}
	}

	/// Stitches a completed child's resolved addresses into its parent's in-progress answer,
	/// clamps the parent's expiry time to the minimum of its own and the child's, and, once
	/// the parent's children list empties, promotes the parent to `Done`.
	fn complete_child(&mut self, handle: QueryHandle, now: Instant) {
		let Some(mut child) = self.manager.cancel_tree(handle).into_iter().next() else { return };
		let Some(parent_handle) = child.parent else { return };

		let addrs: Vec<core::net::IpAddr> = child
			.answer
			.records
			.drain(..)
			.filter_map(|r| match r {
				crate::rr::Record::A(v4) => Some(core::net::IpAddr::V4(v4)),
				crate::rr::Record::Aaaa(v6) => Some(core::net::IpAddr::V6(v6)),
				_ => None,
			})
			.collect();

		let Some(parent) = self.manager.get_mut(parent_handle) else { return };
		parent.children.retain(|&c| c != handle);

		match child.child_role {
			Some(ChildRole::AddrUnion) => {
				for addr in addrs {
					parent.answer.records.push(crate::rr::Record::Addr(addr));
				}
			}
			Some(ChildRole::HostAddr { index }) => {
				if let Some(record) = parent.answer.records.get_mut(index) {
					if let Some(host) = record.host_addr_mut() {
						host.addrs.extend(addrs);
					}
				}
			}
			None => {}
		}

		parent.arena.transfer_interim(&mut child.arena, child.arena.interim_total());
		parent.answer.expires = match (parent.answer.expires, child.answer.expires) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(Some(a), None) => Some(a),
			(None, b) => b,
		};

		if parent.children.is_empty() {
			parent.answer.status = Status::Ok;
			self.complete_query(parent_handle, now);
		}
	}

	fn finish_with_status(&mut self, handle: QueryHandle, status: Status, now: Instant) {
		if let Some(query) = self.manager.get_mut(handle) {
			query.answer.status = status;
		}
		self.complete_query(handle, now);
	}

	/// Advances TCP connection/send state: finishing a pending connect, queueing any `TcpWait`
	/// query once connected, and flushing the shared send buffer.
	fn drive_tcp(&mut self, now: Instant) {
		if self.tcp.state() == TcpState::Connecting {
			if let Err(e) = self.tcp.finish_connect() {
				warn!("TCP connect failed: {e}");
				self.tcp_broken(now);
				return;
			}
		}

		if self.tcp.state() == TcpState::Ok {
			for handle in self.manager.timew_handles() {
				let Some(query) = self.manager.get_mut(handle) else { continue };
				if query.state != State::TcpWait {
					continue;
				}
				self.tcp.queue(&query.query_dgram);
				query.deadline = Some(now + Duration::from_millis(self.config.timeouts.tcp_ms));
				self.manager.transition(handle, State::TcpSent);
			}

			if let Err(e) = self.tcp.flush() {
				warn!("TCP write failed: {e}");
				self.tcp_broken(now);
			}
			return;
		}

		if self.tcp.state() == TcpState::Disconnected {
			let Some(handle) =
				self.manager.timew_handles().into_iter().find(|&h| self.manager.get(h).map(|q| q.state) == Some(State::TcpWait))
			else {
				return;
			};

			match self.pick_tcp_server(handle) {
				Some(idx) => {
					let server = self.config.servers[idx];
					self.tcp.connect(server, idx, now, self.config.timeouts.tcp_ms);
				}
				None => self.finish_with_status(handle, Status::AllServersTcpFailed, now),
			}
		}
	}

	fn pick_tcp_server(&self, handle: QueryHandle) -> Option<usize> {
		let query = self.manager.get(handle)?;
		(0..self.config.servers.len()).find(|&i| query.failed_tcp & (1 << i) == 0)
	}

	/// Tears down a broken TCP connection and re-routes every query waiting on it to its next
	/// untried server, or fails it with [`Status::AllServersTcpFailed`] if none remain.
	fn tcp_broken(&mut self, now: Instant) {
		let broken_server = self.tcp.server;
		self.tcp.reset();

		for handle in self.manager.timew_handles() {
			let Some(query) = self.manager.get_mut(handle) else { continue };
			if !matches!(query.state, State::TcpWait | State::TcpSent) {
				continue;
			}
			query.failed_tcp |= 1 << (broken_server % 32);

			if self.pick_tcp_server(handle).is_none() {
				self.finish_with_status(handle, Status::AllServersTcpFailed, now);
			} else {
				// The query's own deadline tracked the now-torn-down connection's read/connect
				// timeout; while it's re-queued as TcpWait, the new connection attempt's deadline
				// lives on `self.tcp` instead, so a stale past value here must not immediately
				// re-trip `process_timeouts`.
				if let Some(q) = self.manager.get_mut(handle) {
					q.deadline = None;
				}
				self.manager.transition(handle, State::TcpWait);
			}
		}

		self.drive_tcp(now);
	}

	#[cfg(debug_assertions)]
	fn assert_consistent(&self) {
		self.manager.assert_consistent();
	}

	#[cfg(not(debug_assertions))]
	fn assert_consistent(&self) {}
}

/// Advances a search-list walk to its next candidate name: the owner is tried absolute
/// first if it already has at least `ndots` dots, otherwise each search suffix is tried in order
/// and the absolute name is tried last as a fallback. The walk is exhausted, not reset, once
/// every candidate has been offered.
fn advance_search(search: &mut SearchWalk, list: &crate::config::SearchList) -> Option<String> {
	let dots = search.original.chars().filter(|&c| c == '.').count() as u32;
	let ndots_met = dots >= list.ndots;

	if ndots_met && search.absolute == AbsoluteTry::NotYet {
		search.absolute = AbsoluteTry::Tried;
		return Some(format!("{}.", search.original));
	}

	if search.next_suffix < list.suffixes.len() {
		let suffix = &list.suffixes[search.next_suffix];
		search.next_suffix += 1;
		if search.next_suffix == list.suffixes.len() && search.absolute == AbsoluteTry::NotYet {
			search.absolute = AbsoluteTry::MustTryNext;
		}
		return Some(format!("{}.{}.", search.original, suffix));
	}

	if search.absolute == AbsoluteTry::MustTryNext {
		search.absolute = AbsoluteTry::Tried;
		return Some(format!("{}.", search.original));
	}

	None
}

fn interest_to_events(interest: Interest) -> i16 {
	let mut events = 0;
	if interest.readable {
		events |= libc::POLLIN;
	}
	if interest.writable {
		events |= libc::POLLOUT;
	}
	events
}
