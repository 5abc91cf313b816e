//! The query slab: owns every [`crate::query::slot::Query`], in exactly one of its three queues,
//! addressed by generation-checked [`QueryHandle`]s.
//!
//! An index-based arena where each query is a slot and each queue is a `VecDeque<QueryHandle>`,
//! rather than an intrusive doubly-linked list. Queue membership is removed by value rather than
//! by an O(1) intrusive unlink; for the query counts a stub resolver actually carries (tens, not
//! millions) this is the right trade against carrying unsafe linked-list plumbing for no practical
//! benefit.

use std::collections::VecDeque;

use crate::query::slot::{Query, QueryHandle};
use crate::query::state::{Queue, State};

struct Slot<C> {
	generation: u32,
	query: Option<Query<C>>,
}

/// Owns every in-flight (or just-completed) query for one resolver handle.
pub struct Manager<C> {
	slots: Vec<Slot<C>>,
	free: Vec<u32>,
	timew: VecDeque<QueryHandle>,
	childw: VecDeque<QueryHandle>,
	output: VecDeque<QueryHandle>,
}

impl<C> Default for Manager<C> {
	fn default() -> Self {
		Self { slots: Vec::new(), free: Vec::new(), timew: VecDeque::new(), childw: VecDeque::new(), output: VecDeque::new() }
	}
}

impl<C> Manager<C> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a freshly constructed query and links it into the queue its `state` implies.
	pub fn insert(&mut self, query: Query<C>) -> QueryHandle {
		let queue = query.state.queue();

		let handle = if let Some(index) = self.free.pop() {
			let slot = &mut self.slots[index as usize];
			slot.query = Some(query);
			QueryHandle { index, generation: slot.generation }
		} else {
			let index = self.slots.len() as u32;
			self.slots.push(Slot { generation: 0, query: Some(query) });
			QueryHandle { index, generation: 0 }
		};

		self.link(handle, queue);
		handle
	}

	pub fn get(&self, handle: QueryHandle) -> Option<&Query<C>> {
		self.slots.get(handle.index as usize).filter(|s| s.generation == handle.generation).and_then(|s| s.query.as_ref())
	}

	pub fn get_mut(&mut self, handle: QueryHandle) -> Option<&mut Query<C>> {
		self
			.slots
			.get_mut(handle.index as usize)
			.filter(|s| s.generation == handle.generation)
			.and_then(|s| s.query.as_mut())
	}

	fn queue_mut(&mut self, queue: Queue) -> &mut VecDeque<QueryHandle> {
		match queue {
			Queue::TimeW => &mut self.timew,
			Queue::ChildW => &mut self.childw,
			Queue::Output => &mut self.output,
		}
	}

	pub fn link(&mut self, handle: QueryHandle, queue: Queue) {
		self.queue_mut(queue).push_back(handle);
	}

	pub fn unlink(&mut self, handle: QueryHandle, queue: Queue) {
		let q = self.queue_mut(queue);
		if let Some(pos) = q.iter().position(|&h| h == handle) {
			q.remove(pos);
		}
	}

	/// Moves `handle` from whatever queue its current state implies into the queue `new_state`
	/// implies, and updates the stored state. The sole place a query's queue membership changes,
	/// so the state/queue invariant can never drift.
	pub fn transition(&mut self, handle: QueryHandle, new_state: State) {
		let old_queue = match self.get(handle) {
			Some(q) => q.state.queue(),
			None => return,
		};
		self.unlink(handle, old_queue);
		if let Some(q) = self.get_mut(handle) {
			q.state = new_state;
		}
		self.link(handle, new_state.queue());
	}

	/// Removes and returns a query entirely, freeing its slot for reuse under a new generation.
	/// The caller is responsible for having already unlinked it from its queue (`cancel` and
	/// completion-reaping both do this explicitly, since they also need to recurse into children).
	pub fn take(&mut self, handle: QueryHandle) -> Option<Query<C>> {
		let slot = self.slots.get_mut(handle.index as usize)?;
		if slot.generation != handle.generation {
			return None;
		}
		let query = slot.query.take()?;
		slot.generation = slot.generation.wrapping_add(1);
		self.free.push(handle.index);
		Some(query)
	}

	pub fn timew_handles(&self) -> Vec<QueryHandle> {
		self.timew.iter().copied().collect()
	}

	pub fn childw_handles(&self) -> Vec<QueryHandle> {
		self.childw.iter().copied().collect()
	}

	pub fn output_front(&self) -> Option<QueryHandle> {
		self.output.front().copied()
	}

	pub fn contains_output(&self, handle: QueryHandle) -> bool {
		self.output.contains(&handle)
	}

	/// Removes and returns the oldest completed query, per `check(null)`'s FIFO contract.
	pub fn take_output_front(&mut self) -> Option<Query<C>> {
		let handle = self.output.pop_front()?;
		self.take(handle)
	}

	/// Removes and returns a specific completed query from *output*, per `check(&query)`.
	pub fn take_output(&mut self, handle: QueryHandle) -> Option<Query<C>> {
		let pos = self.output.iter().position(|&h| h == handle)?;
		self.output.remove(pos);
		self.take(handle)
	}

	/// Whether any live query currently carries wire id `id`, used to avoid handing out a
	/// colliding id to a freshly submitted query.
	pub fn id_in_use(&self, id: u16) -> bool {
		self.all_handles().into_iter().filter_map(|h| self.get(h)).any(|q| q.dns_id == id)
	}

	/// Unlinks and removes `handle` and every descendant in its child tree: `cancel` recursively
	/// cancels children and frees all arena storage. Dropping the returned queries releases their
	/// arena storage; the caller need not do anything further.
	pub fn cancel_tree(&mut self, handle: QueryHandle) -> Vec<Query<C>> {
		let mut removed = Vec::new();
		let mut stack = vec![handle];

		while let Some(h) = stack.pop() {
			let Some(query) = self.get(h) else { continue };
			stack.extend(query.children.iter().copied());

			let queue = query.state.queue();
			self.unlink(h, queue);
			if let Some(q) = self.take(h) {
				removed.push(q);
			}
		}

		removed
	}

	/// The earliest deadline among every *timew* query, for `beforeSelect`'s timeout clamp.
	pub fn earliest_deadline(&self) -> Option<std::time::Instant> {
		self.timew.iter().filter_map(|&h| self.get(h)).filter_map(|q| q.deadline).min()
	}

	/// Every live query handle, in slot order, for `forAllQueries`'s restartable iteration.
	/// "Restartable" here means the caller drives the iteration by handle and can resume after a
	/// handle it was given was cancelled elsewhere; iterating over a live snapshot of handles (not
	/// holding a borrow across calls) is what makes that safe.
	pub fn all_handles(&self) -> Vec<QueryHandle> {
		self
			.slots
			.iter()
			.enumerate()
			.filter_map(|(i, s)| s.query.as_ref().map(|_| QueryHandle { index: i as u32, generation: s.generation }))
			.collect()
	}

	pub fn len(&self) -> usize {
		self.slots.iter().filter(|s| s.query.is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Debug-only check of the core invariant: a query is linked into exactly one queue, matching
	/// its state.
	#[cfg(debug_assertions)]
	pub fn assert_consistent(&self) {
		for handle in self.all_handles() {
			let state = self.get(handle).unwrap().state;
			let expected = state.queue();
			let in_timew = self.timew.contains(&handle);
			let in_childw = self.childw.contains(&handle);
			let in_output = self.output.contains(&handle);
			let count = [in_timew, in_childw, in_output].iter().filter(|&&b| b).count();
			assert_eq!(count, 1, "query {handle:?} linked into {count} queues, expected exactly 1");
			let actual = if in_timew {
				Queue::TimeW
			} else if in_childw {
				Queue::ChildW
			} else {
				Queue::Output
			};
			assert_eq!(actual, expected, "query {handle:?} in wrong queue for state {state:?}");
		}
	}
}
