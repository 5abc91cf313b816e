//! SIGPIPE suppression around a socket write: a send that races a peer reset must never raise a
//! signal, unless the host has asked to manage its own signal disposition (`InitFlags::NOSIGPIPE`).
//!
//! An alternative would install `SIG_IGN` once, for the process's lifetime, at startup. Rust's
//! [`Drop`] makes the bracketed form safe to use per write instead: the old disposition is always
//! restored, including when a write panics, without needing a matching teardown call the caller
//! could forget.

/// Restores the previous `SIGPIPE` disposition on drop.
pub struct Guard {
	previous: Option<libc::sighandler_t>,
}

impl Guard {
	/// Ignores `SIGPIPE` for the lifetime of the returned guard, unless `enabled` is false (the
	/// host asked to manage it itself via `InitFlags::NOSIGPIPE`), in which case this is a no-op.
	pub fn protect(enabled: bool) -> Self {
		if !enabled {
			return Self { previous: None };
		}

		// SAFETY: `signal` with SIGPIPE/SIG_IGN is the standard idiom for suppressing the default
		// terminating action around a write that may race a peer reset; no signal handler runs.
		let previous = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
		if previous == libc::SIG_ERR {
			return Self { previous: None };
		}

		Self { previous: Some(previous) }
	}
}

impl Drop for Guard {
	fn drop(&mut self) {
		if let Some(previous) = self.previous {
			// SAFETY: restoring whatever disposition `protect` observed before it installed SIG_IGN.
			unsafe {
				libc::signal(libc::SIGPIPE, previous);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn disabled_guard_restores_nothing() {
		let guard = Guard::protect(false);
		assert!(guard.previous.is_none());
	}

	#[test]
	fn enabled_guard_round_trips_disposition() {
		let guard = Guard::protect(true);
		assert!(guard.previous.is_some());
		drop(guard);
	}
}
