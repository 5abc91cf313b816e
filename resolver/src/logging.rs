//! A colourised, timestamped [`log::Log`] sink, plus the mapping from the configured init-flag
//! diagnostic tiers (debug / server-warnings / error-print) onto `log` levels.

use std::time::SystemTime;

use log::{Level, LevelFilter};
use nu_ansi_term::ansi::RESET;
use nu_ansi_term::{Color, Style};

use crate::config::InitFlags;

pub struct Logger;

impl log::Log for Logger {
	fn enabled(&self, _: &log::Metadata) -> bool {
		true
	}

	fn log(&self, record: &log::Record) {
		let time = humantime::format_rfc3339_nanos(SystemTime::now());

		let dim = Style::new().dimmed().prefix();

		eprintln!(
			"{dim}{time}{RESET} {}{:5}{RESET} {}{}{RESET}{dim}:{RESET} {}",
			match record.level() {
				Level::Trace => Color::Purple,
				Level::Debug => Color::Blue,
				Level::Info => Color::Green,
				Level::Warn => Color::Yellow,
				Level::Error => Color::Red,
			}
			.bold()
			.prefix(),
			record.level(),
			Style::new().bold().prefix(),
			record.target(),
			record.args()
		);
	}

	fn flush(&self) {}
}

/// Installs [`Logger`] as the global `log` sink and sets the max level from `flags`:
/// `DEBUG` enables `Level::Debug`, otherwise diagnostics top out at `Level::Info` unless
/// `NOERRPRINT` silences everything but errors used internally for plumbing failures.
///
/// Idempotent: a second call from the same process is a no-op, since [`log::set_logger`] can only
/// succeed once per process and a host embedding more than one `Resolver` should not need more
/// than one sink installed.
pub fn install(flags: InitFlags) {
	let level = if flags.contains(InitFlags::NOERRPRINT) {
		LevelFilter::Error
	} else if flags.contains(InitFlags::DEBUG) {
		LevelFilter::Debug
	} else {
		LevelFilter::Info
	};

	if log::set_logger(&Logger).is_ok() {
		log::set_max_level(level);
	}
}
