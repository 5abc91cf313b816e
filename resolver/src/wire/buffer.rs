//! A growable scratch buffer reused across codec boundaries: query encoding, domain
//! decompression, and `\DDD`-quoting all accumulate into one of these rather than allocating a
//! fresh `Vec` per step.

/// A resizable byte buffer. Functionally a thin wrapper over `Vec<u8>`; kept as its own type so
/// call sites read as `&mut Buffer` in, bytes out, rather than passing a bare `Vec` around.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
	bytes: Vec<u8>,
}

impl Buffer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn clear(&mut self) {
		self.bytes.clear();
	}

	pub fn push(&mut self, byte: u8) {
		self.bytes.push(byte);
	}

	pub fn extend(&mut self, data: &[u8]) {
		self.bytes.extend_from_slice(data);
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.bytes
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	pub fn into_vec(self) -> Vec<u8> {
		self.bytes
	}

	pub fn push_u16be(&mut self, value: u16) {
		self.extend(&value.to_be_bytes());
	}

	pub fn push_u32be(&mut self, value: u32) {
		self.extend(&value.to_be_bytes());
	}

	/// Appends a name-quoting octet: passes through plain `[A-Za-z0-9-]` and `.`
	/// unchanged, escapes anything else as `\DDD`.
	pub fn push_quoted(&mut self, byte: u8) {
		if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
			self.push(byte);
		} else {
			self.extend(format!("\\{byte:03}").as_bytes());
		}
	}
}
