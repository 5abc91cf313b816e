use bilge::Bitsized;

use crate::bytes::Cast;

macro_rules! define_be {
	( $( $name:ident($int:ident) )* ) => {
		$(
			#[doc = concat!("A ", stringify!($int), " stored in big-endian (network) byteorder.")]
			#[allow(non_camel_case_types)]
			#[repr(transparent)]
			#[derive(Clone, Copy, Default, PartialEq, Eq)]
			pub struct $name($int);

			impl $name {
				/// Retrieves a copy of the value in native-endian byteorder.
				#[inline(always)]
				pub fn get(self) -> $int {
					$int::from_be(self.0)
				}
			}

			impl From<$int> for $name {
				/// Converts a native-endian value into its big-endian wire representation.
				#[inline(always)]
				fn from(value: $int) -> Self {
					Self(value.to_be())
				}
			}

			impl core::fmt::Debug for $name {
				fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
					self.get().fmt(f)
				}
			}

			unsafe impl Cast for $name {}
		)*
	};
}

define_be!( u16be(u16) u32be(u32) );

/// Wraps a `bilge` bitfield struct (e.g. a `#[bitsize(16)] struct Flags`) stored on the wire in
/// big-endian byteorder. The struct's underlying representation must itself be a plain integer
/// (true of any `bitsize` whose width matches a native integer size, which is the only shape used
/// for wire headers here).
#[repr(transparent)]
pub struct BigEndian<T: Bitsized<ArbitraryInt = u16>>(u16);

impl<T: Bitsized<ArbitraryInt = u16> + From<u16>> BigEndian<T> {
	/// Retrieves a copy of the bitfield value in native-endian byteorder.
	#[inline(always)]
	pub fn get(self) -> T {
		u16::from_be(self.0).into()
	}
}

impl<T: Bitsized<ArbitraryInt = u16> + Into<u16>> From<T> for BigEndian<T> {
	/// Converts a bitfield value into its big-endian wire representation.
	#[inline(always)]
	fn from(value: T) -> Self {
		Self(value.into().to_be())
	}
}

impl<T: Bitsized<ArbitraryInt = u16>> Clone for BigEndian<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T: Bitsized<ArbitraryInt = u16>> Copy for BigEndian<T> {}

unsafe impl<T: Bitsized<ArbitraryInt = u16>> Cast for BigEndian<T> {}
