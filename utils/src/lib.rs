pub mod bytes;
/// Utilities for storing integer-like data in a fixed byteorder.
pub mod endian;
/// Error-handling utilities.
pub mod error;
