//! The type registry: wire type codes, the caller-facing [`Type`] a query is submitted
//! with, the materialized [`Record`] shapes an [`crate::Answer`] carries, and per-RR parsing.
//!
//! Types split into a raw group (A, AAAA, NS, CNAME, PTR, MX, TXT, HINFO, SOA, RP verbatim off the
//! wire) and a cooked group (NS, PTR, MX, SOA, RP, and the `Addr` pseudo-type) whose parsing can
//! spawn child queries to resolve embedded hostnames to addresses.

pub mod parse;
pub mod types;

pub use types::{HostAddr, Record, SoaData, Type};
