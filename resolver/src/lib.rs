//! An asynchronous DNS stub resolver library: the host owns the event loop (`select`/`poll`) and
//! drives this crate through [`Resolver::before_select`]/[`Resolver::after_select`] (or the
//! `poll`-array [`Resolver::before_poll`]/[`Resolver::after_poll`] pair); [`Resolver::wait`] is
//! implemented purely on top of the latter for callers that do want a blocking call.
//!
//! Each in-flight query is addressed by a generation-checked handle into
//! [`query::manager::Manager`] rather than an intrusive linked list, and a completed [`Answer`]
//! owns a typed `Vec<Record>` rather than an untyped byte-stride array.

pub mod addr;
pub mod answer;
pub mod config;
pub mod dispatch;
pub mod handle;
pub mod logging;
pub mod query;
pub mod rr;
pub mod status;
pub mod transport;
pub mod wire;

pub use addr::{Addr, AddrFamily, Mask};
pub use answer::Answer;
pub use config::{Config, InitFlags, SearchList, SortEntry, Timeouts};
pub use handle::{CheckOutcome, Resolver};
pub use query::{QueryFlags, QueryHandle, State};
pub use rr::{HostAddr, Record, SoaData, Type};
pub use status::{Band, Status};
