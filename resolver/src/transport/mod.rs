//! Transport & scheduling core: the UDP socket, the opportunistic TCP connection, and the
//! readiness contract the host event loop drives. The host owns the event loop rather than an
//! internal reactor, so these modules expose a plain data contract rather than mailbox callbacks.

pub mod events;
pub mod sigpipe;
pub mod tcp;
pub mod udp;

pub use events::{Interest, PollEntry, ReadySet, WantSet};
pub use tcp::{TcpConn, TcpState};
pub use udp::{UdpSendOutcome, UdpTransport};
