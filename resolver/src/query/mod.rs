//! Query lifecycle: the per-query state machine, its memory accounting, and the manager that owns
//! every in-flight query.

pub mod arena;
pub mod flags;
pub mod manager;
pub mod slot;
pub mod state;

pub use flags::QueryFlags;
pub use slot::{ChildRole, QueryHandle};
pub use state::State;
