//! Supervisor module: tail workers, their coordinator, and the restart policy.

mod coordinator;
mod policy;
mod state;
mod worker;

pub use coordinator::*;
pub use policy::*;
pub use state::*;
