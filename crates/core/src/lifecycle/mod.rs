//! Ticket lifecycle: the state machine, its serialized execution and
//! resolution of staff messages to tickets.

mod engine;
mod error;
mod locks;
mod resolve;
mod transition;

pub use engine::{LifecycleEngine, Transition};
pub use error::LifecycleError;
pub use locks::KeyedLocks;
pub use resolve::{ResolutionPolicy, TicketReference};
pub use transition::{Operation, Step};
