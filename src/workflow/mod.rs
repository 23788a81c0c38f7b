//! The document-analysis workflow: phases, the pure transition function and
//! the coordinator that drives them.

mod coordinator;
mod machine;
mod phase;

pub use coordinator::{Coordinator, WorkflowSettings};
pub use machine::{transition, Effect, Event, Step};
pub use phase::{Controls, Phase, PhaseKind, Ticket};
