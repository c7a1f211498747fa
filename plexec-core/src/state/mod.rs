//! The node life-cycle state machine.
//!
//! Each node type maps to a [`TypeStateTable`] holding, per state, a pure
//! destination computer, an exit handler, an entry handler and the set of
//! conditions active in that state. Tables are built by specializing a
//! base table that covers INACTIVE, WAITING, ITERATION_ENDED and FINISHED.
//!
//! | Table          | Node types                | Adds                         |
//! |----------------|---------------------------|------------------------------|
//! | `default`      | Empty, Assignment         | EXECUTING                    |
//! | `action`       | Command, Update, Request  | EXECUTING, FAILING           |
//! | `list`         | List                      | EXECUTING, FINISHING, FAILING|
//! | `library_call` | LibraryNodeCall           | overrides list EXECUTING, FINISHING |

mod action;
mod base;
mod context;
mod default;
mod list;
mod registry;
mod table;

pub use action::action_table;
pub use base::base_table;
pub use context::{AssignmentRequest, Effects, NodeView, TransitionContext};
pub use default::default_table;
pub use list::{library_call_table, list_table};
pub use registry::{StateTableRegistry, reachable_states};
pub use table::{EntryHandler, ExitHandler, StateComputer, StateHandler, TableBuilder, TypeStateTable};

#[cfg(test)]
mod tests;
