pub mod action_value;
pub mod policy;
pub mod td;

pub use action_value::{ActionValueTable, PreferredTieBreak, TableOptions};
pub use policy::{fallback_action, ValueModel};
pub use td::{TdOutcome, Transition, UpdatedTable};
