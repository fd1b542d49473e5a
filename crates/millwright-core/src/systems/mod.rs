//! Systems - logic that operates on components
//!
//! Run once per tick in this order: construction, needs, production,
//! task generator, agents.

mod agents;
mod construction;
mod needs;
mod production;
mod task_generator;

pub use agents::*;
pub use construction::*;
pub use needs::*;
pub use production::*;
pub use task_generator::*;
