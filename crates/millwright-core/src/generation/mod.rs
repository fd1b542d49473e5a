//! Generation - procedural creation of starting settlements

mod names;
mod settlement;

pub use names::*;
pub use settlement::*;
