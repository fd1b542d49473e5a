//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems. The rules types from
//! `millwright-logic` (`StorageLedger`, `ProductionStation`,
//! `ConstructionSite`) are attached directly as components.

mod common;
mod economy;
mod people;

pub use common::*;
pub use economy::*;
pub use people::*;

pub use millwright_logic::construction::ConstructionSite;
pub use millwright_logic::production::ProductionStation;
pub use millwright_logic::storage::StorageLedger;
