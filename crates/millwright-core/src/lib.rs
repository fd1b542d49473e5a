//! Millwright Core - Settlement Economy Engine
//!
//! An ECS-based simulation of a settlement's labor economy: civilians gather,
//! haul, build and craft while keeping themselves fed and rested, and every
//! unit of stock, every work slot and every storage claim is accounted for.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Civilians, buildings, resource nodes
//! - **Components**: Pure data attached to entities (Position, Civilian,
//!   StorageLedger, ProductionStation, ConstructionSite, ...)
//! - **Systems**: Logic that queries and updates components, run in a fixed
//!   order each tick
//!
//! The rules themselves live in `millwright-logic`; this crate wires them to
//! a world and threads the shared ledgers through [`context::SimContext`].
//!
//! # Example
//!
//! ```rust,no_run
//! use millwright_core::prelude::*;
//! use millwright_core::generation::{generate_settlement, SettlementConfig};
//!
//! let mut engine = EconomyEngine::new();
//!
//! // Lay out a starting settlement
//! generate_settlement(&mut engine, &SettlementConfig::default()).unwrap();
//!
//! // Run simulation
//! loop {
//!     engine.update(1.0 / 20.0);
//!     for alert in engine.drain_alerts() {
//!         println!("{}", alert.message);
//!     }
//! }
//! ```

pub mod components;
pub mod context;
pub mod engine;
pub mod generation;
pub mod interfaces;
pub mod persistence;
pub mod queries;
pub mod report;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{CivilianSpawn, CommandError, EconomyEngine};
    pub use crate::interfaces::{Alert, AlertKind, AlertSink, Locomotion};
    pub use millwright_logic::agent::AgentState;
    pub use millwright_logic::ids::{EntityId, TeamId};
    pub use millwright_logic::storage::FlowMode;
    pub use millwright_logic::tasks::{JobRole, Specialization};
}
