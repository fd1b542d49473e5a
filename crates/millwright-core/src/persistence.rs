//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for efficient binary serialization of the entire simulation.
//! Components are serialized individually then reconstructed on load. Entity
//! handles are restored bit for bit, since components refer to each other by
//! `EntityId`.

use hecs::{Entity, EntityBuilder, World};
use millwright_logic::dispatch::TaskDispatcher;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

use crate::components::*;
use crate::context::{EventBus, StorageNetwork};

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the simulation state
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Simulation time in seconds
    pub sim_time: f64,
    pub tick: u64,
    pub time_scale: f32,
    pub dispatcher: TaskDispatcher,
    pub network: StorageNetwork,
    /// World changes not yet seen by the task generator
    pub events: EventBus,
    /// All entities with their components
    pub entities: Vec<SerializableEntity>,
}

/// All possible components for an entity, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableEntity {
    pub bits: u64,

    // Core
    pub position: Option<Position>,
    pub name: Option<Name>,

    // Buildings
    pub building: Option<Building>,
    pub storage: Option<StorageLedger>,
    pub station: Option<ProductionStation>,
    pub site: Option<ConstructionSite>,
    pub crew: Option<SiteCrew>,
    pub house: Option<House>,

    // World objects and people
    pub node: Option<ResourceNode>,
    pub civilian: Option<Civilian>,
}

fn cloned<T: hecs::Component + Clone>(entity: hecs::EntityRef<'_>) -> Option<T> {
    entity.get::<&T>().map(|c| (*c).clone())
}

/// Extract all entities from a world into serializable form
fn serialize_entities(world: &World) -> Vec<SerializableEntity> {
    let mut entities: Vec<SerializableEntity> = world
        .iter()
        .map(|entity_ref| SerializableEntity {
            bits: entity_ref.entity().to_bits().get(),
            position: cloned(entity_ref),
            name: cloned(entity_ref),
            building: cloned(entity_ref),
            storage: cloned(entity_ref),
            station: cloned(entity_ref),
            site: cloned(entity_ref),
            crew: cloned(entity_ref),
            house: cloned(entity_ref),
            node: cloned(entity_ref),
            civilian: cloned(entity_ref),
        })
        .collect();
    entities.sort_by_key(|e| e.bits);
    entities
}

/// Rebuild a world from serialized entities
fn deserialize_entities(world: &mut World, entities: Vec<SerializableEntity>) -> Result<(), SaveError> {
    for se in entities {
        let handle = Entity::from_bits(se.bits).ok_or(SaveError::InvalidEntity(se.bits))?;
        let mut builder = EntityBuilder::new();
        if let Some(c) = se.position {
            builder.add(c);
        }
        if let Some(c) = se.name {
            builder.add(c);
        }
        if let Some(c) = se.building {
            builder.add(c);
        }
        if let Some(c) = se.storage {
            builder.add(c);
        }
        if let Some(c) = se.station {
            builder.add(c);
        }
        if let Some(c) = se.site {
            builder.add(c);
        }
        if let Some(c) = se.crew {
            builder.add(c);
        }
        if let Some(c) = se.house {
            builder.add(c);
        }
        if let Some(c) = se.node {
            builder.add(c);
        }
        if let Some(c) = se.civilian {
            builder.add(c);
        }
        world.spawn_at(handle, builder.build());
    }
    Ok(())
}

/// Save the complete simulation to a writer
#[allow(clippy::too_many_arguments)]
pub fn save_simulation<W: Write>(
    writer: W,
    world: &World,
    sim_time: f64,
    tick: u64,
    time_scale: f32,
    dispatcher: &TaskDispatcher,
    network: &StorageNetwork,
    events: &EventBus,
) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        sim_time,
        tick,
        time_scale,
        dispatcher: dispatcher.clone(),
        network: network.clone(),
        events: events.clone(),
        entities: serialize_entities(world),
    };

    bincode::serialize_into(writer, &save_data)?;
    log::info!(
        target: "millwright::persistence",
        "saved {} entities at t={:.1}s",
        save_data.entities.len(),
        sim_time
    );
    Ok(())
}

/// Load a simulation from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<LoadedSimulation, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut world = World::new();
    let count = save_data.entities.len();
    deserialize_entities(&mut world, save_data.entities)?;
    log::info!(target: "millwright::persistence", "loaded {} entities", count);

    Ok(LoadedSimulation {
        world,
        sim_time: save_data.sim_time,
        tick: save_data.tick,
        time_scale: save_data.time_scale,
        dispatcher: save_data.dispatcher,
        network: save_data.network,
        events: save_data.events,
    })
}

/// Result of loading a simulation
pub struct LoadedSimulation {
    pub world: World,
    pub sim_time: f64,
    pub tick: u64,
    pub time_scale: f32,
    pub dispatcher: TaskDispatcher,
    pub network: StorageNetwork,
    pub events: EventBus,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Save references invalid entity handle {0:#x}")]
    InvalidEntity(u64),
}
