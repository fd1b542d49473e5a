//! Shared state threaded through every system for one tick.
//!
//! Nothing here is global: the engine owns each piece and lends them to the
//! systems through [`SimContext`].

use std::collections::{BTreeMap, BTreeSet};

use millwright_logic::catalog::DefinitionCatalog;
use millwright_logic::config::EconomyConfig;
use millwright_logic::dispatch::TaskDispatcher;
use millwright_logic::ids::{EntityId, ResourceKind, TeamId};
use millwright_logic::storage::ReservationTable;
use serde::{Deserialize, Serialize};

use crate::interfaces::{Alert, AlertSink, Locomotion};

/// Per-team reservations against storage stock, plus how much of each
/// storage's stock those reservations are routed through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageNetwork {
    tables: BTreeMap<TeamId, ReservationTable>,
    earmarks: BTreeMap<(EntityId, ResourceKind), u32>,
}

impl StorageNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, team: TeamId) -> Option<&ReservationTable> {
        self.tables.get(&team)
    }

    pub fn table_mut(&mut self, team: TeamId) -> &mut ReservationTable {
        self.tables.entry(team).or_default()
    }

    /// Route `amount` of a reservation through `storage`.
    pub fn earmark(&mut self, storage: EntityId, kind: ResourceKind, amount: u32) {
        if amount > 0 {
            *self.earmarks.entry((storage, kind)).or_default() += amount;
        }
    }

    /// Give back up to `amount` of an earmark. Returns the amount removed.
    pub fn unearmark(&mut self, storage: EntityId, kind: ResourceKind, amount: u32) -> u32 {
        let Some(held) = self.earmarks.get_mut(&(storage, kind)) else {
            return 0;
        };
        let removed = amount.min(*held);
        *held -= removed;
        if *held == 0 {
            self.earmarks.remove(&(storage, kind));
        }
        removed
    }

    /// Units of `kind` at `storage` already promised to some hauler.
    pub fn earmarked(&self, storage: EntityId, kind: ResourceKind) -> u32 {
        self.earmarks.get(&(storage, kind)).copied().unwrap_or(0)
    }

    /// Forget earmarks on a storage that no longer exists.
    pub fn forget_storage(&mut self, storage: EntityId) {
        self.earmarks.retain(|(id, _), _| *id != storage);
    }

    /// Drop every claim aimed at `destination`, whichever team made it.
    pub fn release_destination(&mut self, destination: EntityId) {
        for table in self.tables.values_mut() {
            table.release_destination(destination);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|t| t.is_empty()) && self.earmarks.is_empty()
    }
}

/// World-mutation notices collected during a tick and consumed by the task
/// generator on the next one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBus {
    changed: BTreeSet<EntityId>,
    removed: BTreeSet<EntityId>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_changed(&mut self, id: EntityId) {
        if !self.removed.contains(&id) {
            self.changed.insert(id);
        }
    }

    pub fn mark_removed(&mut self, id: EntityId) {
        self.changed.remove(&id);
        self.removed.insert(id);
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    /// Take everything queued so far as `(changed, removed)`.
    pub fn drain(&mut self) -> (Vec<EntityId>, Vec<EntityId>) {
        let changed = std::mem::take(&mut self.changed).into_iter().collect();
        let removed = std::mem::take(&mut self.removed).into_iter().collect();
        (changed, removed)
    }
}

/// Everything a system may touch besides the ECS world.
pub struct SimContext<'a> {
    pub catalog: &'a DefinitionCatalog,
    pub config: &'a EconomyConfig,
    pub dispatcher: &'a mut TaskDispatcher,
    pub network: &'a mut StorageNetwork,
    pub events: &'a mut EventBus,
    pub alerts: &'a mut dyn AlertSink,
    pub locomotion: &'a dyn Locomotion,
    /// Simulation seconds since start.
    pub now: f64,
}

impl SimContext<'_> {
    pub fn alert(&mut self, alert: Alert) -> bool {
        self.alerts.raise(self.now, alert)
    }
}
