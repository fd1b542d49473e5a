//! Economy components: buildings, resource nodes, houses.
//!
//! A building entity carries [`Building`] plus whichever functional parts its
//! definition names: `StorageLedger`, `ProductionStation`, [`House`]. While a
//! `ConstructionSite` (and its [`SiteCrew`]) is attached the functional parts
//! are inert.

use std::collections::BTreeSet;

use millwright_logic::ids::{EntityId, ResourceKind, TeamId};
use serde::{Deserialize, Serialize};

/// Marker + identity for a placed building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub def_id: String,
    pub team: TeamId,
}

/// Civilians currently bound to a construction site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteCrew {
    pub builders: BTreeSet<EntityId>,
    pub haulers: BTreeSet<EntityId>,
}

/// A gatherable deposit (tree stand, quarry, berry bush)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub kind: ResourceKind,
    pub remaining: u32,
    pub slots: u32,
    pub seconds_per_unit: f32,
    pub gatherers: BTreeSet<EntityId>,
}

impl ResourceNode {
    pub fn new(kind: ResourceKind, remaining: u32, slots: u32, seconds_per_unit: f32) -> Self {
        Self {
            kind,
            remaining,
            slots,
            seconds_per_unit: seconds_per_unit.max(0.01),
            gatherers: BTreeSet::new(),
        }
    }

    pub fn has_free_slot(&self) -> bool {
        (self.gatherers.len() as u32) < self.slots
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining == 0
    }
}

/// Residence with a fixed number of beds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct House {
    pub capacity: u32,
    pub residents: BTreeSet<EntityId>,
}

impl House {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            residents: BTreeSet::new(),
        }
    }

    pub fn has_vacancy(&self) -> bool {
        (self.residents.len() as u32) < self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_slots() {
        let mut node = ResourceNode::new(ResourceKind(0), 10, 1, 2.0);
        assert!(node.has_free_slot());
        node.gatherers.insert(EntityId(1));
        assert!(!node.has_free_slot());
        assert!(!node.is_depleted());
    }

    #[test]
    fn test_house_vacancy() {
        let mut house = House::new(1);
        assert!(house.has_vacancy());
        house.residents.insert(EntityId(2));
        assert!(!house.has_vacancy());
    }
}
