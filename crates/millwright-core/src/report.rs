//! Serializable snapshot of the economy for hosts, logs and the harness.

use std::collections::BTreeMap;

use millwright_logic::ids::ResourceKind;
use millwright_logic::production::StationState;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::engine::EconomyEngine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReport {
    pub id: u64,
    pub building: String,
    pub team: i32,
    pub recipe: Option<String>,
    pub state: StationState,
    pub upgrade_level: u32,
    pub assigned_workers: u32,
    pub active_workers: u32,
    pub haulers: u32,
    pub inputs: BTreeMap<String, u32>,
    pub outputs: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteReport {
    pub id: u64,
    pub building: String,
    pub team: i32,
    /// Units still to be delivered
    pub missing: u32,
    /// Labor progress, 0..=1
    pub progress: f32,
    pub builders: usize,
    pub haulers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyReport {
    pub sim_time: f64,
    pub tick: u64,
    pub civilians: usize,
    /// Civilians per state label
    pub states: BTreeMap<String, usize>,
    /// Stored units per team, per resource id (finished storages only)
    pub stock: BTreeMap<i32, BTreeMap<String, u32>>,
    /// Units left in gatherable nodes, per resource id
    pub node_reserves: BTreeMap<String, u32>,
    pub stations: Vec<StationReport>,
    pub sites: Vec<SiteReport>,
    pub pending_tasks: usize,
    pub open_reservations: bool,
}

impl EconomyReport {
    pub fn collect(engine: &EconomyEngine) -> Self {
        let world = &engine.world;
        let catalog = &engine.catalog;
        let name = |kind: ResourceKind| catalog.resource_def(kind).map(|r| r.id.clone()).unwrap_or_default();

        let mut states = BTreeMap::new();
        let mut civilians = 0;
        for (_, civ) in world.query::<&Civilian>().iter() {
            civilians += 1;
            *states.entry(civ.state().label().to_string()).or_insert(0) += 1;
        }

        let mut stock: BTreeMap<i32, BTreeMap<String, u32>> = BTreeMap::new();
        for (_, (building, ledger, site)) in world
            .query::<(&Building, &StorageLedger, Option<&ConstructionSite>)>()
            .iter()
        {
            if site.is_some() {
                continue;
            }
            let team = stock.entry(building.team.0).or_default();
            for (kind, entry) in ledger.entries() {
                if entry.stored > 0 {
                    *team.entry(name(kind)).or_insert(0) += entry.stored;
                }
            }
        }

        let mut node_reserves = BTreeMap::new();
        for (_, node) in world.query::<&ResourceNode>().iter() {
            *node_reserves.entry(name(node.kind)).or_insert(0) += node.remaining;
        }

        let mut stations: Vec<StationReport> = world
            .query::<(&Building, &ProductionStation)>()
            .iter()
            .map(|(entity, (building, station))| StationReport {
                id: id_of(entity).0,
                building: building.def_id.clone(),
                team: building.team.0,
                recipe: station.recipe().map(|r| r.name.clone()),
                state: station.state(),
                upgrade_level: station.upgrade_level(),
                assigned_workers: station.assigned_count(),
                active_workers: station.active_workers(),
                haulers: station.hauler_count(),
                inputs: station.inputs().map(|(k, v)| (name(k), v)).collect(),
                outputs: station.outputs().map(|(k, v)| (name(k), v)).collect(),
            })
            .collect();
        stations.sort_by_key(|s| s.id);

        let mut sites: Vec<SiteReport> = world
            .query::<(&Building, &ConstructionSite, Option<&SiteCrew>)>()
            .iter()
            .map(|(entity, (building, site, crew))| SiteReport {
                id: id_of(entity).0,
                building: building.def_id.clone(),
                team: building.team.0,
                missing: site.total_remaining(),
                progress: site.progress(),
                builders: crew.map(|c| c.builders.len()).unwrap_or(0),
                haulers: crew.map(|c| c.haulers.len()).unwrap_or(0),
            })
            .collect();
        sites.sort_by_key(|s| s.id);

        Self {
            sim_time: engine.sim_time(),
            tick: engine.tick_count(),
            civilians,
            states,
            stock,
            node_reserves,
            stations,
            sites,
            pending_tasks: engine.pending_tasks(),
            open_reservations: !engine.network.is_empty(),
        }
    }

    /// Stored units of a resource for one team.
    pub fn team_stock(&self, team: i32, resource: &str) -> u32 {
        self.stock
            .get(&team)
            .and_then(|s| s.get(resource))
            .copied()
            .unwrap_or(0)
    }

    pub fn in_state(&self, label: &str) -> usize {
        self.states.get(label).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use millwright_logic::ids::TeamId;

    #[test]
    fn test_report_counts_finished_storage_only() {
        let mut engine = EconomyEngine::new();
        let store = engine.place_building("stockpile", TeamId(0), Vec2::ZERO).unwrap();
        engine.stock(store, "wood", 12).unwrap();
        let warehouse = engine.place_building("warehouse", TeamId(0), Vec2::new(4.0, 0.0)).unwrap();
        engine.stock(warehouse, "wood", 30).unwrap();
        engine.place_building("sawmill", TeamId(1), Vec2::new(9.0, 0.0)).unwrap();

        let report = engine.report();
        assert_eq!(report.team_stock(0, "wood"), 12);
        assert_eq!(report.sites.len(), 2);
        assert_eq!(report.stations.len(), 1);
        assert_eq!(report.stations[0].team, 1);
        assert_eq!(report.stations[0].recipe.as_deref(), Some("saw_planks"));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let mut engine = EconomyEngine::new();
        engine.spawn_node("berries", Vec2::ZERO, 25, 2, 1.0).unwrap();
        let json = serde_json::to_string(&engine.report()).unwrap();
        let back: EconomyReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.node_reserves.get("berries"), Some(&25));
    }
}
