//! Starting settlement: a stocked stockpile, a ring of building sites,
//! resource nodes scattered around it and a population sorted into jobs.

use millwright_logic::ids::{EntityId, TeamId};
use millwright_logic::tasks::{JobRole, Specialization};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::names::generate_name;
use crate::components::Vec2;
use crate::engine::{CivilianSpawn, CommandError, EconomyEngine};

/// A batch of identical gatherable nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCluster {
    pub resource: String,
    pub count: u32,
    pub amount: u32,
    pub slots: u32,
    pub seconds_per_unit: f32,
}

impl NodeCluster {
    pub fn new(resource: impl Into<String>, count: u32, amount: u32) -> Self {
        Self {
            resource: resource.into(),
            count,
            amount,
            slots: 2,
            seconds_per_unit: 2.0,
        }
    }
}

/// Configuration for settlement generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub seed: u64,
    pub team: TeamId,
    pub center: Vec2,
    /// Nodes are scattered out to this distance from the center
    pub radius: f32,
    pub gatherers: u32,
    pub builders: u32,
    pub haulers: u32,
    /// One crafter per entry
    pub crafters: Vec<Specialization>,
    /// Tool handed to every gatherer
    pub gatherer_tool: Option<String>,
    /// Building definitions placed as construction sites
    pub buildings: Vec<String>,
    pub nodes: Vec<NodeCluster>,
    pub starting_stock: Vec<(String, u32)>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            team: TeamId(0),
            center: Vec2::ZERO,
            radius: 40.0,
            gatherers: 4,
            builders: 2,
            haulers: 2,
            crafters: vec![Specialization::Carpenter],
            gatherer_tool: Some("axe".into()),
            buildings: vec!["sawmill".into(), "house".into(), "house".into()],
            nodes: vec![
                NodeCluster {
                    slots: 1,
                    ..NodeCluster::new("wood", 3, 60)
                },
                NodeCluster {
                    slots: 1,
                    ..NodeCluster::new("stone", 2, 40)
                },
                NodeCluster {
                    seconds_per_unit: 1.5,
                    ..NodeCluster::new("berries", 2, 40)
                },
            ],
            starting_stock: vec![("wood".into(), 20), ("berries".into(), 30)],
        }
    }
}

/// Handles to everything a generated settlement put into the world.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub stockpile: EntityId,
    pub buildings: Vec<EntityId>,
    pub nodes: Vec<EntityId>,
    pub civilians: Vec<EntityId>,
}

fn ring_point(center: Vec2, radius: f32, angle: f32) -> Vec2 {
    center + Vec2::new(angle.cos(), angle.sin()) * radius
}

/// Generate a settlement into `engine`. The same seed and catalog always
/// give the same layout.
pub fn generate_settlement(engine: &mut EconomyEngine, config: &SettlementConfig) -> Result<Settlement, CommandError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let team = config.team;

    let stockpile = engine.place_building("stockpile", team, config.center)?;
    for (resource, amount) in &config.starting_stock {
        engine.stock(stockpile, resource, *amount)?;
    }

    let mut settlement = Settlement {
        stockpile,
        buildings: Vec::new(),
        nodes: Vec::new(),
        civilians: Vec::new(),
    };

    let ring = (config.radius * 0.3).max(6.0);
    let count = config.buildings.len().max(1) as f32;
    for (i, def_id) in config.buildings.iter().enumerate() {
        let angle = std::f32::consts::TAU * i as f32 / count;
        let position = ring_point(config.center, ring, angle);
        settlement.buildings.push(engine.place_building(def_id, team, position)?);
    }

    for cluster in &config.nodes {
        for _ in 0..cluster.count {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let distance = rng.gen_range(config.radius * 0.5..=config.radius);
            let position = ring_point(config.center, distance, angle);
            settlement.nodes.push(engine.spawn_node(
                &cluster.resource,
                position,
                cluster.amount,
                cluster.slots,
                cluster.seconds_per_unit,
            )?);
        }
    }

    let mut jobs: Vec<(JobRole, Option<Specialization>)> = Vec::new();
    jobs.extend((0..config.gatherers).map(|_| (JobRole::Gatherer, None)));
    jobs.extend((0..config.builders).map(|_| (JobRole::Builder, None)));
    jobs.extend((0..config.haulers).map(|_| (JobRole::Hauler, None)));
    jobs.extend(config.crafters.iter().map(|s| (JobRole::Crafter, Some(*s))));

    for (role, specialization) in jobs {
        let offset = Vec2::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
        let mut spawn = CivilianSpawn::new(team, role, config.center + offset).named(generate_name(&mut rng));
        spawn.specialization = specialization;
        if role == JobRole::Gatherer {
            spawn.tool = config.gatherer_tool.clone();
        }
        settlement.civilians.push(engine.spawn_civilian(spawn)?);
    }

    log::info!(
        target: "millwright::generation",
        "generated settlement for team {}: {} buildings, {} nodes, {} civilians",
        team,
        settlement.buildings.len() + 1,
        settlement.nodes.len(),
        settlement.civilians.len()
    );
    Ok(settlement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settlement() {
        let mut engine = EconomyEngine::new();
        let config = SettlementConfig::default();
        let settlement = generate_settlement(&mut engine, &config).unwrap();

        assert_eq!(settlement.civilians.len(), 9);
        assert_eq!(settlement.nodes.len(), 7);
        assert_eq!(engine.civilian_count(), 9);
        assert_eq!(engine.building_count(), 4);
        assert_eq!(engine.stored(settlement.stockpile, "wood"), 20);
    }

    #[test]
    fn test_same_seed_same_layout() {
        let config = SettlementConfig::default();
        let mut a = EconomyEngine::new();
        let mut b = EconomyEngine::new();
        let first = generate_settlement(&mut a, &config).unwrap();
        let second = generate_settlement(&mut b, &config).unwrap();
        for (x, y) in first.nodes.iter().zip(&second.nodes) {
            assert_eq!(a.position_of(*x), b.position_of(*y));
        }
    }

    #[test]
    fn test_unknown_building_fails() {
        let mut engine = EconomyEngine::new();
        let config = SettlementConfig {
            buildings: vec!["palace".into()],
            ..Default::default()
        };
        assert_eq!(
            generate_settlement(&mut engine, &config).unwrap_err(),
            CommandError::UnknownBuilding("palace".into())
        );
    }

    #[test]
    fn test_settlement_grows() {
        let mut engine = EconomyEngine::new();
        generate_settlement(&mut engine, &SettlementConfig::default()).unwrap();
        let before = engine.report();
        for _ in 0..600 {
            engine.update(0.5);
        }
        let after = engine.report();
        assert!(after.node_reserves["wood"] < before.node_reserves["wood"]);
        assert!(after.node_reserves["stone"] < before.node_reserves["stone"]);
        assert!(after.sites.len() < before.sites.len());
    }
}
