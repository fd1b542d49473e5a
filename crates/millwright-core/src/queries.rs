//! Nearest-match lookups over the world.
//!
//! Only finished buildings count: anything still carrying a
//! `ConstructionSite` is skipped. Ties on distance go to the lower entity id
//! so results are deterministic.

use hecs::World;
use millwright_logic::ids::{EntityId, ResourceKind, TeamId};

use crate::components::*;
use crate::context::StorageNetwork;

fn nearest<I>(candidates: I, from: Vec2) -> Option<EntityId>
where
    I: IntoIterator<Item = (EntityId, Vec2)>,
{
    candidates
        .into_iter()
        .map(|(id, pos)| (from.distance_squared(&pos), id))
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)))
        .map(|(_, id)| id)
}

/// Finished storages belonging to `team`, with their ledger and position.
fn storages(world: &World, team: TeamId, mut visit: impl FnMut(EntityId, &StorageLedger, Vec2)) {
    for (entity, (building, ledger, pos, site)) in world
        .query::<(&Building, &StorageLedger, &Position, Option<&ConstructionSite>)>()
        .iter()
    {
        if site.is_some() || building.team != team {
            continue;
        }
        visit(id_of(entity), ledger, pos.0);
    }
}

/// Withdrawable stock of `kind` across the team's storages.
pub fn team_supply(world: &World, team: TeamId, kind: ResourceKind) -> u32 {
    let mut total = 0;
    storages(world, team, |_, ledger, _| total += ledger.supply_of(kind));
    total
}

/// Closest storage that can hand over `kind`, with the amount not yet
/// earmarked for other haulers. Prefers one covering all of `wanted`; falls
/// back to any with unclaimed stock.
pub fn nearest_supplier(
    world: &World,
    network: &StorageNetwork,
    team: TeamId,
    kind: ResourceKind,
    from: Vec2,
    wanted: u32,
) -> Option<(EntityId, u32)> {
    let mut full = Vec::new();
    let mut partial = Vec::new();
    let mut free = std::collections::BTreeMap::new();
    storages(world, team, |id, ledger, pos| {
        let unclaimed = ledger.supply_of(kind).saturating_sub(network.earmarked(id, kind));
        if unclaimed >= wanted.max(1) {
            full.push((id, pos));
        } else if unclaimed > 0 {
            partial.push((id, pos));
        }
        free.insert(id, unclaimed);
    });
    let id = nearest(full, from).or_else(|| nearest(partial, from))?;
    Some((id, free[&id]))
}

/// Closest storage with room for `kind`.
pub fn nearest_receiver(world: &World, team: TeamId, kind: ResourceKind, from: Vec2) -> Option<EntityId> {
    let mut found = Vec::new();
    storages(world, team, |id, ledger, pos| {
        if ledger.can_receive(kind) {
            found.push((id, pos));
        }
    });
    nearest(found, from)
}

/// Closest storage offering any of the `edible` kinds.
pub fn nearest_food(world: &World, team: TeamId, edible: &[ResourceKind], from: Vec2) -> Option<EntityId> {
    let mut found = Vec::new();
    storages(world, team, |id, ledger, pos| {
        if edible.iter().any(|kind| ledger.supply_of(*kind) > 0) {
            found.push((id, pos));
        }
    });
    nearest(found, from)
}

pub fn nearest_vacant_house(world: &World, team: TeamId, from: Vec2) -> Option<EntityId> {
    let found: Vec<_> = world
        .query::<(&Building, &House, &Position, Option<&ConstructionSite>)>()
        .iter()
        .filter(|(_, (building, house, _, site))| site.is_none() && building.team == team && house.has_vacancy())
        .map(|(entity, (_, _, pos, _))| (id_of(entity), pos.0))
        .collect();
    nearest(found, from)
}

pub fn position_of(world: &World, id: EntityId) -> Option<Vec2> {
    let entity = entity_of(id)?;
    world.get::<&Position>(entity).ok().map(|p| p.0)
}

/// Exists and is not under construction.
pub fn is_active(world: &World, id: EntityId) -> bool {
    entity_of(id).is_some_and(|e| world.contains(e) && world.get::<&ConstructionSite>(e).is_err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use millwright_logic::storage::FlowMode;

    const WOOD: ResourceKind = ResourceKind(0);
    const TEAM: TeamId = TeamId(0);

    fn storage(world: &mut World, x: f32, wood: u32) -> EntityId {
        let mut ledger = StorageLedger::new();
        ledger.set_capacity(WOOD, 100);
        ledger.deposit(WOOD, wood);
        let building = Building {
            def_id: "stockpile".into(),
            team: TEAM,
        };
        id_of(world.spawn((building, ledger, Position::new(x, 0.0))))
    }

    #[test]
    fn test_supplier_prefers_full_load() {
        let mut world = World::new();
        let near = storage(&mut world, 1.0, 2);
        let far = storage(&mut world, 10.0, 20);
        let network = StorageNetwork::new();
        assert_eq!(nearest_supplier(&world, &network, TEAM, WOOD, Vec2::ZERO, 5), Some((far, 20)));
        assert_eq!(nearest_supplier(&world, &network, TEAM, WOOD, Vec2::ZERO, 2), Some((near, 2)));
        assert_eq!(team_supply(&world, TEAM, WOOD), 22);
        assert_eq!(team_supply(&world, TeamId(1), WOOD), 0);
    }

    #[test]
    fn test_sites_and_flow_modes_excluded() {
        let mut world = World::new();
        let site = storage(&mut world, 1.0, 10);
        let blocked = storage(&mut world, 2.0, 10);
        let e = entity_of(site).unwrap();
        world
            .insert_one(e, ConstructionSite::new(&[], 5.0))
            .unwrap();
        world
            .get::<&mut StorageLedger>(entity_of(blocked).unwrap())
            .unwrap()
            .set_flow_mode_all(FlowMode::ReceiveOnly);
        assert_eq!(nearest_supplier(&world, &StorageNetwork::new(), TEAM, WOOD, Vec2::ZERO, 1), None);
        assert_eq!(nearest_receiver(&world, TEAM, WOOD, Vec2::ZERO), Some(blocked));
        assert!(!is_active(&world, site));
        assert!(is_active(&world, blocked));
    }

    #[test]
    fn test_supplier_skips_earmarked_stock() {
        let mut world = World::new();
        let near = storage(&mut world, 1.0, 10);
        let far = storage(&mut world, 10.0, 10);
        let mut network = StorageNetwork::new();
        network.earmark(near, WOOD, 6);
        assert_eq!(nearest_supplier(&world, &network, TEAM, WOOD, Vec2::ZERO, 5), Some((far, 10)));
        assert_eq!(nearest_supplier(&world, &network, TEAM, WOOD, Vec2::ZERO, 4), Some((near, 4)));

        network.earmark(far, WOOD, 10);
        assert_eq!(nearest_supplier(&world, &network, TEAM, WOOD, Vec2::ZERO, 5), Some((near, 4)));
        network.earmark(near, WOOD, 4);
        assert_eq!(nearest_supplier(&world, &network, TEAM, WOOD, Vec2::ZERO, 1), None);
    }
}
