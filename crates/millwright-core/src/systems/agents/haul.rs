//! Haul driver: collect reserved stock and carry it to a construction site.

use hecs::World;
use millwright_logic::agent::{AgentEvent, AgentState};
use millwright_logic::ids::{EntityId, ResourceKind};

use super::{apply_event, move_toward, Agent};
use crate::components::*;
use crate::context::SimContext;
use crate::queries;

pub(super) fn drive(world: &World, ctx: &mut SimContext, agent: &mut Agent, dt: f32) {
    match *agent.state() {
        AgentState::MovingToPickup {
            site,
            storage,
            kind,
            reserved,
        } => {
            if !site_open(world, site) {
                apply_event(world, ctx, agent, AgentEvent::TargetLost);
                return;
            }
            let Some(target) = queries::position_of(world, storage) else {
                apply_event(world, ctx, agent, AgentEvent::StorageLost);
                return;
            };
            if !move_toward(ctx, agent, target, dt) {
                return;
            }
            let event = pick_up(world, ctx, agent, storage, site, kind, reserved);
            apply_event(world, ctx, agent, event);
        }
        AgentState::DeliveringToSite { site, kind, .. } => {
            let target = queries::position_of(world, site).filter(|_| site_open(world, site));
            let Some(target) = target else {
                apply_event(world, ctx, agent, AgentEvent::TargetLost);
                return;
            };
            if !move_toward(ctx, agent, target, dt) {
                return;
            }
            let carried = agent.civ.carried();
            let accepted = entity_of(site)
                .and_then(|e| world.get::<&mut ConstructionSite>(e).ok())
                .map(|mut tracker| tracker.receive_delivery(kind, carried))
                .unwrap_or(0);
            agent.civ.unload(accepted);
            ctx.events.mark_changed(site);
            let event = if agent.civ.is_carrying() {
                AgentEvent::CarryRemains
            } else {
                AgentEvent::CarryEmpty
            };
            apply_event(world, ctx, agent, event);
        }
        _ => {}
    }
}

fn site_open(world: &World, site: EntityId) -> bool {
    entity_of(site).is_some_and(|e| world.get::<&ConstructionSite>(e).is_ok_and(|s| !s.materials_complete()))
}

/// Withdraw up to the reserved amount and turn it into in-transit stock.
/// Shared with station input fetching; `destination` owns the reservation.
pub(super) fn pick_up(
    world: &World,
    ctx: &mut SimContext,
    agent: &mut Agent,
    storage: EntityId,
    destination: EntityId,
    kind: ResourceKind,
    reserved: u32,
) -> AgentEvent {
    let room = ctx
        .config
        .workers
        .carry_capacity
        .saturating_sub(agent.civ.carried());
    let taken = entity_of(storage)
        .and_then(|e| world.get::<&mut StorageLedger>(e).ok())
        .map(|mut ledger| ledger.withdraw(kind, reserved.min(room)))
        .unwrap_or(0);
    if taken == 0 {
        return AgentEvent::PickupFailed;
    }
    let loaded = agent.civ.load(kind, taken, ctx.config.workers.carry_capacity);
    ctx.network
        .table_mut(agent.team())
        .consume_reserved(destination, kind, loaded);
    ctx.network.unearmark(storage, kind, loaded);
    match agent.civ.machine.state_mut() {
        AgentState::MovingToPickup { reserved, .. } | AgentState::FetchingInput { reserved, .. } => {
            *reserved = reserved.saturating_sub(loaded);
        }
        _ => {}
    }
    AgentEvent::PickedUp { amount: loaded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::agent::Assignment;
    use millwright_logic::ids::{ResourceAmount, TeamId};
    use millwright_logic::tasks::JobRole;

    #[test]
    fn test_haul_moves_reserved_stock_to_site() {
        let mut harness = Harness::new();
        let team = TeamId(0);
        let wood = ResourceKind(0);
        let mut ledger = StorageLedger::new();
        ledger.set_capacity(wood, 50);
        ledger.deposit(wood, 5);
        let store = harness.world.spawn((
            Building {
                def_id: "stockpile".into(),
                team,
            },
            ledger,
            Position::new(0.5, 0.0),
        ));
        let site = harness.world.spawn((
            Building {
                def_id: "house".into(),
                team,
            },
            ConstructionSite::new(&[ResourceAmount::new(wood, 8)], 5.0),
            SiteCrew::default(),
            Position::new(0.0, 0.5),
        ));
        let granted = harness.network.table_mut(team).reserve(id_of(site), wood, 8, 5);
        assert_eq!(granted, 5);

        let mut civ = Civilian::new(team, JobRole::Hauler);
        civ.machine.handle(AgentEvent::Assigned(Assignment::Haul {
            site: id_of(site),
            storage: id_of(store),
            kind: wood,
            reserved: granted,
        }));
        let entity = harness.world.spawn((civ, Position::default()));
        let mut agent = Agent::load(&harness.world, entity).unwrap();

        harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        assert_eq!(
            agent.state(),
            &AgentState::DeliveringToSite {
                site: id_of(site),
                kind: wood,
                in_transit: 5
            }
        );
        assert_eq!(harness.network.table(team).unwrap().committed_for_site(id_of(site), wood), 5);
        assert_eq!(harness.network.table(team).unwrap().total_reserved(wood), 0);

        harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        assert_eq!(agent.state(), &AgentState::SearchingHaul);
        assert_eq!(harness.world.get::<&ConstructionSite>(site).unwrap().delivered(wood), 5);
        assert!(harness.network.is_empty());
    }
}
