//! Craft driver: production workers at their work points, plus the buffer
//! errands run by station haulers (or by the workers themselves when the
//! station has no dedicated logistics).

use hecs::World;
use millwright_logic::agent::{AgentEvent, AgentState};
use millwright_logic::ids::{EntityId, ResourceKind, TeamId};
use millwright_logic::tasks::CraftRole;

use super::{apply_event, deposit, haul, move_toward, Agent};
use crate::components::*;
use crate::context::SimContext;
use crate::interfaces::{Alert, AlertKind};
use crate::queries;

/// Where a worker stands to operate `point`.
pub(crate) fn work_point_position(station: Vec2, point: usize) -> Vec2 {
    station + Vec2::new(1.5 * point as f32, 1.5)
}

pub(super) fn drive(world: &World, ctx: &mut SimContext, agent: &mut Agent, dt: f32) {
    let Some(station) = agent.state().target().filter(|_| station_kept(agent.state())) else {
        step_errand(world, ctx, agent, dt);
        return;
    };
    let Some(entity) = entity_of(station).filter(|e| world.contains(*e)) else {
        apply_event(world, ctx, agent, AgentEvent::TargetLost);
        return;
    };
    let seated = world
        .get::<&ProductionStation>(entity)
        .is_ok_and(|s| s.is_assigned(agent.id));
    if !seated {
        apply_event(world, ctx, agent, AgentEvent::Evicted);
        return;
    }

    match *agent.state() {
        AgentState::MovingToWorkPoint { point, waited, .. } => {
            let Some(base) = queries::position_of(world, station) else {
                apply_event(world, ctx, agent, AgentEvent::TargetLost);
                return;
            };
            if move_toward(ctx, agent, work_point_position(base, point), dt) {
                apply_event(world, ctx, agent, AgentEvent::Arrived);
                return;
            }
            let waited = waited + dt;
            if let AgentState::MovingToWorkPoint { waited: clock, .. } = agent.civ.machine.state_mut() {
                *clock = waited;
            }
            if waited >= ctx.config.workers.work_point_stall_seconds {
                let message = format!("{} could not reach its work point", agent.id);
                ctx.alert(Alert::new(AlertKind::WorkerStalled, agent.team(), Some(agent.id), message));
                apply_event(world, ctx, agent, AgentEvent::Stalled);
            }
        }
        AgentState::Crafting { .. } => {
            if self_service_due(world, ctx, agent.team(), station) {
                apply_event(world, ctx, agent, AgentEvent::ServiceStation);
            }
        }
        _ => {}
    }
}

/// States driven by the work-point half of this module.
fn station_kept(state: &AgentState) -> bool {
    matches!(state, AgentState::MovingToWorkPoint { .. } | AgentState::Crafting { .. })
}

/// A production worker leaves its point to tend the buffers only when the
/// station has no haulers of its own, nobody else is already out, and there
/// is something to do.
fn self_service_due(world: &World, ctx: &SimContext, team: TeamId, station: EntityId) -> bool {
    let Some(entity) = entity_of(station) else {
        return false;
    };
    let Ok(s) = world.get::<&ProductionStation>(entity) else {
        return false;
    };
    if s.requires_hauler_logistics() || s.errand_count() > 0 {
        return false;
    }
    if s.has_any_output_queued() {
        return true;
    }
    s.needs_any_input()
        && s.try_get_input_request()
            .is_some_and(|req| available(world, ctx, team, req.kind) > 0)
}

/// Team stock of `kind` not yet promised elsewhere.
fn available(world: &World, ctx: &SimContext, team: TeamId, kind: ResourceKind) -> u32 {
    let reserved = ctx.network.table(team).map(|t| t.total_reserved(kind)).unwrap_or(0);
    queries::team_supply(world, team, kind).saturating_sub(reserved)
}

fn role_seated(station: &ProductionStation, worker: EntityId, role: CraftRole) -> bool {
    match role {
        CraftRole::Production => station.is_assigned(worker),
        CraftRole::Hauler => station.is_hauler(worker),
    }
}

fn step_errand(world: &World, ctx: &mut SimContext, agent: &mut Agent, dt: f32) {
    let (station, role) = match *agent.state() {
        AgentState::ServicingStation { station, role }
        | AgentState::FetchingInput { station, role, .. }
        | AgentState::DeliveringInput { station, role, .. }
        | AgentState::CollectingOutput { station, role }
        | AgentState::StoringGoods { station, role, .. } => (station, role),
        _ => return,
    };
    let Some(entity) = entity_of(station).filter(|e| world.contains(*e)) else {
        apply_event(world, ctx, agent, AgentEvent::TargetLost);
        return;
    };
    let seated = world
        .get::<&ProductionStation>(entity)
        .is_ok_and(|s| role_seated(&s, agent.id, role));
    if !seated {
        apply_event(world, ctx, agent, AgentEvent::Evicted);
        return;
    }

    match *agent.state() {
        AgentState::ServicingStation { .. } => service(world, ctx, agent, station, role),
        AgentState::FetchingInput {
            storage, kind, reserved, ..
        } => {
            let Some(target) = queries::position_of(world, storage) else {
                apply_event(world, ctx, agent, AgentEvent::StorageLost);
                return;
            };
            if !move_toward(ctx, agent, target, dt) {
                return;
            }
            let event = haul::pick_up(world, ctx, agent, storage, station, kind, reserved);
            apply_event(world, ctx, agent, event);
        }
        AgentState::DeliveringInput { kind, .. } => {
            let Some(target) = queries::position_of(world, station) else {
                apply_event(world, ctx, agent, AgentEvent::TargetLost);
                return;
            };
            if !move_toward(ctx, agent, target, dt) {
                return;
            }
            let carried = agent.civ.carried();
            let accepted = world
                .get::<&mut ProductionStation>(entity)
                .map(|mut s| s.deposit_input(kind, carried))
                .unwrap_or(0);
            agent.civ.unload(accepted);
            let event = if agent.civ.is_carrying() {
                AgentEvent::CarryRemains
            } else {
                AgentEvent::CarryEmpty
            };
            apply_event(world, ctx, agent, event);
        }
        AgentState::CollectingOutput { .. } => {
            let Some(target) = queries::position_of(world, station) else {
                apply_event(world, ctx, agent, AgentEvent::TargetLost);
                return;
            };
            if !move_toward(ctx, agent, target, dt) {
                return;
            }
            let capacity = ctx.config.workers.carry_capacity;
            let room = capacity.saturating_sub(agent.civ.carried());
            let taken = world
                .get::<&mut ProductionStation>(entity)
                .ok()
                .and_then(|mut s| {
                    let line = s.try_get_output_request()?;
                    Some((line.kind, s.take_output(line.kind, line.amount.min(room))))
                });
            let event = match taken {
                Some((kind, amount)) if amount > 0 => {
                    agent.civ.load(kind, amount, capacity);
                    AgentEvent::StoreCarry
                }
                _ => AgentEvent::PickupFailed,
            };
            apply_event(world, ctx, agent, event);
        }
        AgentState::StoringGoods { storage, .. } => {
            deposit::deliver_to_storage(world, ctx, agent, storage, dt);
        }
        _ => {}
    }
}

/// Decide the next errand at the station: empty the output first, then top
/// up the most depleted input. Production workers with nothing to do walk
/// back to their point; haulers wait at the station.
fn service(world: &World, ctx: &mut SimContext, agent: &mut Agent, station: EntityId, role: CraftRole) {
    let Some(entity) = entity_of(station) else {
        return;
    };
    let (output_waiting, input_request, point) = {
        let Ok(s) = world.get::<&ProductionStation>(entity) else {
            return;
        };
        let wants_input = role == CraftRole::Hauler || s.needs_any_input();
        (
            s.has_any_output_queued(),
            s.try_get_input_request().filter(|_| wants_input),
            s.work_point_of(agent.id),
        )
    };

    if output_waiting {
        apply_event(world, ctx, agent, AgentEvent::CollectOutput);
        return;
    }

    if let Some(request) = input_request {
        let team = agent.team();
        let capacity = ctx.config.workers.carry_capacity;
        let supply = queries::team_supply(world, team, request.kind);
        let table = ctx.network.table_mut(team);
        let need = request
            .amount
            .saturating_sub(table.committed_for_site(station, request.kind));
        let granted = table.reserve(station, request.kind, need.min(capacity), supply);
        if granted > 0 {
            match queries::nearest_supplier(world, ctx.network, team, request.kind, agent.pos, granted) {
                Some((storage, free)) => {
                    let reserved = granted.min(free);
                    ctx.network.table_mut(team).release(station, request.kind, granted - reserved);
                    ctx.network.earmark(storage, request.kind, reserved);
                    apply_event(
                        world,
                        ctx,
                        agent,
                        AgentEvent::FetchInput {
                            storage,
                            kind: request.kind,
                            reserved,
                        },
                    );
                    return;
                }
                None => {
                    ctx.network.table_mut(team).release(station, request.kind, granted);
                }
            }
        } else if need > 0 {
            let message = format!("station {} is short of {}", station, ctx.catalog.resource_name(request.kind));
            ctx.alert(Alert::new(AlertKind::InputShortage, team, Some(station), message));
        }
    }

    if role == CraftRole::Production {
        match point {
            Some(point) => {
                apply_event(world, ctx, agent, AgentEvent::ReturnToPoint { point });
            }
            None => {
                apply_event(world, ctx, agent, AgentEvent::Evicted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::agent::Assignment;
    use millwright_logic::production::ProductionStation;
    use millwright_logic::tasks::{JobRole, Specialization};

    struct Mill {
        station: hecs::Entity,
        wood: ResourceKind,
        plank: ResourceKind,
    }

    fn sawmill(harness: &mut Harness) -> Mill {
        let wood = harness.catalog.resource("wood").unwrap();
        let plank = harness.catalog.resource("plank").unwrap();
        let def = harness.catalog.building("sawmill").unwrap();
        let station_def = def.station.as_ref().unwrap();
        let recipe = harness
            .catalog
            .recipe_by_id(station_def.default_recipe().unwrap())
            .unwrap()
            .clone();
        let station = ProductionStation::new(station_def.spec.clone(), harness.config.production.station_tuning())
            .with_recipe(recipe);
        let station = harness.world.spawn((
            Building {
                def_id: "sawmill".into(),
                team: TeamId(0),
            },
            station,
            Position::default(),
        ));
        Mill { station, wood, plank }
    }

    fn seated_carpenter(harness: &mut Harness, mill: &Mill) -> Agent {
        let civ = Civilian::new(TeamId(0), JobRole::Crafter).with_specialization(Specialization::Carpenter);
        let entity = harness.world.spawn((civ, Position::default()));
        let id = id_of(entity);
        let point = {
            let mut station = harness.world.get::<&mut ProductionStation>(mill.station).unwrap();
            station.assign_worker(id, Some(Specialization::Carpenter), 1.0).unwrap();
            station.reserve_work_point(id).unwrap()
        };
        let mut agent = Agent::load(&harness.world, entity).unwrap();
        agent.civ.machine.handle(AgentEvent::Assigned(Assignment::Craft {
            station: id_of(mill.station),
            point,
        }));
        agent
    }

    #[test]
    fn test_worker_reaches_point_and_is_present() {
        let mut harness = Harness::new();
        let mill = sawmill(&mut harness);
        let mut agent = seated_carpenter(&mut harness, &mill);
        for _ in 0..5 {
            harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        }
        assert!(matches!(agent.state(), AgentState::Crafting { .. }));
        let station = harness.world.get::<&ProductionStation>(mill.station).unwrap();
        assert_eq!(station.active_workers(), 1);
    }

    #[test]
    fn test_worker_collects_output_then_returns() {
        let mut harness = Harness::new();
        let mill = sawmill(&mut harness);
        let mut ledger = StorageLedger::new();
        ledger.set_capacity(mill.plank, 50);
        harness.world.spawn((
            Building {
                def_id: "stockpile".into(),
                team: TeamId(0),
            },
            ledger,
            Position::new(3.0, 0.0),
        ));
        let mut agent = seated_carpenter(&mut harness, &mill);
        for _ in 0..5 {
            harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        }
        {
            let mut station = harness.world.get::<&mut ProductionStation>(mill.station).unwrap();
            assert_eq!(station.deposit_input(mill.wood, 2), 2);
            station.tick(10.0);
            assert_eq!(station.output_stored(mill.plank), 1);
        }

        let mut visited = Vec::new();
        for _ in 0..40 {
            harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
            visited.push(agent.state().label());
            if matches!(agent.state(), AgentState::Crafting { .. }) && visited.contains(&"storing_goods") {
                break;
            }
        }
        assert!(visited.contains(&"collecting_output"));
        assert!(matches!(agent.state(), AgentState::Crafting { .. }));
        assert!(!agent.civ.is_carrying());
        let station = harness.world.get::<&ProductionStation>(mill.station).unwrap();
        assert_eq!(station.errand_count(), 0);
        assert!(!station.has_any_output_queued());
    }

    #[test]
    fn test_unreachable_point_stalls() {
        let mut harness = Harness::new();
        harness.mover.speed = 0.0;
        let mill = sawmill(&mut harness);
        let mut agent = seated_carpenter(&mut harness, &mill);
        let stall = harness.config.workers.work_point_stall_seconds;
        harness.run(|world, ctx| drive(world, ctx, &mut agent, stall + 1.0));
        assert_eq!(agent.state(), &AgentState::SearchingStation);
        let station = harness.world.get::<&ProductionStation>(mill.station).unwrap();
        assert!(!station.is_assigned(agent.id));
        assert_eq!(harness.alerts.delivered()[0].kind, AlertKind::WorkerStalled);
    }
}
