//! Task generator - republishes the open-slot deficit of changed targets
//!
//! Runs on the events gathered since the last tick. For each changed node,
//! site or station it works out how many workers the target implies right
//! now and tops the dispatcher queue up (or trims it) to
//! `implied − (queued + assigned)`.

use hecs::World;
use millwright_logic::dispatch::TaskDispatcher;
use millwright_logic::generator::{
    deficit, node_gather_slots, site_build_slots, site_haul_slots, station_hauler_slots, station_production_slots,
    surplus,
};
use millwright_logic::ids::{EntityId, TeamId};
use millwright_logic::tasks::WorkerTaskRequest;

use crate::components::*;
use crate::context::SimContext;

pub fn task_generator_system(world: &mut World, ctx: &mut SimContext) {
    let (changed, removed) = ctx.events.drain();
    for id in removed {
        let cancelled = ctx.dispatcher.cancel_target(id);
        if cancelled > 0 {
            log::debug!(target: "millwright::tasks", "cancelled {} request(s) for removed {}", cancelled, id);
        }
    }
    for id in changed {
        regenerate(world, ctx, id);
    }
}

/// Bring the queue for one request key in line with the implied slot count.
fn sync(dispatcher: &mut TaskDispatcher, request: WorkerTaskRequest, implied: u32, assigned: u32) {
    let key = request.key();
    let queued = dispatcher.queued_for(key);
    for _ in 0..deficit(implied, queued, assigned) {
        dispatcher.queue_task(request);
    }
    let trim = surplus(implied, queued, assigned);
    if trim > 0 {
        dispatcher.cancel_key(key, trim);
    }
}

fn regenerate(world: &World, ctx: &mut SimContext, id: EntityId) {
    let Some(entity) = entity_of(id).filter(|e| world.contains(*e)) else {
        ctx.dispatcher.cancel_target(id);
        return;
    };

    if let Ok(node) = world.get::<&ResourceNode>(entity) {
        sync(
            ctx.dispatcher,
            WorkerTaskRequest::gather(TeamId::GLOBAL, id),
            node_gather_slots(node.remaining, node.slots),
            node.gatherers.len() as u32,
        );
        return;
    }

    let Ok(team) = world.get::<&Building>(entity).map(|b| b.team) else {
        return;
    };

    if let Ok(site) = world.get::<&ConstructionSite>(entity) {
        let (builders, haulers) = world
            .get::<&SiteCrew>(entity)
            .map(|crew| (crew.builders.len() as u32, crew.haulers.len() as u32))
            .unwrap_or((0, 0));
        let limits = ctx.config.construction;
        sync(
            ctx.dispatcher,
            WorkerTaskRequest::haul(team, id),
            site_haul_slots(&site, ctx.config.workers.carry_capacity, limits.max_haulers_per_site),
            haulers,
        );
        sync(
            ctx.dispatcher,
            WorkerTaskRequest::build(team, id),
            site_build_slots(&site, limits.max_builders_per_site),
            builders,
        );
        return;
    }

    if let Ok(station) = world.get::<&ProductionStation>(entity) {
        let specialization = station.recipe().and_then(|r| r.specialization);
        sync(
            ctx.dispatcher,
            WorkerTaskRequest::craft(team, id, specialization),
            station_production_slots(&station),
            station.assigned_count(),
        );
        sync(
            ctx.dispatcher,
            WorkerTaskRequest::station_hauler(team, id),
            station_hauler_slots(&station),
            station.hauler_count(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::ids::{ResourceAmount, ResourceKind};
    use millwright_logic::tasks::TaskKind;

    #[test]
    fn test_node_queues_one_request_per_slot() {
        let mut harness = Harness::new();
        let node = harness
            .world
            .spawn((ResourceNode::new(ResourceKind(0), 50, 3, 1.0), Position::default()));
        harness.events.mark_changed(id_of(node));
        harness.run(task_generator_system);
        assert_eq!(harness.dispatcher.pending_for_team(TeamId::GLOBAL, TaskKind::Gather), 3);

        // A second pass over the same state adds nothing.
        harness.events.mark_changed(id_of(node));
        harness.run(task_generator_system);
        assert_eq!(harness.dispatcher.pending_count(), 3);

        harness.world.get::<&mut ResourceNode>(node).unwrap().slots = 1;
        harness.events.mark_changed(id_of(node));
        harness.run(task_generator_system);
        assert_eq!(harness.dispatcher.pending_count(), 1);

        harness.events.mark_removed(id_of(node));
        harness.run(task_generator_system);
        assert_eq!(harness.dispatcher.pending_count(), 0);
    }

    #[test]
    fn test_site_switches_haul_to_build() {
        let mut harness = Harness::new();
        let wood = ResourceKind(0);
        let site = harness.world.spawn((
            Building {
                def_id: "house".into(),
                team: TeamId(0),
            },
            ConstructionSite::new(&[ResourceAmount::new(wood, 15)], 10.0),
            SiteCrew::default(),
            Position::default(),
        ));
        harness.events.mark_changed(id_of(site));
        harness.run(task_generator_system);
        assert_eq!(harness.dispatcher.pending_for_team(TeamId(0), TaskKind::Haul), 2);
        assert_eq!(harness.dispatcher.pending_for_team(TeamId(0), TaskKind::Build), 0);

        harness
            .world
            .get::<&mut ConstructionSite>(site)
            .unwrap()
            .receive_delivery(wood, 15);
        harness.events.mark_changed(id_of(site));
        harness.run(task_generator_system);
        assert_eq!(harness.dispatcher.pending_for_team(TeamId(0), TaskKind::Haul), 0);
        assert_eq!(
            harness.dispatcher.pending_for_team(TeamId(0), TaskKind::Build),
            harness.config.construction.max_builders_per_site as usize
        );
    }
}
