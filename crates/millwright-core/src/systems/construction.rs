//! Construction system - turns finished sites into working buildings

use hecs::{Entity, World};

use crate::components::*;
use crate::context::SimContext;

/// Strip the site and crew from every building whose work is done. The
/// building's storage, station or house becomes live from here on.
pub fn construction_system(world: &mut World, ctx: &mut SimContext) {
    let finished: Vec<Entity> = world
        .query::<&ConstructionSite>()
        .iter()
        .filter(|(_, site)| site.is_complete())
        .map(|(entity, _)| entity)
        .collect();

    for entity in finished {
        let id = id_of(entity);
        if let Err(err) = world.remove_one::<ConstructionSite>(entity) {
            log::warn!(target: "millwright::construction", "could not clear site on {}: {}", id, err);
            continue;
        }
        if world.remove_one::<SiteCrew>(entity).is_err() {
            log::debug!(target: "millwright::construction", "{} finished without a crew", id);
        }
        ctx.network.release_destination(id);
        ctx.dispatcher.cancel_target(id);
        ctx.events.mark_changed(id);
        if let Ok(building) = world.get::<&Building>(entity) {
            log::info!(target: "millwright::construction", "{} finished for {} ({})", building.def_id, building.team, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::ids::{ResourceAmount, ResourceKind, TeamId};
    use millwright_logic::tasks::WorkerTaskRequest;

    #[test]
    fn test_finished_site_becomes_building() {
        let mut harness = Harness::new();
        let mut site = ConstructionSite::new(&[ResourceAmount::new(ResourceKind(0), 1)], 1.0);
        site.receive_delivery(ResourceKind(0), 1);
        let entity = harness.world.spawn((
            Building {
                def_id: "house".into(),
                team: TeamId(0),
            },
            site,
            SiteCrew::default(),
            House::new(2),
        ));
        harness
            .dispatcher
            .queue_task(WorkerTaskRequest::build(TeamId(0), id_of(entity)));

        harness.run(construction_system);
        assert!(harness.world.get::<&ConstructionSite>(entity).is_ok());

        harness
            .world
            .get::<&mut ConstructionSite>(entity)
            .unwrap()
            .add_work(1.0);
        harness.run(construction_system);
        assert!(harness.world.get::<&ConstructionSite>(entity).is_err());
        assert!(harness.world.get::<&SiteCrew>(entity).is_err());
        assert!(harness.world.get::<&House>(entity).is_ok());
        assert_eq!(harness.dispatcher.pending_count(), 0);
        assert_eq!(harness.events.drain().0, vec![id_of(entity)]);
    }

    #[test]
    fn test_site_without_crew_still_finishes() {
        let mut harness = Harness::new();
        let mut site = ConstructionSite::new(&[], 1.0);
        site.add_work(1.0);
        let entity = harness.world.spawn((
            Building {
                def_id: "stockpile".into(),
                team: TeamId(0),
            },
            site,
        ));
        harness.run(construction_system);
        assert!(harness.world.get::<&ConstructionSite>(entity).is_err());
        assert!(harness.world.get::<&Building>(entity).is_ok());
        assert_eq!(harness.events.drain().0, vec![id_of(entity)]);
    }
}
