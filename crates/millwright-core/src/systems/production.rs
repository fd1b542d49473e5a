//! Production system - advances station pipelines and attendance clocks

use hecs::World;

use crate::components::*;
use crate::context::SimContext;
use crate::interfaces::{Alert, AlertKind};

pub fn production_system(world: &mut World, ctx: &mut SimContext, dt: f32) {
    for (entity, (building, station, site)) in
        world.query_mut::<(&Building, &mut ProductionStation, Option<&ConstructionSite>)>()
    {
        if site.is_some() {
            continue;
        }
        let id = id_of(entity);

        let evicted = station.tick_attendance(dt);
        if !evicted.is_empty() {
            log::info!(
                target: "millwright::production",
                "{} {} unassigned {} absent worker(s)",
                building.def_id,
                id,
                evicted.len()
            );
            ctx.events.mark_changed(id);
        }

        let tick = station.tick(dt);
        if tick.changed {
            log::trace!(target: "millwright::production", "{} {} -> {:?}", building.def_id, id, tick.state);
        }
        let Some(cycle) = tick.completed else {
            continue;
        };
        log::debug!(
            target: "millwright::production",
            "{} {} completed a cycle ({} line(s) produced)",
            building.def_id,
            id,
            cycle.produced.len()
        );
        if !cycle.discarded.is_empty() {
            let lost: Vec<String> = cycle
                .discarded
                .iter()
                .map(|line| format!("{} {}", line.amount, ctx.catalog.resource_name(line.kind)))
                .collect();
            let message = format!("{} output full, discarded {}", building.def_id, lost.join(", "));
            ctx.alert(Alert::new(AlertKind::OutputDiscarded, building.team, Some(id), message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::ids::{EntityId, TeamId};
    use millwright_logic::production::StationState;

    fn spawn_sawmill(harness: &mut Harness) -> hecs::Entity {
        let def = harness.catalog.building("sawmill").unwrap();
        let station_def = def.station.as_ref().unwrap();
        let recipe = harness
            .catalog
            .recipe_by_id(station_def.default_recipe().unwrap())
            .unwrap()
            .clone();
        let station = ProductionStation::new(station_def.spec.clone(), harness.config.production.station_tuning())
            .with_recipe(recipe);
        harness.world.spawn((
            Building {
                def_id: "sawmill".into(),
                team: TeamId(0),
            },
            station,
            Position::default(),
        ))
    }

    #[test]
    fn test_absent_worker_is_evicted() {
        let mut harness = Harness::new();
        let mill = spawn_sawmill(&mut harness);
        let carpenter = Some(millwright_logic::tasks::Specialization::Carpenter);
        {
            let mut station = harness.world.get::<&mut ProductionStation>(mill).unwrap();
            station.assign_worker(EntityId(77), carpenter, 1.0).unwrap();
            station.reserve_work_point(EntityId(77)).unwrap();
        }
        let timeout = harness.config.production.absence_timeout_seconds;
        harness.run(|world, ctx| production_system(world, ctx, timeout + 1.0));

        let station = harness.world.get::<&ProductionStation>(mill).unwrap();
        assert!(!station.is_assigned(EntityId(77)));
        assert_eq!(harness.events.drain().0, vec![id_of(mill)]);
    }

    #[test]
    fn test_station_waits_for_inputs() {
        let mut harness = Harness::new();
        let mill = spawn_sawmill(&mut harness);
        harness.run(|world, ctx| production_system(world, ctx, 1.0));
        let station = harness.world.get::<&ProductionStation>(mill).unwrap();
        assert_eq!(station.state(), StationState::WaitingForInputs);
    }
}
