//! Build driver: walk to a supplied site and put labor into it.

use hecs::World;
use millwright_logic::agent::{AgentEvent, AgentState};

use super::{apply_event, move_toward, Agent};
use crate::components::*;
use crate::context::SimContext;
use crate::queries;

pub(super) fn drive(world: &World, ctx: &mut SimContext, agent: &mut Agent, dt: f32) {
    match *agent.state() {
        AgentState::MovingToSite { site } => {
            let open = entity_of(site).is_some_and(|e| world.get::<&ConstructionSite>(e).is_ok_and(|s| !s.is_complete()));
            let target = queries::position_of(world, site).filter(|_| open);
            let Some(target) = target else {
                apply_event(world, ctx, agent, AgentEvent::TargetLost);
                return;
            };
            if move_toward(ctx, agent, target, dt) {
                apply_event(world, ctx, agent, AgentEvent::Arrived);
            }
        }
        AgentState::Building { site } => {
            let Some(entity) = entity_of(site).filter(|e| world.contains(*e)) else {
                apply_event(world, ctx, agent, AgentEvent::TargetLost);
                return;
            };
            let labor = ctx.config.workers.build_rate * ctx.catalog.tool_bonus(agent.civ.tool) * dt;
            let finished = match world.get::<&mut ConstructionSite>(entity) {
                Ok(mut tracker) => tracker.is_complete() || tracker.add_work(labor),
                Err(_) => true,
            };
            if finished {
                ctx.events.mark_changed(site);
                apply_event(world, ctx, agent, AgentEvent::WorkComplete);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::agent::Assignment;
    use millwright_logic::ids::TeamId;
    use millwright_logic::tasks::JobRole;

    #[test]
    fn test_builder_finishes_site() {
        let mut harness = Harness::new();
        let site = harness.world.spawn((
            Building {
                def_id: "house".into(),
                team: TeamId(0),
            },
            ConstructionSite::new(&[], 3.0),
            SiteCrew::default(),
            Position::new(0.5, 0.0),
        ));
        let mut civ = Civilian::new(TeamId(0), JobRole::Builder);
        civ.machine
            .handle(AgentEvent::Assigned(Assignment::Build { site: id_of(site) }));
        let entity = harness.world.spawn((civ, Position::default()));
        let mut agent = Agent::load(&harness.world, entity).unwrap();

        harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        assert_eq!(agent.state(), &AgentState::Building { site: id_of(site) });
        for _ in 0..3 {
            harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        }
        assert!(harness.world.get::<&ConstructionSite>(site).unwrap().is_complete());
        assert_eq!(agent.state(), &AgentState::SearchingSite);
    }
}
