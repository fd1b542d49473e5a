//! Needs system - decays hunger and fatigue, interrupts work when urgent

use hecs::{Entity, World};
use millwright_logic::agent::AgentEvent;
use millwright_logic::needs::{preempts, NeedKind};

use super::agents;
use crate::components::Civilian;
use crate::context::SimContext;

/// Grow every civilian's needs by `dt` seconds and raise `NeedCrossed` for
/// those whose most urgent need may preempt what they are doing.
pub fn needs_system(world: &mut World, ctx: &mut SimContext, dt: f32) {
    let tuning = ctx.config.needs;
    let mut crossed: Vec<(Entity, NeedKind)> = Vec::new();
    for (entity, civ) in world.query_mut::<&mut Civilian>() {
        civ.needs.decay(dt, &tuning);
        if let Some(kind) = civ.needs.urgent(&tuning) {
            if preempts(kind, civ.state().need()) {
                crossed.push((entity, kind));
            }
        }
    }
    crossed.sort_by_key(|(entity, _)| entity.to_bits());

    for (entity, kind) in crossed {
        agents::raise(world, ctx, entity, AgentEvent::NeedCrossed(kind));
    }
}

/// Civilians currently at or past the seek threshold for some need.
pub fn find_urgent_needs(world: &World, ctx: &SimContext) -> Vec<(Entity, NeedKind)> {
    world
        .query::<&Civilian>()
        .iter()
        .filter_map(|(entity, civ)| civ.needs.urgent(&ctx.config.needs).map(|kind| (entity, kind)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Position;
    use crate::systems::testing::Harness;
    use millwright_logic::agent::AgentState;
    use millwright_logic::ids::TeamId;
    use millwright_logic::tasks::JobRole;

    #[test]
    fn test_hunger_interrupts_search() {
        let mut harness = Harness::new();
        let civ = harness
            .world
            .spawn((Civilian::new(TeamId(0), JobRole::Gatherer), Position::default()));

        let seconds_to_urgent = harness.config.needs.max_level * harness.config.needs.seek_threshold
            / harness.config.needs.hunger_per_second;
        harness.run(|world, ctx| needs_system(world, ctx, seconds_to_urgent * 0.5));
        assert_eq!(
            harness.world.get::<&Civilian>(civ).unwrap().state(),
            &AgentState::SearchingNode
        );

        harness.run(|world, ctx| needs_system(world, ctx, seconds_to_urgent));
        let civilian = harness.world.get::<&Civilian>(civ).unwrap();
        assert_eq!(civilian.state(), &AgentState::SeekingFoodStorage { storage: None });
        assert_eq!(civilian.machine.resume(), Some(&AgentState::SearchingNode));
    }

    #[test]
    fn test_find_urgent_needs() {
        let mut harness = Harness::new();
        let mut tired = Civilian::new(TeamId(0), JobRole::Builder);
        tired.needs.fatigue = harness.config.needs.max_level;
        harness.world.spawn((tired, Position::default()));
        harness
            .world
            .spawn((Civilian::new(TeamId(0), JobRole::Builder), Position::default()));

        let urgent = harness.run(|world, ctx| find_urgent_needs(world, ctx));
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].1, NeedKind::Fatigue);
    }
}
