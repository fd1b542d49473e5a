//! Need drivers: find food and eat, find a bed and sleep.

use hecs::World;
use millwright_logic::agent::{AgentEvent, AgentState};
use millwright_logic::ids::EntityId;
use millwright_logic::needs::NeedKind;

use super::{apply_event, move_toward, Agent};
use crate::components::*;
use crate::context::SimContext;
use crate::interfaces::{Alert, AlertKind};
use crate::queries;

pub(super) fn drive(world: &World, ctx: &mut SimContext, agent: &mut Agent, dt: f32) {
    match *agent.state() {
        AgentState::SeekingFoodStorage { storage: None } => {
            let edible = ctx.catalog.edible_kinds();
            match queries::nearest_food(world, agent.team(), &edible, agent.pos) {
                Some(storage) => {
                    apply_event(world, ctx, agent, AgentEvent::Found(storage));
                }
                None => {
                    ctx.alert(Alert::new(AlertKind::NoFood, agent.team(), Some(agent.id), "no food in storage"));
                }
            }
        }
        AgentState::SeekingFoodStorage { storage: Some(storage) } => {
            let Some(target) = queries::position_of(world, storage) else {
                apply_event(world, ctx, agent, AgentEvent::StorageLost);
                return;
            };
            if !move_toward(ctx, agent, target, dt) {
                return;
            }
            let event = match take_meal(world, ctx, storage) {
                Some(nutrition) => AgentEvent::StartMeal { nutrition },
                None => AgentEvent::StorageLost,
            };
            apply_event(world, ctx, agent, event);
        }
        AgentState::Eating { elapsed, nutrition } => {
            let elapsed = elapsed + dt;
            if elapsed < ctx.config.needs.eat_seconds {
                if let AgentState::Eating { elapsed: timer, .. } = agent.civ.machine.state_mut() {
                    *timer = elapsed;
                }
                return;
            }
            agent.civ.needs.satisfy(NeedKind::Hunger, nutrition);
            let event = if agent.civ.needs.is_satisfied(NeedKind::Hunger, &ctx.config.needs) {
                AgentEvent::NeedSatisfied(NeedKind::Hunger)
            } else {
                AgentEvent::MealFinished
            };
            apply_event(world, ctx, agent, event);
        }
        AgentState::SeekingHouse { house: None } => {
            let event = match find_bed(world, agent) {
                Some(house) => AgentEvent::Found(house),
                None => AgentEvent::SleepRough,
            };
            apply_event(world, ctx, agent, event);
        }
        AgentState::SeekingHouse { house: Some(house) } => {
            let Some(target) = queries::position_of(world, house).filter(|_| queries::is_active(world, house)) else {
                agent.civ.house = None;
                apply_event(world, ctx, agent, AgentEvent::StorageLost);
                return;
            };
            if move_toward(ctx, agent, target, dt) {
                apply_event(world, ctx, agent, AgentEvent::Arrived);
            }
        }
        AgentState::Sleeping { house } => {
            if let Some(house) = house {
                if !queries::is_active(world, house) {
                    agent.civ.house = None;
                    apply_event(world, ctx, agent, AgentEvent::TargetLost);
                    return;
                }
            }
            let tuning = ctx.config.needs;
            let factor = if house.is_some() { 1.0 } else { tuning.rough_sleep_factor };
            agent
                .civ
                .needs
                .satisfy(NeedKind::Fatigue, tuning.sleep_recovery_per_second * factor * dt);
            if agent.civ.needs.is_satisfied(NeedKind::Fatigue, &tuning) {
                apply_event(world, ctx, agent, AgentEvent::NeedSatisfied(NeedKind::Fatigue));
            }
        }
        _ => {}
    }
}

/// Withdraw one unit of the most nourishing food the storage offers.
fn take_meal(world: &World, ctx: &SimContext, storage: EntityId) -> Option<f32> {
    let mut ledger = world.get::<&mut StorageLedger>(entity_of(storage)?).ok()?;
    let kind = ctx
        .catalog
        .edible_kinds()
        .into_iter()
        .filter(|kind| ledger.supply_of(*kind) > 0)
        .max_by(|a, b| {
            ctx.catalog
                .nutrition(*a)
                .partial_cmp(&ctx.catalog.nutrition(*b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
    (ledger.withdraw(kind, 1) == 1).then(|| ctx.catalog.nutrition(kind))
}

/// The civilian's own house if it still stands, otherwise move into the
/// nearest house with a free bed.
fn find_bed(world: &World, agent: &mut Agent) -> Option<EntityId> {
    if let Some(home) = agent.civ.house {
        if queries::is_active(world, home) {
            return Some(home);
        }
        agent.civ.house = None;
    }
    let house = queries::nearest_vacant_house(world, agent.team(), agent.pos)?;
    let mut residence = world.get::<&mut House>(entity_of(house)?).ok()?;
    residence.residents.insert(agent.id);
    agent.civ.house = Some(house);
    log::debug!(target: "millwright::agents", "{} moved into {}", agent.id, house);
    Some(house)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::ids::TeamId;
    use millwright_logic::tasks::JobRole;

    fn tired(harness: &mut Harness) -> Agent {
        let mut civ = Civilian::new(TeamId(0), JobRole::Builder);
        civ.needs.fatigue = harness.config.needs.max_level;
        civ.machine.handle(AgentEvent::NeedCrossed(NeedKind::Fatigue));
        let entity = harness.world.spawn((civ, Position::default()));
        Agent::load(&harness.world, entity).unwrap()
    }

    #[test]
    fn test_houseless_civilian_sleeps_rough() {
        let mut harness = Harness::new();
        let mut agent = tired(&mut harness);
        harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        assert_eq!(agent.state(), &AgentState::Sleeping { house: None });

        let before = agent.civ.needs.fatigue;
        harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        let tuning = harness.config.needs;
        let recovered = before - agent.civ.needs.fatigue;
        assert!((recovered - tuning.sleep_recovery_per_second * tuning.rough_sleep_factor).abs() < 1e-4);
    }

    #[test]
    fn test_claims_vacant_house() {
        let mut harness = Harness::new();
        let house = harness.world.spawn((
            Building {
                def_id: "house".into(),
                team: TeamId(0),
            },
            House::new(1),
            Position::new(0.5, 0.0),
        ));
        let mut agent = tired(&mut harness);
        harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        assert_eq!(agent.civ.house, Some(id_of(house)));
        assert!(harness.world.get::<&House>(house).unwrap().residents.contains(&agent.id));

        harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
        assert_eq!(agent.state(), &AgentState::Sleeping { house: Some(id_of(house)) });

        let mut ticks = 0;
        while agent.state().is_need() {
            harness.run(|world, ctx| drive(world, ctx, &mut agent, 1.0));
            ticks += 1;
            assert!(ticks < 1_000);
        }
        assert_eq!(agent.state(), &AgentState::SearchingSite);
    }
}
