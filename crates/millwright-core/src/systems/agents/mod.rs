//! Worker agents - drive each civilian's state machine against the world
//!
//! Every tick each civilian is copied out of the world, stepped according to
//! its current state, and written back. Stepping observes the world, mutates
//! the shared ledgers, and raises [`AgentEvent`]s; every resulting
//! transition runs through [`transitions::on_transition`], which releases
//! the claims the old state held.

mod build;
mod craft;
mod deposit;
mod gather;
mod haul;
mod needs;
mod search;
mod transitions;

use hecs::{Entity, World};
use millwright_logic::agent::{AgentEvent, AgentState, StateFamily};
use millwright_logic::ids::{EntityId, TeamId};

use crate::components::*;
use crate::context::SimContext;

pub(crate) use transitions::release_claims;

/// A civilian checked out of the world for one step.
pub(crate) struct Agent {
    pub entity: Entity,
    pub id: EntityId,
    pub civ: Civilian,
    pub pos: Vec2,
}

impl Agent {
    pub fn load(world: &World, entity: Entity) -> Option<Self> {
        let civ = (*world.get::<&Civilian>(entity).ok()?).clone();
        let pos = world.get::<&Position>(entity).map(|p| p.0).unwrap_or_default();
        Some(Self {
            entity,
            id: id_of(entity),
            civ,
            pos,
        })
    }

    pub fn store(self, world: &mut World) {
        if let Ok(mut civ) = world.get::<&mut Civilian>(self.entity) {
            *civ = self.civ;
        }
        if let Ok(mut pos) = world.get::<&mut Position>(self.entity) {
            pos.0 = self.pos;
        }
    }

    pub fn state(&self) -> &AgentState {
        self.civ.state()
    }

    pub fn team(&self) -> TeamId {
        self.civ.team
    }
}

/// Feed one event to the agent's machine and settle the transition.
pub(crate) fn apply_event(world: &World, ctx: &mut SimContext, agent: &mut Agent, event: AgentEvent) -> bool {
    let Some(transition) = agent.civ.machine.handle(event) else {
        return false;
    };
    log::debug!(
        target: "millwright::agents",
        "{} {} -> {} ({:?})",
        agent.id,
        transition.from.label(),
        transition.to.label(),
        event
    );
    transitions::on_transition(world, ctx, agent, &transition);
    true
}

/// Raise an event on a civilian still in the world.
pub(crate) fn raise(world: &mut World, ctx: &mut SimContext, entity: Entity, event: AgentEvent) -> bool {
    let Some(mut agent) = Agent::load(world, entity) else {
        return false;
    };
    let handled = apply_event(world, ctx, &mut agent, event);
    agent.store(world);
    handled
}

/// Walk toward `target`. True on arrival.
pub(crate) fn move_toward(ctx: &SimContext, agent: &mut Agent, target: Vec2, dt: f32) -> bool {
    ctx.locomotion
        .move_to(agent.id, &mut agent.pos, target, ctx.config.workers.stop_distance, dt)
}

/// Step every civilian once, in entity order.
pub fn agents_system(world: &mut World, ctx: &mut SimContext, dt: f32) {
    let mut civilians: Vec<Entity> = world.query::<&Civilian>().iter().map(|(e, _)| e).collect();
    civilians.sort_by_key(|e| e.to_bits());

    for entity in civilians {
        let Some(mut agent) = Agent::load(world, entity) else {
            continue;
        };
        step(world, ctx, &mut agent, dt);
        agent.store(world);
    }
}

fn step(world: &mut World, ctx: &mut SimContext, agent: &mut Agent, dt: f32) {
    if agent.state().is_searching() {
        search::search(world, ctx, agent, dt);
        return;
    }
    match agent.state().family() {
        StateFamily::Needs => needs::drive(world, ctx, agent, dt),
        StateFamily::Gather => gather::drive(world, ctx, agent, dt),
        StateFamily::Build => build::drive(world, ctx, agent, dt),
        StateFamily::Haul => haul::drive(world, ctx, agent, dt),
        StateFamily::Craft => craft::drive(world, ctx, agent, dt),
        StateFamily::Deposit => {
            if let AgentState::DepositingCarry { storage } = *agent.state() {
                deposit::deliver_to_storage(world, ctx, agent, storage, dt);
            }
        }
        StateFamily::Idle => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use millwright_logic::tasks::JobRole;

    #[test]
    fn test_checked_out_agent_writes_back() {
        let mut world = World::new();
        let entity = world.spawn((Civilian::new(TeamId(0), JobRole::Hauler), Position::new(2.0, 3.0)));

        let mut agent = Agent::load(&world, entity).unwrap();
        assert_eq!(agent.pos, Vec2::new(2.0, 3.0));
        agent.civ.search_cooldown = 4.0;
        agent.pos = Vec2::new(5.0, 0.0);
        // The world copy is untouched until the agent is stored.
        assert_eq!(world.get::<&Civilian>(entity).unwrap().search_cooldown, 0.0);

        agent.store(&mut world);
        assert_eq!(world.get::<&Civilian>(entity).unwrap().search_cooldown, 4.0);
        assert_eq!(world.get::<&Position>(entity).unwrap().0, Vec2::new(5.0, 0.0));
        let marker = world.spawn((Position::new(0.0, 0.0),));
        assert!(Agent::load(&world, marker).is_none());
    }
}
