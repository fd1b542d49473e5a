//! Gather driver: walk to a node, extract into the carry slot, bring it home.

use hecs::World;
use millwright_logic::agent::{AgentEvent, AgentState};
use millwright_logic::ids::EntityId;

use super::{apply_event, deposit, move_toward, Agent};
use crate::components::*;
use crate::context::SimContext;
use crate::queries;

pub(super) fn drive(world: &mut World, ctx: &mut SimContext, agent: &mut Agent, dt: f32) {
    match *agent.state() {
        AgentState::MovingToNode { node } => {
            let live = entity_of(node)
                .and_then(|e| world.get::<&ResourceNode>(e).ok())
                .is_some_and(|n| !n.is_depleted());
            let target = queries::position_of(world, node).filter(|_| live);
            let Some(target) = target else {
                apply_event(world, ctx, agent, AgentEvent::TargetLost);
                return;
            };
            if move_toward(ctx, agent, target, dt) {
                apply_event(world, ctx, agent, AgentEvent::Arrived);
            }
        }
        AgentState::Gathering { node, progress } => gather(world, ctx, agent, node, progress, dt),
        AgentState::ReturningToStorage { storage } => {
            deposit::deliver_to_storage(world, ctx, agent, storage, dt);
        }
        _ => {}
    }
}

fn gather(world: &mut World, ctx: &mut SimContext, agent: &mut Agent, node: EntityId, progress: f32, dt: f32) {
    let capacity = ctx.config.workers.carry_capacity;
    let Some(entity) = entity_of(node).filter(|e| world.contains(*e)) else {
        let event = if agent.civ.is_carrying() {
            AgentEvent::CarryFull
        } else {
            AgentEvent::TargetLost
        };
        apply_event(world, ctx, agent, event);
        return;
    };

    let mut progress = progress + dt * ctx.catalog.tool_bonus(agent.civ.tool);
    let (depleted, blocked) = {
        let Ok(mut source) = world.get::<&mut ResourceNode>(entity) else {
            apply_event(world, ctx, agent, AgentEvent::TargetLost);
            return;
        };
        let mut blocked = false;
        while progress >= source.seconds_per_unit && source.remaining > 0 {
            if agent.civ.load(source.kind, 1, capacity) == 0 {
                blocked = true;
                break;
            }
            source.remaining -= 1;
            progress -= source.seconds_per_unit;
        }
        (source.remaining == 0, blocked)
    };
    if let AgentState::Gathering { progress: stored, .. } = agent.civ.machine.state_mut() {
        *stored = progress;
    }

    if depleted {
        log::info!(target: "millwright::gather", "node {} depleted", node);
        let _ = world.despawn(entity);
        ctx.events.mark_removed(node);
        let event = if agent.civ.is_carrying() {
            AgentEvent::CarryFull
        } else {
            AgentEvent::TargetLost
        };
        apply_event(world, ctx, agent, event);
    } else if blocked || agent.civ.carried() >= capacity {
        apply_event(world, ctx, agent, AgentEvent::CarryFull);
    }
}
