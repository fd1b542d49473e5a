//! Emptying the carry slot into storage.
//!
//! Shared by gatherers returning a load, the neutral deposit detour, and
//! station workers storing collected output.

use hecs::World;
use millwright_logic::agent::AgentEvent;
use millwright_logic::ids::EntityId;

use super::{apply_event, move_toward, Agent};
use crate::components::*;
use crate::context::SimContext;
use crate::interfaces::{Alert, AlertKind};
use crate::queries;

/// Pick a storage for the carried kind, walk there, and unload what fits.
pub(super) fn deliver_to_storage(
    world: &World,
    ctx: &mut SimContext,
    agent: &mut Agent,
    storage: Option<EntityId>,
    dt: f32,
) {
    let Some(carry) = agent.civ.carry.filter(|c| c.amount > 0) else {
        apply_event(world, ctx, agent, AgentEvent::CarryEmpty);
        return;
    };

    let Some(storage) = storage else {
        match queries::nearest_receiver(world, agent.team(), carry.kind, agent.pos) {
            Some(found) => {
                apply_event(world, ctx, agent, AgentEvent::Found(found));
            }
            None => {
                let message = format!("no storage accepts {}", ctx.catalog.resource_name(carry.kind));
                ctx.alert(Alert::new(AlertKind::StorageFull, agent.team(), Some(agent.id), message));
            }
        }
        return;
    };

    let target = queries::position_of(world, storage).filter(|_| queries::is_active(world, storage));
    let Some(target) = target else {
        apply_event(world, ctx, agent, AgentEvent::StorageLost);
        return;
    };
    if !move_toward(ctx, agent, target, dt) {
        return;
    }

    let accepted = entity_of(storage)
        .and_then(|e| world.get::<&mut StorageLedger>(e).ok())
        .map(|mut ledger| ledger.deposit(carry.kind, carry.amount))
        .unwrap_or(0);
    agent.civ.unload(accepted);

    let event = if agent.civ.is_carrying() {
        AgentEvent::CarryRemains
    } else {
        AgentEvent::CarryEmpty
    };
    apply_event(world, ctx, agent, event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::AlertSink;
    use crate::systems::testing::Harness;
    use millwright_logic::agent::AgentState;
    use millwright_logic::ids::{ResourceKind, TeamId};
    use millwright_logic::tasks::JobRole;

    fn carrier(harness: &mut Harness, amount: u32) -> Agent {
        let mut civ = Civilian::new(TeamId(0), JobRole::Hauler);
        civ.load(ResourceKind(0), amount, 10);
        civ.machine.reset(AgentState::DepositingCarry { storage: None });
        let entity = harness.world.spawn((civ, Position::default()));
        Agent::load(&harness.world, entity).unwrap()
    }

    #[test]
    fn test_overflow_keeps_remainder() {
        let mut harness = Harness::new();
        let mut ledger = StorageLedger::new();
        ledger.set_capacity(ResourceKind(0), 4);
        let store = harness.world.spawn((
            Building {
                def_id: "stockpile".into(),
                team: TeamId(0),
            },
            ledger,
            Position::new(0.5, 0.0),
        ));
        let mut agent = carrier(&mut harness, 10);

        harness.run(|world, ctx| deliver_to_storage(world, ctx, &mut agent, None, 1.0));
        assert_eq!(agent.state(), &AgentState::DepositingCarry { storage: Some(id_of(store)) });

        harness.run(|world, ctx| deliver_to_storage(world, ctx, &mut agent, Some(id_of(store)), 1.0));
        assert_eq!(agent.civ.carried(), 6);
        assert_eq!(agent.state(), &AgentState::DepositingCarry { storage: None });
        assert_eq!(harness.world.get::<&StorageLedger>(store).unwrap().stored(ResourceKind(0)), 4);

        harness.run(|world, ctx| deliver_to_storage(world, ctx, &mut agent, None, 1.0));
        let alerts = harness.alerts.drain();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::StorageFull);
    }
}
