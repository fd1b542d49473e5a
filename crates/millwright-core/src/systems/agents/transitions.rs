//! Exit/enter bookkeeping shared by every transition.

use hecs::{Component, World};
use millwright_logic::agent::{AgentState, Claim, Transition};
use millwright_logic::ids::{EntityId, TeamId};

use super::Agent;
use crate::components::*;
use crate::context::SimContext;

/// Run `f` on a component of `id` if both still exist.
fn edit<T: Component>(world: &World, id: EntityId, f: impl FnOnce(&mut T)) -> bool {
    let Some(entity) = entity_of(id) else {
        return false;
    };
    match world.get::<&mut T>(entity) {
        Ok(mut component) => {
            f(&mut *component);
            true
        }
        Err(_) => false,
    }
}

pub(super) fn on_transition(world: &World, ctx: &mut SimContext, agent: &mut Agent, transition: &Transition) {
    release_claims(world, ctx, agent.id, agent.team(), &transition.released_claims());
    update_station_flags(world, agent.id, &transition.from, &transition.to);
}

/// Give back what `worker` held. Targets that no longer exist are skipped.
pub(crate) fn release_claims(world: &World, ctx: &mut SimContext, worker: EntityId, team: TeamId, claims: &[Claim]) {
    for claim in claims {
        let target = match *claim {
            Claim::GatherSlot { node } => {
                edit::<ResourceNode>(world, node, |n| {
                    n.gatherers.remove(&worker);
                })
                .then_some(node)
            }
            Claim::SiteWork { site } => {
                edit::<SiteCrew>(world, site, |crew| {
                    crew.builders.remove(&worker);
                })
                .then_some(site)
            }
            Claim::SiteHaul { site } => {
                edit::<SiteCrew>(world, site, |crew| {
                    crew.haulers.remove(&worker);
                })
                .then_some(site)
            }
            Claim::Reservation {
                destination,
                source,
                kind,
                amount,
            } => {
                ctx.network.table_mut(team).release(destination, kind, amount);
                ctx.network.unearmark(source, kind, amount);
                Some(destination)
            }
            Claim::InTransit {
                destination,
                kind,
                amount,
            } => {
                ctx.network.table_mut(team).settle_in_transit(destination, kind, amount);
                Some(destination)
            }
            Claim::StationWorker { station } => {
                edit::<ProductionStation>(world, station, |s| {
                    s.unassign_worker(worker);
                })
                .then_some(station)
            }
            Claim::StationHauler { station } => {
                edit::<ProductionStation>(world, station, |s| {
                    s.unassign_hauler(worker);
                })
                .then_some(station)
            }
        };
        if let Some(target) = target {
            log::trace!(target: "millwright::agents", "{} released {:?}", worker, claim);
            ctx.events.mark_changed(target);
        }
    }
}

/// Station a production worker is running a buffer errand for.
fn errand_station(state: &AgentState) -> Option<EntityId> {
    if !state.is_errand() {
        return None;
    }
    match *state {
        AgentState::ServicingStation { station, .. }
        | AgentState::FetchingInput { station, .. }
        | AgentState::DeliveringInput { station, .. }
        | AgentState::CollectingOutput { station, .. }
        | AgentState::StoringGoods { station, .. } => Some(station),
        _ => None,
    }
}

/// Keep the station's presence and errand flags in step with the worker.
fn update_station_flags(world: &World, worker: EntityId, from: &AgentState, to: &AgentState) {
    if let AgentState::Crafting { station, .. } = *from {
        if !matches!(to, AgentState::Crafting { .. }) {
            edit::<ProductionStation>(world, station, |s| s.set_present(worker, false));
        }
    }
    if let AgentState::Crafting { station, .. } = *to {
        edit::<ProductionStation>(world, station, |s| s.set_present(worker, true));
    }

    let (was, now) = (errand_station(from), errand_station(to));
    if was != now {
        if let Some(station) = was {
            edit::<ProductionStation>(world, station, |s| s.set_errand(worker, false));
        }
        if let Some(station) = now {
            edit::<ProductionStation>(world, station, |s| s.set_errand(worker, true));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::ids::ResourceKind;

    #[test]
    fn test_release_skips_missing_targets() {
        let mut harness = Harness::new();
        let node = harness
            .world
            .spawn((ResourceNode::new(ResourceKind(0), 5, 2, 1.0), Position::default()));
        let worker = EntityId(500);
        harness
            .world
            .get::<&mut ResourceNode>(node)
            .unwrap()
            .gatherers
            .insert(worker);

        let claims = [
            Claim::GatherSlot { node: id_of(node) },
            Claim::SiteWork { site: EntityId(9_999) },
        ];
        harness.run(|world, ctx| release_claims(world, ctx, worker, TeamId(0), &claims));

        assert!(harness.world.get::<&ResourceNode>(node).unwrap().gatherers.is_empty());
        assert_eq!(harness.events.drain().0, vec![id_of(node)]);
    }

    #[test]
    fn test_reservation_claim_returns_stock() {
        let mut harness = Harness::new();
        let wood = ResourceKind(0);
        let site = EntityId(42);
        let team = TeamId(0);
        let store = EntityId(7);
        assert_eq!(harness.network.table_mut(team).reserve(site, wood, 4, 10), 4);
        harness.network.earmark(store, wood, 4);
        let claims = [Claim::Reservation {
            destination: site,
            source: store,
            kind: wood,
            amount: 4,
        }];
        harness.run(|world, ctx| release_claims(world, ctx, EntityId(1), team, &claims));
        assert_eq!(harness.network.table(team).unwrap().total_reserved(wood), 0);
        assert_eq!(harness.network.earmarked(store, wood), 0);
        assert!(harness.network.is_empty());
    }
}
