//! Idle and search states: poll the dispatcher for matching work.

use hecs::World;
use millwright_logic::agent::{AgentEvent, Assignment};
use millwright_logic::catalog::DefinitionCatalog;
use millwright_logic::config::EconomyConfig;
use millwright_logic::dispatch::{TargetStatus, TaskCandidate};
use millwright_logic::ids::{EntityId, TeamId};
use millwright_logic::tasks::{can_perform, Capability, CraftRole, JobRole, TaskKind, WorkerTaskRequest};

use super::{apply_event, Agent};
use crate::components::*;
use crate::context::{SimContext, StorageNetwork};
use crate::queries;

pub(super) fn search(world: &World, ctx: &mut SimContext, agent: &mut Agent, dt: f32) {
    if agent.civ.is_carrying() {
        apply_event(world, ctx, agent, AgentEvent::MustDeposit);
        return;
    }
    if agent.civ.role() == JobRole::Unemployed {
        return;
    }
    agent.civ.search_cooldown -= dt;
    if agent.civ.search_cooldown > 0.0 {
        return;
    }
    agent.civ.search_cooldown = ctx.config.workers.search_interval_seconds;

    let mut candidate = Candidate {
        world,
        network: &mut *ctx.network,
        catalog: ctx.catalog,
        config: ctx.config,
        agent,
        accepted: None,
    };
    let request = ctx.dispatcher.try_assign_any_task(&mut candidate);
    let accepted = candidate.accepted.take();

    if let (Some(request), Some(assignment)) = (request, accepted) {
        log::debug!(target: "millwright::agents", "{} took {:?} at {}", agent.id, request.kind, request.target);
        apply_event(world, ctx, agent, AgentEvent::Assigned(assignment));
    }
}

/// A polling civilian as the dispatcher sees it. Accepting a request takes
/// the matching claim in the world on the spot.
struct Candidate<'a> {
    world: &'a World,
    network: &'a mut StorageNetwork,
    catalog: &'a DefinitionCatalog,
    config: &'a EconomyConfig,
    agent: &'a Agent,
    accepted: Option<Assignment>,
}

impl Candidate<'_> {
    fn claim(&mut self, request: &WorkerTaskRequest) -> Option<Assignment> {
        let entity = entity_of(request.target)?;
        let worker = self.agent.id;
        match request.kind {
            TaskKind::Gather => {
                let mut node = self.world.get::<&mut ResourceNode>(entity).ok()?;
                if !node.has_free_slot() || node.is_depleted() {
                    return None;
                }
                node.gatherers.insert(worker);
                Some(Assignment::Gather { node: request.target })
            }
            TaskKind::Build => {
                let mut crew = self.world.get::<&mut SiteCrew>(entity).ok()?;
                if crew.builders.len() as u32 >= self.config.construction.max_builders_per_site {
                    return None;
                }
                crew.builders.insert(worker);
                Some(Assignment::Build { site: request.target })
            }
            TaskKind::Haul => self.claim_haul(request.target),
            TaskKind::Craft => {
                let mut station = self.world.get::<&mut ProductionStation>(entity).ok()?;
                match request.craft_role {
                    Some(CraftRole::Hauler) => {
                        station.assign_hauler(worker).ok()?;
                        Some(Assignment::StationLogistics { station: request.target })
                    }
                    _ => {
                        let bonus = self.catalog.tool_bonus(self.agent.civ.tool);
                        station.assign_worker(worker, self.agent.civ.specialization, bonus).ok()?;
                        match station.reserve_work_point(worker) {
                            Some(point) => Some(Assignment::Craft {
                                station: request.target,
                                point,
                            }),
                            None => {
                                station.unassign_worker(worker);
                                None
                            }
                        }
                    }
                }
            }
        }
    }

    /// Reserve one load for the first undelivered cost line that the team
    /// can still cover, and join the site's haul crew.
    fn claim_haul(&mut self, site: EntityId) -> Option<Assignment> {
        let entity = entity_of(site)?;
        let missing = {
            let tracker = self.world.get::<&ConstructionSite>(entity).ok()?;
            tracker.missing()
        };
        let team = self.agent.team();
        let carry = self.config.workers.carry_capacity;

        for line in missing {
            let table = self.network.table_mut(team);
            let need = line.amount.saturating_sub(table.committed_for_site(site, line.kind));
            if need == 0 {
                continue;
            }
            let supply = queries::team_supply(self.world, team, line.kind);
            let granted = table.reserve(site, line.kind, need.min(carry), supply);
            if granted == 0 {
                continue;
            }
            let supplier = queries::nearest_supplier(self.world, self.network, team, line.kind, self.agent.pos, granted);
            let table = self.network.table_mut(team);
            let Some((storage, free)) = supplier else {
                table.release(site, line.kind, granted);
                continue;
            };
            let Ok(mut crew) = self.world.get::<&mut SiteCrew>(entity) else {
                table.release(site, line.kind, granted);
                return None;
            };
            // One storage per trip: hand back what this source cannot cover.
            let reserved = granted.min(free);
            table.release(site, line.kind, granted - reserved);
            self.network.earmark(storage, line.kind, reserved);
            crew.haulers.insert(self.agent.id);
            return Some(Assignment::Haul {
                site,
                storage,
                kind: line.kind,
                reserved,
            });
        }
        None
    }
}

impl TaskCandidate for Candidate<'_> {
    fn team(&self) -> TeamId {
        self.agent.team()
    }

    fn can_perform(&self, capability: &Capability) -> bool {
        can_perform(self.agent.civ.role(), self.agent.civ.specialization, capability)
    }

    fn target_status(&self, request: &WorkerTaskRequest) -> TargetStatus {
        let Some(entity) = entity_of(request.target).filter(|e| self.world.contains(*e)) else {
            return TargetStatus::Gone;
        };
        let limits = self.config.construction;
        match request.kind {
            TaskKind::Gather => match self.world.get::<&ResourceNode>(entity) {
                Err(_) => TargetStatus::Gone,
                Ok(node) if node.is_depleted() => TargetStatus::Gone,
                Ok(node) if !node.has_free_slot() => TargetStatus::Unavailable,
                Ok(_) => TargetStatus::Live,
            },
            TaskKind::Build => {
                let Ok(site) = self.world.get::<&ConstructionSite>(entity) else {
                    return TargetStatus::Gone;
                };
                if site.is_complete() {
                    return TargetStatus::Gone;
                }
                let builders = self.world.get::<&SiteCrew>(entity).map(|c| c.builders.len() as u32).unwrap_or(0);
                if !site.materials_complete() || builders >= limits.max_builders_per_site {
                    TargetStatus::Unavailable
                } else {
                    TargetStatus::Live
                }
            }
            TaskKind::Haul => {
                let Ok(site) = self.world.get::<&ConstructionSite>(entity) else {
                    return TargetStatus::Gone;
                };
                if site.materials_complete() {
                    return TargetStatus::Gone;
                }
                let haulers = self.world.get::<&SiteCrew>(entity).map(|c| c.haulers.len() as u32).unwrap_or(0);
                if haulers >= limits.max_haulers_per_site {
                    TargetStatus::Unavailable
                } else {
                    TargetStatus::Live
                }
            }
            TaskKind::Craft => {
                let Ok(station) = self.world.get::<&ProductionStation>(entity) else {
                    return TargetStatus::Gone;
                };
                if self.world.get::<&ConstructionSite>(entity).is_ok() {
                    return TargetStatus::Unavailable;
                }
                if station.recipe().is_none() {
                    return TargetStatus::Gone;
                }
                match request.craft_role {
                    Some(CraftRole::Hauler) if !station.requires_hauler_logistics() => TargetStatus::Gone,
                    Some(CraftRole::Hauler) if station.hauler_count() >= station.max_haulers() => {
                        TargetStatus::Unavailable
                    }
                    Some(CraftRole::Hauler) => TargetStatus::Live,
                    _ if station.assigned_count() >= station.effective_max_workers() => TargetStatus::Unavailable,
                    _ => TargetStatus::Live,
                }
            }
        }
    }

    fn try_assign_task(&mut self, request: &WorkerTaskRequest) -> bool {
        match self.claim(request) {
            Some(assignment) => {
                self.accepted = Some(assignment);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::testing::Harness;
    use millwright_logic::agent::AgentState;
    use millwright_logic::ids::ResourceKind;

    fn agent(harness: &mut Harness, role: JobRole) -> Agent {
        let entity = harness.world.spawn((Civilian::new(TeamId(0), role), Position::default()));
        Agent::load(&harness.world, entity).unwrap()
    }

    #[test]
    fn test_carrying_searcher_deposits_first() {
        let mut harness = Harness::new();
        let mut gatherer = agent(&mut harness, JobRole::Gatherer);
        gatherer.civ.load(ResourceKind(0), 3, 10);
        harness.run(|world, ctx| search(world, ctx, &mut gatherer, 1.0));
        assert_eq!(gatherer.state(), &AgentState::DepositingCarry { storage: None });
    }

    #[test]
    fn test_gatherer_claims_node_slot() {
        let mut harness = Harness::new();
        let node = harness
            .world
            .spawn((ResourceNode::new(ResourceKind(0), 20, 1, 1.0), Position::new(5.0, 0.0)));
        harness
            .dispatcher
            .queue_task(WorkerTaskRequest::gather(TeamId::GLOBAL, id_of(node)));
        harness
            .dispatcher
            .queue_task(WorkerTaskRequest::gather(TeamId::GLOBAL, id_of(node)));

        let mut first = agent(&mut harness, JobRole::Gatherer);
        let mut second = agent(&mut harness, JobRole::Gatherer);
        harness.run(|world, ctx| {
            search(world, ctx, &mut first, 1.0);
            search(world, ctx, &mut second, 1.0);
        });

        assert_eq!(first.state(), &AgentState::MovingToNode { node: id_of(node) });
        assert_eq!(second.state(), &AgentState::SearchingNode);
        assert_eq!(harness.world.get::<&ResourceNode>(node).unwrap().gatherers.len(), 1);
        assert_eq!(harness.dispatcher.pending_count(), 1);
    }

    #[test]
    fn test_unemployed_never_polls() {
        let mut harness = Harness::new();
        let node = harness
            .world
            .spawn((ResourceNode::new(ResourceKind(0), 20, 1, 1.0), Position::default()));
        harness
            .dispatcher
            .queue_task(WorkerTaskRequest::gather(TeamId::GLOBAL, id_of(node)));
        let mut idle = agent(&mut harness, JobRole::Unemployed);
        harness.run(|world, ctx| search(world, ctx, &mut idle, 1.0));
        assert_eq!(idle.state(), &AgentState::Idle);
        assert_eq!(harness.dispatcher.pending_count(), 1);
    }
}
