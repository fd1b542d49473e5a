//! Team-scoped task queues and worker matching.
//!
//! Requests live in an arena. Queues hold arena indices; a consumed or dead
//! request is tombstoned (its slot emptied) and the stale index is skipped
//! and dropped on the next scan, so indices held by a scan in progress stay
//! valid.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, TeamId};
use crate::tasks::{Capability, TaskKey, TaskKind, WorkerTaskRequest};

/// Lazily checked state of a request's target at match time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    /// Matchable right now.
    Live,
    /// Exists but cannot take a worker at the moment; keep the request queued.
    Unavailable,
    /// Gone for good; tombstone the request.
    Gone,
}

/// What the dispatcher needs to know about a worker polling for work.
pub trait TaskCandidate {
    fn team(&self) -> TeamId;
    fn can_perform(&self, capability: &Capability) -> bool;
    fn target_status(&self, request: &WorkerTaskRequest) -> TargetStatus;
    /// Take the task. Returning false leaves the request queued.
    fn try_assign_task(&mut self, request: &WorkerTaskRequest) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub usize);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDispatcher {
    slots: Vec<Option<WorkerTaskRequest>>,
    free: Vec<usize>,
    queues: BTreeMap<TeamId, [VecDeque<usize>; 4]>,
    queued: HashMap<TaskKey, u32>,
}

impl TaskDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_task(&mut self, request: WorkerTaskRequest) -> TaskHandle {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(request);
                index
            }
            None => {
                self.slots.push(Some(request));
                self.slots.len() - 1
            }
        };
        self.queues.entry(request.team).or_default()[request.kind.index()].push_back(index);
        *self.queued.entry(request.key()).or_insert(0) += 1;
        TaskHandle(index)
    }

    fn tombstone(&mut self, index: usize) -> Option<WorkerTaskRequest> {
        let request = self.slots.get_mut(index)?.take()?;
        if let Some(count) = self.queued.get_mut(&request.key()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.queued.remove(&request.key());
            }
        }
        self.free.push(index);
        Some(request)
    }

    /// Tombstone every queued request aimed at `target`. Returns the count.
    pub fn cancel_target(&mut self, target: EntityId) -> usize {
        let doomed: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some_and(|r| r.target == target))
            .map(|(i, _)| i)
            .collect();
        for index in &doomed {
            self.tombstone(*index);
        }
        self.purge_stale();
        doomed.len()
    }

    /// Tombstone at most `count` queued requests with this key, newest first.
    pub fn cancel_key(&mut self, key: TaskKey, count: u32) -> u32 {
        let mut cancelled = 0;
        for index in (0..self.slots.len()).rev() {
            if cancelled == count {
                break;
            }
            if self.slots[index].is_some_and(|r| r.key() == key) {
                self.tombstone(index);
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            self.purge_stale();
        }
        cancelled
    }

    /// Live requests for a key.
    pub fn queued_for(&self, key: TaskKey) -> u32 {
        self.queued.get(&key).copied().unwrap_or(0)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn pending_for_team(&self, team: TeamId, kind: TaskKind) -> usize {
        self.queues
            .get(&team)
            .map(|q| {
                q[kind.index()]
                    .iter()
                    .filter(|i| self.slots[**i].is_some_and(|r| r.team == team && r.kind == kind))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Free slots can be reused by later requests of a different team or
    /// kind; drop queue entries that no longer point at their own request.
    fn purge_stale(&mut self) {
        let slots = &self.slots;
        for (team, queues) in self.queues.iter_mut() {
            for kind in TaskKind::PRIORITY {
                queues[kind.index()]
                    .retain(|i| slots[*i].is_some_and(|r| r.team == *team && r.kind == kind));
            }
        }
    }

    /// Offer queued work to `worker`: its own team first, then global, each
    /// scanned Craft, Haul, Build, Gather in FIFO order. Returns the request
    /// the worker accepted.
    pub fn try_assign_any_task(&mut self, worker: &mut impl TaskCandidate) -> Option<WorkerTaskRequest> {
        let team = worker.team();
        let mut teams = vec![team];
        if !team.is_global() {
            teams.push(TeamId::GLOBAL);
        }

        for scan_team in teams {
            for kind in TaskKind::PRIORITY {
                let indices: Vec<usize> = match self.queues.get(&scan_team) {
                    Some(q) => q[kind.index()].iter().copied().collect(),
                    None => continue,
                };
                let mut gone = Vec::new();
                let mut accepted = None;
                for index in indices {
                    let Some(request) = self.slots[index] else {
                        continue;
                    };
                    if request.team != scan_team || request.kind != kind {
                        continue;
                    }
                    match worker.target_status(&request) {
                        TargetStatus::Gone => {
                            gone.push(index);
                            continue;
                        }
                        TargetStatus::Unavailable => continue,
                        TargetStatus::Live => {}
                    }
                    if !worker.can_perform(&request.capability()) {
                        continue;
                    }
                    if worker.try_assign_task(&request) {
                        accepted = Some(index);
                        break;
                    }
                }
                for index in gone {
                    if let Some(request) = self.tombstone(index) {
                        log::trace!(
                            target: "millwright::dispatch",
                            "dropped {:?} request for vanished target {}",
                            request.kind,
                            request.target
                        );
                    }
                }
                if let Some(index) = accepted {
                    let request = self.tombstone(index);
                    self.purge_stale();
                    return request;
                }
            }
        }
        self.purge_stale();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{can_perform, JobRole, Specialization};
    use std::collections::HashSet;

    struct Worker {
        team: TeamId,
        role: JobRole,
        specialization: Option<Specialization>,
        gone: HashSet<EntityId>,
        busy: HashSet<EntityId>,
        refuse: bool,
        taken: Vec<WorkerTaskRequest>,
    }

    impl Worker {
        fn new(team: TeamId, role: JobRole) -> Self {
            Self {
                team,
                role,
                specialization: None,
                gone: HashSet::new(),
                busy: HashSet::new(),
                refuse: false,
                taken: Vec::new(),
            }
        }
    }

    impl TaskCandidate for Worker {
        fn team(&self) -> TeamId {
            self.team
        }
        fn can_perform(&self, capability: &Capability) -> bool {
            can_perform(self.role, self.specialization, capability)
        }
        fn target_status(&self, request: &WorkerTaskRequest) -> TargetStatus {
            if self.gone.contains(&request.target) {
                TargetStatus::Gone
            } else if self.busy.contains(&request.target) {
                TargetStatus::Unavailable
            } else {
                TargetStatus::Live
            }
        }
        fn try_assign_task(&mut self, request: &WorkerTaskRequest) -> bool {
            if self.refuse {
                return false;
            }
            self.taken.push(*request);
            true
        }
    }

    const TEAM: TeamId = TeamId(0);

    #[test]
    fn test_priority_beats_fifo_across_kinds() {
        let mut dispatcher = TaskDispatcher::new();
        dispatcher.queue_task(WorkerTaskRequest::build(TEAM, EntityId(1)));
        dispatcher.queue_task(WorkerTaskRequest::haul(TEAM, EntityId(2)));

        let mut builder = Worker::new(TEAM, JobRole::Builder);
        let first = dispatcher.try_assign_any_task(&mut builder).unwrap();
        assert_eq!(first.kind, TaskKind::Haul);
        let second = dispatcher.try_assign_any_task(&mut builder).unwrap();
        assert_eq!(second.kind, TaskKind::Build);
        assert!(dispatcher.try_assign_any_task(&mut builder).is_none());
    }

    #[test]
    fn test_team_queue_before_global() {
        let mut dispatcher = TaskDispatcher::new();
        dispatcher.queue_task(WorkerTaskRequest::gather(TeamId::GLOBAL, EntityId(1)));
        dispatcher.queue_task(WorkerTaskRequest::gather(TEAM, EntityId(2)));

        let mut gatherer = Worker::new(TEAM, JobRole::Gatherer);
        assert_eq!(dispatcher.try_assign_any_task(&mut gatherer).unwrap().target, EntityId(2));
        assert_eq!(dispatcher.try_assign_any_task(&mut gatherer).unwrap().target, EntityId(1));
    }

    #[test]
    fn test_other_teams_queue_is_invisible() {
        let mut dispatcher = TaskDispatcher::new();
        dispatcher.queue_task(WorkerTaskRequest::gather(TeamId(7), EntityId(1)));
        let mut gatherer = Worker::new(TEAM, JobRole::Gatherer);
        assert!(dispatcher.try_assign_any_task(&mut gatherer).is_none());
        assert_eq!(dispatcher.pending_count(), 1);
    }

    #[test]
    fn test_gone_targets_are_tombstoned() {
        let mut dispatcher = TaskDispatcher::new();
        dispatcher.queue_task(WorkerTaskRequest::gather(TEAM, EntityId(1)));
        dispatcher.queue_task(WorkerTaskRequest::gather(TEAM, EntityId(2)));

        let mut gatherer = Worker::new(TEAM, JobRole::Gatherer);
        gatherer.gone.insert(EntityId(1));
        let taken = dispatcher.try_assign_any_task(&mut gatherer).unwrap();
        assert_eq!(taken.target, EntityId(2));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[test]
    fn test_unavailable_and_mismatched_stay_queued_in_order() {
        let mut dispatcher = TaskDispatcher::new();
        dispatcher.queue_task(WorkerTaskRequest::gather(TEAM, EntityId(1)));
        dispatcher.queue_task(WorkerTaskRequest::gather(TEAM, EntityId(2)));

        let mut gatherer = Worker::new(TEAM, JobRole::Gatherer);
        gatherer.busy.insert(EntityId(1));
        assert_eq!(dispatcher.try_assign_any_task(&mut gatherer).unwrap().target, EntityId(2));

        let mut builder = Worker::new(TEAM, JobRole::Builder);
        assert!(dispatcher.try_assign_any_task(&mut builder).is_none());

        gatherer.busy.clear();
        assert_eq!(dispatcher.try_assign_any_task(&mut gatherer).unwrap().target, EntityId(1));
    }

    #[test]
    fn test_rejected_offer_keeps_request() {
        let mut dispatcher = TaskDispatcher::new();
        dispatcher.queue_task(WorkerTaskRequest::gather(TEAM, EntityId(1)));
        let mut gatherer = Worker::new(TEAM, JobRole::Gatherer);
        gatherer.refuse = true;
        assert!(dispatcher.try_assign_any_task(&mut gatherer).is_none());
        assert_eq!(dispatcher.pending_count(), 1);
    }

    #[test]
    fn test_each_request_goes_to_one_worker() {
        let mut dispatcher = TaskDispatcher::new();
        for _ in 0..2 {
            dispatcher.queue_task(WorkerTaskRequest::gather(TEAM, EntityId(9)));
        }
        let mut assigned = 0;
        for _ in 0..5 {
            let mut gatherer = Worker::new(TEAM, JobRole::Gatherer);
            if dispatcher.try_assign_any_task(&mut gatherer).is_some() {
                assigned += 1;
            }
        }
        assert_eq!(assigned, 2);
    }

    #[test]
    fn test_queued_counts_and_cancel() {
        let mut dispatcher = TaskDispatcher::new();
        let key = WorkerTaskRequest::haul(TEAM, EntityId(3)).key();
        for _ in 0..3 {
            dispatcher.queue_task(WorkerTaskRequest::haul(TEAM, EntityId(3)));
        }
        dispatcher.queue_task(WorkerTaskRequest::build(TEAM, EntityId(4)));
        assert_eq!(dispatcher.queued_for(key), 3);

        assert_eq!(dispatcher.cancel_key(key, 1), 1);
        assert_eq!(dispatcher.queued_for(key), 2);

        assert_eq!(dispatcher.cancel_target(EntityId(3)), 2);
        assert_eq!(dispatcher.queued_for(key), 0);
        assert_eq!(dispatcher.pending_count(), 1);
    }

    #[test]
    fn test_reused_slot_does_not_leak_into_old_queue() {
        let mut dispatcher = TaskDispatcher::new();
        dispatcher.queue_task(WorkerTaskRequest::gather(TEAM, EntityId(1)));
        dispatcher.cancel_target(EntityId(1));
        dispatcher.queue_task(WorkerTaskRequest::build(TEAM, EntityId(2)));

        assert_eq!(dispatcher.pending_for_team(TEAM, TaskKind::Gather), 0);
        assert_eq!(dispatcher.pending_for_team(TEAM, TaskKind::Build), 1);
        let mut gatherer = Worker::new(TEAM, JobRole::Gatherer);
        assert!(dispatcher.try_assign_any_task(&mut gatherer).is_none());
    }
}
