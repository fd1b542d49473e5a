//! Task requests, job roles and capabilities.

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, TeamId};

/// Kinds of work the dispatcher matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Gather,
    Build,
    Haul,
    Craft,
}

impl TaskKind {
    /// Dispatcher scan order, most urgent first.
    pub const PRIORITY: [TaskKind; 4] = [TaskKind::Craft, TaskKind::Haul, TaskKind::Build, TaskKind::Gather];

    pub fn index(self) -> usize {
        match self {
            TaskKind::Gather => 0,
            TaskKind::Build => 1,
            TaskKind::Haul => 2,
            TaskKind::Craft => 3,
        }
    }
}

/// Whether a craft seat is for working the recipe or servicing the buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CraftRole {
    Production,
    Hauler,
}

/// Crafting specialization a recipe may demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    Carpenter,
    Miller,
    Baker,
    Smith,
    Mason,
    Weaver,
}

/// A civilian's job. Decides which tasks it accepts and where it idles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRole {
    #[default]
    Unemployed,
    Gatherer,
    Builder,
    Hauler,
    Crafter,
}

impl JobRole {
    pub fn accepts(self, kind: TaskKind, role: Option<CraftRole>) -> bool {
        match (self, kind) {
            (JobRole::Gatherer, TaskKind::Gather) => true,
            (JobRole::Builder, TaskKind::Build | TaskKind::Haul) => true,
            (JobRole::Hauler, TaskKind::Haul) => true,
            (JobRole::Hauler, TaskKind::Craft) => role == Some(CraftRole::Hauler),
            (JobRole::Crafter, TaskKind::Craft) => role == Some(CraftRole::Production),
            _ => false,
        }
    }
}

/// What a request demands of the worker that takes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Perform(TaskKind),
    Craft {
        role: CraftRole,
        specialization: Option<Specialization>,
    },
}

/// Queue identity used for deficit accounting: one counter per
/// (kind, target, craft role).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub kind: TaskKind,
    pub target: EntityId,
    pub role: Option<CraftRole>,
}

/// One open task slot. Plain value; produced by the generator and consumed by
/// the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTaskRequest {
    pub kind: TaskKind,
    pub team: TeamId,
    pub target: EntityId,
    pub craft_role: Option<CraftRole>,
    pub required_specialization: Option<Specialization>,
}

impl WorkerTaskRequest {
    pub fn gather(team: TeamId, node: EntityId) -> Self {
        Self {
            kind: TaskKind::Gather,
            team,
            target: node,
            craft_role: None,
            required_specialization: None,
        }
    }

    pub fn build(team: TeamId, site: EntityId) -> Self {
        Self {
            kind: TaskKind::Build,
            team,
            target: site,
            craft_role: None,
            required_specialization: None,
        }
    }

    pub fn haul(team: TeamId, site: EntityId) -> Self {
        Self {
            kind: TaskKind::Haul,
            team,
            target: site,
            craft_role: None,
            required_specialization: None,
        }
    }

    pub fn craft(team: TeamId, station: EntityId, specialization: Option<Specialization>) -> Self {
        Self {
            kind: TaskKind::Craft,
            team,
            target: station,
            craft_role: Some(CraftRole::Production),
            required_specialization: specialization,
        }
    }

    pub fn station_hauler(team: TeamId, station: EntityId) -> Self {
        Self {
            kind: TaskKind::Craft,
            team,
            target: station,
            craft_role: Some(CraftRole::Hauler),
            required_specialization: None,
        }
    }

    pub fn key(&self) -> TaskKey {
        TaskKey {
            kind: self.kind,
            target: self.target,
            role: self.craft_role,
        }
    }

    pub fn capability(&self) -> Capability {
        match self.kind {
            TaskKind::Craft => Capability::Craft {
                role: self.craft_role.unwrap_or(CraftRole::Production),
                specialization: self.required_specialization,
            },
            kind => Capability::Perform(kind),
        }
    }
}

/// Check a worker's role and specialization against a capability.
pub fn can_perform(role: JobRole, specialization: Option<Specialization>, capability: &Capability) -> bool {
    match *capability {
        Capability::Perform(kind) => role.accepts(kind, None),
        Capability::Craft {
            role: craft_role,
            specialization: required,
        } => {
            role.accepts(TaskKind::Craft, Some(craft_role))
                && match required {
                    Some(needed) => specialization == Some(needed),
                    None => true,
                }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert_eq!(
            TaskKind::PRIORITY,
            [TaskKind::Craft, TaskKind::Haul, TaskKind::Build, TaskKind::Gather]
        );
    }

    #[test]
    fn test_craft_requires_matching_specialization() {
        let req = WorkerTaskRequest::craft(TeamId(0), EntityId(1), Some(Specialization::Carpenter));
        let cap = req.capability();
        assert!(can_perform(JobRole::Crafter, Some(Specialization::Carpenter), &cap));
        assert!(!can_perform(JobRole::Crafter, Some(Specialization::Baker), &cap));
        assert!(!can_perform(JobRole::Crafter, None, &cap));
        assert!(!can_perform(JobRole::Hauler, Some(Specialization::Carpenter), &cap));
    }

    #[test]
    fn test_station_hauler_seat_is_for_haulers() {
        let cap = WorkerTaskRequest::station_hauler(TeamId(0), EntityId(1)).capability();
        assert!(can_perform(JobRole::Hauler, None, &cap));
        assert!(!can_perform(JobRole::Crafter, Some(Specialization::Smith), &cap));
    }

    #[test]
    fn test_builders_haul_but_gatherers_do_not() {
        let haul = Capability::Perform(TaskKind::Haul);
        assert!(can_perform(JobRole::Builder, None, &haul));
        assert!(can_perform(JobRole::Hauler, None, &haul));
        assert!(!can_perform(JobRole::Gatherer, None, &haul));
        assert!(!can_perform(JobRole::Unemployed, None, &haul));
    }
}
