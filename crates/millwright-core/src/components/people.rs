//! Civilian components.

use millwright_logic::agent::{AgentMachine, AgentState};
use millwright_logic::ids::{EntityId, ResourceAmount, ResourceKind, TeamId, ToolId};
use millwright_logic::needs::NeedLevels;
use millwright_logic::tasks::{JobRole, Specialization};
use serde::{Deserialize, Serialize};

/// A settler: job, state machine, needs and the single carry slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Civilian {
    pub team: TeamId,
    pub specialization: Option<Specialization>,
    pub tool: Option<ToolId>,
    pub machine: AgentMachine,
    pub needs: NeedLevels,
    pub carry: Option<ResourceAmount>,
    pub house: Option<EntityId>,
    /// Seconds until the next dispatcher poll.
    pub search_cooldown: f32,
}

impl Civilian {
    pub fn new(team: TeamId, role: JobRole) -> Self {
        Self {
            team,
            specialization: None,
            tool: None,
            machine: AgentMachine::new(role),
            needs: NeedLevels::default(),
            carry: None,
            house: None,
            search_cooldown: 0.0,
        }
    }

    pub fn with_specialization(mut self, specialization: Specialization) -> Self {
        self.specialization = Some(specialization);
        self
    }

    pub fn with_tool(mut self, tool: ToolId) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn state(&self) -> &AgentState {
        self.machine.state()
    }

    pub fn role(&self) -> JobRole {
        self.machine.role()
    }

    pub fn carried(&self) -> u32 {
        self.carry.map(|c| c.amount).unwrap_or(0)
    }

    pub fn carried_kind(&self) -> Option<ResourceKind> {
        self.carry.filter(|c| c.amount > 0).map(|c| c.kind)
    }

    pub fn is_carrying(&self) -> bool {
        self.carried() > 0
    }

    /// Add to the carry slot. Only one kind at a time; returns the amount taken.
    pub fn load(&mut self, kind: ResourceKind, amount: u32, capacity: u32) -> u32 {
        match self.carry {
            Some(c) if c.amount > 0 && c.kind != kind => 0,
            _ => {
                let current = self.carried();
                let taken = amount.min(capacity.saturating_sub(current));
                if taken > 0 {
                    self.carry = Some(ResourceAmount::new(kind, current + taken));
                }
                taken
            }
        }
    }

    /// Remove from the carry slot; returns the amount removed.
    pub fn unload(&mut self, amount: u32) -> u32 {
        let Some(mut carry) = self.carry else {
            return 0;
        };
        let removed = amount.min(carry.amount);
        carry.amount -= removed;
        self.carry = (carry.amount > 0).then_some(carry);
        removed
    }
}
