//! Worker agent state machine.
//!
//! A civilian is always in exactly one [`AgentState`]. The engine observes
//! the world, raises an [`AgentEvent`], and [`transition`] says where that
//! leads. Everything a state holds in the wider world (gather slots, site
//! seats, reservations, in-transit goods, station seats) is listed by
//! [`AgentState::claims`]; on every transition the engine releases the
//! claims of the old state that the new state does not also hold.
//!
//! Needs sit on top of the work families. [`AgentMachine`] saves a resume
//! point when a need interrupts and restores it when the need is met.

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, ResourceKind};
use crate::needs::{preempts, NeedKind};
use crate::tasks::{CraftRole, JobRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,

    // Needs
    SeekingFoodStorage { storage: Option<EntityId> },
    Eating { elapsed: f32, nutrition: f32 },
    SeekingHouse { house: Option<EntityId> },
    Sleeping { house: Option<EntityId> },

    // Gather
    SearchingNode,
    MovingToNode { node: EntityId },
    Gathering { node: EntityId, progress: f32 },
    ReturningToStorage { storage: Option<EntityId> },

    // Build
    SearchingSite,
    MovingToSite { site: EntityId },
    Building { site: EntityId },

    // Haul
    SearchingHaul,
    MovingToPickup {
        site: EntityId,
        storage: EntityId,
        kind: ResourceKind,
        reserved: u32,
    },
    DeliveringToSite {
        site: EntityId,
        kind: ResourceKind,
        in_transit: u32,
    },

    // Craft
    SearchingStation,
    MovingToWorkPoint {
        station: EntityId,
        point: usize,
        waited: f32,
    },
    Crafting { station: EntityId, point: usize },
    ServicingStation { station: EntityId, role: CraftRole },
    FetchingInput {
        station: EntityId,
        role: CraftRole,
        storage: EntityId,
        kind: ResourceKind,
        reserved: u32,
    },
    DeliveringInput {
        station: EntityId,
        role: CraftRole,
        kind: ResourceKind,
        in_transit: u32,
    },
    CollectingOutput { station: EntityId, role: CraftRole },
    StoringGoods {
        station: EntityId,
        role: CraftRole,
        storage: Option<EntityId>,
    },

    DepositingCarry { storage: Option<EntityId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateFamily {
    Idle,
    Needs,
    Gather,
    Build,
    Haul,
    Craft,
    Deposit,
}

/// Something a state holds outside the civilian itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Claim {
    GatherSlot { node: EntityId },
    SiteWork { site: EntityId },
    SiteHaul { site: EntityId },
    /// Stock promised to `destination`, to be collected from `source`.
    Reservation {
        destination: EntityId,
        source: EntityId,
        kind: ResourceKind,
        amount: u32,
    },
    InTransit {
        destination: EntityId,
        kind: ResourceKind,
        amount: u32,
    },
    StationWorker { station: EntityId },
    StationHauler { station: EntityId },
}

fn station_seat(station: EntityId, role: CraftRole) -> Claim {
    match role {
        CraftRole::Production => Claim::StationWorker { station },
        CraftRole::Hauler => Claim::StationHauler { station },
    }
}

impl AgentState {
    pub fn family(&self) -> StateFamily {
        use AgentState::*;
        match self {
            Idle => StateFamily::Idle,
            SeekingFoodStorage { .. } | Eating { .. } | SeekingHouse { .. } | Sleeping { .. } => StateFamily::Needs,
            SearchingNode | MovingToNode { .. } | Gathering { .. } | ReturningToStorage { .. } => StateFamily::Gather,
            SearchingSite | MovingToSite { .. } | Building { .. } => StateFamily::Build,
            SearchingHaul | MovingToPickup { .. } | DeliveringToSite { .. } => StateFamily::Haul,
            SearchingStation
            | MovingToWorkPoint { .. }
            | Crafting { .. }
            | ServicingStation { .. }
            | FetchingInput { .. }
            | DeliveringInput { .. }
            | CollectingOutput { .. }
            | StoringGoods { .. } => StateFamily::Craft,
            DepositingCarry { .. } => StateFamily::Deposit,
        }
    }

    /// Short stable label for logs and reports.
    pub fn label(&self) -> &'static str {
        use AgentState::*;
        match self {
            Idle => "idle",
            SeekingFoodStorage { .. } => "seeking_food_storage",
            Eating { .. } => "eating",
            SeekingHouse { .. } => "seeking_house",
            Sleeping { .. } => "sleeping",
            SearchingNode => "searching_node",
            MovingToNode { .. } => "moving_to_node",
            Gathering { .. } => "gathering",
            ReturningToStorage { .. } => "returning_to_storage",
            SearchingSite => "searching_site",
            MovingToSite { .. } => "moving_to_site",
            Building { .. } => "building",
            SearchingHaul => "searching_haul",
            MovingToPickup { .. } => "moving_to_pickup",
            DeliveringToSite { .. } => "delivering_to_site",
            SearchingStation => "searching_station",
            MovingToWorkPoint { .. } => "moving_to_work_point",
            Crafting { .. } => "crafting",
            ServicingStation { .. } => "servicing_station",
            FetchingInput { .. } => "fetching_input",
            DeliveringInput { .. } => "delivering_input",
            CollectingOutput { .. } => "collecting_output",
            StoringGoods { .. } => "storing_goods",
            DepositingCarry { .. } => "depositing_carry",
        }
    }

    pub fn is_need(&self) -> bool {
        self.family() == StateFamily::Needs
    }

    /// The need this state is handling, if any.
    pub fn need(&self) -> Option<NeedKind> {
        match self {
            AgentState::SeekingFoodStorage { .. } | AgentState::Eating { .. } => Some(NeedKind::Hunger),
            AgentState::SeekingHouse { .. } | AgentState::Sleeping { .. } => Some(NeedKind::Fatigue),
            _ => None,
        }
    }

    /// Idle or a family search state: free to take new work.
    pub fn is_searching(&self) -> bool {
        matches!(
            self,
            AgentState::Idle
                | AgentState::SearchingNode
                | AgentState::SearchingSite
                | AgentState::SearchingHaul
                | AgentState::SearchingStation
        )
    }

    /// A production worker away from its work point on a buffer errand.
    pub fn is_errand(&self) -> bool {
        use AgentState::*;
        match self {
            ServicingStation { role, .. }
            | FetchingInput { role, .. }
            | DeliveringInput { role, .. }
            | CollectingOutput { role, .. }
            | StoringGoods { role, .. } => *role == CraftRole::Production,
            _ => false,
        }
    }

    /// States whose purpose is to move goods out of the carry slot.
    pub fn is_delivering_carry(&self) -> bool {
        matches!(
            self,
            AgentState::DeliveringToSite { .. }
                | AgentState::DeliveringInput { .. }
                | AgentState::StoringGoods { .. }
                | AgentState::ReturningToStorage { .. }
                | AgentState::DepositingCarry { .. }
        )
    }

    pub fn family_search(&self) -> Option<AgentState> {
        match self.family() {
            StateFamily::Gather => Some(AgentState::SearchingNode),
            StateFamily::Build => Some(AgentState::SearchingSite),
            StateFamily::Haul => Some(AgentState::SearchingHaul),
            StateFamily::Craft => Some(AgentState::SearchingStation),
            StateFamily::Idle | StateFamily::Needs | StateFamily::Deposit => None,
        }
    }

    /// Everything this state holds in the world. Zero quantities are omitted.
    pub fn claims(&self) -> Vec<Claim> {
        use AgentState::*;
        let mut claims = Vec::new();
        match *self {
            MovingToNode { node } | Gathering { node, .. } => claims.push(Claim::GatherSlot { node }),
            MovingToSite { site } | Building { site } => claims.push(Claim::SiteWork { site }),
            MovingToPickup {
                site,
                storage,
                kind,
                reserved,
            } => {
                claims.push(Claim::SiteHaul { site });
                if reserved > 0 {
                    claims.push(Claim::Reservation {
                        destination: site,
                        source: storage,
                        kind,
                        amount: reserved,
                    });
                }
            }
            DeliveringToSite { site, kind, in_transit } => {
                claims.push(Claim::SiteHaul { site });
                if in_transit > 0 {
                    claims.push(Claim::InTransit {
                        destination: site,
                        kind,
                        amount: in_transit,
                    });
                }
            }
            MovingToWorkPoint { station, .. } | Crafting { station, .. } => {
                claims.push(Claim::StationWorker { station })
            }
            ServicingStation { station, role }
            | CollectingOutput { station, role }
            | StoringGoods { station, role, .. } => claims.push(station_seat(station, role)),
            FetchingInput {
                station,
                role,
                storage,
                kind,
                reserved,
            } => {
                claims.push(station_seat(station, role));
                if reserved > 0 {
                    claims.push(Claim::Reservation {
                        destination: station,
                        source: storage,
                        kind,
                        amount: reserved,
                    });
                }
            }
            DeliveringInput {
                station,
                role,
                kind,
                in_transit,
            } => {
                claims.push(station_seat(station, role));
                if in_transit > 0 {
                    claims.push(Claim::InTransit {
                        destination: station,
                        kind,
                        amount: in_transit,
                    });
                }
            }
            _ => {}
        }
        claims
    }

    /// Where to pick up after a need interrupt. Claims are released when the
    /// interrupt begins, so claim-holding states resume at their family's
    /// search state, and states moving goods resume by depositing them.
    pub fn resume_point(&self) -> AgentState {
        use AgentState::*;
        match self {
            DeliveringToSite { .. } | DeliveringInput { .. } | StoringGoods { .. } => DepositingCarry { storage: None },
            ReturningToStorage { .. } => ReturningToStorage { storage: None },
            DepositingCarry { .. } => DepositingCarry { storage: None },
            state if state.is_searching() || state.is_need() => state.clone(),
            state => state.family_search().unwrap_or(Idle),
        }
    }

    /// Main entity the civilian is heading to or working at.
    pub fn target(&self) -> Option<EntityId> {
        use AgentState::*;
        match *self {
            SeekingFoodStorage { storage } | ReturningToStorage { storage } | DepositingCarry { storage } => storage,
            SeekingHouse { house } | Sleeping { house } => house,
            MovingToNode { node } | Gathering { node, .. } => Some(node),
            MovingToSite { site } | Building { site } | DeliveringToSite { site, .. } => Some(site),
            MovingToPickup { storage, .. } | FetchingInput { storage, .. } => Some(storage),
            MovingToWorkPoint { station, .. }
            | Crafting { station, .. }
            | ServicingStation { station, .. }
            | DeliveringInput { station, .. }
            | CollectingOutput { station, .. } => Some(station),
            StoringGoods { storage, .. } => storage,
            _ => None,
        }
    }
}

impl JobRole {
    /// Where a civilian with this role goes when it has nothing else to do.
    pub fn default_state(self) -> AgentState {
        match self {
            JobRole::Unemployed => AgentState::Idle,
            JobRole::Gatherer => AgentState::SearchingNode,
            JobRole::Builder => AgentState::SearchingSite,
            JobRole::Hauler => AgentState::SearchingHaul,
            JobRole::Crafter => AgentState::SearchingStation,
        }
    }
}

/// A task the dispatcher handed over, with whatever the civilian claimed
/// while accepting it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Assignment {
    Gather { node: EntityId },
    Build { site: EntityId },
    Haul {
        site: EntityId,
        storage: EntityId,
        kind: ResourceKind,
        reserved: u32,
    },
    Craft { station: EntityId, point: usize },
    StationLogistics { station: EntityId },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AgentEvent {
    NeedCrossed(NeedKind),
    NeedSatisfied(NeedKind),
    RoleChanged(JobRole),
    Assigned(Assignment),
    /// A destination (storage or house) was picked for the current state.
    Found(EntityId),
    SleepRough,
    Arrived,
    StartMeal { nutrition: f32 },
    MealFinished,
    /// The work target vanished or finished.
    TargetLost,
    /// The chosen storage or house vanished or refused.
    StorageLost,
    CarryFull,
    PickedUp { amount: u32 },
    PickupFailed,
    CarryEmpty,
    CarryRemains,
    WorkComplete,
    ServiceStation,
    FetchInput {
        storage: EntityId,
        kind: ResourceKind,
        reserved: u32,
    },
    CollectOutput,
    StoreCarry,
    ReturnToPoint { point: usize },
    Stalled,
    Evicted,
    MustDeposit,
    Cancel,
}

fn assigned_state(assignment: &Assignment) -> AgentState {
    match *assignment {
        Assignment::Gather { node } => AgentState::MovingToNode { node },
        Assignment::Build { site } => AgentState::MovingToSite { site },
        Assignment::Haul {
            site,
            storage,
            kind,
            reserved,
        } => AgentState::MovingToPickup {
            site,
            storage,
            kind,
            reserved,
        },
        Assignment::Craft { station, point } => AgentState::MovingToWorkPoint {
            station,
            point,
            waited: 0.0,
        },
        Assignment::StationLogistics { station } => AgentState::ServicingStation {
            station,
            role: CraftRole::Hauler,
        },
    }
}

fn need_entry(kind: NeedKind) -> AgentState {
    match kind {
        NeedKind::Hunger => AgentState::SeekingFoodStorage { storage: None },
        NeedKind::Fatigue => AgentState::SeekingHouse { house: None },
    }
}

/// Pure transition function. `None` means the event does not apply to the
/// state and nothing changes.
pub fn transition(state: &AgentState, event: &AgentEvent, role: JobRole) -> Option<AgentState> {
    use AgentEvent as E;
    use AgentState as S;

    // Events valid from (almost) any state.
    match *event {
        E::NeedCrossed(kind) => {
            return preempts(kind, state.need()).then(|| need_entry(kind));
        }
        E::NeedSatisfied(kind) => {
            return (state.need() == Some(kind)).then(|| role.default_state());
        }
        E::RoleChanged(new_role) => {
            return (!state.is_need()).then(|| new_role.default_state());
        }
        E::Cancel => {
            return (!state.is_need() && *state != role.default_state()).then(|| role.default_state());
        }
        E::Assigned(ref assignment) => {
            return state.is_searching().then(|| assigned_state(assignment));
        }
        E::MustDeposit => {
            return state
                .is_searching()
                .then_some(S::DepositingCarry { storage: None });
        }
        _ => {}
    }

    let next = match (state, event) {
        // Needs
        (S::SeekingFoodStorage { .. }, E::Found(storage)) => S::SeekingFoodStorage { storage: Some(*storage) },
        (S::SeekingFoodStorage { .. }, E::StorageLost) => S::SeekingFoodStorage { storage: None },
        (S::SeekingFoodStorage { .. }, E::StartMeal { nutrition }) => S::Eating {
            elapsed: 0.0,
            nutrition: *nutrition,
        },
        (S::Eating { .. }, E::MealFinished) => S::SeekingFoodStorage { storage: None },
        (S::SeekingHouse { .. }, E::Found(house)) => S::SeekingHouse { house: Some(*house) },
        (S::SeekingHouse { .. }, E::StorageLost) => S::SeekingHouse { house: None },
        (S::SeekingHouse { .. }, E::SleepRough) => S::Sleeping { house: None },
        (S::SeekingHouse { house: Some(house) }, E::Arrived) => S::Sleeping { house: Some(*house) },
        (S::Sleeping { house: Some(_) }, E::TargetLost) => S::Sleeping { house: None },

        // Gather
        (S::MovingToNode { node }, E::Arrived) => S::Gathering {
            node: *node,
            progress: 0.0,
        },
        (S::Gathering { .. }, E::CarryFull) => S::ReturningToStorage { storage: None },
        (S::ReturningToStorage { .. }, E::Found(storage)) => S::ReturningToStorage { storage: Some(*storage) },
        (S::ReturningToStorage { .. }, E::StorageLost | E::CarryRemains) => S::ReturningToStorage { storage: None },
        (S::ReturningToStorage { .. }, E::CarryEmpty) => S::SearchingNode,

        // Build
        (S::MovingToSite { site }, E::Arrived) => S::Building { site: *site },
        (S::Building { .. }, E::WorkComplete) => S::SearchingSite,

        // Haul
        (
            S::MovingToPickup { site, kind, .. },
            E::PickedUp { amount },
        ) => S::DeliveringToSite {
            site: *site,
            kind: *kind,
            in_transit: *amount,
        },
        (S::MovingToPickup { .. }, E::PickupFailed | E::StorageLost) => S::SearchingHaul,
        (S::DeliveringToSite { .. }, E::CarryEmpty) => S::SearchingHaul,
        (S::DeliveringToSite { .. }, E::CarryRemains) => S::DepositingCarry { storage: None },

        // Craft
        (S::MovingToWorkPoint { station, point, .. }, E::Arrived) => S::Crafting {
            station: *station,
            point: *point,
        },
        (S::MovingToWorkPoint { .. }, E::Stalled) => role.default_state(),
        (S::Crafting { station, .. }, E::ServiceStation) => S::ServicingStation {
            station: *station,
            role: CraftRole::Production,
        },
        (
            S::ServicingStation { station, role },
            E::FetchInput {
                storage,
                kind,
                reserved,
            },
        ) => S::FetchingInput {
            station: *station,
            role: *role,
            storage: *storage,
            kind: *kind,
            reserved: *reserved,
        },
        (S::ServicingStation { station, role }, E::CollectOutput) => S::CollectingOutput {
            station: *station,
            role: *role,
        },
        (
            S::ServicingStation {
                station,
                role: CraftRole::Production,
            },
            E::ReturnToPoint { point },
        ) => S::MovingToWorkPoint {
            station: *station,
            point: *point,
            waited: 0.0,
        },
        (
            S::FetchingInput {
                station, role, kind, ..
            },
            E::PickedUp { amount },
        ) => S::DeliveringInput {
            station: *station,
            role: *role,
            kind: *kind,
            in_transit: *amount,
        },
        (S::FetchingInput { station, role, .. }, E::PickupFailed | E::StorageLost) => S::ServicingStation {
            station: *station,
            role: *role,
        },
        (S::DeliveringInput { station, role, .. }, E::CarryEmpty) => S::ServicingStation {
            station: *station,
            role: *role,
        },
        (S::DeliveringInput { .. }, E::CarryRemains) => S::DepositingCarry { storage: None },
        (S::CollectingOutput { station, role }, E::StoreCarry) => S::StoringGoods {
            station: *station,
            role: *role,
            storage: None,
        },
        (S::CollectingOutput { station, role }, E::PickupFailed) => S::ServicingStation {
            station: *station,
            role: *role,
        },
        (S::StoringGoods { station, role, .. }, E::Found(storage)) => S::StoringGoods {
            station: *station,
            role: *role,
            storage: Some(*storage),
        },
        (S::StoringGoods { station, role, .. }, E::StorageLost | E::CarryRemains) => S::StoringGoods {
            station: *station,
            role: *role,
            storage: None,
        },
        (S::StoringGoods { station, role, .. }, E::CarryEmpty) => S::ServicingStation {
            station: *station,
            role: *role,
        },

        // Deposit detour
        (S::DepositingCarry { .. }, E::Found(storage)) => S::DepositingCarry { storage: Some(*storage) },
        (S::DepositingCarry { .. }, E::StorageLost | E::CarryRemains) => S::DepositingCarry { storage: None },
        (S::DepositingCarry { .. }, E::CarryEmpty) => role.default_state(),

        // Lost targets and evictions: drop goods first if carrying them for
        // the lost target, otherwise go back to searching.
        (state, E::TargetLost | E::Evicted)
            if matches!(
                state,
                S::DeliveringToSite { .. } | S::DeliveringInput { .. } | S::StoringGoods { .. }
            ) =>
        {
            S::DepositingCarry { storage: None }
        }
        (state, E::TargetLost) => state.family_search()?,
        (state, E::Evicted) if state.family() == StateFamily::Craft && !state.is_searching() => match role {
            JobRole::Crafter => S::SearchingStation,
            _ => role.default_state(),
        },

        _ => return None,
    };
    Some(next)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: AgentState,
    pub to: AgentState,
}

impl Transition {
    /// Claims held by `from` that `to` does not keep.
    pub fn released_claims(&self) -> Vec<Claim> {
        let kept = self.to.claims();
        self.from
            .claims()
            .into_iter()
            .filter(|claim| !kept.contains(claim))
            .collect()
    }
}

/// Per-civilian machine: current state, role, and the saved resume point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMachine {
    state: AgentState,
    resume: Option<AgentState>,
    role: JobRole,
}

impl AgentMachine {
    pub fn new(role: JobRole) -> Self {
        Self {
            state: role.default_state(),
            resume: None,
            role,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// In-place edit of state fields that do not change the state itself,
    /// such as timers or a settled reservation amount.
    pub fn state_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }

    pub fn role(&self) -> JobRole {
        self.role
    }

    pub fn resume(&self) -> Option<&AgentState> {
        self.resume.as_ref()
    }

    pub fn handle(&mut self, event: AgentEvent) -> Option<Transition> {
        match event {
            AgentEvent::RoleChanged(role) => {
                self.role = role;
                if self.state.is_need() {
                    self.resume = None;
                }
            }
            AgentEvent::NeedCrossed(kind) => {
                if preempts(kind, self.state.need()) && !self.state.is_need() && self.resume.is_none() {
                    self.resume = Some(self.state.resume_point());
                }
            }
            _ => {}
        }

        let mut next = transition(&self.state, &event, self.role)?;
        if let AgentEvent::NeedSatisfied(_) = event {
            if let Some(saved) = self.resume.take() {
                if !saved.is_need() {
                    next = saved;
                }
            }
        }
        let from = std::mem::replace(&mut self.state, next);
        Some(Transition {
            from,
            to: self.state.clone(),
        })
    }

    /// Force a state without going through [`transition`], e.g. on load.
    pub fn reset(&mut self, state: AgentState) -> Transition {
        self.resume = None;
        let from = std::mem::replace(&mut self.state, state);
        Transition {
            from,
            to: self.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: EntityId = EntityId(10);
    const SITE: EntityId = EntityId(11);
    const STATION: EntityId = EntityId(12);
    const STORE: EntityId = EntityId(13);
    const WOOD: ResourceKind = ResourceKind(0);

    #[test]
    fn test_hunger_interrupts_gathering_and_resumes_search() {
        let mut machine = AgentMachine::new(JobRole::Gatherer);
        machine.handle(AgentEvent::Assigned(Assignment::Gather { node: NODE }));
        machine.handle(AgentEvent::Arrived);
        assert!(matches!(machine.state(), AgentState::Gathering { .. }));

        let t = machine.handle(AgentEvent::NeedCrossed(NeedKind::Hunger)).unwrap();
        assert_eq!(t.to, AgentState::SeekingFoodStorage { storage: None });
        assert_eq!(t.released_claims(), vec![Claim::GatherSlot { node: NODE }]);

        machine.handle(AgentEvent::NeedSatisfied(NeedKind::Hunger));
        assert_eq!(machine.state(), &AgentState::SearchingNode);
        assert!(machine.resume().is_none());
    }

    #[test]
    fn test_reentrant_interrupt_keeps_first_resume_point() {
        let mut machine = AgentMachine::new(JobRole::Builder);
        machine.handle(AgentEvent::Assigned(Assignment::Build { site: SITE }));
        machine.handle(AgentEvent::NeedCrossed(NeedKind::Fatigue));
        machine.handle(AgentEvent::NeedCrossed(NeedKind::Hunger));
        assert_eq!(machine.state(), &AgentState::SeekingFoodStorage { storage: None });
        assert_eq!(machine.resume(), Some(&AgentState::SearchingSite));
    }

    #[test]
    fn test_fatigue_does_not_preempt_hunger() {
        let mut machine = AgentMachine::new(JobRole::Gatherer);
        machine.handle(AgentEvent::NeedCrossed(NeedKind::Hunger));
        assert!(machine.handle(AgentEvent::NeedCrossed(NeedKind::Fatigue)).is_none());
        assert_eq!(machine.state().need(), Some(NeedKind::Hunger));
    }

    #[test]
    fn test_carrying_state_resumes_by_depositing() {
        let delivering = AgentState::DeliveringToSite {
            site: SITE,
            kind: WOOD,
            in_transit: 5,
        };
        assert_eq!(delivering.resume_point(), AgentState::DepositingCarry { storage: None });
        let returning = AgentState::ReturningToStorage { storage: Some(STORE) };
        assert_eq!(returning.resume_point(), AgentState::ReturningToStorage { storage: None });
    }

    #[test]
    fn test_role_change_during_need_falls_back_to_new_default() {
        let mut machine = AgentMachine::new(JobRole::Gatherer);
        machine.handle(AgentEvent::NeedCrossed(NeedKind::Hunger));
        assert!(machine.handle(AgentEvent::RoleChanged(JobRole::Hauler)).is_none());
        machine.handle(AgentEvent::NeedSatisfied(NeedKind::Hunger));
        assert_eq!(machine.state(), &AgentState::SearchingHaul);
    }

    #[test]
    fn test_haul_pickup_moves_reservation_into_transit() {
        let mut machine = AgentMachine::new(JobRole::Hauler);
        machine.handle(AgentEvent::Assigned(Assignment::Haul {
            site: SITE,
            storage: STORE,
            kind: WOOD,
            reserved: 4,
        }));
        assert!(machine.state().claims().contains(&Claim::Reservation {
            destination: SITE,
            source: STORE,
            kind: WOOD,
            amount: 4,
        }));

        if let AgentState::MovingToPickup { reserved, .. } = machine.state_mut() {
            *reserved = 0;
        }
        let t = machine.handle(AgentEvent::PickedUp { amount: 4 }).unwrap();
        assert!(t.released_claims().is_empty());
        assert_eq!(
            t.to.claims(),
            vec![
                Claim::SiteHaul { site: SITE },
                Claim::InTransit {
                    destination: SITE,
                    kind: WOOD,
                    amount: 4,
                },
            ]
        );

        let lost = machine.handle(AgentEvent::TargetLost).unwrap();
        assert_eq!(lost.to, AgentState::DepositingCarry { storage: None });
    }

    #[test]
    fn test_station_errand_keeps_worker_seat() {
        let mut machine = AgentMachine::new(JobRole::Crafter);
        machine.handle(AgentEvent::Assigned(Assignment::Craft {
            station: STATION,
            point: 0,
        }));
        machine.handle(AgentEvent::Arrived);
        let t = machine.handle(AgentEvent::ServiceStation).unwrap();
        assert!(t.to.is_errand());
        assert!(t.released_claims().is_empty());

        let back = machine.handle(AgentEvent::ReturnToPoint { point: 0 }).unwrap();
        assert!(matches!(back.to, AgentState::MovingToWorkPoint { .. }));
    }

    #[test]
    fn test_stall_falls_back_to_role_default() {
        let mut machine = AgentMachine::new(JobRole::Crafter);
        machine.handle(AgentEvent::Assigned(Assignment::Craft {
            station: STATION,
            point: 1,
        }));
        let t = machine.handle(AgentEvent::Stalled).unwrap();
        assert_eq!(t.to, AgentState::SearchingStation);
        assert_eq!(t.released_claims(), vec![Claim::StationWorker { station: STATION }]);
    }

    #[test]
    fn test_evicted_station_hauler_returns_to_hauling() {
        let mut machine = AgentMachine::new(JobRole::Hauler);
        machine.handle(AgentEvent::Assigned(Assignment::StationLogistics { station: STATION }));
        let t = machine.handle(AgentEvent::Evicted).unwrap();
        assert_eq!(t.to, AgentState::SearchingHaul);
        assert_eq!(t.released_claims(), vec![Claim::StationHauler { station: STATION }]);
    }

    #[test]
    fn test_assignment_only_from_search_states() {
        let building = AgentState::Building { site: SITE };
        let event = AgentEvent::Assigned(Assignment::Build { site: SITE });
        assert!(transition(&building, &event, JobRole::Builder).is_none());
        assert!(transition(&AgentState::SearchingSite, &event, JobRole::Builder).is_some());
    }

    #[test]
    fn test_must_deposit_from_search() {
        let next = transition(&AgentState::SearchingNode, &AgentEvent::MustDeposit, JobRole::Gatherer);
        assert_eq!(next, Some(AgentState::DepositingCarry { storage: None }));
        let after = transition(
            &AgentState::DepositingCarry { storage: Some(STORE) },
            &AgentEvent::CarryEmpty,
            JobRole::Gatherer,
        );
        assert_eq!(after, Some(AgentState::SearchingNode));
    }

    #[test]
    fn test_default_states() {
        assert_eq!(JobRole::Unemployed.default_state(), AgentState::Idle);
        assert_eq!(JobRole::Crafter.default_state(), AgentState::SearchingStation);
    }
}
