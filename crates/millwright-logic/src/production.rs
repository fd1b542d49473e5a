//! Production station: input buffer → craft timer → output buffer.
//!
//! Guards are evaluated every tick in a fixed priority order:
//!
//! 1. any output at or above cap ⇒ `WaitingForPickup` (backpressure wins)
//! 2. any input below its effective requirement ⇒ `WaitingForInputs`
//! 3. nobody physically at a work point ⇒ `InputsReady`
//! 4. otherwise `InProgress`, accruing `dt × active workers`
//!
//! On completion every input requirement is debited and every output is
//! credited clamped to the output cap. Overflow is discarded and reported in
//! the returned [`CraftCycle`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, RecipeId, ResourceAmount, ResourceKind};
use crate::tasks::Specialization;

/// Float slack when comparing an accrued timer against the craft duration.
const TIMER_EPSILON: f32 = 1e-4;

/// A resolved recipe. Quantities are per batch unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub inputs: Vec<ResourceAmount>,
    pub outputs: Vec<ResourceAmount>,
    pub craft_time_seconds: f32,
    pub batch_size: u32,
    pub specialization: Option<Specialization>,
}

/// Static shape of a station, taken from its building definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSpec {
    pub work_points: u32,
    pub max_workers: u32,
    pub max_haulers: u32,
    pub input_capacity: u32,
    pub output_capacity: u32,
    pub station_modifier: f32,
    pub input_efficiency: f32,
    pub require_hauler_logistics: bool,
}

impl Default for StationSpec {
    fn default() -> Self {
        Self {
            work_points: 1,
            max_workers: 1,
            max_haulers: 0,
            input_capacity: 20,
            output_capacity: 10,
            station_modifier: 1.0,
            input_efficiency: 1.0,
            require_hauler_logistics: false,
        }
    }
}

/// Global station tuning from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationTuning {
    pub absence_timeout_seconds: f32,
    pub upgrade_speed_per_level: f32,
    pub upgrade_workers_per_level: u32,
    pub max_upgrade_level: u32,
}

impl Default for StationTuning {
    fn default() -> Self {
        Self {
            absence_timeout_seconds: 30.0,
            upgrade_speed_per_level: 0.25,
            upgrade_workers_per_level: 1,
            max_upgrade_level: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StationState {
    #[default]
    Idle,
    WaitingForInputs,
    InputsReady,
    InProgress,
    OutputReady,
    WaitingForPickup,
}

/// Why a worker or hauler could not take a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignRejection {
    NoRecipe,
    SpecializationMismatch,
    StationFull,
    NoHaulerSeats,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct WorkerSeat {
    point: Option<usize>,
    present: bool,
    on_errand: bool,
    absent_seconds: f32,
    tool_bonus: f32,
}

/// Result of one completed craft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftCycle {
    pub consumed: Vec<ResourceAmount>,
    pub produced: Vec<ResourceAmount>,
    pub discarded: Vec<ResourceAmount>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationTick {
    pub state: StationState,
    pub changed: bool,
    pub completed: Option<CraftCycle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionStation {
    spec: StationSpec,
    tuning: StationTuning,
    recipe: Option<Recipe>,
    input_buffer: BTreeMap<ResourceKind, u32>,
    output_buffer: BTreeMap<ResourceKind, u32>,
    work_points: Vec<Option<EntityId>>,
    workers: BTreeMap<EntityId, WorkerSeat>,
    haulers: BTreeSet<EntityId>,
    upgrade_level: u32,
    timer: f32,
    state: StationState,
}

impl ProductionStation {
    pub fn new(spec: StationSpec, tuning: StationTuning) -> Self {
        let points = spec.work_points as usize;
        Self {
            spec,
            tuning,
            recipe: None,
            input_buffer: BTreeMap::new(),
            output_buffer: BTreeMap::new(),
            work_points: vec![None; points],
            workers: BTreeMap::new(),
            haulers: BTreeSet::new(),
            upgrade_level: 0,
            timer: 0.0,
            state: StationState::Idle,
        }
    }

    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        self.set_recipe(Some(recipe));
        self
    }

    /// Swap the active recipe. Buffers persist; the timer restarts. Clearing
    /// the recipe unassigns every worker and hauler; the unassigned civilians
    /// are returned, workers first. See [`Self::evict_mismatched`] for
    /// specialization changes.
    pub fn set_recipe(&mut self, recipe: Option<Recipe>) -> Vec<EntityId> {
        self.timer = 0.0;
        self.recipe = recipe;
        if self.recipe.is_some() {
            return Vec::new();
        }
        let mut evicted: Vec<EntityId> = self.workers.keys().copied().collect();
        for worker in &evicted {
            self.unassign_worker(*worker);
        }
        evicted.extend(std::mem::take(&mut self.haulers));
        evicted
    }

    /// Drop workers that cannot serve the current recipe. The caller knows
    /// each worker's specialization, the station does not.
    pub fn evict_mismatched(
        &mut self,
        specialization_of: impl Fn(EntityId) -> Option<Specialization>,
    ) -> Vec<EntityId> {
        let Some(required) = self.recipe.as_ref().and_then(|r| r.specialization) else {
            return Vec::new();
        };
        let evicted: Vec<EntityId> = self
            .workers
            .keys()
            .copied()
            .filter(|w| specialization_of(*w) != Some(required))
            .collect();
        for worker in &evicted {
            self.unassign_worker(*worker);
        }
        evicted
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    pub fn spec(&self) -> &StationSpec {
        &self.spec
    }

    pub fn state(&self) -> StationState {
        self.state
    }

    pub fn timer(&self) -> f32 {
        self.timer
    }

    pub fn upgrade_level(&self) -> u32 {
        self.upgrade_level
    }

    pub fn requires_hauler_logistics(&self) -> bool {
        self.spec.require_hauler_logistics
    }

    /// Raise the upgrade level by one. False once the configured cap is reached.
    pub fn upgrade(&mut self) -> bool {
        if self.upgrade_level >= self.tuning.max_upgrade_level {
            return false;
        }
        self.upgrade_level += 1;
        true
    }

    pub fn effective_max_workers(&self) -> u32 {
        self.spec.max_workers + self.upgrade_level * self.tuning.upgrade_workers_per_level
    }

    pub fn work_point_capacity(&self) -> u32 {
        self.work_points.len() as u32
    }

    pub fn max_haulers(&self) -> u32 {
        self.spec.max_haulers
    }

    fn upgrade_multiplier(&self) -> f32 {
        1.0 + self.upgrade_level as f32 * self.tuning.upgrade_speed_per_level
    }

    fn batch(&self) -> u32 {
        self.recipe.as_ref().map(|r| r.batch_size.max(1)).unwrap_or(1)
    }

    /// Input consumed per cycle for a recipe line of `amount`.
    pub fn effective_input(&self, amount: u32) -> u32 {
        if amount == 0 {
            return 0;
        }
        let scaled = (amount * self.batch()) as f32 * self.spec.input_efficiency;
        (scaled.ceil() as u32).max(1)
    }

    /// Output credited per cycle for a recipe line of `amount`.
    pub fn effective_output(&self, amount: u32) -> u32 {
        amount * self.batch()
    }

    pub fn input_requirements(&self) -> Vec<ResourceAmount> {
        self.recipe
            .as_ref()
            .map(|r| {
                r.inputs
                    .iter()
                    .map(|line| ResourceAmount::new(line.kind, self.effective_input(line.amount)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn output_amounts(&self) -> Vec<ResourceAmount> {
        self.recipe
            .as_ref()
            .map(|r| {
                r.outputs
                    .iter()
                    .map(|line| ResourceAmount::new(line.kind, self.effective_output(line.amount)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn average_tool_bonus(&self) -> f32 {
        let present: Vec<f32> = self
            .workers
            .values()
            .filter(|s| s.present && s.point.is_some())
            .map(|s| s.tool_bonus)
            .collect();
        if present.is_empty() {
            1.0
        } else {
            present.iter().sum::<f32>() / present.len() as f32
        }
    }

    /// Seconds of single-worker labor one cycle needs, or `None` without a recipe.
    pub fn craft_duration(&self) -> Option<f32> {
        let recipe = self.recipe.as_ref()?;
        let speed = self.spec.station_modifier * self.upgrade_multiplier() * self.average_tool_bonus();
        Some(recipe.craft_time_seconds / speed.max(0.01))
    }

    // ── Staffing ────────────────────────────────────────────────────────

    pub fn assign_worker(
        &mut self,
        worker: EntityId,
        specialization: Option<Specialization>,
        tool_bonus: f32,
    ) -> Result<(), AssignRejection> {
        if self.workers.contains_key(&worker) {
            return Ok(());
        }
        let recipe = self.recipe.as_ref().ok_or(AssignRejection::NoRecipe)?;
        if let Some(required) = recipe.specialization {
            if specialization != Some(required) {
                return Err(AssignRejection::SpecializationMismatch);
            }
        }
        if self.workers.len() as u32 >= self.effective_max_workers() {
            return Err(AssignRejection::StationFull);
        }
        self.workers.insert(
            worker,
            WorkerSeat {
                point: None,
                present: false,
                on_errand: false,
                absent_seconds: 0.0,
                tool_bonus: tool_bonus.max(0.1),
            },
        );
        Ok(())
    }

    /// Remove a worker and free its work point. Idempotent.
    pub fn unassign_worker(&mut self, worker: EntityId) -> bool {
        self.release_work_point(worker);
        self.workers.remove(&worker).is_some()
    }

    pub fn is_assigned(&self, worker: EntityId) -> bool {
        self.workers.contains_key(&worker)
    }

    pub fn assigned_workers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.workers.keys().copied()
    }

    pub fn assigned_count(&self) -> u32 {
        self.workers.len() as u32
    }

    /// Claim a work point for an assigned worker. Returns the same point on
    /// repeated calls; `None` if unassigned or every point is taken.
    pub fn reserve_work_point(&mut self, worker: EntityId) -> Option<usize> {
        let seat = self.workers.get(&worker)?;
        if let Some(point) = seat.point {
            return Some(point);
        }
        let free = self.work_points.iter().position(|p| p.is_none())?;
        self.work_points[free] = Some(worker);
        if let Some(seat) = self.workers.get_mut(&worker) {
            seat.point = Some(free);
        }
        Some(free)
    }

    pub fn release_work_point(&mut self, worker: EntityId) {
        if let Some(seat) = self.workers.get_mut(&worker) {
            if let Some(point) = seat.point.take() {
                self.work_points[point] = None;
            }
            seat.present = false;
        }
    }

    pub fn work_point_of(&self, worker: EntityId) -> Option<usize> {
        self.workers.get(&worker).and_then(|s| s.point)
    }

    /// Mark whether a worker is physically standing at its point.
    pub fn set_present(&mut self, worker: EntityId, present: bool) {
        if let Some(seat) = self.workers.get_mut(&worker) {
            seat.present = present && seat.point.is_some();
            if seat.present {
                seat.absent_seconds = 0.0;
            }
        }
    }

    /// Excuse a production worker from the absence clock while it services
    /// the station's buffers.
    pub fn set_errand(&mut self, worker: EntityId, on_errand: bool) {
        if let Some(seat) = self.workers.get_mut(&worker) {
            seat.on_errand = on_errand;
            seat.absent_seconds = 0.0;
        }
    }

    pub fn errand_count(&self) -> usize {
        self.workers.values().filter(|s| s.on_errand).count()
    }

    pub fn active_workers(&self) -> u32 {
        self.workers
            .values()
            .filter(|s| s.present && s.point.is_some())
            .count() as u32
    }

    /// Advance absence clocks and force-unassign anyone absent past the
    /// timeout. Returns the evicted workers.
    pub fn tick_attendance(&mut self, dt: f32) -> Vec<EntityId> {
        let timeout = self.tuning.absence_timeout_seconds;
        let mut evicted = Vec::new();
        for (worker, seat) in self.workers.iter_mut() {
            if seat.present || seat.on_errand {
                continue;
            }
            seat.absent_seconds += dt;
            if seat.absent_seconds >= timeout {
                evicted.push(*worker);
            }
        }
        for worker in &evicted {
            self.unassign_worker(*worker);
        }
        evicted
    }

    pub fn assign_hauler(&mut self, hauler: EntityId) -> Result<(), AssignRejection> {
        if self.haulers.contains(&hauler) {
            return Ok(());
        }
        if !self.spec.require_hauler_logistics {
            return Err(AssignRejection::NoHaulerSeats);
        }
        if self.haulers.len() as u32 >= self.spec.max_haulers {
            return Err(AssignRejection::StationFull);
        }
        self.haulers.insert(hauler);
        Ok(())
    }

    pub fn unassign_hauler(&mut self, hauler: EntityId) -> bool {
        self.haulers.remove(&hauler)
    }

    pub fn is_hauler(&self, hauler: EntityId) -> bool {
        self.haulers.contains(&hauler)
    }

    pub fn hauler_count(&self) -> u32 {
        self.haulers.len() as u32
    }

    // ── Buffers ─────────────────────────────────────────────────────────

    pub fn input_stored(&self, kind: ResourceKind) -> u32 {
        self.input_buffer.get(&kind).copied().unwrap_or(0)
    }

    pub fn output_stored(&self, kind: ResourceKind) -> u32 {
        self.output_buffer.get(&kind).copied().unwrap_or(0)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (ResourceKind, u32)> + '_ {
        self.input_buffer.iter().map(|(k, v)| (*k, *v))
    }

    pub fn outputs(&self) -> impl Iterator<Item = (ResourceKind, u32)> + '_ {
        self.output_buffer.iter().map(|(k, v)| (*k, *v))
    }

    fn is_recipe_input(&self, kind: ResourceKind) -> bool {
        self.recipe
            .as_ref()
            .is_some_and(|r| r.inputs.iter().any(|line| line.kind == kind))
    }

    /// Load inputs, bounded by the input cap. Kinds the recipe does not use
    /// are refused.
    pub fn deposit_input(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        if !self.is_recipe_input(kind) {
            return 0;
        }
        let cap = self.spec.input_capacity;
        let stored = self.input_buffer.entry(kind).or_insert(0);
        let accepted = amount.min(cap.saturating_sub(*stored));
        *stored += accepted;
        accepted
    }

    pub fn take_output(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        let Some(stored) = self.output_buffer.get_mut(&kind) else {
            return 0;
        };
        let taken = amount.min(*stored);
        *stored -= taken;
        if *stored == 0 {
            self.output_buffer.remove(&kind);
        }
        taken
    }

    /// Any recipe input below its per-cycle requirement.
    pub fn needs_any_input(&self) -> bool {
        self.input_requirements()
            .iter()
            .any(|req| self.input_stored(req.kind) < req.amount)
    }

    pub fn has_any_output_queued(&self) -> bool {
        self.output_buffer.values().any(|v| *v > 0)
    }

    /// The most depleted input (relative to its requirement) that still has
    /// room, with the amount needed to fill it to the cap.
    pub fn try_get_input_request(&self) -> Option<ResourceAmount> {
        let cap = self.spec.input_capacity;
        self.input_requirements()
            .into_iter()
            .filter_map(|req| {
                let stored = self.input_stored(req.kind);
                let room = cap.saturating_sub(stored);
                (room > 0).then(|| (stored as f32 / req.amount.max(1) as f32, ResourceAmount::new(req.kind, room)))
            })
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, request)| request)
    }

    /// The fullest output kind and how much of it is waiting.
    pub fn try_get_output_request(&self) -> Option<ResourceAmount> {
        self.output_buffer
            .iter()
            .filter(|(_, v)| **v > 0)
            .max_by_key(|(_, v)| **v)
            .map(|(k, v)| ResourceAmount::new(*k, *v))
    }

    // ── Tick ────────────────────────────────────────────────────────────

    fn outputs_blocked(&self) -> bool {
        let cap = self.spec.output_capacity;
        self.recipe
            .as_ref()
            .is_some_and(|r| r.outputs.iter().any(|line| self.output_stored(line.kind) >= cap))
    }

    pub fn tick(&mut self, dt: f32) -> StationTick {
        let previous = self.state;
        let mut completed = None;

        self.state = if self.recipe.is_none() {
            self.timer = 0.0;
            StationState::Idle
        } else if self.outputs_blocked() {
            StationState::WaitingForPickup
        } else if self.needs_any_input() {
            StationState::WaitingForInputs
        } else {
            let active = self.active_workers();
            if active == 0 {
                StationState::InputsReady
            } else {
                self.timer += dt * active as f32;
                let duration = self.craft_duration().unwrap_or(f32::MAX);
                if self.timer + TIMER_EPSILON >= duration {
                    completed = Some(self.complete_cycle());
                    StationState::OutputReady
                } else {
                    StationState::InProgress
                }
            }
        };

        StationTick {
            state: self.state,
            changed: self.state != previous,
            completed,
        }
    }

    fn complete_cycle(&mut self) -> CraftCycle {
        let mut cycle = CraftCycle::default();
        for req in self.input_requirements() {
            let stored = self.input_buffer.entry(req.kind).or_insert(0);
            let debit = req.amount.min(*stored);
            *stored -= debit;
            cycle.consumed.push(ResourceAmount::new(req.kind, debit));
        }
        let cap = self.spec.output_capacity;
        for out in self.output_amounts() {
            let stored = self.output_buffer.entry(out.kind).or_insert(0);
            let credited = out.amount.min(cap.saturating_sub(*stored));
            *stored += credited;
            cycle.produced.push(ResourceAmount::new(out.kind, credited));
            if credited < out.amount {
                cycle.discarded.push(ResourceAmount::new(out.kind, out.amount - credited));
            }
        }
        self.timer = 0.0;
        cycle
    }
}
