//! Construction site tracking: materials first, then labor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ResourceAmount, ResourceKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionSite {
    required: BTreeMap<ResourceKind, u32>,
    delivered: BTreeMap<ResourceKind, u32>,
    work_required: f32,
    work_done: f32,
    complete: bool,
}

impl ConstructionSite {
    pub fn new(cost: &[ResourceAmount], work_required: f32) -> Self {
        let mut required = BTreeMap::new();
        for line in cost.iter().filter(|c| c.amount > 0) {
            *required.entry(line.kind).or_insert(0) += line.amount;
        }
        Self {
            required,
            delivered: BTreeMap::new(),
            work_required: work_required.max(0.0),
            work_done: 0.0,
            complete: false,
        }
    }

    pub fn required(&self, kind: ResourceKind) -> u32 {
        self.required.get(&kind).copied().unwrap_or(0)
    }

    pub fn delivered(&self, kind: ResourceKind) -> u32 {
        self.delivered.get(&kind).copied().unwrap_or(0)
    }

    pub fn remaining(&self, kind: ResourceKind) -> u32 {
        self.required(kind).saturating_sub(self.delivered(kind))
    }

    /// Every cost line still short, with the shortfall.
    pub fn missing(&self) -> Vec<ResourceAmount> {
        self.required
            .keys()
            .map(|kind| ResourceAmount::new(*kind, self.remaining(*kind)))
            .filter(|m| m.amount > 0)
            .collect()
    }

    pub fn total_remaining(&self) -> u32 {
        self.required.keys().map(|kind| self.remaining(*kind)).sum()
    }

    pub fn materials_complete(&self) -> bool {
        self.total_remaining() == 0
    }

    /// Accept up to the remaining need for `kind`. Finished sites and kinds
    /// outside the cost list accept nothing.
    pub fn receive_delivery(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        if self.complete {
            return 0;
        }
        let accepted = amount.min(self.remaining(kind));
        if accepted > 0 {
            *self.delivered.entry(kind).or_insert(0) += accepted;
        }
        accepted
    }

    /// Apply labor. Does nothing until materials are in. Returns true only on
    /// the call that completes the site.
    pub fn add_work(&mut self, amount: f32) -> bool {
        if self.complete || !self.materials_complete() {
            return false;
        }
        self.work_done = (self.work_done + amount.max(0.0)).min(self.work_required);
        if self.work_done >= self.work_required {
            self.complete = true;
            return true;
        }
        false
    }

    /// Labor progress in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.work_required <= 0.0 {
            if self.materials_complete() { 1.0 } else { 0.0 }
        } else {
            (self.work_done / self.work_required).clamp(0.0, 1.0)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WOOD: ResourceKind = ResourceKind(0);
    const STONE: ResourceKind = ResourceKind(1);
    const PLANK: ResourceKind = ResourceKind(2);

    fn warehouse() -> ConstructionSite {
        ConstructionSite::new(
            &[ResourceAmount::new(WOOD, 20), ResourceAmount::new(STONE, 10)],
            30.0,
        )
    }

    #[test]
    fn test_delivery_clamps_to_remaining_need() {
        let mut site = warehouse();
        assert_eq!(site.receive_delivery(WOOD, 15), 15);
        assert_eq!(site.receive_delivery(WOOD, 15), 5);
        assert_eq!(site.receive_delivery(WOOD, 1), 0);
        assert_eq!(site.receive_delivery(PLANK, 5), 0);
        assert_eq!(site.missing(), vec![ResourceAmount::new(STONE, 10)]);
    }

    #[test]
    fn test_work_waits_for_materials() {
        let mut site = warehouse();
        assert!(!site.add_work(100.0));
        assert_eq!(site.progress(), 0.0);

        site.receive_delivery(WOOD, 20);
        site.receive_delivery(STONE, 10);
        assert!(site.materials_complete());
        assert!(!site.add_work(20.0));
        assert!(site.add_work(10.0));
        assert!(site.is_complete());
    }

    #[test]
    fn test_completion_is_terminal() {
        let mut site = ConstructionSite::new(&[], 1.0);
        assert!(site.add_work(1.0));
        assert!(!site.add_work(1.0));
        assert!(site.is_complete());
        assert_eq!(site.receive_delivery(WOOD, 1), 0);
    }

    #[test]
    fn test_zero_cost_lines_are_ignored() {
        let site = ConstructionSite::new(&[ResourceAmount::new(WOOD, 0)], 5.0);
        assert!(site.materials_complete());
        assert_eq!(site.total_remaining(), 0);
    }
}
