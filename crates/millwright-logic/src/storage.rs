//! Storage ledger and per-team reservation table.
//!
//! Every mutator clamps silently and returns the quantity actually moved.
//! Callers branch on the return value; nothing here assumes full service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, ResourceKind};

/// Which directions goods may flow through a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowMode {
    Disabled,
    ReceiveOnly,
    SupplyOnly,
    #[default]
    ReceiveAndSupply,
}

impl FlowMode {
    pub fn can_receive(self) -> bool {
        matches!(self, FlowMode::ReceiveOnly | FlowMode::ReceiveAndSupply)
    }

    pub fn can_supply(self) -> bool {
        matches!(self, FlowMode::SupplyOnly | FlowMode::ReceiveAndSupply)
    }
}

/// Accounting for one resource kind inside a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub stored: u32,
    pub capacity: u32,
    pub flow: FlowMode,
}

impl LedgerEntry {
    pub fn free_space(&self) -> u32 {
        self.capacity.saturating_sub(self.stored)
    }
}

/// Per-building stock. Invariant: `stored <= capacity` for every entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageLedger {
    entries: BTreeMap<ResourceKind, LedgerEntry>,
}

impl StorageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set capacity for a kind, creating the entry if needed. Lowering capacity
    /// clamps `stored` and returns the amount that no longer fits.
    pub fn set_capacity(&mut self, kind: ResourceKind, capacity: u32) -> u32 {
        let entry = self.entries.entry(kind).or_default();
        entry.capacity = capacity;
        let overflow = entry.stored.saturating_sub(capacity);
        entry.stored -= overflow;
        overflow
    }

    pub fn set_flow_mode(&mut self, kind: ResourceKind, flow: FlowMode) {
        self.entries.entry(kind).or_default().flow = flow;
    }

    /// Apply one flow mode to every configured kind.
    pub fn set_flow_mode_all(&mut self, flow: FlowMode) {
        for entry in self.entries.values_mut() {
            entry.flow = flow;
        }
    }

    /// Add up to `amount`, bounded by free space. Zero when the flow mode
    /// refuses receiving.
    pub fn deposit(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        let Some(entry) = self.entries.get_mut(&kind) else {
            return 0;
        };
        if !entry.flow.can_receive() {
            return 0;
        }
        let accepted = amount.min(entry.free_space());
        entry.stored += accepted;
        accepted
    }

    /// Remove up to `amount`, bounded by stock. Zero when the flow mode
    /// refuses supply.
    pub fn withdraw(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        let Some(entry) = self.entries.get_mut(&kind) else {
            return 0;
        };
        if !entry.flow.can_supply() {
            return 0;
        }
        let removed = amount.min(entry.stored);
        entry.stored -= removed;
        removed
    }

    pub fn stored(&self, kind: ResourceKind) -> u32 {
        self.entries.get(&kind).map(|e| e.stored).unwrap_or(0)
    }

    pub fn capacity(&self, kind: ResourceKind) -> u32 {
        self.entries.get(&kind).map(|e| e.capacity).unwrap_or(0)
    }

    pub fn flow_mode(&self, kind: ResourceKind) -> FlowMode {
        self.entries.get(&kind).map(|e| e.flow).unwrap_or(FlowMode::Disabled)
    }

    pub fn free_space(&self, kind: ResourceKind) -> u32 {
        self.entries.get(&kind).map(|e| e.free_space()).unwrap_or(0)
    }

    /// True if a deposit of `kind` would move at least one unit.
    pub fn can_receive(&self, kind: ResourceKind) -> bool {
        self.entries
            .get(&kind)
            .map(|e| e.flow.can_receive() && e.free_space() > 0)
            .unwrap_or(false)
    }

    /// Stock a withdrawal of `kind` could currently reach.
    pub fn supply_of(&self, kind: ResourceKind) -> u32 {
        self.entries
            .get(&kind)
            .filter(|e| e.flow.can_supply())
            .map(|e| e.stored)
            .unwrap_or(0)
    }

    pub fn entries(&self) -> impl Iterator<Item = (ResourceKind, &LedgerEntry)> {
        self.entries.iter().map(|(k, e)| (*k, e))
    }

    pub fn total_stored(&self) -> u32 {
        self.entries.values().map(|e| e.stored).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Claim {
    reserved: u32,
    in_transit: u32,
}

/// Per-team claims against stock, keyed by (destination, kind).
///
/// `reserved` is a promise on stock still sitting in storage; `in_transit`
/// is stock already withdrawn and being carried to the destination. Only
/// `reserved` counts against availability for new reservations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationTable {
    claims: BTreeMap<(EntityId, ResourceKind), Claim>,
    reserved_by_kind: BTreeMap<ResourceKind, u32>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim up to `amount` of `kind` for `destination`, where `available` is
    /// the team's physical supply of that kind. Returns the granted amount,
    /// which never pushes total reservations beyond `available`.
    pub fn reserve(
        &mut self,
        destination: EntityId,
        kind: ResourceKind,
        amount: u32,
        available: u32,
    ) -> u32 {
        let already = self.total_reserved(kind);
        let granted = amount.min(available.saturating_sub(already));
        if granted == 0 {
            return 0;
        }
        self.claims.entry((destination, kind)).or_default().reserved += granted;
        *self.reserved_by_kind.entry(kind).or_default() += granted;
        granted
    }

    /// Convert up to `amount` of an outstanding claim into in-transit stock
    /// after a physical withdrawal. Returns the amount converted.
    pub fn consume_reserved(&mut self, destination: EntityId, kind: ResourceKind, amount: u32) -> u32 {
        let Some(claim) = self.claims.get_mut(&(destination, kind)) else {
            return 0;
        };
        let consumed = amount.min(claim.reserved);
        claim.reserved -= consumed;
        claim.in_transit += consumed;
        self.decrement_kind(kind, consumed);
        consumed
    }

    /// Drop up to `amount` of an unused claim.
    pub fn release(&mut self, destination: EntityId, kind: ResourceKind, amount: u32) -> u32 {
        let Some(claim) = self.claims.get_mut(&(destination, kind)) else {
            return 0;
        };
        let released = amount.min(claim.reserved);
        claim.reserved -= released;
        self.decrement_kind(kind, released);
        self.prune(destination, kind);
        released
    }

    /// Clear up to `amount` of in-transit stock (delivered or abandoned).
    pub fn settle_in_transit(&mut self, destination: EntityId, kind: ResourceKind, amount: u32) -> u32 {
        let Some(claim) = self.claims.get_mut(&(destination, kind)) else {
            return 0;
        };
        let settled = amount.min(claim.in_transit);
        claim.in_transit -= settled;
        self.prune(destination, kind);
        settled
    }

    /// Forget every claim for a destination that was removed or completed.
    pub fn release_destination(&mut self, destination: EntityId) {
        let keys: Vec<_> = self
            .claims
            .keys()
            .filter(|(d, _)| *d == destination)
            .copied()
            .collect();
        for key in keys {
            if let Some(claim) = self.claims.remove(&key) {
                self.decrement_kind(key.1, claim.reserved);
            }
        }
    }

    /// Outstanding (not yet withdrawn) claim for a destination.
    pub fn reserved_for_site(&self, destination: EntityId, kind: ResourceKind) -> u32 {
        self.claims
            .get(&(destination, kind))
            .map(|c| c.reserved)
            .unwrap_or(0)
    }

    /// Reserved plus in-transit: everything already on its way to the destination.
    pub fn committed_for_site(&self, destination: EntityId, kind: ResourceKind) -> u32 {
        self.claims
            .get(&(destination, kind))
            .map(|c| c.reserved + c.in_transit)
            .unwrap_or(0)
    }

    pub fn total_reserved(&self, kind: ResourceKind) -> u32 {
        self.reserved_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    fn decrement_kind(&mut self, kind: ResourceKind, amount: u32) {
        if let Some(total) = self.reserved_by_kind.get_mut(&kind) {
            *total = total.saturating_sub(amount);
            if *total == 0 {
                self.reserved_by_kind.remove(&kind);
            }
        }
    }

    fn prune(&mut self, destination: EntityId, kind: ResourceKind) {
        if self
            .claims
            .get(&(destination, kind))
            .is_some_and(|c| c.reserved == 0 && c.in_transit == 0)
        {
            self.claims.remove(&(destination, kind));
        }
    }
}
