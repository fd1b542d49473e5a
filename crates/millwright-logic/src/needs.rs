//! Survival needs: hunger and fatigue.
//!
//! Levels rise from 0 (content) toward `max_level`. Crossing the seek
//! threshold interrupts work; dropping to the satisfied threshold ends the
//! interrupt.

use serde::{Deserialize, Serialize};

use crate::config::NeedsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeedKind {
    Hunger,
    Fatigue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NeedLevels {
    pub hunger: f32,
    pub fatigue: f32,
}

impl NeedLevels {
    pub fn level(&self, kind: NeedKind) -> f32 {
        match kind {
            NeedKind::Hunger => self.hunger,
            NeedKind::Fatigue => self.fatigue,
        }
    }

    fn level_mut(&mut self, kind: NeedKind) -> &mut f32 {
        match kind {
            NeedKind::Hunger => &mut self.hunger,
            NeedKind::Fatigue => &mut self.fatigue,
        }
    }

    /// Apply `dt` seconds of decay (needs grow).
    pub fn decay(&mut self, dt: f32, tuning: &NeedsConfig) {
        self.hunger = (self.hunger + tuning.hunger_per_second * dt).clamp(0.0, tuning.max_level);
        self.fatigue = (self.fatigue + tuning.fatigue_per_second * dt).clamp(0.0, tuning.max_level);
    }

    pub fn fraction(&self, kind: NeedKind, tuning: &NeedsConfig) -> f32 {
        if tuning.max_level <= 0.0 {
            return 0.0;
        }
        (self.level(kind) / tuning.max_level).clamp(0.0, 1.0)
    }

    /// The need that should interrupt work, if any. Hunger wins over fatigue.
    pub fn urgent(&self, tuning: &NeedsConfig) -> Option<NeedKind> {
        [NeedKind::Hunger, NeedKind::Fatigue]
            .into_iter()
            .find(|kind| self.fraction(*kind, tuning) >= tuning.seek_threshold)
    }

    pub fn is_satisfied(&self, kind: NeedKind, tuning: &NeedsConfig) -> bool {
        self.fraction(kind, tuning) <= tuning.satisfied_threshold
    }

    /// Lower a need by `amount`, clamped at zero.
    pub fn satisfy(&mut self, kind: NeedKind, amount: f32) {
        let value = self.level_mut(kind);
        *value = (*value - amount).max(0.0);
    }
}

/// Whether `candidate` may interrupt a civilian already handling `current`.
pub fn preempts(candidate: NeedKind, current: Option<NeedKind>) -> bool {
    match current {
        None => true,
        Some(NeedKind::Fatigue) => candidate == NeedKind::Hunger,
        Some(NeedKind::Hunger) => false,
    }
}
