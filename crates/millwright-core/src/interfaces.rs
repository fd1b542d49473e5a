//! Collaborators the engine consumes: locomotion and alert delivery.
//!
//! A host swaps these for its own (navmesh mover, UI toasts). The defaults
//! keep the engine runnable headless.

use std::collections::HashMap;

use millwright_logic::ids::{EntityId, TeamId};
use serde::{Deserialize, Serialize};

use crate::components::Vec2;

/// Moves an agent toward a point.
pub trait Locomotion {
    /// Advance `position` toward `target` for `dt` seconds. Returns true once
    /// within `stop_distance`.
    fn move_to(&self, agent: EntityId, position: &mut Vec2, target: Vec2, stop_distance: f32, dt: f32) -> bool;
}

/// Straight-line mover at a fixed speed, no obstacles.
#[derive(Debug, Clone, Copy)]
pub struct StraightLineMover {
    pub speed: f32,
}

impl Locomotion for StraightLineMover {
    fn move_to(&self, _agent: EntityId, position: &mut Vec2, target: Vec2, stop_distance: f32, dt: f32) -> bool {
        let offset = target - *position;
        let distance = offset.length();
        if distance <= stop_distance {
            return true;
        }
        let step = self.speed * dt;
        if step >= distance - stop_distance {
            *position = target - offset.normalize() * stop_distance;
            true
        } else {
            *position = *position + offset.normalize() * step;
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    StorageFull,
    NoFood,
    InputShortage,
    OutputDiscarded,
    WorkerStalled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub team: TeamId,
    pub subject: Option<EntityId>,
    pub message: String,
}

impl Alert {
    pub fn new(kind: AlertKind, team: TeamId, subject: Option<EntityId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            team,
            subject,
            message: message.into(),
        }
    }
}

/// Receives player-facing alerts.
pub trait AlertSink {
    /// Offer an alert at simulation time `now`. Returns true if delivered.
    fn raise(&mut self, now: f64, alert: Alert) -> bool;

    /// Hand over delivered alerts, if the sink keeps them.
    fn drain(&mut self) -> Vec<Alert> {
        Vec::new()
    }
}

/// Default sink: at most one alert per (kind, team) per window, logged
/// through `log::warn!` and kept until drained.
#[derive(Debug, Clone, Default)]
pub struct ThrottledAlerts {
    window: f64,
    last: HashMap<(AlertKind, TeamId), f64>,
    delivered: Vec<Alert>,
}

impl ThrottledAlerts {
    pub fn new(window_seconds: f32) -> Self {
        Self {
            window: window_seconds.max(0.0) as f64,
            last: HashMap::new(),
            delivered: Vec::new(),
        }
    }

    pub fn delivered(&self) -> &[Alert] {
        &self.delivered
    }
}

impl AlertSink for ThrottledAlerts {
    fn raise(&mut self, now: f64, alert: Alert) -> bool {
        let key = (alert.kind, alert.team);
        if let Some(last) = self.last.get(&key) {
            if now - last < self.window {
                return false;
            }
        }
        self.last.insert(key, now);
        log::warn!(target: "millwright::alerts", "[{}] {:?}: {}", alert.team, alert.kind, alert.message);
        self.delivered.push(alert);
        true
    }

    fn drain(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_mover_arrives() {
        let mover = StraightLineMover { speed: 2.0 };
        let mut pos = Vec2::ZERO;
        let target = Vec2::new(10.0, 0.0);
        assert!(!mover.move_to(EntityId(1), &mut pos, target, 1.0, 1.0));
        assert_eq!(pos, Vec2::new(2.0, 0.0));
        let mut arrived = false;
        for _ in 0..10 {
            if mover.move_to(EntityId(1), &mut pos, target, 1.0, 1.0) {
                arrived = true;
                break;
            }
        }
        assert!(arrived);
        assert!(pos.distance(&target) <= 1.0 + 1e-4);
    }

    #[test]
    fn test_alerts_throttle_per_kind_and_team() {
        let mut alerts = ThrottledAlerts::new(10.0);
        let team = TeamId(0);
        assert!(alerts.raise(0.0, Alert::new(AlertKind::NoFood, team, None, "no food")));
        assert!(!alerts.raise(5.0, Alert::new(AlertKind::NoFood, team, None, "no food")));
        assert!(alerts.raise(5.0, Alert::new(AlertKind::NoFood, TeamId(1), None, "no food")));
        assert!(alerts.raise(5.0, Alert::new(AlertKind::StorageFull, team, None, "full")));
        assert!(alerts.raise(10.0, Alert::new(AlertKind::NoFood, team, None, "no food")));
        assert_eq!(alerts.drain().len(), 4);
        assert!(alerts.delivered().is_empty());
    }
}
