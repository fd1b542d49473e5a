//! Pure economy rules for Millwright.
//!
//! This crate holds every rule of the settlement economy that does not need
//! a world: plain data in, plain data out. The `millwright-core` crate wires
//! these types into an ECS world and drives them once per tick.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`agent`] | Worker state machine: 24 states, transition function, claims, needs resume |
//! | [`catalog`] | Resource, tool, recipe and building definitions, interned at load |
//! | [`config`] | Economy tuning with builtin defaults and env override |
//! | [`construction`] | Construction site: delivered materials, then labor |
//! | [`dispatch`] | Team-scoped task queues and first-poller-wins matching |
//! | [`generator`] | Implied-slot and deficit arithmetic for task generation |
//! | [`ids`] | Entity, team, resource, recipe and tool identifiers |
//! | [`needs`] | Hunger and fatigue levels, thresholds, preemption |
//! | [`production`] | Production station: buffers, staffing, craft timer |
//! | [`storage`] | Per-building storage ledger and per-team reservations |
//! | [`tasks`] | Task requests, job roles, specializations, capabilities |

pub mod agent;
pub mod catalog;
pub mod config;
pub mod construction;
pub mod dispatch;
pub mod generator;
pub mod ids;
pub mod needs;
pub mod production;
pub mod storage;
pub mod tasks;
