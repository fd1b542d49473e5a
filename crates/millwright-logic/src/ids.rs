//! Identifiers shared by every rules module.
//!
//! Resource, recipe and tool ids are interned indices handed out by the
//! [`DefinitionCatalog`](crate::catalog::DefinitionCatalog) at load time.
//! World objects are referenced through [`EntityId`], which the engine maps
//! onto its own entity handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a world object (building, resource node, civilian).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owning team. [`TeamId::GLOBAL`] holds work any team may pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i32);

impl TeamId {
    pub const GLOBAL: TeamId = TeamId(-1);

    pub fn is_global(self) -> bool {
        self == Self::GLOBAL
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "global")
        } else {
            write!(f, "team {}", self.0)
        }
    }
}

/// Interned resource identity. Carries no behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKind(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToolId(pub u16);

/// A quantity of a single resource kind. Also used as the civilian carry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub kind: ResourceKind,
    pub amount: u32,
}

impl ResourceAmount {
    pub fn new(kind: ResourceKind, amount: u32) -> Self {
        Self { kind, amount }
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }
}
