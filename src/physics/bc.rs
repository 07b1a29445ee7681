use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Physical treatment of a boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryKind {
    /// No incoming particles.
    #[default]
    Vacuum,
    /// Incoming angular flux equals the outgoing flux of the mirrored direction.
    Reflective,
}

/// Boundary treatment per boundary id. Ids without an entry are vacuum.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BoundaryConditions {
    #[serde(default)]
    kinds: BTreeMap<u32, BoundaryKind>,
}

impl BoundaryConditions {
    pub fn all_vacuum() -> Self {
        Self::default()
    }

    /// Every listed boundary reflective.
    pub fn reflective(ids: impl IntoIterator<Item = u32>) -> Self {
        let mut bcs = Self::default();
        for id in ids {
            bcs.set(id, BoundaryKind::Reflective);
        }
        bcs
    }

    pub fn set(&mut self, boundary_id: u32, kind: BoundaryKind) {
        self.kinds.insert(boundary_id, kind);
    }

    pub fn with(mut self, boundary_id: u32, kind: BoundaryKind) -> Self {
        self.set(boundary_id, kind);
        self
    }

    pub fn kind(&self, boundary_id: u32) -> BoundaryKind {
        self.kinds.get(&boundary_id).copied().unwrap_or_default()
    }

    pub fn is_reflective(&self, boundary_id: u32) -> bool {
        self.kind(boundary_id) == BoundaryKind::Reflective
    }

    pub fn has_reflective(&self) -> bool {
        self.kinds.values().any(|k| *k == BoundaryKind::Reflective)
    }

    pub fn reflective_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.kinds
            .iter()
            .filter(|(_, k)| **k == BoundaryKind::Reflective)
            .map(|(id, _)| *id)
    }
}
