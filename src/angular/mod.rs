//! Angular discretization: discrete directions with weights, the bijection
//! between `(direction, group)` pairs and linear-system components, and the
//! reflected-direction lookup used on reflective boundaries.

pub mod rules;

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};
use crate::physics::bc::BoundaryConditions;

/// Directions closer than this are considered identical when matching
/// reflected directions to quadrature points.
const DIRECTION_MATCH_TOL: f64 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuadratureRule {
    /// 1D slab Gauss–Legendre, weights sum to 2.
    GaussLegendre,
    /// 3D Gauss–Legendre × Chebyshev product, weights sum to 4π.
    Product,
}

/// Bijection between `(direction, group)` and a flat component index.
///
/// Components are numbered group-major: `k = g * n_dir + d`.
#[derive(Clone, Debug)]
pub struct ComponentIndex {
    n_dir: usize,
    n_group: usize,
    inverse: Vec<(usize, usize)>,
}

impl ComponentIndex {
    pub fn new(n_dir: usize, n_group: usize) -> Self {
        let inverse = (0..n_group)
            .flat_map(|g| (0..n_dir).map(move |d| (d, g)))
            .collect();
        Self {
            n_dir,
            n_group,
            inverse,
        }
    }

    pub fn n_dir(&self) -> usize {
        self.n_dir
    }

    pub fn n_group(&self) -> usize {
        self.n_group
    }

    pub fn n_total_vars(&self) -> usize {
        self.inverse.len()
    }

    #[inline]
    pub fn index(&self, direction: usize, group: usize) -> usize {
        assert!(
            direction < self.n_dir && group < self.n_group,
            "component ({direction}, {group}) outside {} directions x {} groups",
            self.n_dir,
            self.n_group
        );
        group * self.n_dir + direction
    }

    #[inline]
    pub fn component(&self, k: usize) -> (usize, usize) {
        self.inverse[k]
    }

    #[inline]
    pub fn direction_of(&self, k: usize) -> usize {
        self.inverse[k].0
    }

    #[inline]
    pub fn group_of(&self, k: usize) -> usize {
        self.inverse[k].1
    }

    /// Components belonging to group `g`, in direction order.
    pub fn components_in_group(&self, g: usize) -> std::ops::Range<usize> {
        g * self.n_dir..(g + 1) * self.n_dir
    }
}

/// Discrete directions, weights and the lookup tables built from them.
///
/// Built once and read-only afterwards.
#[derive(Clone, Debug)]
pub struct AngularQuadrature {
    rule: QuadratureRule,
    order: usize,
    directions: Vec<DVec3>,
    weights: Vec<f64>,
    index: ComponentIndex,
    /// Per reflective boundary, reflected direction indexed by incident direction.
    reflection: BTreeMap<u32, Vec<usize>>,
}

impl AngularQuadrature {
    pub fn new(rule: QuadratureRule, order: usize, n_group: usize) -> TransportResult<Self> {
        if n_group == 0 {
            return Err(TransportError::config("number of groups must be positive"));
        }
        let (directions, weights) = match rule {
            QuadratureRule::GaussLegendre => rules::slab_rule(order)?,
            QuadratureRule::Product => rules::product_rule(order)?,
        };
        let index = ComponentIndex::new(directions.len(), n_group);
        Ok(Self {
            rule,
            order,
            directions,
            weights,
            index,
            reflection: BTreeMap::new(),
        })
    }

    /// Build a quadrature from explicit directions and weights.
    pub fn from_parts(
        directions: Vec<DVec3>,
        weights: Vec<f64>,
        n_group: usize,
    ) -> TransportResult<Self> {
        if directions.len() != weights.len() || directions.is_empty() {
            return Err(TransportError::config(format!(
                "{} directions but {} weights",
                directions.len(),
                weights.len()
            )));
        }
        if n_group == 0 {
            return Err(TransportError::config("number of groups must be positive"));
        }
        let index = ComponentIndex::new(directions.len(), n_group);
        Ok(Self {
            rule: QuadratureRule::Product,
            order: 0,
            directions,
            weights,
            index,
            reflection: BTreeMap::new(),
        })
    }

    /// Attach the reflected-direction tables for every reflective boundary.
    ///
    /// `normals` maps boundary ids to their outward unit normal. Fails when a
    /// reflective boundary has no normal or when a reflected direction is not
    /// part of the quadrature set.
    pub fn with_reflective_boundaries(
        mut self,
        boundaries: &BoundaryConditions,
        normals: &BTreeMap<u32, DVec3>,
    ) -> TransportResult<Self> {
        let mut reflection = BTreeMap::new();
        for id in boundaries.reflective_ids() {
            let n = normals.get(&id).copied().ok_or_else(|| {
                TransportError::config(format!("reflective boundary {id} has no faces in the mesh"))
            })?;
            let n = n.normalize();
            let table = self
                .directions
                .iter()
                .enumerate()
                .map(|(d, omega)| {
                    let reflected = *omega - 2.0 * omega.dot(n) * n;
                    self.find_direction(reflected).ok_or_else(|| {
                        TransportError::config(format!(
                            "direction {d} has no reflected partner on boundary {id}"
                        ))
                    })
                })
                .collect::<TransportResult<Vec<_>>>()?;
            reflection.insert(id, table);
        }
        self.reflection = reflection;
        Ok(self)
    }

    fn find_direction(&self, omega: DVec3) -> Option<usize> {
        self.directions
            .iter()
            .position(|d| d.distance(omega) < DIRECTION_MATCH_TOL)
    }

    pub fn rule(&self) -> QuadratureRule {
        self.rule
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn n_dir(&self) -> usize {
        self.directions.len()
    }

    pub fn n_group(&self) -> usize {
        self.index.n_group()
    }

    pub fn n_total_vars(&self) -> usize {
        self.index.n_total_vars()
    }

    pub fn directions(&self) -> &[DVec3] {
        &self.directions
    }

    pub fn direction(&self, d: usize) -> DVec3 {
        self.directions[d]
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weight(&self, d: usize) -> f64 {
        self.weights[d]
    }

    /// Sum of all weights: 2 for the slab rule, 4π for the product rule.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn component_index(&self) -> &ComponentIndex {
        &self.index
    }

    pub fn index(&self, direction: usize, group: usize) -> usize {
        self.index.index(direction, group)
    }

    pub fn component(&self, k: usize) -> (usize, usize) {
        self.index.component(k)
    }

    pub fn is_reflective(&self, boundary_id: u32) -> bool {
        self.reflection.contains_key(&boundary_id)
    }

    /// Outgoing direction paired with `incident` on a reflective boundary.
    pub fn reflected_direction(&self, boundary_id: u32, incident: usize) -> TransportResult<usize> {
        self.reflection
            .get(&boundary_id)
            .and_then(|table| table.get(incident).copied())
            .ok_or(TransportError::InvalidBoundaryQuery {
                boundary_id,
                direction: incident,
            })
    }
}
