//! Nested iterations: source iteration within a group, Gauss–Seidel over
//! groups, and power iteration on the fission source.

pub mod in_group;
pub mod multigroup;
pub mod power;

use nalgebra::DVector;

use crate::equation::{Equation, TransportProblem};
use crate::error::{TransportError, TransportResult};

pub use in_group::{InGroupIterator, InGroupReport};
pub use multigroup::{FixedSourceSolver, MultigroupIterator, MultigroupReport};
pub use power::{EigenSolution, EigenState, IterationRecord, PowerIteration};

/// The high-order transport equation and, when accelerated, its low-order
/// companion. Both share the same problem data and moments.
pub struct EquationSet<'a> {
    pub high_order: Equation<'a>,
    pub low_order: Option<Equation<'a>>,
}

impl<'a> EquationSet<'a> {
    pub fn new(high_order: Equation<'a>) -> TransportResult<Self> {
        if !high_order.formulation().owns_directions() {
            return Err(TransportError::config(format!(
                "{}: the high-order equation must carry directional solutions",
                high_order.name()
            )));
        }
        Ok(Self {
            high_order,
            low_order: None,
        })
    }

    pub fn with_low_order(mut self, low_order: Equation<'a>) -> TransportResult<Self> {
        if low_order.formulation().owns_directions() {
            return Err(TransportError::config(format!(
                "{}: acceleration needs a low-order formulation",
                low_order.name()
            )));
        }
        if low_order.is_eigen() != self.high_order.is_eigen() {
            return Err(TransportError::config(
                "high- and low-order equations disagree on the problem type",
            ));
        }
        self.low_order = Some(low_order);
        Ok(self)
    }

    pub fn problem(&self) -> TransportProblem<'a> {
        *self.high_order.problem()
    }

    pub fn is_eigen(&self) -> bool {
        self.high_order.is_eigen()
    }

    pub fn n_group(&self) -> usize {
        self.high_order.n_group()
    }

    fn each(&mut self) -> impl Iterator<Item = &mut Equation<'a>> {
        std::iter::once(&mut self.high_order).chain(self.low_order.as_mut())
    }

    /// Size all systems, reset the moments to unity and assemble matrices.
    pub fn initialize(&mut self, moments: &mut [DVector<f64>]) -> TransportResult<()> {
        for eq in self.each() {
            eq.initialize_system(moments)?;
            eq.assemble_bilinear_form()?;
        }
        Ok(())
    }

    pub fn assemble_fixed_linear_form(&mut self, moments: &[DVector<f64>]) -> TransportResult<()> {
        for eq in self.each() {
            eq.assemble_fixed_linear_form(moments)?;
        }
        Ok(())
    }

    pub fn scale_fission_transfer(&mut self, keff: f64) -> TransportResult<()> {
        for eq in self.each() {
            eq.scale_fission_transfer(keff)?;
        }
        Ok(())
    }

    pub fn estimate_fission_source(&self, moments: &[DVector<f64>]) -> TransportResult<f64> {
        self.high_order.estimate_fission_source(moments)
    }
}
