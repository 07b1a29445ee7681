use nalgebra::DVector;
use serde::Serialize;

use super::{EquationSet, MultigroupIterator};
use crate::error::{TransportError, TransportResult};
use crate::numerics::Convergence;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EigenState {
    Iterating,
    Converged,
    MaxIterationsExceeded,
}

/// Diagnostics of one power iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub keff: f64,
    pub err_k: f64,
    pub err_phi: f64,
    pub sweeps: usize,
    pub multigroup_converged: bool,
}

#[derive(Clone, Debug)]
pub struct EigenSolution {
    pub keff: f64,
    pub iterations: usize,
    pub err_k: f64,
    pub err_phi: f64,
    pub history: Vec<IterationRecord>,
}

/// Power iteration for the fundamental mode.
///
/// Each step rescales the fission source by the current `k`, converges the
/// groups for that source and updates `k` from the ratio of successive
/// fission sources.
#[derive(Clone, Debug)]
pub struct PowerIteration {
    multigroup: MultigroupIterator,
    k_tolerance: f64,
    flux_convergence: Convergence,
    max_iterations: usize,
    fatal_multigroup: bool,

    state: EigenState,
    initialized: bool,
    keff: f64,
    fission_source: f64,
    iteration: usize,
    err_k: f64,
    err_phi: f64,
    history: Vec<IterationRecord>,
}

impl PowerIteration {
    pub fn new(
        multigroup: MultigroupIterator,
        k_tolerance: f64,
        flux_convergence: Convergence,
        max_iterations: usize,
    ) -> Self {
        Self {
            multigroup,
            k_tolerance,
            flux_convergence,
            max_iterations,
            fatal_multigroup: false,
            state: EigenState::Iterating,
            initialized: false,
            keff: 1.0,
            fission_source: 0.0,
            iteration: 0,
            err_k: f64::INFINITY,
            err_phi: f64::INFINITY,
            history: Vec::new(),
        }
    }

    /// Abort the eigenvalue loop when a multigroup solve does not converge.
    pub fn with_fatal_multigroup(mut self, fatal: bool) -> Self {
        self.fatal_multigroup = fatal;
        self
    }

    pub fn state(&self) -> EigenState {
        self.state
    }

    pub fn keff(&self) -> f64 {
        self.keff
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn errors(&self) -> (f64, f64) {
        (self.err_k, self.err_phi)
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    /// Assemble the equations, start from `k = 1` and unit moments.
    pub fn initialize(
        &mut self,
        equations: &mut EquationSet<'_>,
        moments: &mut [DVector<f64>],
    ) -> TransportResult<()> {
        if !equations.is_eigen() {
            return Err(TransportError::config(
                "power iteration requested for a fixed-source problem",
            ));
        }
        equations.initialize(moments)?;
        let fission_source = equations.estimate_fission_source(moments)?;
        if fission_source <= 0.0 {
            return Err(TransportError::config(
                "initial fission source is zero, no fissile cell is owned by any worker",
            ));
        }
        self.keff = 1.0;
        self.fission_source = fission_source;
        self.iteration = 0;
        self.err_k = f64::INFINITY;
        self.err_phi = f64::INFINITY;
        self.history.clear();
        self.state = EigenState::Iterating;
        self.initialized = true;
        Ok(())
    }

    /// One outer iteration. Terminal states are returned unchanged.
    pub fn step(
        &mut self,
        equations: &mut EquationSet<'_>,
        moments: &mut [DVector<f64>],
    ) -> TransportResult<EigenState> {
        if !self.initialized {
            return Err(TransportError::config(
                "power iteration stepped before initialization",
            ));
        }
        if self.state != EigenState::Iterating {
            return Ok(self.state);
        }

        let previous = moments.to_vec();
        let (k_old, source_old) = (self.keff, self.fission_source);

        equations.scale_fission_transfer(k_old)?;
        equations.assemble_fixed_linear_form(moments)?;
        let report = self.multigroup.iterate(equations, moments)?;
        if !report.converged && self.fatal_multigroup {
            return Err(TransportError::MultigroupNonConvergence {
                sweeps: report.sweeps,
                error: report.error,
            });
        }

        let source_new = equations.estimate_fission_source(moments)?;
        if !(source_new > 0.0 && source_new.is_finite()) {
            return Err(TransportError::config(format!(
                "fission source became {source_new} in power iteration {}",
                self.iteration + 1
            )));
        }
        let k_new = k_old * source_new / source_old;

        self.iteration += 1;
        self.keff = k_new;
        self.fission_source = source_new;
        self.err_k = (k_new - k_old).abs() / k_new;
        let problem = equations.problem();
        let flux = self.flux_convergence.check(
            moments,
            &previous,
            problem.mesh.owned_cells(),
            problem.ctx,
        )?;
        self.err_phi = flux.error;
        self.history.push(IterationRecord {
            iteration: self.iteration,
            keff: k_new,
            err_k: self.err_k,
            err_phi: self.err_phi,
            sweeps: report.sweeps,
            multigroup_converged: report.converged,
        });

        if problem.ctx.is_root() {
            log::info!(
                "power iteration {:>4}: k = {:.8}, err_k = {:.3e}, err_phi = {:.3e}",
                self.iteration,
                k_new,
                self.err_k,
                self.err_phi
            );
        }

        self.state = if self.err_k <= self.k_tolerance && flux.converged {
            EigenState::Converged
        } else if self.iteration >= self.max_iterations {
            EigenState::MaxIterationsExceeded
        } else {
            EigenState::Iterating
        };
        Ok(self.state)
    }

    /// Initialize and iterate until a terminal state.
    pub fn solve(
        &mut self,
        equations: &mut EquationSet<'_>,
        moments: &mut [DVector<f64>],
    ) -> TransportResult<EigenSolution> {
        self.initialize(equations, moments)?;
        while self.step(equations, moments)? == EigenState::Iterating {}

        match self.state {
            EigenState::Converged => Ok(EigenSolution {
                keff: self.keff,
                iterations: self.iteration,
                err_k: self.err_k,
                err_phi: self.err_phi,
                history: self.history.clone(),
            }),
            _ => Err(TransportError::EigenNonConvergence {
                iterations: self.iteration,
                err_k: self.err_k,
                err_phi: self.err_phi,
                keff: self.keff,
            }),
        }
    }
}
