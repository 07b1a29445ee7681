//! Multigroup, multi-direction transport on cell meshes with cell-wise
//! constant unknowns: assembly per component, source iteration within a
//! group, Gauss-Seidel over groups and power iteration for `k_eff`.

pub mod angular;
pub mod config;
pub mod discretization;
pub mod driver;
pub mod equation;
pub mod error;
pub mod iteration;
pub mod numerics;
pub mod physics;
pub mod processing;

pub use error::{TransportError, TransportResult};
