//! Distributed-execution context passed explicitly to every component that
//! reduces across workers or logs.

use std::sync::Arc;

use crate::error::TransportResult;

/// Blocking collective operations over all workers of a run. Every worker
/// must take part in each call.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn sum(&self, local: f64) -> TransportResult<f64>;
    fn max(&self, local: f64) -> TransportResult<f64>;
}

/// Single-process communicator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sum(&self, local: f64) -> TransportResult<f64> {
        Ok(local)
    }

    fn max(&self, local: f64) -> TransportResult<f64> {
        Ok(local)
    }
}

#[derive(Clone)]
pub struct ExecutionContext {
    comm: Arc<dyn Communicator>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::serial()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(comm: Arc<dyn Communicator>) -> Self {
        Self { comm }
    }

    pub fn serial() -> Self {
        Self::new(Arc::new(SerialComm))
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Only the root worker writes progress messages.
    pub fn is_root(&self) -> bool {
        self.rank() == 0
    }

    pub fn sum(&self, local: f64) -> TransportResult<f64> {
        self.comm.sum(local)
    }

    pub fn max(&self, local: f64) -> TransportResult<f64> {
        self.comm.max(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_context_is_root() {
        let ctx = ExecutionContext::default();
        assert!(ctx.is_root());
        assert_eq!(ctx.size(), 1);
        assert_eq!(ctx.sum(2.5).unwrap(), 2.5);
        assert_eq!(ctx.max(-1.0).unwrap(), -1.0);
    }
}
