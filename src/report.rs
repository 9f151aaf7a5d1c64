//! Timing and progress reporters invoked by the driver.
//!
//! Only the leader rank prints. The leader is passed in explicitly; nothing
//! here consults global state to decide who talks.

use crate::algs::communicator::{Communicator, ReduceOp};
use crate::sor_error::SorError;
use std::time::Duration;

/// Receives the raw per-process wall time of the iteration loop.
pub trait TimingReporter<C: Communicator> {
    fn report(&mut self, comm: &C, elapsed: Duration) -> Result<(), SorError>;
}

/// Discards timings.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTimings;

impl<C: Communicator> TimingReporter<C> for NoTimings {
    fn report(&mut self, _comm: &C, _elapsed: Duration) -> Result<(), SorError> {
        Ok(())
    }
}

/// Reduces min and max loop time over the communicator and logs them on the leader.
#[derive(Clone, Debug, Default)]
pub struct MinMaxTimings {
    pub leader: usize,
    /// `(min, max)` in seconds, filled on every rank after `report`.
    pub last: Option<(f64, f64)>,
}

impl MinMaxTimings {
    pub fn new(leader: usize) -> Self {
        Self { leader, last: None }
    }
}

impl<C: Communicator> TimingReporter<C> for MinMaxTimings {
    fn report(&mut self, comm: &C, elapsed: Duration) -> Result<(), SorError> {
        let secs = elapsed.as_secs_f64();
        let min = comm.all_reduce(secs, ReduceOp::Min)?;
        let max = comm.all_reduce(secs, ReduceOp::Max)?;
        self.last = Some((min, max));
        if comm.rank() == self.leader {
            log::info!(
                "iteration timings: min {:.2} ms, max {:.2} ms",
                min * 1000.0,
                max * 1000.0
            );
        }
        Ok(())
    }
}

/// Per-iteration progress line, called on the leader only.
pub trait ProgressReporter {
    fn iteration(&mut self, iteration: usize, norm: f64, epsilon: f64);
}

/// Logs progress at `info` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn iteration(&mut self, iteration: usize, norm: f64, epsilon: f64) {
        log::info!("iteration {iteration}: diff_norm = {norm:.6}, epsilon = {epsilon:.6}");
    }
}

/// Records every progress call; handy for inspecting a run afterwards.
#[derive(Clone, Debug, Default)]
pub struct ProgressLog {
    pub entries: Vec<(usize, f64)>,
}

impl ProgressReporter for ProgressLog {
    fn iteration(&mut self, iteration: usize, norm: f64, _epsilon: f64) {
        self.entries.push((iteration, norm));
    }
}
