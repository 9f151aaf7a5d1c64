//! Iteration driver: exchange → sweep → reduce → swap, until done.
//!
//! States, in order:
//! - *init*: validate the configuration, the grid shape and the process
//!   topology; allocate the zeroed next buffer and the scratch columns; split the
//!   row and column groups. Nothing is sent before every allocation succeeded.
//! - *iterating*: optional frame export of the current buffer, halo
//!   exchange, stencil sweep into the next buffer, global reduction,
//!   leader-only progress report, buffer swap.
//! - *done*: after `max_iter` iterations, or earlier when the policy is
//!   [`ConvergencePolicy::Threshold`] and the global norm fell below epsilon.
//!   The loop time goes to the timing reporter and the non-final buffer is
//!   released.
//!
//! [`ConvergencePolicy::Threshold`]: crate::algs::reduction::ConvergencePolicy::Threshold

use crate::algs::communicator::Communicator;
use crate::algs::decompose::{ProcessGrid, decompose};
use crate::algs::halo_exchange::HaloExchange;
use crate::algs::reduction::global_sq_norm;
use crate::algs::stencil::{relaxation_factor, sor_sweep};
use crate::config::SorConfig;
use crate::data::buffer_pair::{BufferPair, FinalBuffer};
use crate::data::grid::{Grid, Scalar};
use crate::io::{Frame, FrameExporter};
use crate::report::{ProgressReporter, TimingReporter};
use crate::sor_error::SorError;
use std::time::{Duration, Instant};

/// Result of a completed run on one rank.
#[derive(Debug)]
pub struct SorOutcome<T> {
    /// Iterations actually executed.
    pub iterations: usize,
    /// The final iterate; the other buffer has been released.
    pub grid: Grid<T>,
    /// Global squared norm of the last iteration's change, `None` if no
    /// iteration ran.
    pub global_sq_norm: Option<f64>,
    /// Wall time of the iteration loop on this rank.
    pub elapsed: Duration,
    /// True when `grid` is the allocation passed to [`SorDriver::run`].
    pub final_is_caller_buffer: bool,
    /// Halo transfers posted by this rank over the whole run.
    pub transfers: usize,
}

impl<T> SorOutcome<T> {
    pub fn global_norm(&self) -> Option<f64> {
        self.global_sq_norm.map(f64::sqrt)
    }
}

/// Runs the relaxation on one rank. Every rank of `comm` must run it with
/// the same `nb`, `mb`, `p` and termination settings.
pub struct SorDriver<'a, T, C: Communicator> {
    comm: &'a C,
    config: SorConfig,
    exporter: Option<&'a mut dyn FrameExporter<T>>,
    timings: Option<&'a mut dyn TimingReporter<C>>,
    progress: Option<&'a mut dyn ProgressReporter>,
}

impl<'a, T: Scalar, C: Communicator> SorDriver<'a, T, C> {
    pub fn new(comm: &'a C, config: SorConfig) -> Self {
        Self {
            comm,
            config,
            exporter: None,
            timings: None,
            progress: None,
        }
    }

    /// Frame exporter, used only when `config.save_output` is set.
    pub fn with_exporter(mut self, exporter: &'a mut dyn FrameExporter<T>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Timing reporter; it runs collectives, so give one to every rank or none.
    pub fn with_timings(mut self, timings: &'a mut dyn TimingReporter<C>) -> Self {
        self.timings = Some(timings);
        self
    }

    /// Progress reporter, called on `config.leader` only.
    pub fn with_progress(mut self, progress: &'a mut dyn ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &SorConfig {
        &self.config
    }

    /// Relax `grid` in place of the caller; the caller's ghost border must
    /// already hold the global boundary values.
    pub fn run(mut self, grid: Grid<T>) -> Result<SorOutcome<T>, SorError> {
        let cfg = self.config.clone();
        cfg.validate()?;
        if grid.shape() != (cfg.nb, cfg.mb) {
            return Err(SorError::ShapeMismatch {
                expected: (cfg.nb, cfg.mb),
                found: grid.shape(),
            });
        }
        let rank = self.comm.rank();
        ProcessGrid::new(rank, self.comm.size(), cfg.p)?;

        let mut pair = if cfg.seed_next_border {
            BufferPair::with_seeded_border(grid)?
        } else {
            BufferPair::new(grid)?
        };
        let mut halo = HaloExchange::<T>::new(cfg.nb, cfg.mb)?;
        let dec = decompose(self.comm, cfg.p)?;
        let leader = rank == cfg.leader;
        if leader {
            log::debug!(
                "{}x{} blocks on a {}x{} process grid, W = {:?}",
                cfg.nb,
                cfg.mb,
                dec.grid.q,
                dec.grid.p,
                relaxation_factor::<T>(cfg.nb)
            );
        }

        let mut iterations = 0;
        let mut global = None;
        let mut transfers = 0;
        let start = Instant::now();
        while iterations < cfg.max_iter {
            if cfg.save_output {
                if let Some(exporter) = self.exporter.as_deref_mut() {
                    let frame = Frame {
                        grid: pair.current(),
                        iteration: iterations,
                        rank,
                    };
                    if let Err(e) = exporter.export(&frame) {
                        log::warn!("rank {rank}: frame {iterations} export failed: {e}");
                    }
                }
            }

            transfers += halo.exchange(pair.current_mut(), &dec)?.posted();
            let (current, next) = pair.split_mut();
            let local = sor_sweep(next, current)?;
            let sq = global_sq_norm(self.comm, local)?;
            global = Some(sq);

            if leader {
                if let Some(progress) = self.progress.as_deref_mut() {
                    progress.iteration(iterations, sq.sqrt(), cfg.epsilon);
                }
            }

            pair.swap();
            iterations += 1;
            if cfg.policy.converged(sq, cfg.epsilon) {
                log::debug!("rank {rank}: converged after {iterations} iterations");
                break;
            }
        }
        let elapsed = start.elapsed();

        if let Some(timings) = self.timings.as_deref_mut() {
            timings.report(self.comm, elapsed)?;
        }

        let FinalBuffer {
            grid,
            is_caller_buffer,
        } = pair.into_final();
        Ok(SorOutcome {
            iterations,
            grid,
            global_sq_norm: global,
            elapsed,
            final_is_caller_buffer: is_caller_buffer,
            transfers,
        })
    }
}

/// Run with no exporter, timing or progress reporter.
pub fn relax<T: Scalar, C: Communicator>(
    comm: &C,
    config: SorConfig,
    grid: Grid<T>,
) -> Result<SorOutcome<T>, SorError> {
    SorDriver::new(comm, config).run(grid)
}
