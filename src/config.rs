//! Run configuration for the relaxation driver.

use crate::algs::reduction::ConvergencePolicy;
use crate::sor_error::SorError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorConfig {
    /// Interior width of the local block (NB).
    pub nb: usize,
    /// Interior height of the local block (MB).
    pub mb: usize,
    /// Processes per row of the process grid (P).
    pub p: usize,
    /// Threshold reported alongside the norm; ends the run only under
    /// [`ConvergencePolicy::Threshold`].
    pub epsilon: f64,
    pub max_iter: usize,
    pub policy: ConvergencePolicy,
    /// Hand the current buffer to the frame exporter every iteration.
    pub save_output: bool,
    /// Rank that prints progress and timing summaries.
    pub leader: usize,
    /// Start the next buffer with the caller's ghost border instead of
    /// zeros. Off by default; changes the values of every odd iteration.
    pub seed_next_border: bool,
}

impl Default for SorConfig {
    fn default() -> Self {
        Self {
            nb: 64,
            mb: 64,
            p: 1,
            epsilon: 1e-6,
            max_iter: 100,
            policy: ConvergencePolicy::IterationCap,
            save_output: false,
            leader: 0,
            seed_next_border: false,
        }
    }
}

impl SorConfig {
    pub fn new(nb: usize, mb: usize, p: usize) -> Self {
        Self {
            nb,
            mb,
            p,
            ..Default::default()
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Stop early once the global norm drops below `self.epsilon`.
    pub fn with_early_exit(mut self) -> Self {
        self.policy = ConvergencePolicy::Threshold;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_save_output(mut self, save_output: bool) -> Self {
        self.save_output = save_output;
        self
    }

    pub fn with_leader(mut self, leader: usize) -> Self {
        self.leader = leader;
        self
    }

    pub fn with_seeded_next_border(mut self, seed: bool) -> Self {
        self.seed_next_border = seed;
        self
    }

    pub fn validate(&self) -> Result<(), SorError> {
        if self.nb == 0 || self.mb == 0 {
            return Err(SorError::InvalidConfig(format!(
                "interior must be non-empty, got {}x{}",
                self.nb, self.mb
            )));
        }
        if self.p == 0 {
            return Err(SorError::InvalidConfig("P must be at least 1".into()));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SorError::InvalidConfig(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}
