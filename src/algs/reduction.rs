//! Global convergence metric and the termination policy built on it.

use crate::algs::communicator::Communicator;
use crate::data::grid::Scalar;
use crate::sor_error::SorError;
use serde::{Deserialize, Serialize};

/// Sum the local squared-change metric over every rank of `comm`.
///
/// Collective and blocking: no rank leaves before every rank has
/// contributed, which makes it the per-iteration barrier of the run. The
/// result is the squared L2 norm of the global change.
pub fn global_sq_norm<T: Scalar, C: Communicator>(comm: &C, local: T) -> Result<f64, SorError> {
    let local = local
        .to_f64()
        .ok_or_else(|| SorError::Collective("local metric is not representable as f64".into()))?;
    comm.all_reduce_sum(local)
}

/// When the driver may stop before the iteration cap.
///
/// The threshold itself is [`SorConfig::epsilon`](crate::config::SorConfig::epsilon);
/// the policy only says whether it ends the loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvergencePolicy {
    /// Run exactly `max_iter` iterations; the norm is computed and reported
    /// but never ends the loop.
    #[default]
    IterationCap,
    /// Also stop once `sqrt(global) < epsilon`.
    Threshold,
}

impl ConvergencePolicy {
    /// True when `global_sq` (a squared norm) allows an early exit.
    pub fn converged(&self, global_sq: f64, epsilon: f64) -> bool {
        match self {
            ConvergencePolicy::IterationCap => false,
            ConvergencePolicy::Threshold => global_sq.sqrt() < epsilon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn serial_norm_is_identity() {
        assert_eq!(global_sq_norm(&NoComm, 2.5f32).unwrap(), 2.5);
    }

    #[test]
    fn cap_policy_never_converges() {
        assert!(!ConvergencePolicy::IterationCap.converged(0.0, 1.0));
    }

    #[test]
    fn threshold_compares_the_root() {
        let p = ConvergencePolicy::Threshold;
        assert!(p.converged(0.0099, 0.1));
        assert!(!p.converged(0.01, 0.1));
    }
}
