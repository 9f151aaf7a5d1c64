#![cfg_attr(docsrs, feature(doc_cfg))]
//! # halo-sor
//!
//! halo-sor relaxes a 2D field split into equal blocks over a Q×P grid of
//! cooperating processes. Every iteration each process swaps a one-cell halo
//! with its north, south, east and west neighbours using non-blocking
//! transfers, applies an over-relaxed five-point sweep to its block, and
//! joins a global reduction of the change norm.
//!
//! ## Features
//! - Ghosted grid buffers with fallible allocation and a two-slot double buffer
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - Row/column sub-groups derived from a P-wide process grid
//! - Iteration cap plus an opt-in threshold exit
//! - Frame export (PNG), min/max timing and leader-only progress reporting
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! halo-sor = "0.3"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! ```
//! use halo_sor::prelude::*;
//!
//! let grid = Grid::<f64>::try_with_border(8, 8, 0.0, 10.0)?;
//! let out = relax(&NoComm, SorConfig::new(8, 8, 1).with_max_iter(10), grid)?;
//! assert_eq!(out.iterations, 10);
//! # Ok::<(), halo_sor::sor_error::SorError>(())
//! ```

pub mod algs;
pub mod config;
pub mod data;
pub mod io;
pub mod report;
pub mod sor_error;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm, Wait};
    pub use crate::algs::decompose::{Decomposition, ProcessGrid, decompose};
    pub use crate::algs::driver::{SorDriver, SorOutcome, relax};
    pub use crate::algs::halo_exchange::HaloExchange;
    pub use crate::algs::reduction::ConvergencePolicy;
    pub use crate::algs::stencil::{relaxation_factor, sor_sweep};
    pub use crate::config::SorConfig;
    pub use crate::data::buffer_pair::BufferPair;
    pub use crate::data::grid::{Grid, Scalar, Side};
    pub use crate::io::{Frame, FrameExporter, PngExporter};
    pub use crate::report::{LogProgress, MinMaxTimings, NoTimings, ProgressReporter, TimingReporter};
    pub use crate::sor_error::SorError;
}
