//! SorError: unified error type for halo-sor public APIs
//!
//! Every fallible operation in the crate returns this type. Communication
//! failures are fatal to the run; the driver never retries.

use thiserror::Error;

/// Unified error type for halo-sor operations.
#[derive(Debug, Error)]
pub enum SorError {
    /// A grid or scratch buffer could not be allocated.
    #[error("allocation of {cells} cells failed")]
    Allocation { cells: usize },
    /// The communicator size is not a multiple of the process-grid width.
    #[error("process topology is ill-formed: size {size} is not divisible by P = {p}")]
    Topology { size: usize, p: usize },
    /// Rejected run configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A grid does not have the interior shape the run was configured for.
    #[error("grid shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// A point-to-point transfer with `neighbor` failed or delivered a short payload.
    #[error("communication with rank {neighbor} failed: {source}")]
    Comm {
        neighbor: usize,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A collective operation (reduction, split) failed.
    #[error("collective operation failed: {0}")]
    Collective(String),
    /// I/O failure while exporting a frame.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A frame could not be encoded or written as an image.
    #[error("image export failed: {0}")]
    Image(#[from] image::ImageError),
    /// MPI could not be initialized (already initialized or unavailable).
    #[error("MPI initialization failed")]
    MpiInit,
}
