//! Re-export public algorithms.

pub mod communicator;
pub mod decompose;
pub mod driver;
pub mod halo_exchange;
pub mod reduction;
pub mod stencil;
pub mod wire;

pub use decompose::decompose;
pub use driver::{SorDriver, relax};
