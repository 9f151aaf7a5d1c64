//! Frame export.
//!
//! The driver hands every snapshot to a [`FrameExporter`]; the exporter owns
//! file naming and encoding. Export failures never stop the iteration loop.

pub mod png;

use crate::data::grid::Grid;
use crate::sor_error::SorError;

/// One snapshot of a rank's current buffer.
#[derive(Debug)]
pub struct Frame<'a, T> {
    pub grid: &'a Grid<T>,
    pub iteration: usize,
    pub rank: usize,
}

pub trait FrameExporter<T> {
    fn export(&mut self, frame: &Frame<'_, T>) -> Result<(), SorError>;
}

pub use png::PngExporter;
