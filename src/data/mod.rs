//! Grid storage and double buffering.

pub mod buffer_pair;
pub mod grid;
