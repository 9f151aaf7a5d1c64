//! Map ranks onto a Q×P process grid and build the row/column groups.
//!
//! Rank `r` sits at `(row, col) = (r / P, r % P)`. The column group holds
//! every rank with the same `col` and carries the north/south exchange;
//! the row group holds every rank with the same `row` and carries east/west.
//! Both splits use the base rank as key, so a rank's position inside its
//! column group is its row and its position inside its row group is its
//! column.

use crate::algs::communicator::Communicator;
use crate::sor_error::SorError;

/// Position of this process in the P-wide process grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProcessGrid {
    pub rank: usize,
    pub size: usize,
    /// Processes per row.
    pub p: usize,
    /// Processes per column, `size / p`.
    pub q: usize,
    pub row: usize,
    pub col: usize,
}

impl ProcessGrid {
    pub fn new(rank: usize, size: usize, p: usize) -> Result<Self, SorError> {
        if p == 0 || size == 0 || size % p != 0 {
            return Err(SorError::Topology { size, p });
        }
        if rank >= size {
            return Err(SorError::InvalidConfig(format!(
                "rank {rank} outside a communicator of size {size}"
            )));
        }
        Ok(Self {
            rank,
            size,
            p,
            q: size / p,
            row: rank / p,
            col: rank % p,
        })
    }

    /// Base rank at grid coordinates `(row, col)`.
    pub fn rank_at(&self, row: usize, col: usize) -> usize {
        row * self.p + col
    }
}

/// Rank and size of this process inside one group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupPosition {
    pub rank: usize,
    pub size: usize,
}

impl GroupPosition {
    /// The neighbour at group rank − 1 (north or west), if any.
    pub fn lower(&self) -> Option<usize> {
        self.rank.checked_sub(1)
    }

    /// The neighbour at group rank + 1 (south or east), if any.
    pub fn upper(&self) -> Option<usize> {
        (self.rank + 1 < self.size).then_some(self.rank + 1)
    }
}

/// The two exchange groups of one process.
pub struct Decomposition<C> {
    pub grid: ProcessGrid,
    /// Ranks sharing this column; north/south traffic.
    pub column: C,
    /// Ranks sharing this row; east/west traffic.
    pub row: C,
}

impl<C: Communicator> Decomposition<C> {
    pub fn column_position(&self) -> GroupPosition {
        GroupPosition {
            rank: self.column.rank(),
            size: self.column.size(),
        }
    }

    pub fn row_position(&self) -> GroupPosition {
        GroupPosition {
            rank: self.row.rank(),
            size: self.row.size(),
        }
    }
}

/// Validate the topology, then split `comm` into column and row groups.
///
/// Fails with [`SorError::Topology`] before any communication when
/// `comm.size()` is not a multiple of `p`.
pub fn decompose<C: Communicator>(comm: &C, p: usize) -> Result<Decomposition<C>, SorError> {
    let grid = ProcessGrid::new(comm.rank(), comm.size(), p)?;
    let column = comm.split(grid.col, grid.rank)?;
    let row = comm.split(grid.row, grid.rank)?;

    if column.rank() != grid.row || column.size() != grid.q {
        return Err(SorError::Collective(format!(
            "column group places rank {} at {}/{}, expected {}/{}",
            grid.rank,
            column.rank(),
            column.size(),
            grid.row,
            grid.q
        )));
    }
    if row.rank() != grid.col || row.size() != grid.p {
        return Err(SorError::Collective(format!(
            "row group places rank {} at {}/{}, expected {}/{}",
            grid.rank,
            row.rank(),
            row.size(),
            grid.col,
            grid.p
        )));
    }
    log::debug!(
        "rank {} -> grid ({}, {}) of {}x{}",
        grid.rank,
        grid.row,
        grid.col,
        grid.q,
        grid.p
    );
    Ok(Decomposition { grid, column, row })
}
