//! Two-slot arena for double buffering.
//!
//! The pair owns both grids. An active index picks the "current" slot; the
//! other slot is "next". `swap` flips the index, so the two roles can never
//! refer to the same memory.

use crate::data::grid::{Grid, Scalar};
use crate::sor_error::SorError;

#[derive(Debug)]
pub struct BufferPair<T> {
    slots: [Grid<T>; 2],
    active: usize,
    /// Slot holding the caller's original allocation.
    caller: usize,
}

/// What survives a [`BufferPair`] once iteration stops.
#[derive(Debug)]
pub struct FinalBuffer<T> {
    pub grid: Grid<T>,
    /// True when `grid` is the allocation the caller handed in.
    pub is_caller_buffer: bool,
}

impl<T: Scalar> BufferPair<T> {
    /// Take ownership of the caller's grid as "current" and allocate a
    /// zeroed "next", ghost cells included.
    pub fn new(current: Grid<T>) -> Result<Self, SorError> {
        let (nb, mb) = current.shape();
        let next = Grid::try_zeroed(nb, mb)?;
        Ok(Self {
            slots: [current, next],
            active: 0,
            caller: 0,
        })
    }

    /// Like [`BufferPair::new`], but the next buffer's ghost border starts as
    /// a copy of the caller's, so reads through the next buffer see the
    /// global boundary from the first iteration on.
    pub fn with_seeded_border(current: Grid<T>) -> Result<Self, SorError> {
        let (nb, mb) = current.shape();
        let mut next = Grid::try_zeroed(nb, mb)?;
        next.copy_border_from(&current)?;
        Ok(Self {
            slots: [current, next],
            active: 0,
            caller: 0,
        })
    }

    pub fn current(&self) -> &Grid<T> {
        &self.slots[self.active]
    }

    pub fn current_mut(&mut self) -> &mut Grid<T> {
        &mut self.slots[self.active]
    }

    pub fn next(&self) -> &Grid<T> {
        &self.slots[1 - self.active]
    }

    /// Borrow `(current, next)` at once: current shared, next exclusive.
    pub fn split_mut(&mut self) -> (&Grid<T>, &mut Grid<T>) {
        let [a, b] = &mut self.slots;
        if self.active == 0 { (&*a, b) } else { (&*b, a) }
    }

    pub fn swap(&mut self) {
        self.active = 1 - self.active;
    }

    pub fn current_is_caller_buffer(&self) -> bool {
        self.active == self.caller
    }

    /// Keep the current slot, release the other.
    pub fn into_final(self) -> FinalBuffer<T> {
        let is_caller_buffer = self.current_is_caller_buffer();
        let [a, b] = self.slots;
        let grid = if self.active == 0 {
            drop(b);
            a
        } else {
            drop(a);
            b
        };
        FinalBuffer {
            grid,
            is_caller_buffer,
        }
    }
}
