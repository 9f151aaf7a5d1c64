//! Ghosted 2D grid buffer.
//!
//! A `Grid` stores an NB×MB interior surrounded by a one-cell ghost border,
//! (NB+2)×(MB+2) cells in row-major order. Interior cell `(i, j)` lives at
//! linear index `1 + i + (j + 1) * (NB + 2)`; physical row 0 is the north
//! ghost row, physical column 0 the west ghost column.

use crate::sor_error::SorError;
use bytemuck::Pod;
use num_traits::Float;
use std::fmt::Debug;

/// Element type of a grid: `f32` or `f64`.
pub trait Scalar: Float + Pod + Debug + Send + Sync + 'static {}

impl Scalar for f32 {}
impl Scalar for f64 {}

/// Which side of the interior a ghost row or column sits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    North,
    South,
    East,
    West,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    nb: usize,
    mb: usize,
    data: Vec<T>,
}

/// Allocate `len` copies of `value`, reporting failure instead of aborting.
pub(crate) fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>, SorError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| SorError::Allocation { cells: len })?;
    v.resize(len, value);
    Ok(v)
}

fn cell_count(nb: usize, mb: usize) -> Result<usize, SorError> {
    nb.checked_add(2)
        .zip(mb.checked_add(2))
        .and_then(|(w, h)| w.checked_mul(h))
        .ok_or(SorError::Allocation { cells: usize::MAX })
}

impl<T: Scalar> Grid<T> {
    /// A grid with every cell, ghosts included, set to zero.
    pub fn try_zeroed(nb: usize, mb: usize) -> Result<Self, SorError> {
        Self::try_filled(nb, mb, T::zero())
    }

    pub fn try_filled(nb: usize, mb: usize, value: T) -> Result<Self, SorError> {
        let cells = cell_count(nb, mb)?;
        Ok(Self {
            nb,
            mb,
            data: try_filled(cells, value)?,
        })
    }

    /// Wrap an existing row-major buffer of (NB+2)×(MB+2) cells.
    pub fn from_vec(nb: usize, mb: usize, data: Vec<T>) -> Result<Self, SorError> {
        let cells = cell_count(nb, mb)?;
        if data.len() != cells {
            return Err(SorError::InvalidConfig(format!(
                "buffer of {} cells cannot hold a {nb}x{mb} grid with ghosts ({cells} cells)",
                data.len()
            )));
        }
        Ok(Self { nb, mb, data })
    }

    /// Uniform interior `interior`, uniform ghost border `border`.
    pub fn try_with_border(nb: usize, mb: usize, interior: T, border: T) -> Result<Self, SorError> {
        let mut g = Self::try_filled(nb, mb, border)?;
        for j in 0..mb {
            g.interior_row_mut(j).fill(interior);
        }
        Ok(g)
    }

    /// Interior shape `(NB, MB)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nb, self.mb)
    }

    pub fn nb(&self) -> usize {
        self.nb
    }

    pub fn mb(&self) -> usize {
        self.mb
    }

    /// Physical row length, NB + 2.
    #[inline]
    pub fn stride(&self) -> usize {
        self.nb + 2
    }

    /// Linear index of interior cell `(i, j)`.
    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.nb && j < self.mb);
        1 + i + (j + 1) * self.stride()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[self.idx(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: T) {
        let k = self.idx(i, j);
        self.data[k] = v;
    }

    /// Cell at physical coordinates, ghosts included (`x < NB+2`, `y < MB+2`).
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> T {
        self.data[x + y * self.stride()]
    }

    #[inline]
    pub fn at_mut(&mut self, x: usize, y: usize) -> &mut T {
        let s = self.stride();
        &mut self.data[x + y * s]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Interior row `j` (NB contiguous cells, ghosts excluded).
    pub fn interior_row(&self, j: usize) -> &[T] {
        let start = self.idx(0, j);
        &self.data[start..start + self.nb]
    }

    pub fn interior_row_mut(&mut self, j: usize) -> &mut [T] {
        let start = self.idx(0, j);
        let nb = self.nb;
        &mut self.data[start..start + nb]
    }

    /// The NB interior-width cells of a ghost row (corners excluded).
    pub fn ghost_row(&self, side: Side) -> &[T] {
        let start = self.ghost_row_start(side);
        &self.data[start..start + self.nb]
    }

    pub fn ghost_row_mut(&mut self, side: Side) -> &mut [T] {
        let start = self.ghost_row_start(side);
        let nb = self.nb;
        &mut self.data[start..start + nb]
    }

    fn ghost_row_start(&self, side: Side) -> usize {
        match side {
            Side::North => 1,
            Side::South => 1 + (self.mb + 1) * self.stride(),
            Side::East | Side::West => panic!("{side:?} is a ghost column, not a row"),
        }
    }

    /// The interior row adjacent to a north or south ghost row.
    pub fn edge_row(&self, side: Side) -> &[T] {
        match side {
            Side::North => self.interior_row(0),
            Side::South => self.interior_row(self.mb - 1),
            Side::East | Side::West => panic!("{side:?} is a column, not a row"),
        }
    }

    /// Physical column index of the interior column adjacent to `side`.
    fn edge_col(&self, side: Side) -> usize {
        match side {
            Side::West => 1,
            Side::East => self.nb,
            Side::North | Side::South => panic!("{side:?} is a row, not a column"),
        }
    }

    /// Physical column index of the ghost column on `side`.
    fn ghost_col(&self, side: Side) -> usize {
        match side {
            Side::West => 0,
            Side::East => self.nb + 1,
            Side::North | Side::South => panic!("{side:?} is a row, not a column"),
        }
    }

    /// Pack the strided interior column next to `side` into `out` (length MB).
    pub fn pack_edge_col(&self, side: Side, out: &mut [T]) {
        debug_assert_eq!(out.len(), self.mb);
        let x = self.edge_col(side);
        for (j, slot) in out.iter_mut().enumerate() {
            *slot = self.at(x, j + 1);
        }
    }

    /// Unpack a contiguous column (length MB) into the ghost column on `side`.
    pub fn unpack_ghost_col(&mut self, side: Side, src: &[T]) {
        debug_assert_eq!(src.len(), self.mb);
        let x = self.ghost_col(side);
        for (j, &v) in src.iter().enumerate() {
            *self.at_mut(x, j + 1) = v;
        }
    }

    /// Copy every ghost cell (corners included) from `other`.
    pub fn copy_border_from(&mut self, other: &Grid<T>) -> Result<(), SorError> {
        if other.shape() != self.shape() {
            return Err(SorError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        let (w, h) = (self.stride(), self.mb + 2);
        for y in 0..h {
            for x in 0..w {
                if y == 0 || y == h - 1 || x == 0 || x == w - 1 {
                    *self.at_mut(x, y) = other.at(x, y);
                }
            }
        }
        Ok(())
    }

    /// Iterate interior values row by row.
    pub fn interior(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.mb).flat_map(move |j| self.interior_row(j).iter().copied())
    }

    /// The ghosted `nb`×`mb` block at block coordinates `(row, col)` of a
    /// global field, ghosts taken from the surrounding global cells.
    ///
    /// `self` must have interior `(cols * nb, rows * mb)` for some block
    /// grid; only `(row, col)` needs to fit.
    pub fn block(&self, nb: usize, mb: usize, row: usize, col: usize) -> Result<Grid<T>, SorError> {
        if (col + 1) * nb > self.nb || (row + 1) * mb > self.mb {
            return Err(SorError::ShapeMismatch {
                expected: ((col + 1) * nb, (row + 1) * mb),
                found: self.shape(),
            });
        }
        let mut out = Grid::try_zeroed(nb, mb)?;
        let (x0, y0) = (col * nb, row * mb);
        for y in 0..mb + 2 {
            for x in 0..nb + 2 {
                *out.at_mut(x, y) = self.at(x0 + x, y0 + y);
            }
        }
        Ok(out)
    }

    /// Write the interior of `block` into this global field at block `(row, col)`.
    pub fn insert_block(&mut self, block: &Grid<T>, row: usize, col: usize) -> Result<(), SorError> {
        let (nb, mb) = block.shape();
        if (col + 1) * nb > self.nb || (row + 1) * mb > self.mb {
            return Err(SorError::ShapeMismatch {
                expected: ((col + 1) * nb, (row + 1) * mb),
                found: self.shape(),
            });
        }
        for j in 0..mb {
            for i in 0..nb {
                self.set(col * nb + i, row * mb + j, block.get(i, j));
            }
        }
        Ok(())
    }
}
