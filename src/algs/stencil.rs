//! Over-relaxed five-point sweep over the interior of a ghosted grid.
//!
//! ```text
//! next[c] = (1 - W) * current[c]
//!         + (W / 4) * (next[west] + current[east] + next[north] + current[south])
//! W = 2 / (1 + π / NB)
//! ```
//!
//! West and north are read from `next`, east and south from `current`.
//! Inside a row the west value is the one written a step earlier in the
//! same pass, so the traversal must stay row-major (rows outer, columns
//! inner). At the block edge the west/north reads land on `next`'s ghost
//! cells.

use crate::data::grid::{Grid, Scalar};
use crate::sor_error::SorError;
use num_traits::NumCast;

/// Fixed relaxation factor for an interior `nb` cells wide.
pub fn relaxation_factor<T: Scalar>(nb: usize) -> T {
    let two = T::one() + T::one();
    let pi = <T as NumCast>::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let nb = <T as NumCast>::from(nb).unwrap_or_else(T::infinity);
    two / (T::one() + pi / nb)
}

/// Update every interior cell of `next` from `current` and return the
/// local convergence metric `Σ (next - current)²` over interior cells.
///
/// Ghost cells of `next` are read, never written.
pub fn sor_sweep<T: Scalar>(next: &mut Grid<T>, current: &Grid<T>) -> Result<T, SorError> {
    if next.shape() != current.shape() {
        return Err(SorError::ShapeMismatch {
            expected: current.shape(),
            found: next.shape(),
        });
    }
    let (nb, mb) = current.shape();
    let w: T = relaxation_factor(nb);
    let keep = T::one() - w;
    let quarter_w = w / (T::one() + T::one() + T::one() + T::one());
    let stride = current.stride();
    let om = current.as_slice();
    let nm = next.as_mut_slice();

    let mut norm = T::zero();
    for j in 0..mb {
        for i in 0..nb {
            let pos = 1 + i + (j + 1) * stride;
            let v = keep * om[pos]
                + quarter_w * (nm[pos - 1] + om[pos + 1] + nm[pos - stride] + om[pos + stride]);
            nm[pos] = v;
            let d = v - om[pos];
            norm = norm + d * d;
        }
    }
    Ok(norm)
}
