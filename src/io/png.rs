//! PNG snapshots of a grid's interior.
//!
//! One pixel per interior cell, row by row. Values are mapped linearly from
//! [-20, 20] onto a blue→red ramp: `t = clamp((v + 20) / 40, 0, 1)`,
//! `r = ⌊255 t⌋`, `g = 0`, `b = 255 - r`.

use crate::data::grid::{Grid, Scalar};
use crate::io::{Frame, FrameExporter};
use crate::sor_error::SorError;
use image::{Rgb, RgbImage};
use std::fs;
use std::path::PathBuf;

const RAMP_LO: f64 = -20.0;
const RAMP_HI: f64 = 20.0;

/// Map a value onto the blue→red ramp.
pub fn ramp(v: f64) -> Rgb<u8> {
    let t = ((v - RAMP_LO) / (RAMP_HI - RAMP_LO)).clamp(0.0, 1.0);
    let r = (t * 255.0) as u8;
    Rgb([r, 0, 255 - r])
}

/// Render the interior of `grid`, NB pixels wide and MB tall.
pub fn render<T: Scalar>(grid: &Grid<T>) -> Result<RgbImage, SorError> {
    let (nb, mb) = grid.shape();
    let too_big = || SorError::InvalidConfig(format!("{nb}x{mb} interior is too large for an image"));
    let width = u32::try_from(nb).map_err(|_| too_big())?;
    let height = u32::try_from(mb).map_err(|_| too_big())?;
    let mut img = RgbImage::new(width, height);
    for (y, row) in (0..mb).map(|j| grid.interior_row(j)).enumerate() {
        for (x, &v) in row.iter().enumerate() {
            img.put_pixel(x as u32, y as u32, ramp(v.to_f64().unwrap_or(f64::NAN)));
        }
    }
    Ok(img)
}

/// Writes `<dir>/rank_<rank>_iteration_<iter:04>.png`, creating `dir` on demand.
#[derive(Clone, Debug)]
pub struct PngExporter {
    dir: PathBuf,
    written: usize,
}

impl PngExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: 0,
        }
    }

    pub fn path_for(&self, rank: usize, iteration: usize) -> PathBuf {
        self.dir
            .join(format!("rank_{rank}_iteration_{iteration:04}.png"))
    }

    /// Frames written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl<T: Scalar> FrameExporter<T> for PngExporter {
    fn export(&mut self, frame: &Frame<'_, T>) -> Result<(), SorError> {
        fs::create_dir_all(&self.dir)?;
        let img = render(frame.grid)?;
        img.save(self.path_for(frame.rank, frame.iteration))?;
        self.written += 1;
        Ok(())
    }
}
