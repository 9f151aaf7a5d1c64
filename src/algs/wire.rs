//! Fixed wire records and byte casts shared by the exchange paths.
//!
//! Grid values travel in native byte order: every rank of a run is the same
//! binary on the same kind of machine. Control records (split requests,
//! reduction partials) are little-endian.

use bytemuck::{Pod, Zeroable};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Copy a received payload into `dst`, checking the byte length first.
///
/// The payload is copied byte-wise, so it need not be aligned for `T`.
pub fn copy_into<T: Pod>(dst: &mut [T], payload: &[u8]) -> Result<(), String> {
    let bytes = cast_slice_mut(dst);
    expect_exact_len(payload.len(), bytes.len())?;
    bytes.copy_from_slice(payload);
    Ok(())
}

/// One rank's vote in a communicator split: `(color, key)`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireSplit {
    pub color_le: u64,
    pub key_le: u64,
}

impl WireSplit {
    pub const SIZE: usize = 16;

    pub fn new(color: usize, key: usize) -> Self {
        Self {
            color_le: (color as u64).to_le(),
            key_le: (key as u64).to_le(),
        }
    }
    pub fn color(&self) -> usize {
        u64::from_le(self.color_le) as usize
    }
    pub fn key(&self) -> usize {
        u64::from_le(self.key_le) as usize
    }
}

/// A scalar partial result carried by the in-process reductions.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq)]
pub struct WireF64 {
    pub bits_le: u64,
}

impl WireF64 {
    pub fn of(x: f64) -> Self {
        Self {
            bits_le: x.to_bits().to_le(),
        }
    }
    pub fn get(&self) -> f64 {
        f64::from_bits(u64::from_le(self.bits_le))
    }
}
