//! Per-iteration ghost-border exchange with up to four neighbours.
//!
//! North/south traffic runs over the column group and moves whole interior
//! rows (NB contiguous cells) straight into the neighbour's ghost row.
//! East/west traffic runs over the row group; the interior column has
//! stride NB+2, so it is packed into contiguous scratch before sending and
//! unpacked from contiguous scratch after receiving.
//!
//! All receives are posted, then all sends, then every handle is waited on.
//! Even when a transfer fails, every posted handle is drained before the
//! error is returned, so nothing stays in flight past the iteration.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::decompose::Decomposition;
use crate::algs::wire::{cast_slice, cast_slice_mut, copy_into};
use crate::data::grid::{Grid, Scalar, Side, try_filled};
use crate::sor_error::SorError;

/// Tag of every halo message; groups and directions keep them apart.
pub const TAG_HALO: CommTag = CommTag(0x5300);

/// How many transfers one exchange posted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    pub recvs: usize,
    pub sends: usize,
}

impl ExchangeStats {
    pub fn posted(&self) -> usize {
        self.recvs + self.sends
    }
}

/// Owns the east/west scratch columns, reused across iterations.
#[derive(Debug)]
pub struct HaloExchange<T> {
    nb: usize,
    mb: usize,
    send_east: Vec<T>,
    send_west: Vec<T>,
    recv_east: Vec<T>,
    recv_west: Vec<T>,
}

impl<T: Scalar> HaloExchange<T> {
    pub fn new(nb: usize, mb: usize) -> Result<Self, SorError> {
        if nb == 0 || mb == 0 {
            return Err(SorError::InvalidConfig(format!(
                "halo exchange needs a non-empty interior, got {nb}x{mb}"
            )));
        }
        Ok(Self {
            nb,
            mb,
            send_east: try_filled(mb, T::zero())?,
            send_west: try_filled(mb, T::zero())?,
            recv_east: try_filled(mb, T::zero())?,
            recv_west: try_filled(mb, T::zero())?,
        })
    }

    /// Refresh the ghost border of `grid` from its neighbours.
    ///
    /// Directions without a neighbour are skipped and their ghost cells keep
    /// whatever the caller put there.
    pub fn exchange<C: Communicator>(
        &mut self,
        grid: &mut Grid<T>,
        dec: &Decomposition<C>,
    ) -> Result<ExchangeStats, SorError> {
        if grid.shape() != (self.nb, self.mb) {
            return Err(SorError::ShapeMismatch {
                expected: (self.nb, self.mb),
                found: grid.shape(),
            });
        }
        let tag = TAG_HALO.as_u16();
        let pg = dec.grid;
        let ns = dec.column_position();
        let ew = dec.row_position();
        let north = ns.lower().map(|r| (r, pg.rank - pg.p));
        let south = ns.upper().map(|r| (r, pg.rank + pg.p));
        let west = ew.lower().map(|r| (r, pg.rank - 1));
        let east = ew.upper().map(|r| (r, pg.rank + 1));
        let mut stats = ExchangeStats::default();

        // 1) post all receives
        let mut recvs: Vec<(Side, usize, C::RecvHandle)> = Vec::with_capacity(4);
        if let Some((nbr, base)) = north {
            let h = dec
                .column
                .irecv(nbr, tag, cast_slice_mut(grid.ghost_row_mut(Side::North)));
            recvs.push((Side::North, base, h));
        }
        if let Some((nbr, base)) = south {
            let h = dec
                .column
                .irecv(nbr, tag, cast_slice_mut(grid.ghost_row_mut(Side::South)));
            recvs.push((Side::South, base, h));
        }
        if let Some((nbr, base)) = east {
            let h = dec.row.irecv(nbr, tag, cast_slice_mut(&mut self.recv_east));
            recvs.push((Side::East, base, h));
        }
        if let Some((nbr, base)) = west {
            let h = dec.row.irecv(nbr, tag, cast_slice_mut(&mut self.recv_west));
            recvs.push((Side::West, base, h));
        }
        stats.recvs = recvs.len();

        // 2) pack the strided columns and post all sends
        let mut sends: Vec<C::SendHandle> = Vec::with_capacity(4);
        if let Some((nbr, _)) = north {
            sends.push(dec.column.isend(nbr, tag, cast_slice(grid.edge_row(Side::North))));
        }
        if let Some((nbr, _)) = south {
            sends.push(dec.column.isend(nbr, tag, cast_slice(grid.edge_row(Side::South))));
        }
        if let Some((nbr, _)) = east {
            grid.pack_edge_col(Side::East, &mut self.send_east);
            sends.push(dec.row.isend(nbr, tag, cast_slice(&self.send_east)));
        }
        if let Some((nbr, _)) = west {
            grid.pack_edge_col(Side::West, &mut self.send_west);
            sends.push(dec.row.isend(nbr, tag, cast_slice(&self.send_west)));
        }
        stats.sends = sends.len();

        // 3) wait for every receive (but do not early-return)
        let mut maybe_err = None;
        for (side, nbr, h) in recvs {
            match h.wait() {
                Some(data) if maybe_err.is_none() => {
                    let landed = match side {
                        Side::North | Side::South => copy_into(grid.ghost_row_mut(side), &data),
                        Side::East => copy_into(&mut self.recv_east, &data),
                        Side::West => copy_into(&mut self.recv_west, &data),
                    };
                    if let Err(e) = landed {
                        maybe_err = Some(SorError::Comm {
                            neighbor: nbr,
                            source: format!("{side:?} halo: {e}").into(),
                        });
                    }
                }
                None if maybe_err.is_none() => {
                    maybe_err = Some(SorError::Comm {
                        neighbor: nbr,
                        source: format!("no {side:?} halo received").into(),
                    });
                }
                _ => {} // already have an error; just drain
            }
        }

        // 4) always drain all send handles before returning
        for send in sends {
            let _ = send.wait();
        }
        if let Some(err) = maybe_err {
            return Err(err);
        }

        // 5) unpack east/west into the ghost columns
        if east.is_some() {
            grid.unpack_ghost_col(Side::East, &self.recv_east);
        }
        if west.is_some() {
            grid.unpack_ghost_col(Side::West, &self.recv_west);
        }
        log::trace!(
            "rank {}: halo exchange posted {} recvs, {} sends",
            pg.rank,
            stats.recvs,
            stats.sends
        );
        Ok(stats)
    }
}
