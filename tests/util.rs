#![allow(dead_code)]
use halo_sor::algs::communicator::{Communicator, LocalComm, ReduceOp, Wait};
use halo_sor::data::grid::Grid;
use halo_sor::sor_error::SorError;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Run `f` once per rank of a fresh in-process world, each on its own thread.
/// Results come back in rank order.
pub fn run_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalComm) -> R + Sync,
{
    let comms = LocalComm::world(size);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    })
}

/// A `w`×`h` field with a fixed, asymmetric interior pattern and a uniform
/// border, so misplaced halos change the result.
pub fn pattern_field(w: usize, h: usize, border: f64) -> Grid<f64> {
    let mut g = Grid::try_with_border(w, h, 0.0, border).unwrap();
    for j in 0..h {
        for i in 0..w {
            g.set(i, j, ((3 * i + 7 * j) % 11) as f64 - 5.0 + 0.25 * i as f64);
        }
    }
    // Distinct values on each global edge.
    for i in 0..w {
        *g.at_mut(i + 1, 0) = 10.0 + i as f64;
        *g.at_mut(i + 1, h + 1) = -4.0;
    }
    for j in 0..h {
        *g.at_mut(0, j + 1) = 2.0 * j as f64;
        *g.at_mut(w + 1, j + 1) = 7.5;
    }
    g
}

/// Copy of `g` with its interior zeroed and its border kept.
pub fn zero_interior(g: &Grid<f64>) -> Grid<f64> {
    let mut z = g.clone();
    for j in 0..g.mb() {
        z.interior_row_mut(j).fill(0.0);
    }
    z
}

/// One over-relaxed sweep written out cell by cell on physical coordinates.
pub fn reference_sweep(next: &mut Grid<f64>, cur: &Grid<f64>) -> f64 {
    let (nb, mb) = cur.shape();
    let w = 2.0 / (1.0 + std::f64::consts::PI / nb as f64);
    let mut norm = 0.0;
    for y in 1..=mb {
        for x in 1..=nb {
            let v = (1.0 - w) * cur.at(x, y)
                + w / 4.0 * (next.at(x - 1, y) + cur.at(x + 1, y) + next.at(x, y - 1) + cur.at(x, y + 1));
            *next.at_mut(x, y) = v;
            norm += (v - cur.at(x, y)) * (v - cur.at(x, y));
        }
    }
    norm
}

/// `iters` double-buffered sweeps on a single domain, the second buffer
/// starting all zero.
pub fn reference_run(start: &Grid<f64>, iters: usize) -> Grid<f64> {
    let (nb, mb) = start.shape();
    reference_run_from(start, Grid::try_zeroed(nb, mb).unwrap(), iters)
}

/// As [`reference_run`], the second buffer starting with `start`'s border.
pub fn reference_run_seeded(start: &Grid<f64>, iters: usize) -> Grid<f64> {
    reference_run_from(start, zero_interior(start), iters)
}

fn reference_run_from(start: &Grid<f64>, mut next: Grid<f64>, iters: usize) -> Grid<f64> {
    let mut cur = start.clone();
    for _ in 0..iters {
        reference_sweep(&mut next, &cur);
        std::mem::swap(&mut cur, &mut next);
    }
    cur
}

/// Single-threaded emulation of a `q`×`p` block decomposition of `global`:
/// each iteration copies neighbour interiors into ghost cells directly, then
/// sweeps every block. Returns the reassembled global field.
pub fn emulate_blocks(global: &Grid<f64>, p: usize, q: usize, iters: usize) -> Grid<f64> {
    let (gw, gh) = global.shape();
    let (nb, mb) = (gw / p, gh / q);
    let mut cur: Vec<Grid<f64>> = (0..p * q)
        .map(|r| global.block(nb, mb, r / p, r % p).unwrap())
        .collect();
    let mut next: Vec<Grid<f64>> = (0..p * q).map(|_| Grid::try_zeroed(nb, mb).unwrap()).collect();

    for _ in 0..iters {
        let snap = cur.clone();
        for r in 0..p * q {
            let (row, col) = (r / p, r % p);
            let g = &mut cur[r];
            if row > 0 {
                for i in 0..nb {
                    *g.at_mut(i + 1, 0) = snap[r - p].get(i, mb - 1);
                }
            }
            if row + 1 < q {
                for i in 0..nb {
                    *g.at_mut(i + 1, mb + 1) = snap[r + p].get(i, 0);
                }
            }
            if col > 0 {
                for j in 0..mb {
                    *g.at_mut(0, j + 1) = snap[r - 1].get(nb - 1, j);
                }
            }
            if col + 1 < p {
                for j in 0..mb {
                    *g.at_mut(nb + 1, j + 1) = snap[r + 1].get(0, j);
                }
            }
        }
        for r in 0..p * q {
            reference_sweep(&mut next[r], &cur[r]);
        }
        std::mem::swap(&mut cur, &mut next);
    }

    let mut out = global.clone();
    for (r, block) in cur.iter().enumerate() {
        out.insert_block(block, r / p, r % p).unwrap();
    }
    out
}

/// Send handle that counts how many times it was waited on.
pub struct CountedWait(Rc<Cell<usize>>);

impl Wait for CountedWait {
    fn wait(self) -> Option<Vec<u8>> {
        self.0.set(self.0.get() + 1);
        None
    }
}

/// Receive handle whose peer never delivers.
pub struct Lost;

impl Wait for Lost {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Scripted communicator: splits hand out pre-planned `(rank, size)` pairs,
/// every receive is lost, and all traffic is counted.
pub struct ScriptedComm {
    pub rank: usize,
    pub size: usize,
    pub groups: RefCell<VecDeque<(usize, usize)>>,
    pub posted: Rc<Cell<usize>>,
    pub drained: Rc<Cell<usize>>,
    pub splits: Rc<Cell<usize>>,
}

impl ScriptedComm {
    pub fn new(rank: usize, size: usize, groups: &[(usize, usize)]) -> Self {
        Self {
            rank,
            size,
            groups: RefCell::new(groups.iter().copied().collect()),
            posted: Rc::new(Cell::new(0)),
            drained: Rc::new(Cell::new(0)),
            splits: Rc::new(Cell::new(0)),
        }
    }
}

impl Communicator for ScriptedComm {
    type SendHandle = CountedWait;
    type RecvHandle = Lost;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) -> CountedWait {
        self.posted.set(self.posted.get() + 1);
        CountedWait(Rc::clone(&self.drained))
    }
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) -> Lost {
        self.posted.set(self.posted.get() + 1);
        Lost
    }
    fn split(&self, _color: usize, _key: usize) -> Result<Self, SorError> {
        self.splits.set(self.splits.get() + 1);
        let (rank, size) = self
            .groups
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| SorError::Collective("unscripted split".into()))?;
        Ok(Self {
            rank,
            size,
            groups: RefCell::new(VecDeque::new()),
            posted: Rc::clone(&self.posted),
            drained: Rc::clone(&self.drained),
            splits: Rc::clone(&self.splits),
        })
    }
    fn all_reduce(&self, local: f64, _op: ReduceOp) -> Result<f64, SorError> {
        Ok(local)
    }
}
