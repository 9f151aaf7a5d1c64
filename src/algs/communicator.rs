//! Thin façade over in-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the halo exchange calls
//! `.wait()` on every handle before it trusts that a ghost row is ready.
//!
//! Three backends:
//! - [`NoComm`]: a single process, every transfer is a no-op.
//! - [`LocalComm`]: ranks emulated by threads of one process, sharing a mailbox.
//! - `MpiComm` (feature `mpi-support`): rsmpi.

use crate::algs::wire::{WireF64, WireSplit, cast_slice, cast_slice_mut, copy_into};
use crate::sor_error::SorError;
use bytemuck::Zeroable;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use static_assertions::assert_impl_all;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Typed message tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

// Tags reserved for the collectives built on point-to-point messages.
const TAG_SPLIT: CommTag = CommTag(0xFF01);
const TAG_REDUCE: CommTag = CommTag(0xFF02);
const TAG_BCAST: CommTag = CommTag(0xFF03);

/// Reduction operator for [`Communicator::all_reduce`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// Non-blocking communication interface (minimal by design).
///
/// Received bytes are handed back by [`Wait::wait`]; the `buf` passed to
/// `irecv` only sizes the receive. Handles carry no borrow of the buffers
/// they were posted with, so a caller may post receives for a grid and
/// then send from the same grid before waiting.
pub trait Communicator: Sized {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Collective: partition this communicator by `color`, ordering each
    /// part by `(key, rank)`. Every rank must call it in the same order.
    fn split(&self, color: usize, key: usize) -> Result<Self, SorError>;

    /// Collective: combine one scalar from every rank.
    fn all_reduce(&self, local: f64, op: ReduceOp) -> Result<f64, SorError>;

    fn all_reduce_sum(&self, local: f64) -> Result<f64, SorError> {
        self.all_reduce(local, ReduceOp::Sum)
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for serial runs and unit tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
    fn split(&self, _color: usize, _key: usize) -> Result<Self, SorError> {
        Ok(NoComm)
    }
    fn all_reduce(&self, local: f64, _op: ReduceOp) -> Result<f64, SorError> {
        Ok(local)
    }
}

// --- LocalComm: intra-process / one thread per rank ---
type Key = (u64, usize, usize, u16); // (context, src, dst, tag)

#[derive(Debug, Default)]
struct Mailbox {
    queues: Mutex<HashMap<Key, VecDeque<Bytes>>>,
    arrived: Condvar,
    /// (parent context, split sequence, color) -> context
    contexts: DashMap<(u64, u64, usize), u64>,
    next_context: AtomicU64,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        self.queues.lock().entry(key).or_default().push_back(data);
        self.arrived.notify_all();
    }

    /// Blocks until a message for `key` is queued. No timeout.
    fn take(&self, key: &Key) -> Bytes {
        let mut queues = self.queues.lock();
        loop {
            if let Some(queue) = queues.get_mut(key) {
                if let Some(data) = queue.pop_front() {
                    if queue.is_empty() {
                        queues.remove(key);
                    }
                    return data;
                }
            }
            self.arrived.wait(&mut queues);
        }
    }

    fn context_for(&self, parent: u64, seq: u64, color: usize) -> u64 {
        *self
            .contexts
            .entry((parent, seq, color))
            .or_insert_with(|| self.next_context.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Receive handle of [`LocalComm`]; the wait blocks on the shared mailbox.
///
/// The payload comes back exactly as sent; the receiver checks its length.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        Some(self.mailbox.take(&self.key).to_vec())
    }
}

/// One rank of a group of ranks living in the same process.
///
/// Build the whole group with [`LocalComm::world`] and move each member to
/// its own thread. Messages between a pair of ranks with the same tag are
/// delivered in FIFO order; payloads are handed back whole, whatever the
/// receive length.
pub struct LocalComm {
    mailbox: Arc<Mailbox>,
    rank: usize,
    size: usize,
    context: u64,
    splits: AtomicU64,
}

impl LocalComm {
    /// Create `size` connected ranks, index `r` being rank `r`.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                mailbox: Arc::clone(&mailbox),
                rank,
                size,
                context: 0,
                splits: AtomicU64::new(0),
            })
            .collect()
    }

    fn recv_f64(&self, peer: usize, tag: CommTag) -> Result<f64, SorError> {
        let mut rec = WireF64::zeroed();
        let data = self
            .irecv(peer, tag.as_u16(), cast_slice_mut(std::slice::from_mut(&mut rec)))
            .wait()
            .ok_or_else(|| SorError::Collective(format!("no partial from rank {peer}")))?;
        copy_into(std::slice::from_mut(&mut rec), &data).map_err(SorError::Collective)?;
        Ok(rec.get())
    }

    fn send_f64(&self, peer: usize, tag: CommTag, x: f64) {
        self.isend(peer, tag.as_u16(), cast_slice(&[WireF64::of(x)]))
            .wait();
    }
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("context", &self.context)
            .finish()
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        debug_assert!(peer < self.size, "peer {peer} outside communicator of size {}", self.size);
        let key = (self.context, self.rank, peer, tag);
        self.mailbox.post(key, Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (self.context, peer, self.rank, tag),
        }
    }

    fn split(&self, color: usize, key: usize) -> Result<Self, SorError> {
        let seq = self.splits.fetch_add(1, Ordering::Relaxed);
        let vote = WireSplit::new(color, key);
        for peer in (0..self.size).filter(|&p| p != self.rank) {
            self.isend(peer, TAG_SPLIT.as_u16(), cast_slice(&[vote]))
                .wait();
        }

        let mut members = Vec::with_capacity(self.size);
        for peer in 0..self.size {
            let theirs = if peer == self.rank {
                vote
            } else {
                let mut rec = WireSplit::zeroed();
                let data = self
                    .irecv(peer, TAG_SPLIT.as_u16(), cast_slice_mut(std::slice::from_mut(&mut rec)))
                    .wait()
                    .ok_or_else(|| SorError::Collective(format!("split: no vote from rank {peer}")))?;
                copy_into(std::slice::from_mut(&mut rec), &data).map_err(SorError::Collective)?;
                rec
            };
            if theirs.color() == color {
                members.push((theirs.key(), peer));
            }
        }
        members.sort_unstable();

        let rank = members
            .iter()
            .position(|&(_, r)| r == self.rank)
            .ok_or_else(|| SorError::Collective("split: caller missing from its own group".into()))?;
        Ok(LocalComm {
            mailbox: Arc::clone(&self.mailbox),
            rank,
            size: members.len(),
            context: self.mailbox.context_for(self.context, seq, color),
            splits: AtomicU64::new(0),
        })
    }

    /// Gather-to-root then broadcast; root folds partials in rank order so
    /// every run of the same inputs gives the same bits.
    fn all_reduce(&self, local: f64, op: ReduceOp) -> Result<f64, SorError> {
        const ROOT: usize = 0;
        if self.size == 1 {
            return Ok(local);
        }
        if self.rank == ROOT {
            let mut acc = local;
            for peer in 1..self.size {
                acc = op.apply(acc, self.recv_f64(peer, TAG_REDUCE)?);
            }
            for peer in 1..self.size {
                self.send_f64(peer, TAG_BCAST, acc);
            }
            Ok(acc)
        } else {
            self.send_f64(ROOT, TAG_REDUCE, local);
            self.recv_f64(ROOT, TAG_BCAST)
        }
    }
}

assert_impl_all!(NoComm: Send, Sync, Clone);
assert_impl_all!(LocalComm: Send, Sync);
assert_impl_all!(LocalHandle: Send);

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::{Color, SimpleCommunicator};
    use mpi::traits::*;
    use std::rc::Rc;

    /// rsmpi-backed communicator. Dropping the last clone of the universe
    /// finalizes MPI, so sub-communicators keep it alive.
    pub struct MpiComm {
        pub world: SimpleCommunicator,
        universe: Rc<Universe>,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, SorError> {
            let universe = mpi::initialize().ok_or(SorError::MpiInit)?;
            let world = universe.world();
            Ok(Self::wrap(world, Rc::new(universe)))
        }

        fn wrap(world: SimpleCommunicator, universe: Rc<Universe>) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                world,
                universe,
                rank,
                size,
            }
        }
    }

    /// Owns the transfer buffer until the request completes.
    ///
    /// The buffer is leaked into the request for `'static` and reclaimed
    /// after `wait`; dropping an unfinished handle waits first.
    pub struct MpiHandle {
        req: Option<Request<'static, [u8], StaticScope>>,
        buf: *mut [u8],
        recv: bool,
    }

    impl MpiHandle {
        fn complete(&mut self) -> Option<Vec<u8>> {
            let req = self.req.take()?;
            let status = req.wait();
            // SAFETY: `buf` came from `Box::into_raw` and the only request
            // referencing it has completed.
            let boxed = unsafe { Box::from_raw(self.buf) };
            if !self.recv {
                return None;
            }
            let mut data = boxed.into_vec();
            let count = status.count(u8::equivalent_datatype());
            data.truncate(usize::try_from(count).unwrap_or(0));
            Some(data)
        }
    }

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            self.complete()
        }
    }

    impl Drop for MpiHandle {
        fn drop(&mut self) {
            let _ = self.complete();
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let raw: *mut [u8] = Box::into_raw(buf.to_vec().into_boxed_slice());
            // SAFETY: the allocation lives until `MpiHandle::complete`.
            let owned: &'static [u8] = unsafe { &*raw };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, owned, tag as i32);
            MpiHandle {
                req: Some(req),
                buf: raw,
                recv: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let raw: *mut [u8] = Box::into_raw(vec![0u8; buf.len()].into_boxed_slice());
            // SAFETY: as in `isend`; nothing else touches the allocation.
            let owned: &'static mut [u8] = unsafe { &mut *raw };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, owned, tag as i32);
            MpiHandle {
                req: Some(req),
                buf: raw,
                recv: true,
            }
        }

        fn split(&self, color: usize, key: usize) -> Result<Self, SorError> {
            let sub = self
                .world
                .split_by_color_with_key(Color::with_value(color as i32), key as i32)
                .ok_or_else(|| SorError::Collective(format!("split by color {color} failed")))?;
            Ok(Self::wrap(sub, Rc::clone(&self.universe)))
        }

        fn all_reduce(&self, local: f64, op: ReduceOp) -> Result<f64, SorError> {
            let mut global = 0.0f64;
            match op {
                ReduceOp::Sum => self.world.all_reduce_into(&local, &mut global, SystemOperation::sum()),
                ReduceOp::Min => self.world.all_reduce_into(&local, &mut global, SystemOperation::min()),
                ReduceOp::Max => self.world.all_reduce_into(&local, &mut global, SystemOperation::max()),
            }
            Ok(global)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let comms = LocalComm::world(2);

        // Post the receive on rank 1 before rank 0 sends.
        let mut recv_buf = [0u8; 4];
        let recv_handle = comms[1].irecv(0, 7, &mut recv_buf);
        comms[0].isend(1, 7, &[1, 2, 3, 4]).wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn worlds_do_not_share_mailboxes() {
        let a = LocalComm::world(2);
        let b = LocalComm::world(2);
        a[0].isend(1, 3, &[1]);
        b[0].isend(1, 3, &[2]);
        let mut buf = [0u8; 1];
        assert_eq!(b[1].irecv(0, 3, &mut buf).wait(), Some(vec![2]));
        assert_eq!(a[1].irecv(0, 3, &mut buf).wait(), Some(vec![1]));
    }

    #[test]
    fn reduce_ops() {
        assert_eq!(ReduceOp::Sum.apply(1.0, 2.5), 3.5);
        assert_eq!(ReduceOp::Min.apply(1.0, 2.5), 1.0);
        assert_eq!(ReduceOp::Max.apply(1.0, 2.5), 2.5);
    }

    #[test]
    fn oversized_payload_is_returned_whole() {
        let comms = LocalComm::world(2);
        comms[0].isend(1, CommTag::new(5).as_u16(), &[1, 2, 3, 4, 5, 6]);
        let mut b = [0u8; 4];
        let got = comms[1].irecv(0, 5, &mut b).wait().unwrap();
        assert_eq!(got.len(), 6);
    }
}
