//! HDA* worker loop with the embedded termination detector.
//!
//! Cells are statically partitioned across a direction's workers by
//! `(x + y) mod W`; the owner of a cell is the only thread that allocates,
//! queues, or expands its node. Successor proposals travel as messages to
//! the owning worker's inbox. The sent/received counters keep an exact
//! ledger: their difference over a direction equals the number of messages
//! in flight plus the number of nodes sitting in that direction's heaps, so
//! equal sums from an idle worker mean the whole direction is out of work.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::grid::MazeFile;

use super::engine::{DirectionState, MeetPoint};
use super::heap::NodeHeap;
use super::inbox::MessagePool;
use super::node::{manhattan, Node, NodeArena};

/// Mutable state owned by a single worker. Created by the controller so the
/// arenas outlive the threads (parent chains are walked after the join).
pub(crate) struct WorkerState {
    pub arena: NodeArena,
    pub heap: NodeHeap,
    pub pool: MessagePool,
}

impl WorkerState {
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            heap: NodeHeap::new(),
            pool: MessagePool::new(),
        }
    }
}

pub(crate) struct Worker<'a> {
    pub id: usize,
    /// Workers in this direction.
    pub crew: usize,
    pub grid: &'a MazeFile,
    pub dir: &'a DirectionState,
    pub other: &'a DirectionState,
    pub meet: &'a MeetPoint,
    pub finished: &'a AtomicBool,
}

impl Worker<'_> {
    #[inline(always)]
    fn owner_of(&self, x: i32, y: i32) -> usize {
        (x + y) as usize % self.crew
    }

    #[inline(always)]
    fn bump_sent(&self) {
        self.dir.sent[self.id].fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    fn bump_received(&self, n: usize) {
        self.dir.received[self.id].fetch_add(n, Ordering::Relaxed);
    }

    pub fn run(&self, state: &mut WorkerState) {
        let (ox, oy) = self.dir.origin;
        if self.owner_of(ox, oy) == self.id {
            let node = state.arena.alloc(ox, oy);
            unsafe {
                let n = node.as_ptr();
                (*n).g.store(1, Ordering::Relaxed);
                (*n).f = 1 + manhattan(ox, oy, self.dir.target.0, self.dir.target.1);
            }
            state.heap.insert(node);
            self.dir.table.publish(ox, oy, node.as_ptr());
            // Balances the heap entry that had no inbound message.
            self.bump_sent();
        }
        // No worker may sample the counters before the seed is on the books,
        // or an all-zero ledger would read as instant quiescence.
        self.dir.barrier.wait();

        loop {
            if self.finished.load(Ordering::Acquire) {
                break;
            }
            if let Some(node) = state.heap.extract_min() {
                self.visit(node, state);
            } else if !self.idle() {
                break;
            }
            self.drain(state);
        }
    }

    /// Handle one node pulled off the heap: prune, meet, or expand.
    fn visit(&self, node: NonNull<Node>, state: &mut WorkerState) {
        let n = node.as_ptr();
        let (x, y, g) = unsafe { ((*n).x, (*n).y, (*n).g.load(Ordering::Relaxed)) };

        if g >= self.meet.shortest() {
            // Unit edges and an admissible heuristic: everything still
            // queued costs at least as much, so none of it can improve the
            // best meeting.
            let dumped = state.heap.dump();
            self.bump_received(dumped + 1);
            return;
        }

        let counterpart = self.other.table.get(x, y);
        if !counterpart.is_null() {
            let total = g + unsafe { (*counterpart).g.load(Ordering::Relaxed) };
            self.meet.offer(x, y, total);
            self.bump_received(1);
            return;
        }

        let g_next = g + 1;
        for (nx, ny) in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
            if self.grid.is_wall(nx, ny) {
                continue;
            }
            // Sender-side filter only; the owner re-checks on delivery.
            let known = self.dir.table.get(nx, ny);
            if known.is_null() || g_next < unsafe { (*known).g.load(Ordering::Relaxed) } {
                let msg = state.pool.alloc(n, nx, ny, g_next);
                self.bump_sent();
                self.dir.inboxes[self.owner_of(nx, ny)].push(msg);
            }
        }
        self.bump_received(1);
    }

    /// Spin until new work arrives or this direction runs dry. Returns false
    /// when the worker should exit.
    ///
    /// Equal counter sums mean no message is in flight, no node is queued,
    /// and no extraction is mid-visit anywhere in the direction — and since
    /// only this direction's workers feed its inboxes, that quiescence is
    /// permanent. A quiescent direction can therefore retire. The search as
    /// a whole is over only when *both* directions are quiescent: the
    /// counterpart may still be holding a proposal that lowers the best
    /// meeting (or has not even seeded when this direction swept past its
    /// origin), so one direction's silence proves nothing about the final
    /// answer.
    fn idle(&self) -> bool {
        while self.dir.inboxes[self.id].is_empty() {
            // Received before sent: a consumption counted here had its send
            // counted earlier, so reading sent second can only overshoot,
            // never fake an equality.
            let mut received = 0usize;
            for counter in self.dir.received.iter() {
                received += counter.load(Ordering::Relaxed);
            }
            let mut sent = 0usize;
            for counter in self.dir.sent.iter() {
                sent += counter.load(Ordering::Relaxed);
            }
            if self.finished.load(Ordering::Acquire) {
                return false;
            }
            if sent == received {
                self.dir.done.store(true, Ordering::Release);
                if self.other.done.load(Ordering::Acquire) {
                    self.finished.store(true, Ordering::Release);
                }
                return false;
            }
            std::hint::spin_loop();
        }
        true
    }

    /// Take everything out of this worker's inbox and apply it.
    fn drain(&self, state: &mut WorkerState) {
        let head = self.dir.inboxes[self.id].drain();
        if head.is_null() {
            return;
        }
        let mut msg = head;
        let tail = loop {
            let (parent, x, y, g) = unsafe { ((*msg).parent, (*msg).x, (*msg).y, (*msg).g) };
            self.deliver(parent, x, y, g, state);
            let next = unsafe { (*msg).next };
            if next.is_null() {
                break msg;
            }
            msg = next;
        };
        state.pool.recycle_chain(head, tail);
    }

    /// Apply one proposal to the node this worker owns at `(x, y)`.
    fn deliver(&self, parent: *mut Node, x: i32, y: i32, g_new: i32, state: &mut WorkerState) {
        debug_assert_eq!(self.owner_of(x, y), self.id);

        let node = match NonNull::new(self.dir.table.get(x, y)) {
            None => {
                let node = state.arena.alloc(x, y);
                unsafe {
                    let n = node.as_ptr();
                    (*n).parent = parent;
                    (*n).g.store(g_new, Ordering::Relaxed);
                    (*n).f = g_new + manhattan(x, y, self.dir.target.0, self.dir.target.1);
                }
                state.heap.insert(node);
                // Publish last: the counterpart frontier reads g through
                // this pointer as soon as it appears.
                self.dir.table.publish(x, y, node.as_ptr());
                return;
            }
            Some(node) => node,
        };

        let n = node.as_ptr();
        if g_new < unsafe { (*n).g.load(Ordering::Relaxed) } {
            unsafe {
                (*n).parent = parent;
                (*n).g.store(g_new, Ordering::Relaxed);
                (*n).f = g_new + manhattan(x, y, self.dir.target.0, self.dir.target.1);
            }
            if unsafe { (*n).heap_id } != 0 {
                state.heap.decrease_key(node);
                self.bump_received(1);
            } else {
                // Reopening an already expanded node; distributed expansion
                // order is not globally best-first, so this happens.
                state.heap.insert(node);
            }
        } else {
            // Redundant proposal; still counted, or the ledger never closes.
            self.bump_received(1);
        }
    }
}
