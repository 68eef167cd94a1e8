//! Search nodes and the per-worker bump arena that owns them.
//!
//! Nodes are allocated in 64 KiB chunks and never freed individually; chunk
//! storage is reserved up front and never reallocates, so a `*mut Node`
//! handed out here stays valid until the arena drops. The counterpart
//! frontier reads `g` while the owning worker updates it, which is why `g`
//! alone is atomic; every other field is touched only by the owner (or by
//! the main thread after all workers have joined).

use std::ptr::{self, NonNull};
use std::sync::atomic::AtomicI32;

/// Scores start at "unreached".
pub const INF: i32 = i32::MAX;

const CHUNK_BYTES: usize = 64 * 1024;
const NODES_PER_CHUNK: usize = CHUNK_BYTES / std::mem::size_of::<Node>();

#[repr(C)]
pub struct Node {
    /// Predecessor along the best known path in this node's direction.
    pub parent: *mut Node,
    pub x: i32,
    pub y: i32,
    /// Path cost from this direction's origin. Read it through a place
    /// projection (`(*ptr).g.load(..)`) rather than a `&Node`, so no shared
    /// reference to the whole node is formed while the owner is writing the
    /// plain fields next to it.
    pub g: AtomicI32,
    /// `g + h` toward this direction's heuristic target.
    pub f: i32,
    /// 1-based position in the owning worker's heap; 0 when not queued.
    pub heap_id: u32,
}

impl Node {
    fn new(x: i32, y: i32) -> Self {
        Self {
            parent: ptr::null_mut(),
            x,
            y,
            g: AtomicI32::new(INF),
            f: INF,
            heap_id: 0,
        }
    }
}

/// Manhattan distance, the admissible heuristic for a 4-connected unit grid.
#[inline(always)]
pub fn manhattan(x1: i32, y1: i32, x2: i32, y2: i32) -> i32 {
    (x1 - x2).abs() + (y1 - y2).abs()
}

/// Chunked bump allocator with stable node addresses.
pub struct NodeArena {
    chunks: Vec<Vec<Node>>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            chunks: vec![Vec::with_capacity(NODES_PER_CHUNK)],
        }
    }

    /// Allocate a fresh node at `(x, y)` with unreached scores.
    pub fn alloc(&mut self, x: i32, y: i32) -> NonNull<Node> {
        if self
            .chunks
            .last()
            .map_or(true, |chunk| chunk.len() == NODES_PER_CHUNK)
        {
            self.chunks.push(Vec::with_capacity(NODES_PER_CHUNK));
        }
        let chunk = self.chunks.last_mut().expect("arena holds a chunk");
        let idx = chunk.len();
        chunk.push(Node::new(x, y));
        // Capacity was reserved when the chunk was created, so the push above
        // cannot move earlier nodes.
        NonNull::from(&mut chunk[idx])
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: an arena is owned by exactly one worker during the search; other
// threads reach its nodes only through pointers published with
// release/acquire pairs, and the main thread walks them only after every
// worker has joined.
unsafe impl Send for NodeArena {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn fresh_nodes_start_unreached() {
        let mut arena = NodeArena::new();
        let node = arena.alloc(3, 7);
        let node = unsafe { node.as_ref() };
        assert_eq!((node.x, node.y), (3, 7));
        assert_eq!(node.g.load(Ordering::Relaxed), INF);
        assert_eq!(node.f, INF);
        assert_eq!(node.heap_id, 0);
        assert!(node.parent.is_null());
    }

    #[test]
    fn addresses_stay_stable_across_chunk_growth() {
        let mut arena = NodeArena::new();
        let count = NODES_PER_CHUNK * 3 + 17;
        let ptrs: Vec<_> = (0..count)
            .map(|i| arena.alloc(i as i32, (i * 2) as i32))
            .collect();
        for (i, ptr) in ptrs.iter().enumerate() {
            let node = unsafe { ptr.as_ref() };
            assert_eq!((node.x, node.y), (i as i32, (i * 2) as i32));
        }
    }

    #[test]
    fn manhattan_is_symmetric() {
        assert_eq!(manhattan(1, 1, 4, 5), 7);
        assert_eq!(manhattan(4, 5, 1, 1), 7);
        assert_eq!(manhattan(2, 2, 2, 2), 0);
    }
}
