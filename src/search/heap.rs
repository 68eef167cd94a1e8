//! Indexed binary min-heap over node f-scores.
//!
//! The backing array is 1-based with a null sentinel in slot 0, so parent
//! and child indices are plain shifts of each other. Every move writes the
//! moved node's `heap_id` back-index, which is what lets `decrease_key`
//! start sifting from the node's current position instead of searching.
//! Sifts move a hole down or up and place the node once at the end.

use std::ptr::{self, NonNull};

use super::node::Node;

pub struct NodeHeap {
    slots: Vec<*mut Node>,
}

impl NodeHeap {
    pub fn new() -> Self {
        Self {
            slots: vec![ptr::null_mut()],
        }
    }

    /// Number of queued nodes (the sentinel does not count).
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.slots.len() == 1
    }

    #[inline(always)]
    fn fscore(&self, idx: usize) -> i32 {
        unsafe { (*self.slots[idx]).f }
    }

    #[inline(always)]
    fn place(&mut self, idx: usize, node: *mut Node) {
        self.slots[idx] = node;
        unsafe { (*node).heap_id = idx as u32 };
    }

    /// Move the hole at `idx` toward the root until `f` fits, then place
    /// `node` there.
    fn sift_up(&mut self, mut idx: usize, node: *mut Node) {
        let f = unsafe { (*node).f };
        while idx > 1 && f < self.fscore(idx / 2) {
            let parent = self.slots[idx / 2];
            self.place(idx, parent);
            idx /= 2;
        }
        self.place(idx, node);
    }

    pub fn insert(&mut self, node: NonNull<Node>) {
        debug_assert_eq!(unsafe { (*node.as_ptr()).heap_id }, 0);
        self.slots.push(node.as_ptr());
        self.sift_up(self.slots.len() - 1, node.as_ptr());
    }

    /// Remove and return the node with the smallest f-score, clearing its
    /// back-index.
    pub fn extract_min(&mut self) -> Option<NonNull<Node>> {
        if self.is_empty() {
            return None;
        }
        let top = self.slots[1];
        unsafe { (*top).heap_id = 0 };
        let last = match self.slots.pop() {
            Some(p) => p,
            None => return None,
        };
        if !self.is_empty() {
            let f = unsafe { (*last).f };
            let mut idx = 1;
            loop {
                let mut child = idx * 2;
                if child > self.len() {
                    break;
                }
                if child < self.len() && self.fscore(child + 1) < self.fscore(child) {
                    child += 1;
                }
                if self.fscore(child) >= f {
                    break;
                }
                let promoted = self.slots[child];
                self.place(idx, promoted);
                idx = child;
            }
            self.place(idx, last);
        }
        NonNull::new(top)
    }

    /// Restore the heap order after `node`'s f-score decreased in place.
    pub fn decrease_key(&mut self, node: NonNull<Node>) {
        let idx = unsafe { (*node.as_ptr()).heap_id } as usize;
        debug_assert!(idx >= 1 && idx <= self.len());
        debug_assert_eq!(self.slots[idx], node.as_ptr());
        self.sift_up(idx, node.as_ptr());
    }

    /// Discard every queued node, zeroing each back-index so the
    /// "`heap_id > 0` iff queued" invariant survives a prune. Returns the
    /// number of discarded nodes.
    pub fn dump(&mut self) -> usize {
        let count = self.len();
        for &node in &self.slots[1..] {
            unsafe { (*node).heap_id = 0 };
        }
        self.slots.truncate(1);
        count
    }
}

impl Default for NodeHeap {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: a heap is owned by exactly one worker; the node pointers it holds
// are mutated only by that worker.
unsafe impl Send for NodeHeap {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::node::NodeArena;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn scored(arena: &mut NodeArena, f: i32) -> NonNull<Node> {
        let node = arena.alloc(0, 0);
        unsafe { (*node.as_ptr()).f = f };
        node
    }

    fn assert_heap_invariants(heap: &NodeHeap) {
        for idx in 1..=heap.len() {
            let node = heap.slots[idx];
            assert_eq!(unsafe { (*node).heap_id } as usize, idx, "back-index at {idx}");
            if idx > 1 {
                assert!(
                    heap.fscore(idx / 2) <= heap.fscore(idx),
                    "order violated between {} and {idx}",
                    idx / 2
                );
            }
        }
    }

    #[test]
    fn extracts_in_fscore_order() {
        let mut arena = NodeArena::new();
        let mut heap = NodeHeap::new();
        for f in [9, 3, 7, 1, 8, 2, 2, 5] {
            heap.insert(scored(&mut arena, f));
            assert_heap_invariants(&heap);
        }
        let mut out = Vec::new();
        while let Some(node) = heap.extract_min() {
            assert_eq!(unsafe { (*node.as_ptr()).heap_id }, 0);
            out.push(unsafe { (*node.as_ptr()).f });
            assert_heap_invariants(&heap);
        }
        assert_eq!(out, vec![1, 2, 2, 3, 5, 7, 8, 9]);
    }

    #[test]
    fn decrease_key_moves_node_to_front() {
        let mut arena = NodeArena::new();
        let mut heap = NodeHeap::new();
        for f in [4, 6, 8, 10] {
            heap.insert(scored(&mut arena, f));
        }
        let node = scored(&mut arena, 12);
        heap.insert(node);
        unsafe { (*node.as_ptr()).f = 1 };
        heap.decrease_key(node);
        assert_heap_invariants(&heap);
        let min = heap.extract_min().expect("heap is non-empty");
        assert_eq!(min, node);
    }

    #[test]
    fn dump_clears_back_indices() {
        let mut arena = NodeArena::new();
        let mut heap = NodeHeap::new();
        let nodes: Vec<_> = (0..10).map(|f| scored(&mut arena, f)).collect();
        for &node in &nodes {
            heap.insert(node);
        }
        assert_eq!(heap.dump(), 10);
        assert!(heap.is_empty());
        for node in nodes {
            assert_eq!(unsafe { (*node.as_ptr()).heap_id }, 0);
        }
    }

    #[test]
    fn randomized_ops_keep_the_invariants() {
        let mut rng = StdRng::seed_from_u64(0x51F7_0E55);
        let mut arena = NodeArena::new();
        let mut heap = NodeHeap::new();
        let mut queued: Vec<NonNull<Node>> = Vec::new();
        for _ in 0..2000 {
            match rng.gen_range(0..3) {
                0 => {
                    let node = scored(&mut arena, rng.gen_range(0..1000));
                    heap.insert(node);
                    queued.push(node);
                }
                1 => {
                    if let Some(node) = heap.extract_min() {
                        queued.retain(|&n| n != node);
                    }
                }
                _ => {
                    if !queued.is_empty() {
                        let node = queued[rng.gen_range(0..queued.len())];
                        let f = unsafe { (*node.as_ptr()).f };
                        unsafe { (*node.as_ptr()).f = rng.gen_range(0..=f) };
                        heap.decrease_key(node);
                    }
                }
            }
            assert_heap_invariants(&heap);
        }
    }
}
