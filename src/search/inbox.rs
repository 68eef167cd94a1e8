//! Lock-free single-consumer inboxes and the message pool behind them.
//!
//! Each worker consumes exactly one `Inbox`, a Treiber stack of intrusively
//! linked messages. Producers push with a CAS retry loop; the consumer
//! drains the whole chain with one atomic exchange and walks it in
//! arrival-reversed order. The successful push doubles as the publication
//! barrier for everything the producer wrote before it, including node
//! pointers freshly stored in the node table.
//!
//! Messages are bump-allocated by the *sender* from its own pool and, after
//! a drain is processed, spliced onto the *consumer's* free list in O(1).
//! Messages therefore migrate between pools; chunks are only released when
//! every worker has stopped, so a pool never frees memory another pool's
//! free list still references while threads run.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use super::node::Node;

const CHUNK_BYTES: usize = 64 * 1024;
const MSGS_PER_CHUNK: usize = CHUNK_BYTES / std::mem::size_of::<Message>();

/// A successor proposal routed to the worker owning `(x, y)`.
#[repr(C)]
pub struct Message {
    /// Intrusive link: stack successor while queued, free-list successor
    /// after recycling.
    pub next: *mut Message,
    pub parent: *mut Node,
    pub x: i32,
    pub y: i32,
    pub g: i32,
}

/// The single-consumer stack head.
pub struct Inbox {
    head: AtomicPtr<Message>,
}

impl Inbox {
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Multi-producer push.
    pub fn push(&self, msg: NonNull<Message>) {
        let msg = msg.as_ptr();
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            unsafe { (*msg).next = head };
            match self
                .head
                .compare_exchange_weak(head, msg, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    /// Used only by the consumer's idle spin; staleness is fine because a
    /// concurrent push will be seen on a later iteration.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }

    /// Take the whole pending chain, leaving the inbox empty.
    #[inline(always)]
    pub fn drain(&self) -> *mut Message {
        self.head.swap(ptr::null_mut(), Ordering::Acquire)
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender-side chunk allocator with a consumer-side free list.
pub struct MessagePool {
    chunks: Vec<Vec<Message>>,
    bin: *mut Message,
}

impl MessagePool {
    pub fn new() -> Self {
        Self {
            chunks: vec![Vec::with_capacity(MSGS_PER_CHUNK)],
            bin: ptr::null_mut(),
        }
    }

    pub fn alloc(&mut self, parent: *mut Node, x: i32, y: i32, g: i32) -> NonNull<Message> {
        if !self.bin.is_null() {
            let msg = self.bin;
            unsafe {
                self.bin = (*msg).next;
                (*msg).next = ptr::null_mut();
                (*msg).parent = parent;
                (*msg).x = x;
                (*msg).y = y;
                (*msg).g = g;
                return NonNull::new_unchecked(msg);
            }
        }
        if self
            .chunks
            .last()
            .map_or(true, |chunk| chunk.len() == MSGS_PER_CHUNK)
        {
            self.chunks.push(Vec::with_capacity(MSGS_PER_CHUNK));
        }
        let chunk = self.chunks.last_mut().expect("pool holds a chunk");
        let idx = chunk.len();
        chunk.push(Message {
            next: ptr::null_mut(),
            parent,
            x,
            y,
            g,
        });
        // Chunk capacity is fixed, so the push cannot move earlier messages.
        NonNull::from(&mut chunk[idx])
    }

    /// Splice a fully processed drain chain (`head..=tail`, linked through
    /// `next`) onto the free list.
    pub fn recycle_chain(&mut self, head: *mut Message, tail: *mut Message) {
        unsafe { (*tail).next = self.bin };
        self.bin = head;
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: a pool is owned by exactly one worker at a time; the messages it
// hands out are shared with other threads only through `Inbox`, whose
// push/drain orderings transfer the writes.
unsafe impl Send for MessagePool {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;
    use std::sync::atomic::AtomicUsize;

    fn collect(mut msg: *mut Message) -> Vec<(i32, i32, i32)> {
        let mut out = Vec::new();
        while !msg.is_null() {
            unsafe {
                out.push(((*msg).x, (*msg).y, (*msg).g));
                msg = (*msg).next;
            }
        }
        out
    }

    #[test]
    fn drains_in_arrival_reversed_order() {
        let mut pool = MessagePool::new();
        let inbox = Inbox::new();
        for i in 0..4 {
            inbox.push(pool.alloc(ptr::null_mut(), i, i * 2, i + 1));
        }
        assert!(!inbox.is_empty());
        let chain = inbox.drain();
        assert!(inbox.is_empty());
        assert_eq!(
            collect(chain),
            vec![(3, 6, 4), (2, 4, 3), (1, 2, 2), (0, 0, 1)]
        );
    }

    #[test]
    fn recycled_messages_are_reused_before_fresh_ones() {
        let mut pool = MessagePool::new();
        let first = pool.alloc(ptr::null_mut(), 1, 1, 1);
        pool.recycle_chain(first.as_ptr(), first.as_ptr());
        let second = pool.alloc(ptr::null_mut(), 2, 2, 2);
        assert_eq!(first, second);
        assert_eq!(unsafe { (*second.as_ptr()).x }, 2);
    }

    #[test]
    fn concurrent_pushes_are_all_delivered() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: i32 = 1000;

        let inbox = Inbox::new();
        let delivered = AtomicUsize::new(0);
        let mut pools: Vec<MessagePool> = (0..PRODUCERS).map(|_| MessagePool::new()).collect();
        std::thread::scope(|s| {
            for (p, pool) in pools.iter_mut().enumerate() {
                let inbox = &inbox;
                s.spawn(move || {
                    for i in 0..PER_PRODUCER {
                        inbox.push(pool.alloc(ptr::null_mut(), p as i32, i, 0));
                    }
                });
            }
            let consumer = &inbox;
            let delivered = &delivered;
            s.spawn(move || {
                let mut seen = 0usize;
                while seen < PRODUCERS * PER_PRODUCER as usize {
                    let mut msg = consumer.drain();
                    while !msg.is_null() {
                        seen += 1;
                        msg = unsafe { (*msg).next };
                    }
                    std::hint::spin_loop();
                }
                delivered.store(seen, Ordering::Relaxed);
            });
        });
        assert_eq!(
            delivered.load(Ordering::Relaxed),
            PRODUCERS * PER_PRODUCER as usize
        );
    }
}
