//! # Lock-Free MPSC Queue
//!
//! The default mailbox is built on [`MpscQueue`], a non-blocking linked queue
//! that any number of threads may push into while exactly one logical consumer
//! pops from it.
//!
//! ## How it works
//!
//! The queue is a singly linked list with a permanent "stub" node at the
//! consumer end. A producer allocates a node, atomically swaps it into the
//! producer-side `tail` pointer and only then links the previous tail to it.
//! Between the swap and the link the node is *claimed but unpublished*: the
//! consumer can see that `tail` moved but cannot yet reach the new node.
//!
//! When the consumer hits that window it spins until the link becomes visible.
//! That wait is bounded by a single pointer store in a producer that is already
//! past its only atomic read-modify-write, so nothing ever blocks on a lock.
//!
//! ```text
//!   head (consumer)                               tail (producers)
//!      |                                             |
//!   [stub] --next--> [a] --next--> [b] --next--> [c]
//! ```

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

/// Spins with `spin_loop` hints before falling back to yielding the thread.
const SPIN_LIMIT: u32 = 64;

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: Option<T>,
}

impl<T> Node<T> {
    fn alloc(value: Option<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            value,
        }))
    }
}

/// Non-blocking multi-producer / single-consumer queue.
///
/// * `offer` may be called from any number of threads and never blocks.
/// * `poll` and `clear` belong to a single consumer. Calling them from two
///   threads at the same time is a contract violation and panics rather than
///   corrupting the list.
pub struct MpscQueue<T> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    consuming: AtomicBool,
}

// SAFETY: values move between threads through the queue, so `T: Send` is
// required. Nodes are only freed by the single consumer (enforced by the
// `consuming` flag) after their successor has been published.
unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
    pub fn new() -> Self {
        let stub = Node::alloc(None);
        Self {
            head: AtomicPtr::new(stub),
            tail: AtomicPtr::new(stub),
            consuming: AtomicBool::new(false),
        }
    }

    /// Appends `value`. Safe to call from any thread, never blocks.
    pub fn offer(&self, value: T) {
        let node = Node::alloc(Some(value));
        let prev = self.tail.swap(node, Ordering::AcqRel);
        // SAFETY: `prev` was the tail, so the consumer cannot have freed it:
        // it only frees a node after observing that node's `next` link, which
        // is exactly the store below.
        unsafe { (*prev).next.store(node, Ordering::Release) };
    }

    /// Removes the next value, or returns `None` when the queue is empty.
    ///
    /// # Panics
    ///
    /// Panics if another thread is polling or clearing the same queue.
    pub fn poll(&self) -> Option<T> {
        let _consumer = ConsumerGuard::acquire(&self.consuming);
        self.poll_exclusive()
    }

    /// Drops every queued value.
    ///
    /// # Panics
    ///
    /// Panics if another thread is polling or clearing the same queue.
    pub fn clear(&self) {
        let _consumer = ConsumerGuard::acquire(&self.consuming);
        while self.poll_exclusive().is_some() {}
    }

    /// Returns `true` when no value has been claimed past the consumer position.
    ///
    /// A producer that has claimed a slot but not yet published it counts as
    /// non-empty.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    fn poll_exclusive(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        // SAFETY: `head` is the consumer-owned stub; only this (exclusive)
        // consumer frees nodes, so it is alive.
        let mut next = unsafe { (*head).next.load(Ordering::Acquire) };
        if next.is_null() {
            if self.tail.load(Ordering::Acquire) == head {
                return None;
            }
            next = Self::await_link(head);
        }
        self.head.store(next, Ordering::Release);
        // SAFETY: the old stub is unreachable for producers (its successor is
        // published) and for the consumer (head moved past it). `next` becomes
        // the new stub, its value is taken exactly once here.
        unsafe {
            drop(Box::from_raw(head));
            (*next).value.take()
        }
    }

    /// Waits for a producer that swapped `tail` past `head` to publish its link.
    fn await_link(head: *mut Node<T>) -> *mut Node<T> {
        let mut spins = 0u32;
        loop {
            // SAFETY: see `poll_exclusive`; `head` is still the live stub.
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            if !next.is_null() {
                return next;
            }
            if spins < SPIN_LIMIT {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }
}

impl<T> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        let mut current = *self.head.get_mut();
        while !current.is_null() {
            // SAFETY: `&mut self` means no producer or consumer is active;
            // every node from the stub onward is owned by the queue.
            let node = unsafe { Box::from_raw(current) };
            current = node.next.load(Ordering::Relaxed);
        }
    }
}

impl<T> std::fmt::Debug for MpscQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpscQueue")
            .field("empty", &self.is_empty())
            .finish()
    }
}

struct ConsumerGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ConsumerGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Self {
        if flag.swap(true, Ordering::Acquire) {
            panic!("MpscQueue consumed by more than one thread at a time");
        }
        Self { flag }
    }
}

impl Drop for ConsumerGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
