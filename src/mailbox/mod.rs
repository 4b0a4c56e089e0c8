//! # Mailboxes
//!
//! A mailbox is the per-actor message store feeding the drain loop. Every
//! variant shares one contract:
//!
//! - [`Mailbox::offer`] and [`Mailbox::close`] may run concurrently from any
//!   number of threads.
//! - [`Mailbox::poll`], [`Mailbox::retry_latest`] and [`Mailbox::clear`] belong
//!   to the single logical consumer (the drain loop) at any instant.
//!
//! | Variant | Ordering | Overflow | Concurrency control |
//! |---------|----------|----------|---------------------|
//! | [`UnboundedMailbox`] | FIFO | grows without bound | lock-free ([`MpscQueue`](crate::queue::MpscQueue)) |
//! | [`BoundedMailbox`] | FIFO | drop oldest / reject newest | short mutex around offer/poll |
//! | [`PriorityMailbox`] | comparator, FIFO among equals | unbounded | short mutex around offer/poll |
//! | [`UnsyncMailbox`] | FIFO | none | none, confined to one thread |
//!
//! ## Redelivery
//!
//! After `poll()` returns `X`, calling `retry_latest()` makes the *next*
//! `poll()` return `X` again exactly once; iteration then resumes where it
//! left off. Supervisors use this to redeliver a message that failed.
//!
//! ## Closing
//!
//! [`Mailbox::close`] seals a mailbox with one terminal value (the actor's
//! poison pill). It is delivered after everything already pending, never
//! counts against a capacity bound and is never evicted. Every later `offer`
//! is refused.

mod bounded;
mod priority;
mod unbounded;
mod unsync;

pub use bounded::BoundedMailbox;
pub use priority::PriorityMailbox;
pub use unbounded::UnboundedMailbox;
pub use unsync::UnsyncMailbox;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Per-actor message store.
pub trait Mailbox<T>: Send + Sync {
    /// Enqueues `value`. Returns `false` when the mailbox refused it.
    fn offer(&self, value: T) -> bool;

    /// Dequeues the next value (or the value armed by `retry_latest`).
    fn poll(&self) -> Option<T>;

    /// Arms redelivery of the value most recently returned by `poll`.
    fn retry_latest(&self);

    /// Discards all pending values and any armed redelivery.
    fn clear(&self);

    /// Returns `true` when `poll` would currently return `None`.
    fn is_empty(&self) -> bool;

    /// Seals the mailbox with `last`, delivered after all pending values.
    /// Returns `false` if the mailbox was already closed.
    fn close(&self, last: T) -> bool;

    fn is_closed(&self) -> bool;
}

/// What a bounded mailbox does with an offer when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowStrategy {
    /// Evict the oldest pending message and accept the new one.
    DropOldest,
    /// Refuse the new message; `offer` returns `false`.
    RejectNewest,
}

/// Mailbox selection that can be expressed in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MailboxKind {
    #[default]
    Unbounded,
    Bounded {
        capacity: usize,
        overflow: OverflowStrategy,
    },
    Unsynchronized,
}

/// Orders message contents for a [`PriorityMailbox`]: `Less` is delivered first.
pub type Comparator<M> = Arc<dyn Fn(&M, &M) -> Ordering + Send + Sync>;

/// Full mailbox selection for one actor.
pub enum MailboxConfig<M> {
    Kind(MailboxKind),
    Priority(Comparator<M>),
}

impl<M> MailboxConfig<M> {
    pub fn unbounded() -> Self {
        Self::Kind(MailboxKind::Unbounded)
    }

    pub fn bounded(capacity: usize, overflow: OverflowStrategy) -> Self {
        Self::Kind(MailboxKind::Bounded { capacity, overflow })
    }

    pub fn unsynchronized() -> Self {
        Self::Kind(MailboxKind::Unsynchronized)
    }

    pub fn priority<F>(comparator: F) -> Self
    where
        F: Fn(&M, &M) -> Ordering + Send + Sync + 'static,
    {
        Self::Priority(Arc::new(comparator))
    }
}

impl<M> Default for MailboxConfig<M> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<M> Clone for MailboxConfig<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Kind(kind) => Self::Kind(*kind),
            Self::Priority(cmp) => Self::Priority(Arc::clone(cmp)),
        }
    }
}

impl<M> From<MailboxKind> for MailboxConfig<M> {
    fn from(kind: MailboxKind) -> Self {
        Self::Kind(kind)
    }
}

impl<M> fmt::Debug for MailboxConfig<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Priority(_) => f.write_str("Priority(..)"),
        }
    }
}

/// The "last polled" slot shared by every mailbox variant.
#[derive(Debug)]
pub(crate) struct Redelivery<T> {
    latest: Option<T>,
    armed: bool,
}

impl<T: Clone> Redelivery<T> {
    pub(crate) fn new() -> Self {
        Self {
            latest: None,
            armed: false,
        }
    }

    /// Returns the armed value, disarming it.
    pub(crate) fn take_armed(&mut self) -> Option<T> {
        if !self.armed {
            return None;
        }
        self.armed = false;
        self.latest.clone()
    }

    /// Remembers `value` as the latest poll result, returning the value it replaced.
    pub(crate) fn record(&mut self, value: &T) -> Option<T> {
        self.latest.replace(value.clone())
    }

    pub(crate) fn arm(&mut self) {
        self.armed = self.latest.is_some();
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    pub(crate) fn reset(&mut self) -> Option<T> {
        self.armed = false;
        self.latest.take()
    }
}
