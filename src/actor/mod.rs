//! # Actors
//!
//! An actor is a behavior (your [`Actor`] implementation) plus a runtime cell
//! that owns its mailbox, its Worker and its lifecycle state. You never touch
//! the cell; you hold an [`ActorRef`] and send messages to it.
//!
//! ## Key Types
//!
//! - [`Actor`]: the trait behaviors implement.
//! - [`Props`]: the recipe for spawning an actor.
//! - [`ActorRef`] / [`AnyActorRef`]: typed and type-erased references.
//! - [`Context`]: what a behavior can do while handling a message.
//! - [`Envelope`]: a message together with its sender.
//!
//! ## Message Processing
//!
//! Each `tell` enqueues an envelope and schedules a drain task on the actor's
//! Worker. The drain loop then processes queued messages one at a time until
//! the mailbox is empty, the actor is paused, restarting or disposed, or a
//! poison pill arrives. At most one thread runs a given actor's behavior at any
//! instant, and messages from one sender are handled in the order sent (the
//! priority mailbox reorders by design).

mod actor_ref;
mod behavior;
mod cell;
mod context;
mod envelope;
mod props;

pub use actor_ref::{ActorRef, AnyActorRef};
pub use behavior::{Actor, BoxActor};
pub use cell::{ActorStats, LifecycleState};
pub use context::Context;
pub use envelope::Envelope;
pub use props::{ActorFactory, Props, SchedulerChoice};

pub(crate) use cell::{ActorCell, AnyCell, CellSpec};
pub(crate) use envelope::{build_mailbox, Letter};
