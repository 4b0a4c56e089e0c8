use super::cell::{ActorCell, ActorStats, AnyCell, LifecycleState};
use super::envelope::Envelope;
use crate::error::{LookupError, TellError};
use crate::hierarchy::ActorId;
use std::fmt;
use std::sync::Arc;

/// Typed, cloneable handle for sending messages to an actor.
///
/// All sends are fire-and-forget: [`ActorRef::tell`] never blocks and never
/// waits for processing. Messages sent to a disposed actor, or refused by a
/// full mailbox, are routed to the actor system's dead letters.
pub struct ActorRef<M: Send + Sync + 'static> {
    cell: Arc<ActorCell<M>>,
}

impl<M: Send + Sync + 'static> ActorRef<M> {
    pub(crate) fn from_cell(cell: Arc<ActorCell<M>>) -> Self {
        Self { cell }
    }

    pub(crate) fn cell(&self) -> &Arc<ActorCell<M>> {
        &self.cell
    }

    pub fn id(&self) -> ActorId {
        self.cell.id()
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Sends `message` without a sender.
    pub fn tell(&self, message: M) {
        let _ = self.try_tell(message);
    }

    /// Sends `message` on behalf of `sender`, which the receiver can read
    /// through [`Context::sender`](super::Context::sender).
    pub fn tell_from(&self, message: M, sender: &AnyActorRef) {
        let _ = self
            .cell
            .tell(Arc::new(Envelope::message(message, Some(sender.clone()))));
    }

    /// Like [`ActorRef::tell`], but reports why a message was not enqueued.
    /// The message still goes to dead letters in that case.
    pub fn try_tell(&self, message: M) -> Result<(), TellError> {
        self.cell.tell(Arc::new(Envelope::message(message, None)))
    }

    /// Gracefully stops this actor and its descendants: each finishes the
    /// messages queued before its poison pill, then terminates. Messages sent
    /// after the pill are refused with [`TellError::Stopping`] and go to dead
    /// letters, whatever the mailbox's capacity or ordering.
    pub fn stop(&self) {
        self.cell.stop_subtree();
    }

    /// Terminates this actor and its descendants without processing queued
    /// messages. A message already being handled runs to completion.
    pub fn dispose(&self) {
        self.cell.dispose_subtree(true);
    }

    pub fn is_disposed(&self) -> bool {
        self.cell.is_disposed()
    }

    pub fn state(&self) -> LifecycleState {
        self.cell.state()
    }

    pub fn stats(&self) -> ActorStats {
        self.cell.stats()
    }

    /// Erases the message type, e.g. to pass this actor as a sender.
    pub fn to_any(&self) -> AnyActorRef {
        self.cell.sender_ref()
    }
}

impl<M: Send + Sync + 'static> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<M: Send + Sync + 'static> PartialEq for ActorRef<M> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<M: Send + Sync + 'static> Eq for ActorRef<M> {}

impl<M: Send + Sync + 'static> fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

impl<M: Send + Sync + 'static> From<ActorRef<M>> for AnyActorRef {
    fn from(actor: ActorRef<M>) -> Self {
        actor.to_any()
    }
}

/// Reference to an actor whose message type is not known statically.
///
/// Used for senders, dead letters and name lookups. Recover a typed
/// reference with [`AnyActorRef::downcast`].
#[derive(Clone)]
pub struct AnyActorRef {
    cell: Arc<dyn AnyCell>,
}

impl AnyActorRef {
    pub(crate) fn from_cell(cell: Arc<dyn AnyCell>) -> Self {
        Self { cell }
    }

    pub fn id(&self) -> ActorId {
        self.cell.id()
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    pub fn is_disposed(&self) -> bool {
        self.cell.is_disposed()
    }

    pub fn stats(&self) -> ActorStats {
        self.cell.stats()
    }

    /// Posts a poison pill to this actor only.
    pub fn stop(&self) {
        Arc::clone(&self.cell).stop();
    }

    /// Disposes this actor only; see [`ActorRef::dispose`] for the cascading form.
    pub fn terminate(&self) {
        Arc::clone(&self.cell).terminate();
    }

    pub fn downcast<M: Send + Sync + 'static>(&self) -> Result<ActorRef<M>, LookupError> {
        Arc::clone(&self.cell)
            .into_any()
            .downcast::<ActorCell<M>>()
            .map(ActorRef::from_cell)
            .map_err(|_| LookupError::TypeMismatch {
                name: self.name().to_string(),
                expected: std::any::type_name::<M>(),
            })
    }
}

impl PartialEq for AnyActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for AnyActorRef {}

impl fmt::Debug for AnyActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyActorRef")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
