use super::actor_ref::AnyActorRef;
use crate::mailbox::{
    BoundedMailbox, Mailbox, MailboxConfig, MailboxKind, PriorityMailbox, UnboundedMailbox,
    UnsyncMailbox,
};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub(crate) enum Payload<M> {
    Message(M),
    PoisonPill,
}

/// Immutable envelope around one message, created at `tell` time.
///
/// The mailbox owns the envelope until it is polled; after processing (or when
/// the mailbox is cleared) it is dropped. Envelopes are shared through `Arc` so
/// a failed message can be redelivered without cloning its content.
pub struct Envelope<M> {
    payload: Payload<M>,
    sender: Option<AnyActorRef>,
}

impl<M> Envelope<M> {
    pub(crate) fn message(content: M, sender: Option<AnyActorRef>) -> Self {
        Self {
            payload: Payload::Message(content),
            sender,
        }
    }

    pub(crate) fn poison_pill() -> Self {
        Self {
            payload: Payload::PoisonPill,
            sender: None,
        }
    }

    pub(crate) fn payload(&self) -> &Payload<M> {
        &self.payload
    }

    /// The message content, `None` for a poison pill.
    pub fn content(&self) -> Option<&M> {
        match &self.payload {
            Payload::Message(content) => Some(content),
            Payload::PoisonPill => None,
        }
    }

    pub fn sender(&self) -> Option<&AnyActorRef> {
        self.sender.as_ref()
    }

    pub fn is_poison_pill(&self) -> bool {
        matches!(self.payload, Payload::PoisonPill)
    }
}

impl<M: fmt::Debug> fmt::Debug for Envelope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Envelope");
        match &self.payload {
            Payload::Message(content) => out.field("content", content),
            Payload::PoisonPill => out.field("content", &"<poison pill>"),
        };
        out.field("sender", &self.sender.as_ref().map(AnyActorRef::name))
            .finish()
    }
}

/// What actually sits in an actor's mailbox.
pub(crate) type Letter<M> = Arc<Envelope<M>>;

/// Builds the mailbox selected by `config`.
///
/// For priority mailboxes the comparator sees message contents. Poison pills
/// never enter the heap: they arrive through [`Mailbox::close`], which
/// delivers them after every pending message.
pub(crate) fn build_mailbox<M>(config: &MailboxConfig<M>) -> Box<dyn Mailbox<Letter<M>>>
where
    M: Send + Sync + 'static,
{
    match config {
        MailboxConfig::Kind(MailboxKind::Unbounded) => Box::new(UnboundedMailbox::new()),
        MailboxConfig::Kind(MailboxKind::Bounded { capacity, overflow }) => {
            Box::new(BoundedMailbox::new(*capacity, *overflow))
        }
        MailboxConfig::Kind(MailboxKind::Unsynchronized) => Box::new(UnsyncMailbox::new()),
        MailboxConfig::Priority(comparator) => {
            let comparator = Arc::clone(comparator);
            Box::new(PriorityMailbox::new(move |a: &Letter<M>, b: &Letter<M>| {
                match (a.content(), b.content()) {
                    (Some(x), Some(y)) => comparator(x, y),
                    _ => Ordering::Equal,
                }
            }))
        }
    }
}
