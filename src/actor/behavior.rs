use super::context::Context;
use crate::error::BoxError;

/// Trait that every actor behavior implements.
///
/// The runtime calls [`Actor::on_message`] for one message at a time, so the
/// behavior owns its state outright: no locks, no atomics. Several threads may
/// run the same actor over its lifetime, but never two at once.
///
/// # Associated Types
/// `Message` is the one type this actor accepts. References to the actor are
/// typed by it ([`ActorRef<Self::Message>`](super::ActorRef)), so sending the wrong message is
/// a compile error rather than a runtime failure.
///
/// # Provided Methods (Hooks)
/// - [`Actor::pre_start`] runs once on the spawning thread before any message
///   is delivered, and again on every restart.
/// - [`Actor::on_stop`] runs once when the instance is retired: on graceful
///   stop, on dispose, and for the old instance on restart.
///
/// The defaults do nothing.
///
/// # Errors and Panics
/// An `Err` returned from `on_message`, or a panic raised inside it, is
/// handed to the actor's [`Supervisor`](crate::supervisor::Supervisor). The
/// failing message is not counted as processed.
pub trait Actor: Send + 'static {
    type Message: Send + Sync + 'static;

    fn on_message(
        &mut self,
        ctx: &mut Context<'_, Self::Message>,
        message: &Self::Message,
    ) -> Result<(), BoxError>;

    /// Failing here aborts the spawn (or the restart) of this instance.
    /// Children spawned here through `ctx` are attached to this actor.
    fn pre_start(&mut self, _ctx: &mut Context<'_, Self::Message>) -> Result<(), BoxError> {
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &mut Context<'_, Self::Message>) {}
}

/// A boxed behavior, as stored by the runtime.
pub type BoxActor<M> = Box<dyn Actor<Message = M>>;
