use super::actor_ref::{ActorRef, AnyActorRef};
use super::props::Props;
use crate::error::{SchedulerError, SpawnError};
use crate::scheduler::TaskHandle;
use crate::system::ActorSystem;
use std::time::Duration;

/// What a behavior can see and do while handling one message.
pub struct Context<'a, M: Send + Sync + 'static> {
    myself: &'a ActorRef<M>,
    sender: Option<&'a AnyActorRef>,
}

impl<'a, M: Send + Sync + 'static> Context<'a, M> {
    pub(crate) fn new(myself: &'a ActorRef<M>, sender: Option<&'a AnyActorRef>) -> Self {
        Self { myself, sender }
    }

    /// Reference to the actor handling the message.
    pub fn myself(&self) -> &ActorRef<M> {
        self.myself
    }

    /// The sender given to [`ActorRef::tell_from`], if any.
    pub fn sender(&self) -> Option<&AnyActorRef> {
        self.sender
    }

    pub fn name(&self) -> &str {
        self.myself.name()
    }

    /// The actor system this actor belongs to, unless it has been dropped.
    pub fn system(&self) -> Option<ActorSystem> {
        self.myself.cell().system().map(ActorSystem::from_shared)
    }

    /// Spawns a child of this actor. Children are stopped and disposed
    /// together with their parent.
    pub fn spawn<C: Send + Sync + 'static>(
        &self,
        props: Props<C>,
        name: Option<&str>,
    ) -> Result<ActorRef<C>, SpawnError> {
        let system = self.system().ok_or(SpawnError::SystemTerminated)?;
        system.spawn_under(Some(self.myself.id()), props, name)
    }

    /// Gracefully stops this actor once the messages already queued are handled.
    pub fn stop_self(&self) {
        self.myself.stop();
    }

    /// Delivers `message` to this actor after `delay`, on its own worker.
    pub fn schedule_once(&self, delay: Duration, message: M) -> TaskHandle {
        let myself = self.myself.clone();
        self.myself
            .cell()
            .worker()
            .schedule_after(delay, Box::new(move || myself.tell(message)))
    }

    /// Delivers a clone of `message` to this actor after `initial`, then
    /// every `period`, until the returned handle is disposed or the actor
    /// terminates.
    pub fn schedule_periodic(
        &self,
        initial: Duration,
        period: Duration,
        message: M,
    ) -> Result<TaskHandle, SchedulerError>
    where
        M: Clone,
    {
        let myself = self.myself.clone();
        self.myself.cell().worker().schedule_periodically(
            initial,
            period,
            Box::new(move || myself.tell(message.clone())),
        )
    }
}
