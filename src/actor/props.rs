use super::behavior::{Actor, BoxActor};
use crate::error::BoxError;
use crate::mailbox::MailboxConfig;
use crate::scheduler::{Scheduler, SchedulerKind};
use crate::supervisor::Supervisor;
use std::fmt;
use std::sync::Arc;

/// Produces fresh behavior instances, at spawn and on every restart.
pub type ActorFactory<M> = Arc<dyn Fn() -> Result<BoxActor<M>, BoxError> + Send + Sync>;

/// Where an actor's drain tasks run.
#[derive(Clone)]
pub enum SchedulerChoice {
    /// One of the actor system's named pools.
    Kind(SchedulerKind),
    /// A caller-owned scheduler, e.g. a [`TestScheduler`](crate::scheduler::TestScheduler).
    Instance(Arc<dyn Scheduler>),
}

impl fmt::Debug for SchedulerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerChoice::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            SchedulerChoice::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// Recipe for spawning an actor: how to build its behavior plus the mailbox,
/// scheduler and supervisor it runs with.
///
/// Unset options fall back to the actor system's
/// [`RuntimeConfig`](crate::config::RuntimeConfig) defaults and to
/// [`DisposeSupervisor`](crate::supervisor::DisposeSupervisor).
///
/// ```rust
/// use actor_runtime::actor::{Actor, Context, Props};
/// use actor_runtime::error::BoxError;
/// use actor_runtime::mailbox::{MailboxConfig, OverflowStrategy};
/// use actor_runtime::scheduler::SchedulerKind;
///
/// struct Echo;
///
/// impl Actor for Echo {
///     type Message = String;
///
///     fn on_message(&mut self, _ctx: &mut Context<'_, String>, msg: &String) -> Result<(), BoxError> {
///         println!("{msg}");
///         Ok(())
///     }
/// }
///
/// let props = Props::new(|| Echo)
///     .with_mailbox(MailboxConfig::bounded(16, OverflowStrategy::DropOldest))
///     .on(SchedulerKind::Io);
/// ```
pub struct Props<M> {
    pub(crate) factory: ActorFactory<M>,
    pub(crate) mailbox: Option<MailboxConfig<M>>,
    pub(crate) scheduler: Option<SchedulerChoice>,
    pub(crate) supervisor: Option<Arc<dyn Supervisor<M>>>,
}

impl<M: Send + Sync + 'static> Props<M> {
    pub fn new<A, F>(factory: F) -> Self
    where
        A: Actor<Message = M>,
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::from_factory(Arc::new(move || Ok(Box::new(factory()) as BoxActor<M>)))
    }

    /// Like [`Props::new`] for factories that can fail. A failing factory
    /// aborts the spawn with [`SpawnError::Factory`](crate::error::SpawnError::Factory).
    pub fn try_new<A, F>(factory: F) -> Self
    where
        A: Actor<Message = M>,
        F: Fn() -> Result<A, BoxError> + Send + Sync + 'static,
    {
        Self::from_factory(Arc::new(move || {
            factory().map(|actor| Box::new(actor) as BoxActor<M>)
        }))
    }

    pub fn from_factory(factory: ActorFactory<M>) -> Self {
        Self {
            factory,
            mailbox: None,
            scheduler: None,
            supervisor: None,
        }
    }

    pub fn with_mailbox(mut self, mailbox: impl Into<MailboxConfig<M>>) -> Self {
        self.mailbox = Some(mailbox.into());
        self
    }

    /// Runs the actor on one of the system's named pools.
    pub fn on(mut self, kind: SchedulerKind) -> Self {
        self.scheduler = Some(SchedulerChoice::Kind(kind));
        self
    }

    /// Runs the actor on a caller-owned scheduler.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(SchedulerChoice::Instance(scheduler));
        self
    }

    pub fn with_supervisor(mut self, supervisor: impl Supervisor<M> + 'static) -> Self {
        self.supervisor = Some(Arc::new(supervisor));
        self
    }

    pub fn with_shared_supervisor(mut self, supervisor: Arc<dyn Supervisor<M>>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }
}

impl<M> Clone for Props<M> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            mailbox: self.mailbox.clone(),
            scheduler: self.scheduler.clone(),
            supervisor: self.supervisor.clone(),
        }
    }
}

impl<M> fmt::Debug for Props<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("mailbox", &self.mailbox)
            .field("scheduler", &self.scheduler)
            .field("custom_supervisor", &self.supervisor.is_some())
            .finish()
    }
}
