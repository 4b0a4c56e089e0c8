//! # Actor System
//!
//! [`ActorSystem`] ties the pieces together: it owns the scheduler pools, the
//! hierarchy, the root guardian and the dead-letter sink, and it is the entry
//! point for spawning top-level actors and shutting everything down.
//!
//! ## Shutdown
//!
//! 1. [`ActorSystem::stop`] sends a poison pill through the whole tree, so
//!    every actor finishes what is already queued.
//! 2. [`ActorSystem::await_termination`] blocks until the hierarchy's active
//!    set is empty.
//! 3. [`ActorSystem::dispose`] forcefully terminates whatever is left.
//!
//! [`ActorSystem::shutdown`] runs all three with the configured timeout and
//! then releases the scheduler pools.

use crate::actor::{
    build_mailbox, Actor, ActorCell, ActorRef, AnyActorRef, CellSpec, Context, Envelope, Letter,
    Props, SchedulerChoice,
};
use crate::config::RuntimeConfig;
use crate::error::{BoxError, LookupError, SpawnError};
use crate::hierarchy::{ActorId, Hierarchy};
use crate::mailbox::MailboxConfig;
use crate::scheduler::{Scheduler, SchedulerKind, SchedulerRegistry};
use crate::supervisor::{DisposeSupervisor, Supervisor};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const ROOT_NAME: &str = "root";

/// A message that could not be delivered.
///
/// Produced when a message is sent to a disposed or stopping actor, or
/// refused by a full bounded mailbox.
#[derive(Clone)]
pub struct DeadLetter {
    recipient: String,
    sender: Option<AnyActorRef>,
    message: Arc<dyn Any + Send + Sync>,
}

impl DeadLetter {
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn sender(&self) -> Option<&AnyActorRef> {
        self.sender.as_ref()
    }

    /// The undelivered message, if it was of type `M`.
    pub fn message<M: Send + Sync + 'static>(&self) -> Option<&M> {
        self.message
            .downcast_ref::<Envelope<M>>()
            .and_then(Envelope::content)
    }
}

impl fmt::Debug for DeadLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadLetter")
            .field("recipient", &self.recipient)
            .field("sender", &self.sender.as_ref().map(AnyActorRef::name))
            .finish_non_exhaustive()
    }
}

/// Parent of every top-level actor.
struct Guardian;

impl Actor for Guardian {
    type Message = ();

    fn on_message(&mut self, _ctx: &mut Context<'_, ()>, _message: &()) -> Result<(), BoxError> {
        Ok(())
    }
}

pub(crate) struct SystemShared {
    name: String,
    config: RuntimeConfig,
    hierarchy: Hierarchy,
    schedulers: SchedulerRegistry,
    dead_letters: RwLock<Option<ActorRef<DeadLetter>>>,
    dead_letter_count: AtomicU64,
    next_id: AtomicU64,
    root: RwLock<Option<ActorRef<()>>>,
}

impl SystemShared {
    pub(crate) fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub(crate) fn publish_dead_letter<M: Send + Sync + 'static>(
        &self,
        recipient: &str,
        letter: Letter<M>,
    ) {
        self.dead_letter_count.fetch_add(1, Ordering::Relaxed);
        let sink = self.dead_letters.read().clone();
        match sink {
            Some(sink) if sink.name() != recipient && !sink.is_disposed() => {
                let dead_letter = DeadLetter {
                    recipient: recipient.to_string(),
                    sender: letter.sender().cloned(),
                    message: letter,
                };
                sink.tell(dead_letter);
            }
            _ => debug!(actor = %recipient, "Dead letter"),
        }
    }

    fn root_id(&self) -> Option<ActorId> {
        self.root.read().as_ref().map(ActorRef::id)
    }
}

/// Handle to one actor system. Clones share the same system.
///
/// Actors only run while some handle to their system is alive; dropping the
/// last handle releases the scheduler pools.
///
/// ```rust
/// use actor_runtime::actor::{Actor, Context, Props};
/// use actor_runtime::error::BoxError;
/// use actor_runtime::system::ActorSystem;
/// use std::time::Duration;
///
/// struct Greeter;
///
/// impl Actor for Greeter {
///     type Message = String;
///
///     fn on_message(&mut self, ctx: &mut Context<'_, String>, who: &String) -> Result<(), BoxError> {
///         println!("{} greets {who}", ctx.name());
///         Ok(())
///     }
/// }
///
/// let system = ActorSystem::new("demo");
/// let greeter = system.spawn(Props::new(|| Greeter), Some("greeter")).unwrap();
/// greeter.tell("world".to_string());
/// assert!(system.shutdown(Some(Duration::from_secs(5))));
/// ```
#[derive(Clone)]
pub struct ActorSystem {
    shared: Arc<SystemShared>,
}

impl ActorSystem {
    pub fn new(name: &str) -> Self {
        Self::with_config(name, RuntimeConfig::default())
    }

    pub fn with_config(name: &str, config: RuntimeConfig) -> Self {
        let shared = Arc::new(SystemShared {
            name: name.to_string(),
            schedulers: SchedulerRegistry::new(&config),
            config,
            hierarchy: Hierarchy::new(),
            dead_letters: RwLock::new(None),
            dead_letter_count: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
            root: RwLock::new(None),
        });
        let system = Self { shared };
        let guardian = Props::new(|| Guardian)
            .on(SchedulerKind::Immediate)
            .with_mailbox(MailboxConfig::unbounded())
            .with_supervisor(DisposeSupervisor);
        match system.spawn_under(None, guardian, Some(ROOT_NAME)) {
            Ok(root) => *system.shared.root.write() = Some(root),
            Err(e) => warn!(system = %name, error = %e, "Failed to start root guardian"),
        }
        info!(system = %name, "Actor system started");
        system
    }

    pub(crate) fn from_shared(shared: Arc<SystemShared>) -> Self {
        Self { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.shared.hierarchy
    }

    pub fn schedulers(&self) -> &SchedulerRegistry {
        &self.shared.schedulers
    }

    /// Spawns a top-level actor under the root guardian.
    ///
    /// Without a name the actor is called `actor-<id>`.
    pub fn spawn<M: Send + Sync + 'static>(
        &self,
        props: Props<M>,
        name: Option<&str>,
    ) -> Result<ActorRef<M>, SpawnError> {
        let root = self.shared.root_id().ok_or(SpawnError::SystemTerminated)?;
        self.spawn_under(Some(root), props, name)
    }

    pub(crate) fn spawn_under<M: Send + Sync + 'static>(
        &self,
        parent: Option<ActorId>,
        props: Props<M>,
        name: Option<&str>,
    ) -> Result<ActorRef<M>, SpawnError> {
        let shared = &self.shared;
        if shared.schedulers.is_shutdown() {
            return Err(SpawnError::SystemTerminated);
        }
        let scheduler: Arc<dyn Scheduler> = match props.scheduler {
            Some(SchedulerChoice::Instance(scheduler)) => scheduler,
            Some(SchedulerChoice::Kind(kind)) => shared.schedulers.resolve(kind)?,
            None => shared.schedulers.resolve(shared.config.default_scheduler)?,
        };
        let worker = scheduler.create_worker()?;
        let mailbox = props
            .mailbox
            .unwrap_or_else(|| MailboxConfig::from(shared.config.default_mailbox));
        let supervisor: Arc<dyn Supervisor<M>> =
            props.supervisor.unwrap_or_else(|| Arc::new(DisposeSupervisor));

        let id = ActorId(shared.next_id.fetch_add(1, Ordering::Relaxed));
        let name = name.map_or_else(|| format!("actor-{}", id.as_u64()), str::to_string);
        let cell = Arc::new(ActorCell::new(CellSpec {
            id,
            name,
            factory: props.factory,
            mailbox: build_mailbox(&mailbox),
            worker: Arc::clone(&worker),
            supervisor,
            system: Arc::downgrade(shared),
        }));

        if let Err(e) = shared.hierarchy.register(cell.clone(), parent) {
            worker.dispose();
            return Err(e);
        }
        cell.start()?;
        info!(
            actor = %cell.name(),
            parent = ?parent.and_then(|p| shared.hierarchy.get(p)).map(|p| p.name().to_string()),
            "Actor spawned"
        );
        Ok(ActorRef::from_cell(cell))
    }

    /// Finds a live actor by name and checks its message type.
    pub fn lookup<M: Send + Sync + 'static>(&self, name: &str) -> Result<ActorRef<M>, LookupError> {
        self.shared
            .hierarchy
            .lookup(name)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))?
            .downcast::<M>()
    }

    /// Routes undeliverable messages to `sink` from now on.
    pub fn set_dead_letters(&self, sink: ActorRef<DeadLetter>) {
        *self.shared.dead_letters.write() = Some(sink);
    }

    pub fn dead_letter_count(&self) -> u64 {
        self.shared.dead_letter_count.load(Ordering::Relaxed)
    }

    /// Gracefully stops every actor, children after their parents.
    pub fn stop(&self) {
        if let Some(root) = self.shared.root_id() {
            self.shared.hierarchy.stop(root);
        }
    }

    /// Forcefully terminates every actor.
    pub fn dispose(&self) {
        if let Some(root) = self.shared.root_id() {
            self.shared.hierarchy.dispose(root);
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.hierarchy.all_terminated()
    }

    /// Blocks until every actor has terminated; `false` if `timeout` elapsed first.
    pub fn await_termination(&self, timeout: Option<Duration>) -> bool {
        self.shared.hierarchy.await_termination(timeout)
    }

    /// Stops all actors, waits up to `timeout` (the configured shutdown
    /// timeout when `None`), disposes stragglers and releases the scheduler
    /// pools. Returns `true` if every actor stopped gracefully.
    ///
    /// Must not be called from an actor running on one of this system's pools.
    pub fn shutdown(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or_else(|| self.shared.config.shutdown_timeout());
        info!(system = %self.name(), "Shutting down actor system");
        self.stop();
        let graceful = self.await_termination(Some(timeout));
        if !graceful {
            warn!(
                system = %self.name(),
                remaining = self.shared.hierarchy.active_count(),
                "Shutdown timed out, disposing remaining actors"
            );
            self.dispose();
        }
        self.shared.schedulers.shutdown();
        *self.shared.root.write() = None;
        *self.shared.dead_letters.write() = None;
        info!(system = %self.name(), graceful, "Actor system shut down");
        graceful
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("name", &self.shared.name)
            .field("hierarchy", &self.shared.hierarchy)
            .finish()
    }
}
