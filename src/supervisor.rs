//! # Supervision
//!
//! When a behavior returns an error or panics, the drain loop hands the
//! failure to the actor's [`Supervisor`] together with a [`Supervision`]
//! handle. The supervisor decides what happens next by calling actions on
//! that handle; actions compose (e.g. pause *and* retry):
//!
//! | Action | Effect |
//! |--------|--------|
//! | [`Supervision::retry`] | the failing message is delivered again next |
//! | [`Supervision::restart`] | a fresh behavior instance replaces the old one; name, mailbox and children are kept |
//! | [`Supervision::pause`] | draining stops for a while, then resumes |
//! | [`Supervision::dispose`] | the actor terminates; children are disposed or handed to the root |
//!
//! Calling no action drops the failing message and moves on.
//!
//! Supervisors run on the drain thread, so the actor handles nothing else
//! until the supervisor returns. A panic raised by the supervisor itself is
//! not caught.
//!
//! ## Strategies
//!
//! - [`DisposeSupervisor`] (the default): log and dispose, children included.
//! - [`RestartSupervisor`]: restart, optionally after a delay, optionally
//!   retrying the message, within a restart budget.
//! - [`RetrySupervisor`]: redeliver the failing message a bounded number of
//!   times, then dispose.
//! - [`PauseSupervisor`]: back off for a fixed time, then retry.
//! - [`DirectiveSupervisor`]: map each error to a [`Directive`] with a closure.

use crate::actor::{ActorCell, ActorRef, AnyActorRef, Letter};
use crate::error::ActorError;
use crate::hierarchy::ActorId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Decides how an actor reacts to a failed message.
pub trait Supervisor<M: Send + Sync + 'static>: Send + Sync {
    fn process_failure(&self, supervision: &mut Supervision<'_, M>, error: &ActorError);
}

impl<M, F> Supervisor<M> for F
where
    M: Send + Sync + 'static,
    F: Fn(&mut Supervision<'_, M>, &ActorError) + Send + Sync,
{
    fn process_failure(&self, supervision: &mut Supervision<'_, M>, error: &ActorError) {
        self(supervision, error)
    }
}

/// What happens to the children of an actor that a supervisor disposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildPolicy {
    #[default]
    Dispose,
    /// Keep the children running under the root guardian.
    Detach,
}

/// Handle through which a supervisor acts on the failing actor.
pub struct Supervision<'a, M: Send + Sync + 'static> {
    cell: &'a Arc<ActorCell<M>>,
    myself: &'a ActorRef<M>,
    letter: &'a Letter<M>,
}

impl<'a, M: Send + Sync + 'static> Supervision<'a, M> {
    pub(crate) fn new(
        cell: &'a Arc<ActorCell<M>>,
        myself: &'a ActorRef<M>,
        letter: &'a Letter<M>,
    ) -> Self {
        Self {
            cell,
            myself,
            letter,
        }
    }

    pub fn actor(&self) -> &ActorRef<M> {
        self.myself
    }

    pub fn id(&self) -> ActorId {
        self.myself.id()
    }

    pub fn name(&self) -> &str {
        self.myself.name()
    }

    /// The message whose handling failed.
    pub fn message(&self) -> Option<&M> {
        self.letter.content()
    }

    pub fn sender(&self) -> Option<&AnyActorRef> {
        self.letter.sender()
    }

    /// Delivers the failing message again before anything else in the mailbox.
    pub fn retry(&mut self) {
        debug!(actor = %self.name(), "Retrying message");
        self.cell.retry_latest();
    }

    /// Replaces the behavior with a fresh instance from the actor's factory.
    ///
    /// With a delay the actor processes nothing until the new instance is in
    /// place. If the factory or `pre_start` fails the actor is disposed.
    pub fn restart(&mut self, delay: Option<Duration>) {
        self.cell.restart(self.myself, delay);
    }

    /// Suspends draining for `duration`. Messages keep queueing meanwhile.
    pub fn pause(&mut self, duration: Duration) {
        self.cell.pause(duration);
    }

    pub fn dispose(&mut self, children: ChildPolicy) {
        self.cell.dispose_subtree(children == ChildPolicy::Dispose);
    }

    /// Tells whether an actor of this system is still registered, so shared
    /// supervisors can drop state kept for terminated actors.
    pub(crate) fn liveness(&self) -> impl Fn(ActorId) -> bool {
        let system = self.cell.system();
        move |id| system.as_ref().is_some_and(|s| s.hierarchy().is_active(id))
    }
}

/// A supervisor decision expressed as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Drop the failing message and carry on.
    Resume,
    Retry,
    Restart {
        delay: Option<Duration>,
        retry_message: bool,
    },
    Pause {
        duration: Duration,
        retry_message: bool,
    },
    Dispose(ChildPolicy),
}

impl Directive {
    pub fn apply<M: Send + Sync + 'static>(self, supervision: &mut Supervision<'_, M>) {
        debug!(actor = %supervision.name(), directive = ?self, "Supervisor directive");
        match self {
            Directive::Resume => {}
            Directive::Retry => supervision.retry(),
            Directive::Restart {
                delay,
                retry_message,
            } => {
                if retry_message {
                    supervision.retry();
                }
                supervision.restart(delay);
            }
            Directive::Pause {
                duration,
                retry_message,
            } => {
                if retry_message {
                    supervision.retry();
                }
                supervision.pause(duration);
            }
            Directive::Dispose(children) => supervision.dispose(children),
        }
    }
}

/// Logs the failure and disposes the actor with its children.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisposeSupervisor;

impl<M: Send + Sync + 'static> Supervisor<M> for DisposeSupervisor {
    fn process_failure(&self, supervision: &mut Supervision<'_, M>, error: &ActorError) {
        error!(actor = %supervision.name(), error = %error, "Actor failed, disposing");
        supervision.dispose(ChildPolicy::Dispose);
    }
}

#[derive(Debug, Clone, Copy)]
struct RestartWindow {
    started: Instant,
    count: u32,
}

/// Restarts the actor on failure.
///
/// Restarts are budgeted per actor: more than `max_restarts` within `within`
/// disposes the actor instead. Budgets of terminated actors and expired
/// windows are pruned on every failure, so one instance can be shared across
/// many short-lived actors.
#[derive(Debug)]
pub struct RestartSupervisor {
    delay: Option<Duration>,
    retry_message: bool,
    max_restarts: Option<u32>,
    within: Duration,
    windows: Mutex<HashMap<ActorId, RestartWindow>>,
}

impl RestartSupervisor {
    pub fn new() -> Self {
        Self {
            delay: None,
            retry_message: false,
            max_restarts: None,
            within: Duration::from_secs(60),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Redeliver the failing message to the new instance instead of dropping it.
    pub fn retry_message(mut self, retry: bool) -> Self {
        self.retry_message = retry;
        self
    }

    pub fn with_limit(mut self, max_restarts: u32, within: Duration) -> Self {
        self.max_restarts = Some(max_restarts);
        self.within = within;
        self
    }

    fn allow_restart(&self, id: ActorId, is_live: impl Fn(ActorId) -> bool) -> bool {
        let Some(max) = self.max_restarts else {
            return true;
        };
        let now = Instant::now();
        let mut windows = self.windows.lock();
        windows.retain(|other, window| {
            *other == id || (now.duration_since(window.started) <= self.within && is_live(*other))
        });
        let window = windows.entry(id).or_insert(RestartWindow {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) > self.within {
            *window = RestartWindow {
                started: now,
                count: 0,
            };
        }
        window.count += 1;
        window.count <= max
    }
}

impl Default for RestartSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send + Sync + 'static> Supervisor<M> for RestartSupervisor {
    fn process_failure(&self, supervision: &mut Supervision<'_, M>, error: &ActorError) {
        if !self.allow_restart(supervision.id(), supervision.liveness()) {
            warn!(
                actor = %supervision.name(),
                error = %error,
                max_restarts = ?self.max_restarts,
                "Restart limit exceeded, disposing actor"
            );
            self.windows.lock().remove(&supervision.id());
            supervision.dispose(ChildPolicy::Dispose);
            return;
        }
        warn!(actor = %supervision.name(), error = %error, "Actor failed, restarting");
        Directive::Restart {
            delay: self.delay,
            retry_message: self.retry_message,
        }
        .apply(supervision);
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryState {
    processed_at_failure: u64,
    attempts: u32,
}

/// Redelivers a failing message up to `max_retries` times in a row, then
/// disposes the actor with its children.
#[derive(Debug)]
pub struct RetrySupervisor {
    max_retries: u32,
    attempts: Mutex<HashMap<ActorId, RetryState>>,
}

impl RetrySupervisor {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one more consecutive failure for `id`; `false` once the budget
    /// is spent. `processed` resets the count when the actor made progress.
    /// Counts of actors that are no longer live are dropped.
    fn allow_retry(&self, id: ActorId, processed: u64, is_live: impl Fn(ActorId) -> bool) -> bool {
        let mut attempts = self.attempts.lock();
        attempts.retain(|other, _| *other == id || is_live(*other));
        let state = attempts.entry(id).or_insert(RetryState {
            processed_at_failure: processed,
            attempts: 0,
        });
        if state.processed_at_failure != processed {
            *state = RetryState {
                processed_at_failure: processed,
                attempts: 0,
            };
        }
        if state.attempts < self.max_retries {
            state.attempts += 1;
            return true;
        }
        attempts.remove(&id);
        false
    }
}

impl<M: Send + Sync + 'static> Supervisor<M> for RetrySupervisor {
    fn process_failure(&self, supervision: &mut Supervision<'_, M>, error: &ActorError) {
        let processed = supervision.actor().stats().processed;
        if self.allow_retry(supervision.id(), processed, supervision.liveness()) {
            supervision.retry();
            return;
        }
        warn!(
            actor = %supervision.name(),
            error = %error,
            retries = self.max_retries,
            "Retries exhausted, disposing actor"
        );
        supervision.dispose(ChildPolicy::Dispose);
    }
}

/// Pauses the actor for a fixed duration, then retries the failing message.
#[derive(Debug, Clone, Copy)]
pub struct PauseSupervisor {
    duration: Duration,
}

impl PauseSupervisor {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl<M: Send + Sync + 'static> Supervisor<M> for PauseSupervisor {
    fn process_failure(&self, supervision: &mut Supervision<'_, M>, error: &ActorError) {
        warn!(actor = %supervision.name(), error = %error, "Actor failed, pausing");
        Directive::Pause {
            duration: self.duration,
            retry_message: true,
        }
        .apply(supervision);
    }
}

/// Chooses a [`Directive`] per failure with a closure.
///
/// ```rust
/// use actor_runtime::error::ActorError;
/// use actor_runtime::supervisor::{ChildPolicy, Directive, DirectiveSupervisor};
///
/// let supervisor = DirectiveSupervisor::new(|error: &ActorError| match error {
///     ActorError::Panicked(_) => Directive::Dispose(ChildPolicy::Dispose),
///     ActorError::Behavior(_) => Directive::Resume,
/// });
/// # let _ = supervisor;
/// ```
pub struct DirectiveSupervisor<F> {
    decide: F,
}

impl<F> DirectiveSupervisor<F>
where
    F: Fn(&ActorError) -> Directive + Send + Sync,
{
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

impl<M, F> Supervisor<M> for DirectiveSupervisor<F>
where
    M: Send + Sync + 'static,
    F: Fn(&ActorError) -> Directive + Send + Sync,
{
    fn process_failure(&self, supervision: &mut Supervision<'_, M>, error: &ActorError) {
        (self.decide)(error).apply(supervision);
    }
}
