//! The runtime half of an actor: mailbox, worker, lifecycle state and the
//! drain loop.
//!
//! ## Drain protocol
//!
//! `wip` counts drain requests. A drain task increments it and proceeds only
//! if it saw zero, so at most one thread runs the behavior at any instant.
//! Before leaving, the drainer subtracts the requests it observed; any that
//! arrived meanwhile make it loop again instead of scheduling a new task.
//!
//! The counter also serves as the teardown gate: whoever takes it from zero
//! after the cell is disposed runs `finalize`, and the counter is never
//! released afterwards.

use super::actor_ref::{ActorRef, AnyActorRef};
use super::behavior::BoxActor;
use super::context::Context;
use super::envelope::{Envelope, Letter, Payload};
use super::props::ActorFactory;
use crate::error::{ActorError, SpawnError, TellError};
use crate::hierarchy::ActorId;
use crate::mailbox::Mailbox;
use crate::scheduler::Worker;
use crate::supervisor::{Supervision, Supervisor};
use crate::system::SystemShared;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const ACTIVE: u8 = 0;
const RESTARTING: u8 = 1;
const STOPPING: u8 = 2;
const DISPOSED: u8 = 3;

/// Lifecycle state of an actor.
///
/// `Active → Restarting → Active` on a delayed restart, `Active → Stopping →
/// Disposed` on a poison pill, and any state `→ Disposed` on dispose.
/// `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Restarting,
    Stopping,
    Disposed,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            ACTIVE => LifecycleState::Active,
            RESTARTING => LifecycleState::Restarting,
            STOPPING => LifecycleState::Stopping,
            _ => LifecycleState::Disposed,
        }
    }
}

/// Counters reported by [`ActorRef::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorStats {
    /// Messages whose handler returned `Ok`.
    pub processed: u64,
    /// Messages whose handler returned an error or panicked.
    pub failed: u64,
    pub restarts: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
    restarts: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ActorStats {
        ActorStats {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }
}

/// Type-erased view of a cell, as stored by the hierarchy.
pub(crate) trait AnyCell: Send + Sync + 'static {
    fn id(&self) -> ActorId;
    fn name(&self) -> &str;
    fn is_disposed(&self) -> bool;
    fn stats(&self) -> ActorStats;
    /// Closes the mailbox with a poison pill.
    fn stop(self: Arc<Self>);
    /// Disposes the cell without waiting for queued messages.
    fn terminate(self: Arc<Self>);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

pub(crate) struct CellSpec<M> {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) factory: ActorFactory<M>,
    pub(crate) mailbox: Box<dyn Mailbox<Letter<M>>>,
    pub(crate) worker: Arc<dyn Worker>,
    pub(crate) supervisor: Arc<dyn Supervisor<M>>,
    pub(crate) system: Weak<SystemShared>,
}

pub(crate) struct ActorCell<M: Send + Sync + 'static> {
    id: ActorId,
    name: String,
    behavior: Mutex<Option<BoxActor<M>>>,
    factory: ActorFactory<M>,
    mailbox: Box<dyn Mailbox<Letter<M>>>,
    worker: Arc<dyn Worker>,
    supervisor: Arc<dyn Supervisor<M>>,
    system: Weak<SystemShared>,
    state: AtomicU8,
    paused: AtomicBool,
    wip: AtomicUsize,
    finalized: AtomicBool,
    counters: Counters,
}

impl<M: Send + Sync + 'static> ActorCell<M> {
    /// Creates a cell whose drain gate is held until [`ActorCell::start`].
    pub(crate) fn new(init: CellSpec<M>) -> Self {
        Self {
            id: init.id,
            name: init.name,
            behavior: Mutex::new(None),
            factory: init.factory,
            mailbox: init.mailbox,
            worker: init.worker,
            supervisor: init.supervisor,
            system: init.system,
            state: AtomicU8::new(ACTIVE),
            paused: AtomicBool::new(false),
            wip: AtomicUsize::new(1),
            finalized: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub(crate) fn id(&self) -> ActorId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) == DISPOSED
    }

    pub(crate) fn stats(&self) -> ActorStats {
        self.counters.snapshot()
    }

    pub(crate) fn worker(&self) -> &Arc<dyn Worker> {
        &self.worker
    }

    pub(crate) fn system(&self) -> Option<Arc<SystemShared>> {
        self.system.upgrade()
    }

    fn is_suspended(&self) -> bool {
        self.paused.load(Ordering::Acquire) || self.state.load(Ordering::Acquire) == RESTARTING
    }

    fn accepts_messages(&self) -> bool {
        self.state.load(Ordering::Acquire) < STOPPING
    }

    /// Builds the first behavior instance and opens the drain gate.
    pub(crate) fn start(self: &Arc<Self>) -> Result<(), SpawnError> {
        let myself = ActorRef::from_cell(Arc::clone(self));
        let actor = match self.construct(&myself) {
            Ok(actor) => actor,
            Err(e) => {
                error!(actor = %self.name, error = %e, "Actor construction failed");
                // Children spawned by a failed pre_start go down with it; the
                // gate is still ours, so finalize here.
                self.dispose_subtree(true);
                self.finalize();
                return Err(e);
            }
        };
        *self.behavior.lock() = Some(actor);
        self.wip.store(0, Ordering::Release);
        if !self.mailbox.is_empty() {
            self.schedule_drain();
        }
        Ok(())
    }

    fn construct(&self, myself: &ActorRef<M>) -> Result<BoxActor<M>, SpawnError> {
        let mut actor = (self.factory)().map_err(|source| SpawnError::Factory {
            name: self.name.clone(),
            source,
        })?;
        actor
            .pre_start(&mut Context::new(myself, None))
            .map_err(|source| SpawnError::PreStart {
                name: self.name.clone(),
                source,
            })?;
        Ok(actor)
    }

    pub(crate) fn tell(self: &Arc<Self>, letter: Letter<M>) -> Result<(), TellError> {
        if !self.accepts_messages() {
            self.dead_letter(letter);
            return Err(TellError::Disposed(self.name.clone()));
        }
        if !self.mailbox.offer(Arc::clone(&letter)) {
            self.dead_letter(letter);
            if self.mailbox.is_closed() {
                debug!(actor = %self.name, "Actor stopping, message refused");
                return Err(TellError::Stopping(self.name.clone()));
            }
            warn!(actor = %self.name, "Mailbox full, message rejected");
            return Err(TellError::Rejected(self.name.clone()));
        }
        self.schedule_drain();
        Ok(())
    }

    fn dead_letter(&self, letter: Letter<M>) {
        if letter.is_poison_pill() {
            return;
        }
        match self.system.upgrade() {
            Some(system) => system.publish_dead_letter(&self.name, letter),
            None => debug!(actor = %self.name, "Dead letter dropped, actor system gone"),
        }
    }

    pub(crate) fn schedule_drain(self: &Arc<Self>) {
        let cell = Arc::clone(self);
        self.worker.schedule(Box::new(move || cell.drain()));
    }

    fn drain(self: &Arc<Self>) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let myself = ActorRef::from_cell(Arc::clone(self));
        let mut missed = 1;
        'owned: loop {
            loop {
                if self.is_disposed() {
                    self.finalize();
                    return;
                }
                if self.is_suspended() {
                    self.wip.store(0, Ordering::Release);
                    // A resume or dispose may have landed before the store.
                    if (self.is_disposed() || !self.is_suspended())
                        && self.wip.fetch_add(1, Ordering::AcqRel) == 0
                    {
                        missed = 1;
                        continue 'owned;
                    }
                    return;
                }
                let Some(letter) = self.mailbox.poll() else {
                    break;
                };
                match letter.payload() {
                    Payload::PoisonPill => {
                        self.stop_gracefully();
                        return;
                    }
                    Payload::Message(message) => self.invoke(&myself, &letter, message),
                }
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return;
            }
        }
    }

    fn invoke(self: &Arc<Self>, myself: &ActorRef<M>, letter: &Letter<M>, message: &M) {
        trace!(actor = %self.name, "Processing message");
        let outcome = {
            let mut behavior = self.behavior.lock();
            let Some(actor) = behavior.as_mut() else {
                return;
            };
            let mut ctx = Context::new(myself, letter.sender());
            panic::catch_unwind(AssertUnwindSafe(|| actor.on_message(&mut ctx, message)))
        };
        let error = match outcome {
            Ok(Ok(())) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Ok(Err(e)) => ActorError::Behavior(e),
            Err(payload) => ActorError::from_panic(payload),
        };
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        debug!(actor = %self.name, error = %error, "Message failed, consulting supervisor");
        let mut supervision = Supervision::new(self, myself, letter);
        self.supervisor.process_failure(&mut supervision, &error);
    }

    fn stop_gracefully(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(ACTIVE, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
            && self.is_disposed()
        {
            return;
        }
        self.finalize();
    }

    /// Tears the cell down: retire the behavior, drop pending messages, stop
    /// the worker and leave the hierarchy. Runs once, on the gate owner.
    fn finalize(self: &Arc<Self>) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state.store(DISPOSED, Ordering::Release);
        self.mailbox.clear();
        let behavior = self.behavior.lock().take();
        if let Some(actor) = behavior {
            self.retire(actor);
        }
        self.worker.dispose();
        if let Some(system) = self.system.upgrade() {
            system.hierarchy().unregister(self.id);
        }
        info!(actor = %self.name, "Actor stopped");
    }

    fn retire(self: &Arc<Self>, mut actor: BoxActor<M>) {
        let myself = ActorRef::from_cell(Arc::clone(self));
        let mut ctx = Context::new(&myself, None);
        if panic::catch_unwind(AssertUnwindSafe(|| actor.on_stop(&mut ctx))).is_err() {
            warn!(actor = %self.name, "on_stop panicked");
        }
    }

    /// Marks the cell disposed; tears it down here unless a drainer is active,
    /// in which case the drainer does it before its next message.
    pub(crate) fn dispose_now(self: &Arc<Self>) {
        if self.state.swap(DISPOSED, Ordering::AcqRel) == DISPOSED {
            return;
        }
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            self.finalize();
        }
    }

    // --- Supervision actions, called from the drain thread ---

    pub(crate) fn retry_latest(&self) {
        self.mailbox.retry_latest();
    }

    pub(crate) fn pause(self: &Arc<Self>, duration: Duration) {
        self.paused.store(true, Ordering::Release);
        debug!(actor = %self.name, ?duration, "Actor paused");
        let cell = Arc::clone(self);
        self.worker
            .schedule_after(duration, Box::new(move || cell.resume()));
    }

    fn resume(self: &Arc<Self>) {
        if self.paused.swap(false, Ordering::AcqRel) {
            debug!(actor = %self.name, "Actor resumed");
            self.schedule_drain();
        }
    }

    pub(crate) fn restart(self: &Arc<Self>, myself: &ActorRef<M>, delay: Option<Duration>) {
        self.counters.restarts.fetch_add(1, Ordering::Relaxed);
        let Some(delay) = delay else {
            self.replace_behavior(myself);
            return;
        };
        if self
            .state
            .compare_exchange(ACTIVE, RESTARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        debug!(actor = %self.name, ?delay, "Restart scheduled");
        let cell = Arc::clone(self);
        self.worker.schedule_after(
            delay,
            Box::new(move || {
                let myself = ActorRef::from_cell(Arc::clone(&cell));
                if cell.replace_behavior(&myself)
                    && cell
                        .state
                        .compare_exchange(RESTARTING, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    cell.schedule_drain();
                }
            }),
        );
    }

    /// Swaps in a fresh behavior instance. A failing factory or `pre_start`
    /// is fatal: the actor and its children are disposed.
    fn replace_behavior(self: &Arc<Self>, myself: &ActorRef<M>) -> bool {
        let previous = self.behavior.lock().take();
        if let Some(actor) = previous {
            self.retire(actor);
        }
        match self.construct(myself) {
            Ok(actor) => {
                *self.behavior.lock() = Some(actor);
                debug!(actor = %self.name, "Actor restarted");
                true
            }
            Err(e) => {
                error!(actor = %self.name, error = %e, "Restart failed, disposing actor");
                self.dispose_subtree(true);
                false
            }
        }
    }

    /// Disposes this actor; its children are disposed too, or handed to the
    /// root when `cascade` is false.
    pub(crate) fn dispose_subtree(self: &Arc<Self>, cascade: bool) {
        match self.system.upgrade() {
            Some(system) => {
                if !cascade {
                    system.hierarchy().detach_children(self.id);
                }
                system.hierarchy().dispose(self.id);
            }
            None => self.dispose_now(),
        }
    }

    /// Graceful stop of this actor and its descendants.
    pub(crate) fn stop_subtree(self: &Arc<Self>) {
        match self.system.upgrade() {
            Some(system) => system.hierarchy().stop(self.id),
            None => self.post_poison_pill(),
        }
    }

    /// Seals the mailbox with a poison pill: whatever is already queued runs
    /// first, whatever is told afterwards is refused.
    fn post_poison_pill(self: &Arc<Self>) {
        if !self.accepts_messages() {
            return;
        }
        if self.mailbox.close(Arc::new(Envelope::poison_pill())) {
            debug!(actor = %self.name, "Poison pill posted");
            self.schedule_drain();
        }
    }

    pub(crate) fn sender_ref(self: &Arc<Self>) -> AnyActorRef {
        AnyActorRef::from_cell(Arc::clone(self) as Arc<dyn AnyCell>)
    }
}

impl<M: Send + Sync + 'static> AnyCell for ActorCell<M> {
    fn id(&self) -> ActorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_disposed(&self) -> bool {
        ActorCell::is_disposed(self)
    }

    fn stats(&self) -> ActorStats {
        self.counters.snapshot()
    }

    fn stop(self: Arc<Self>) {
        self.post_poison_pill();
    }

    fn terminate(self: Arc<Self>) {
        self.dispose_now();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<M: Send + Sync + 'static> fmt::Debug for ActorCell<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorCell")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
