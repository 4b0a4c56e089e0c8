mod common;

use actor_runtime::error::TellError;
use actor_runtime::prelude::*;
use actor_runtime::supervisor::{DirectiveSupervisor, PauseSupervisor, RetrySupervisor};
use common::{eventually, init_tracing, recorder, TIMEOUT};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmd {
    Work(u32),
    Fail,
    Panic,
}

/// Records `(instance, n)` for every `Work(n)`; each instance gets a fresh
/// number from the factory so restarts are visible.
struct Worker {
    instance: usize,
    log: Probe<(usize, u32)>,
}

impl Actor for Worker {
    type Message = Cmd;

    fn on_message(&mut self, _ctx: &mut Context<'_, Cmd>, cmd: &Cmd) -> Result<(), BoxError> {
        match cmd {
            Cmd::Work(n) => {
                self.log.record((self.instance, *n));
                Ok(())
            }
            Cmd::Fail => Err("requested failure".into()),
            Cmd::Panic => panic!("requested panic"),
        }
    }
}

fn worker(log: &Probe<(usize, u32)>) -> Props<Cmd> {
    let log = log.clone();
    let instances = Arc::new(AtomicUsize::new(0));
    Props::new(move || Worker {
        instance: instances.fetch_add(1, Ordering::SeqCst) + 1,
        log: log.clone(),
    })
}

fn on_test_scheduler(props: Props<Cmd>, scheduler: &TestScheduler) -> Props<Cmd> {
    props.with_scheduler(Arc::new(scheduler.clone()))
}

/// Restart keeps the name and mailbox but swaps in a new behavior instance.
#[test]
fn test_restart_replaces_instance() {
    init_tracing();
    let system = ActorSystem::new("restart");
    let scheduler = TestScheduler::new();
    let log = Probe::new();
    let actor = system
        .spawn(
            on_test_scheduler(worker(&log), &scheduler).with_supervisor(RestartSupervisor::new()),
            Some("phoenix"),
        )
        .expect("Failed to spawn actor");

    actor.tell(Cmd::Work(1));
    actor.tell(Cmd::Fail);
    actor.tell(Cmd::Work(2));
    scheduler.trigger_actions();

    assert_eq!(log.snapshot(), vec![(1, 1), (2, 2)]);
    let stats = actor.stats();
    assert_eq!((stats.processed, stats.failed, stats.restarts), (2, 1, 1));
    assert_eq!(
        system.lookup::<Cmd>("phoenix").expect("Name lost on restart"),
        actor
    );
    assert!(!actor.is_disposed());
}

/// A delayed restart holds the mailbox until the new instance is ready, and
/// can redeliver the failing message to it.
#[test]
fn test_delayed_restart_with_retry() {
    let system = ActorSystem::new("delayed-restart");
    let scheduler = TestScheduler::new();
    let log = Probe::new();
    let flaky = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::clone(&flaky);
    let log_in = log.clone();
    let instances = Arc::new(AtomicUsize::new(0));

    // Fails the first attempt at Work(7) only.
    let props = Props::new(move || {
        let instance = instances.fetch_add(1, Ordering::SeqCst) + 1;
        let attempts = Arc::clone(&attempts);
        let log = log_in.clone();
        Flaky {
            instance,
            attempts,
            log,
        }
    })
    .with_scheduler(Arc::new(scheduler.clone()))
    .with_supervisor(
        RestartSupervisor::new()
            .with_delay(Duration::from_secs(5))
            .retry_message(true),
    );

    struct Flaky {
        instance: usize,
        attempts: Arc<AtomicUsize>,
        log: Probe<(usize, u32)>,
    }

    impl Actor for Flaky {
        type Message = u32;

        fn on_message(&mut self, _ctx: &mut Context<'_, u32>, n: &u32) -> Result<(), BoxError> {
            if *n == 7 && self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("first attempt fails".into());
            }
            self.log.record((self.instance, *n));
            Ok(())
        }
    }

    let actor = system.spawn(props, None).expect("Failed to spawn actor");
    actor.tell(7);
    actor.tell(8);
    scheduler.trigger_actions();
    assert!(log.is_empty());

    scheduler.advance_by(Duration::from_secs(4));
    assert!(log.is_empty(), "Processed while restarting");

    scheduler.advance_by(Duration::from_secs(1));
    assert_eq!(log.snapshot(), vec![(2, 7), (2, 8)]);
    assert_eq!(flaky.load(Ordering::SeqCst), 2);
}

/// The default supervisor disposes a failing actor; later sends are dead letters.
#[test]
fn test_default_supervisor_disposes() {
    let system = ActorSystem::new("default-supervisor");
    let log = Probe::new();
    let actor = system.spawn(worker(&log), Some("fragile")).expect("Spawn failed");

    actor.tell(Cmd::Work(1));
    actor.tell(Cmd::Fail);
    actor.tell(Cmd::Work(2));

    assert!(eventually(|| actor.is_disposed()));
    assert_eq!(log.snapshot(), vec![(1, 1)]);
    assert!(matches!(actor.try_tell(Cmd::Work(3)), Err(TellError::Disposed(_))));
    assert!(system.hierarchy().lookup("fragile").is_none());
    assert!(system.dead_letter_count() >= 1);
    system.shutdown(Some(TIMEOUT));
}

/// Panics inside a behavior are caught and handed to the supervisor.
#[test]
fn test_panics_reach_the_supervisor() {
    let system = ActorSystem::new("panics");
    let scheduler = TestScheduler::new();
    let log = Probe::new();
    let errors = Probe::<String>::new();
    let seen = errors.clone();
    let actor = system
        .spawn(
            on_test_scheduler(worker(&log), &scheduler).with_supervisor(
                move |_s: &mut Supervision<'_, Cmd>, error: &ActorError| {
                    seen.record(error.to_string());
                },
            ),
            None,
        )
        .expect("Spawn failed");

    actor.tell(Cmd::Panic);
    actor.tell(Cmd::Fail);
    actor.tell(Cmd::Work(1));
    scheduler.trigger_actions();

    assert_eq!(
        errors.snapshot(),
        vec![
            "Behavior panicked: requested panic".to_string(),
            "Behavior error: requested failure".to_string(),
        ]
    );
    // Same instance: no action means drop the message and carry on.
    assert_eq!(log.snapshot(), vec![(1, 1)]);
    assert_eq!(actor.stats().failed, 2);
}

/// Retry redelivers the failing message ahead of the rest of the mailbox,
/// and disposes the actor once the retries are spent.
#[test]
fn test_retry_supervisor() {
    let system = ActorSystem::new("retry");
    let scheduler = TestScheduler::new();
    let log = Probe::new();
    let actor = system
        .spawn(
            on_test_scheduler(worker(&log), &scheduler).with_supervisor(RetrySupervisor::new(2)),
            None,
        )
        .expect("Spawn failed");

    actor.tell(Cmd::Work(1));
    actor.tell(Cmd::Fail);
    actor.tell(Cmd::Work(2));
    scheduler.trigger_actions();

    // Fail ran once plus two retries; Work(2) never ran.
    assert_eq!(log.snapshot(), vec![(1, 1)]);
    let stats = actor.stats();
    assert_eq!((stats.processed, stats.failed, stats.restarts), (1, 3, 0));
    assert!(actor.is_disposed());
}

/// A panicking supervisor is not caught: the panic escapes the drain task and
/// the actor never drains again.
#[test]
fn test_supervisor_panic_halts_draining() {
    let system = ActorSystem::new("supervisor-panic");
    let scheduler = TestScheduler::new();
    let log = Probe::new();
    let actor = system
        .spawn(
            on_test_scheduler(worker(&log), &scheduler).with_supervisor(
                |_s: &mut Supervision<'_, Cmd>, _e: &ActorError| panic!("supervisor bug"),
            ),
            None,
        )
        .expect("Spawn failed");

    actor.tell(Cmd::Fail);
    actor.tell(Cmd::Work(1));
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        scheduler.trigger_actions();
    }));
    assert!(outcome.is_err());

    actor.tell(Cmd::Work(2));
    scheduler.trigger_actions();
    assert!(log.is_empty());
    assert!(!actor.is_disposed());
}

/// Pause suspends draining for a while; messages keep queueing meanwhile.
#[test]
fn test_pause_supervisor_backs_off() {
    let system = ActorSystem::new("pause");
    let scheduler = TestScheduler::new();
    let log = Probe::new();
    let fail_once = Arc::new(AtomicUsize::new(0));
    let gate = Arc::clone(&fail_once);
    let log_in = log.clone();

    let props = Props::new(move || {
        let gate = Arc::clone(&gate);
        let log = log_in.clone();
        FailOnce { gate, log }
    })
    .with_scheduler(Arc::new(scheduler.clone()))
    .with_supervisor(PauseSupervisor::new(Duration::from_secs(10)));

    struct FailOnce {
        gate: Arc<AtomicUsize>,
        log: Probe<&'static str>,
    }

    impl Actor for FailOnce {
        type Message = &'static str;

        fn on_message(
            &mut self,
            _ctx: &mut Context<'_, &'static str>,
            msg: &&'static str,
        ) -> Result<(), BoxError> {
            if self.gate.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("backend unavailable".into());
            }
            self.log.record(*msg);
            Ok(())
        }
    }

    let actor = system.spawn(props, None).expect("Spawn failed");
    actor.tell("x");
    actor.tell("y");
    scheduler.trigger_actions();
    assert!(log.is_empty());

    actor.tell("z");
    scheduler.advance_by(Duration::from_secs(9));
    assert!(log.is_empty(), "Drained while paused");

    scheduler.advance_by(Duration::from_secs(1));
    assert_eq!(log.snapshot(), vec!["x", "y", "z"]);
}

/// Exceeding the restart budget disposes the actor.
#[test]
fn test_restart_limit() {
    let system = ActorSystem::new("restart-limit");
    let scheduler = TestScheduler::new();
    let log = Probe::new();
    let actor = system
        .spawn(
            on_test_scheduler(worker(&log), &scheduler).with_supervisor(
                RestartSupervisor::new().with_limit(2, Duration::from_secs(60)),
            ),
            None,
        )
        .expect("Spawn failed");

    for _ in 0..3 {
        actor.tell(Cmd::Fail);
    }
    actor.tell(Cmd::Work(1));
    scheduler.trigger_actions();

    assert!(actor.is_disposed());
    assert_eq!(actor.stats().restarts, 2);
    assert!(log.is_empty());
}

/// Detaching children keeps them alive under the root when the parent dies.
#[test]
fn test_dispose_detaches_children() {
    struct Parent {
        child: Probe<u32>,
    }

    impl Actor for Parent {
        type Message = Cmd;

        fn pre_start(&mut self, ctx: &mut Context<'_, Cmd>) -> Result<(), BoxError> {
            ctx.spawn(recorder(&self.child), Some("survivor"))?;
            Ok(())
        }

        fn on_message(&mut self, _ctx: &mut Context<'_, Cmd>, _cmd: &Cmd) -> Result<(), BoxError> {
            Err("parent always fails".into())
        }
    }

    let system = ActorSystem::new("detach");
    let child_log = Probe::new();
    let c = child_log.clone();
    let parent = system
        .spawn(
            Props::new(move || Parent { child: c.clone() }).with_supervisor(DirectiveSupervisor::new(
                |_: &ActorError| Directive::Dispose(ChildPolicy::Detach),
            )),
            Some("doomed"),
        )
        .expect("Spawn failed");
    let child = system.lookup::<u32>("survivor").expect("Child missing");

    parent.tell(Cmd::Fail);
    assert!(eventually(|| parent.is_disposed()));

    assert!(!child.is_disposed());
    assert_eq!(system.hierarchy().parent_of(child.id()), system.hierarchy().root());
    child.tell(5);
    assert!(child_log.wait_for(1, TIMEOUT));
    system.shutdown(Some(TIMEOUT));
}
