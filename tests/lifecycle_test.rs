mod common;

use actor_runtime::actor::LifecycleState;
use actor_runtime::error::TellError;
use actor_runtime::prelude::*;
use common::{eventually, init_tracing, recorder, TIMEOUT};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Started(String),
    Got(String, &'static str),
    Stopped(String),
}

/// Records its lifecycle and optionally spawns children from `pre_start`.
struct Node {
    events: Probe<Event>,
    children: Vec<&'static str>,
}

impl Actor for Node {
    type Message = &'static str;

    fn pre_start(&mut self, ctx: &mut Context<'_, &'static str>) -> Result<(), BoxError> {
        self.events.record(Event::Started(ctx.name().to_string()));
        for &child in &self.children {
            ctx.spawn(node(&self.events, &[]), Some(child))?;
        }
        Ok(())
    }

    fn on_message(
        &mut self,
        ctx: &mut Context<'_, &'static str>,
        message: &&'static str,
    ) -> Result<(), BoxError> {
        self.events.record(Event::Got(ctx.name().to_string(), *message));
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut Context<'_, &'static str>) {
        self.events.record(Event::Stopped(ctx.name().to_string()));
    }
}

fn node(events: &Probe<Event>, children: &[&'static str]) -> Props<&'static str> {
    let events = events.clone();
    let children = children.to_vec();
    Props::new(move || Node {
        events: events.clone(),
        children: children.clone(),
    })
}

/// A poison pill is processed after earlier messages; afterwards the actor is
/// disposed and ignores further sends.
#[test]
fn test_poison_pill_stops_after_pending_messages() {
    init_tracing();
    let system = ActorSystem::new("poison-pill");
    let scheduler = TestScheduler::new();
    let events = Probe::new();
    let actor = system
        .spawn(
            node(&events, &[]).with_scheduler(Arc::new(scheduler.clone())),
            Some("worker"),
        )
        .expect("Failed to spawn actor");

    actor.tell("a");
    actor.tell("b");
    actor.stop();
    assert_eq!(actor.state(), LifecycleState::Active);
    scheduler.trigger_actions();

    let name = || "worker".to_string();
    assert_eq!(
        events.snapshot(),
        vec![
            Event::Started(name()),
            Event::Got(name(), "a"),
            Event::Got(name(), "b"),
            Event::Stopped(name()),
        ]
    );
    assert!(actor.is_disposed());
    assert!(matches!(actor.try_tell("c"), Err(TellError::Disposed(_))));
    scheduler.trigger_actions();
    assert_eq!(events.len(), 4);
    assert!(system.lookup::<&'static str>("worker").is_err());
}

/// A full bounded mailbox neither refuses nor evicts the poison pill, and
/// nothing already queued is lost to make room for it.
#[test]
fn test_stop_with_full_bounded_mailbox() {
    for overflow in [OverflowStrategy::RejectNewest, OverflowStrategy::DropOldest] {
        let system = ActorSystem::new("bounded-stop");
        let scheduler = TestScheduler::new();
        let probe = Probe::new();
        let actor = system
            .spawn(
                recorder(&probe)
                    .with_mailbox(MailboxConfig::bounded(2, overflow))
                    .with_scheduler(Arc::new(scheduler.clone())),
                Some("bounded"),
            )
            .expect("Failed to spawn actor");

        actor.tell(1u32);
        actor.tell(2);
        actor.stop();
        assert!(matches!(actor.try_tell(3), Err(TellError::Stopping(_))), "{overflow:?}");
        scheduler.trigger_actions();

        assert_eq!(probe.snapshot(), vec![1, 2], "{overflow:?}");
        assert!(actor.is_disposed(), "{overflow:?}");
        assert_eq!(system.dead_letter_count(), 1);
    }
}

/// Messages sent after `stop()` are dead-lettered instead of evicting the pill.
#[test]
fn test_tells_after_stop_are_refused() {
    let system = ActorSystem::new("late-tells");
    let scheduler = TestScheduler::new();
    let probe = Probe::new();
    let actor = system
        .spawn(
            recorder(&probe)
                .with_mailbox(MailboxConfig::bounded(2, OverflowStrategy::DropOldest))
                .with_scheduler(Arc::new(scheduler.clone())),
            None,
        )
        .expect("Failed to spawn actor");

    actor.stop();
    actor.tell(10u32);
    actor.tell(11);
    scheduler.trigger_actions();

    assert!(probe.is_empty());
    assert!(actor.is_disposed());
    assert_eq!(actor.state(), LifecycleState::Disposed);
    assert_eq!(system.dead_letter_count(), 2);
}

/// In a priority mailbox the pill still cuts off later sends, however they rank.
#[test]
fn test_stop_with_priority_mailbox() {
    let system = ActorSystem::new("priority-stop");
    let scheduler = TestScheduler::new();
    let probe = Probe::new();
    let actor = system
        .spawn(
            recorder(&probe)
                .with_mailbox(MailboxConfig::priority(|a: &u32, b: &u32| a.cmp(b)))
                .with_scheduler(Arc::new(scheduler.clone())),
            None,
        )
        .expect("Failed to spawn actor");

    actor.tell(3u32);
    actor.tell(1);
    actor.stop();
    actor.tell(0);
    scheduler.trigger_actions();

    assert_eq!(probe.snapshot(), vec![1, 3]);
    assert!(actor.is_disposed());
}

/// Blocks on message 1 until the test releases it.
struct Gate {
    entered: Probe<u32>,
    done: Probe<u32>,
    release: Probe<()>,
}

impl Actor for Gate {
    type Message = u32;

    fn on_message(&mut self, _ctx: &mut Context<'_, u32>, message: &u32) -> Result<(), BoxError> {
        self.entered.record(*message);
        if *message == 1 && !self.release.wait_for(1, TIMEOUT) {
            return Err("gate never released".into());
        }
        self.done.record(*message);
        Ok(())
    }
}

fn gate(entered: &Probe<u32>, done: &Probe<u32>, release: &Probe<()>) -> Props<u32> {
    let (entered, done, release) = (entered.clone(), done.clone(), release.clone());
    Props::new(move || Gate {
        entered: entered.clone(),
        done: done.clone(),
        release: release.clone(),
    })
}

/// Dispose lets the running message finish but nothing queued behind it.
#[test]
fn test_dispose_truncates_the_mailbox() {
    let system = ActorSystem::new("truncate");
    let (entered, done, release) = (Probe::new(), Probe::new(), Probe::new());
    let actor = system
        .spawn(gate(&entered, &done, &release), Some("gate"))
        .expect("Failed to spawn actor");

    for n in 1..=3 {
        actor.tell(n);
    }
    assert!(entered.wait_for(1, TIMEOUT));
    actor.dispose();
    assert!(actor.is_disposed());
    release.record(());

    assert!(eventually(|| system.hierarchy().lookup("gate").is_none()));
    assert_eq!(done.snapshot(), vec![1]);
    assert_eq!(entered.snapshot(), vec![1]);
    assert!(system.shutdown(Some(TIMEOUT)));
}

/// A system-wide graceful stop reaches an actor whose reject-newest mailbox
/// is full, and its queued work still completes.
#[test]
fn test_system_stop_with_full_mailbox() {
    let system = ActorSystem::new("full-stop");
    let (entered, done, release) = (Probe::new(), Probe::new(), Probe::new());
    let actor = system
        .spawn(
            gate(&entered, &done, &release)
                .with_mailbox(MailboxConfig::bounded(1, OverflowStrategy::RejectNewest)),
            None,
        )
        .expect("Failed to spawn actor");

    actor.tell(1);
    assert!(entered.wait_for(1, TIMEOUT));
    actor.tell(2);
    assert!(matches!(actor.try_tell(3), Err(TellError::Rejected(_))));

    system.stop();
    release.record(());

    assert!(system.await_termination(Some(TIMEOUT)));
    assert_eq!(done.snapshot(), vec![1, 2]);
    assert!(actor.is_disposed());
}

/// Disposing a parent disposes its children and frees every name.
#[test]
fn test_cascading_dispose() {
    let system = ActorSystem::new("cascade");
    let events = Probe::new();
    let parent = system
        .spawn(node(&events, &["child-1", "child-2"]), Some("parent"))
        .expect("Failed to spawn parent");
    let child_1 = system
        .lookup::<&'static str>("child-1")
        .expect("child-1 not registered");
    let child_2 = system
        .lookup::<&'static str>("child-2")
        .expect("child-2 not registered");
    assert_eq!(system.hierarchy().children_of(parent.id()), vec![child_1.id(), child_2.id()]);
    assert_eq!(system.hierarchy().parent_of(child_1.id()), Some(parent.id()));

    parent.dispose();

    assert!(parent.is_disposed());
    assert!(child_1.is_disposed());
    assert!(child_2.is_disposed());
    for name in ["parent", "child-1", "child-2"] {
        assert!(system.hierarchy().lookup(name).is_none(), "{name} still registered");
    }
    // Only the root guardian is left.
    assert_eq!(system.hierarchy().active_count(), 1);

    system.dispose();
    assert!(system.is_terminated());
    assert!(system.await_termination(Some(TIMEOUT)));
}

/// Graceful stop cascades to children, each of which runs `on_stop` once.
#[test]
fn test_stop_cascades_to_children() {
    let system = ActorSystem::new("stop-cascade");
    let events = Probe::new();
    let parent = system
        .spawn(node(&events, &["leaf"]), Some("branch"))
        .expect("Failed to spawn parent");
    parent.tell("hello");

    parent.stop();

    assert!(eventually(|| system.hierarchy().active_count() == 1));
    let stopped: Vec<_> = events
        .snapshot()
        .into_iter()
        .filter(|event| matches!(event, Event::Stopped(_)))
        .collect();
    assert_eq!(stopped.len(), 2);
    assert!(stopped.contains(&Event::Stopped("branch".into())));
    assert!(stopped.contains(&Event::Stopped("leaf".into())));
    assert!(events.snapshot().contains(&Event::Got("branch".into(), "hello")));
    system.shutdown(Some(TIMEOUT));
}

/// Names are unique among live actors; a failed spawn releases its name.
#[test]
fn test_spawn_errors() {
    struct Failing;

    impl Actor for Failing {
        type Message = ();

        fn pre_start(&mut self, _ctx: &mut Context<'_, ()>) -> Result<(), BoxError> {
            Err("not today".into())
        }

        fn on_message(&mut self, _ctx: &mut Context<'_, ()>, _msg: &()) -> Result<(), BoxError> {
            Ok(())
        }
    }

    let system = ActorSystem::new("spawn-errors");
    let probe = Probe::<u8>::new();
    system
        .spawn(recorder(&probe), Some("unique"))
        .expect("First spawn failed");
    assert!(matches!(
        system.spawn(recorder(&probe), Some("unique")),
        Err(SpawnError::NameTaken(name)) if name == "unique"
    ));

    let factory = Props::<u8>::try_new(|| -> Result<common::Recorder<u8>, BoxError> {
        Err("no resources".into())
    });
    assert!(matches!(
        system.spawn(factory, Some("broken")),
        Err(SpawnError::Factory { name, .. }) if name == "broken"
    ));
    assert!(matches!(
        system.spawn(Props::new(|| Failing), Some("broken")),
        Err(SpawnError::PreStart { name, .. }) if name == "broken"
    ));
    system
        .spawn(recorder(&probe), Some("broken"))
        .expect("Name should be free after failed spawns");

    let anonymous = system.spawn(recorder(&probe), None).expect("Anonymous spawn failed");
    assert!(anonymous.name().starts_with("actor-"));
    system.shutdown(Some(TIMEOUT));
}

/// Shutdown stops everything gracefully and refuses new spawns afterwards.
#[test]
fn test_system_shutdown() {
    let system = ActorSystem::new("shutdown");
    let events = Probe::new();
    let actors: Vec<_> = (0..4)
        .map(|_| system.spawn(node(&events, &[]), None).expect("Spawn failed"))
        .collect();
    for actor in &actors {
        actor.tell("last words");
    }

    assert!(system.shutdown(Some(TIMEOUT)));

    assert!(system.is_terminated());
    assert!(actors.iter().all(|actor| actor.is_disposed()));
    let got = events
        .snapshot()
        .into_iter()
        .filter(|event| matches!(event, Event::Got(..)))
        .count();
    assert_eq!(got, 4);
    assert!(matches!(
        system.spawn(node(&events, &[]), None),
        Err(SpawnError::SystemTerminated)
    ));
}
