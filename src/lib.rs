#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Actor Runtime
//!
//! > **Lightweight actors over pluggable schedulers.**
//!
//! Actors here never own a thread or a task. Each actor is a mailbox plus a
//! Worker handle on some [`Scheduler`](scheduler::Scheduler); every message
//! sent schedules a short drain task on that Worker, and the drain loop hands
//! queued messages to the behavior one at a time.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Why separate actors from threads?
//!
//! - **Cheap actors**: an idle actor costs a mailbox and a few atomics.
//! - **Choose the executor per actor**: CPU-bound actors on the computation
//!   pool, blocking ones on the IO pool, thread-affine ones on a sticky
//!   thread, and tests on a virtual clock.
//! - **Sequential behaviors**: the drain loop guarantees at most one thread
//!   runs a given behavior at any instant, so behaviors keep plain `&mut self`
//!   state with no locks.
//!
//! ## 🚀 Core Concepts
//!
//! ### Fire-and-forget messaging
//! [`ActorRef::tell`](actor::ActorRef::tell) enqueues and returns. There is no
//! request/response; replies are messages sent back to a sender's reference.
//! Undeliverable messages become [`DeadLetter`](system::DeadLetter)s.
//!
//! ### Supervision
//! A behavior that returns an error or panics does not take the thread down.
//! Its [`Supervisor`](supervisor::Supervisor) decides whether to retry the
//! message, restart the behavior, pause, or dispose the actor.
//!
//! ### Hierarchy
//! Actors spawned from a [`Context`](actor::Context) are children of the
//! spawning actor. Stopping or disposing a parent cascades to its children.
//!
//! ## 🗺️ Module Tour
//!
//! | Layer | Modules |
//! |-------|---------|
//! | Primitives | [`queue`], [`mailbox`] |
//! | Execution | [`scheduler`] |
//! | Actors | [`actor`], [`supervisor`], [`hierarchy`], [`system`] |
//! | Ambient | [`config`], [`error`], [`telemetry`], [`testkit`] |
//!
//! ## Quick Start
//!
//! ```rust
//! use actor_runtime::prelude::*;
//! use std::time::Duration;
//!
//! struct Counter {
//!     total: u64,
//!     seen: Probe<u64>,
//! }
//!
//! impl Actor for Counter {
//!     type Message = u64;
//!
//!     fn on_message(&mut self, _ctx: &mut Context<'_, u64>, n: &u64) -> Result<(), BoxError> {
//!         self.total += n;
//!         self.seen.record(self.total);
//!         Ok(())
//!     }
//! }
//!
//! let system = ActorSystem::new("quick-start");
//! let seen = Probe::new();
//! let probe = seen.clone();
//! let counter = system
//!     .spawn(Props::new(move || Counter { total: 0, seen: probe.clone() }), Some("counter"))
//!     .unwrap();
//!
//! for n in 1..=3 {
//!     counter.tell(n);
//! }
//! assert!(seen.wait_for(3, Duration::from_secs(5)));
//! assert_eq!(seen.snapshot(), vec![1, 3, 6]);
//! system.shutdown(None);
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! RUST_LOG=actor_runtime=debug cargo test
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod mailbox;
pub mod queue;
pub mod scheduler;
pub mod supervisor;
pub mod system;
pub mod telemetry;
pub mod testkit;

/// The types most programs need.
pub mod prelude {
    pub use crate::actor::{Actor, ActorRef, AnyActorRef, Context, Props};
    pub use crate::config::RuntimeConfig;
    pub use crate::error::{ActorError, BoxError, SpawnError};
    pub use crate::mailbox::{MailboxConfig, OverflowStrategy};
    pub use crate::scheduler::{SchedulerKind, TestScheduler};
    pub use crate::supervisor::{
        ChildPolicy, Directive, DisposeSupervisor, RestartSupervisor, Supervision, Supervisor,
    };
    pub use crate::system::{ActorSystem, DeadLetter};
    pub use crate::testkit::Probe;
}
