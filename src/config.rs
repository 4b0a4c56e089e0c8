//! # Runtime Configuration
//!
//! [`RuntimeConfig`] collects the knobs of one actor system: pool sizes,
//! thread names, the scheduler and mailbox used when [`Props`](crate::actor::Props)
//! do not choose one, and the shutdown timeout.
//!
//! The type is `serde`-deserializable so an embedding application can load it
//! from whatever source it uses; the runtime itself never reads files or the
//! environment. Missing fields fall back to [`RuntimeConfig::default`].

use crate::mailbox::MailboxKind;
use crate::scheduler::SchedulerKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Threads in the computation pool. `None` means one per available core.
    pub computation_threads: Option<usize>,
    /// Upper bound on threads in the elastic IO pool.
    pub io_max_threads: usize,
    /// How long an idle IO thread lingers before exiting.
    pub io_keep_alive_ms: u64,
    /// Prefix for the names of every thread the runtime starts.
    pub thread_name_prefix: String,
    pub default_scheduler: SchedulerKind,
    pub default_mailbox: MailboxKind,
    /// Upper bound `ActorSystem::shutdown` waits for actors to terminate.
    pub shutdown_timeout_ms: u64,
}

impl RuntimeConfig {
    pub fn computation_threads(&self) -> usize {
        self.computation_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn with_default_scheduler(mut self, kind: SchedulerKind) -> Self {
        self.default_scheduler = kind;
        self
    }

    pub fn with_default_mailbox(mut self, kind: MailboxKind) -> Self {
        self.default_mailbox = kind;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            computation_threads: None,
            io_max_threads: 64,
            io_keep_alive_ms: 60_000,
            thread_name_prefix: "actor".to_string(),
            default_scheduler: SchedulerKind::Computation,
            default_mailbox: MailboxKind::Unbounded,
            shutdown_timeout_ms: 10_000,
        }
    }
}
