//! # Runtime Errors
//!
//! This module defines the error types used throughout the runtime. Each concern
//! gets its own enum so callers can match on exactly the failures an operation
//! can produce:
//!
//! - [`SpawnError`] - construction failures, surfaced to whoever called `spawn`.
//! - [`LookupError`] - resolving a name to a typed reference failed.
//! - [`TellError`] - a message could not be enqueued (`try_tell` only).
//! - [`ActorError`] - a behavior failed while handling a message; handed to the supervisor.
//! - [`SchedulerError`] - a scheduling request the scheduler cannot honor.

use std::any::Any;

/// Boxed error type returned by actor behaviors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to create an actor.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("Actor name already taken: {0}")]
    NameTaken(String),
    #[error("Parent actor terminated: {0}")]
    ParentTerminated(String),
    #[error("Actor system terminated")]
    SystemTerminated,
    #[error("No worker available: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("Actor factory failed for {name}: {source}")]
    Factory {
        name: String,
        #[source]
        source: BoxError,
    },
    #[error("pre_start failed for {name}: {source}")]
    PreStart {
        name: String,
        #[source]
        source: BoxError,
    },
}

/// Failure to resolve an actor by name.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("No actor named {0}")]
    NotFound(String),
    #[error("Actor {name} does not accept messages of type {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

/// Failure to enqueue a message.
#[derive(Debug, thiserror::Error)]
pub enum TellError {
    #[error("Actor disposed: {0}")]
    Disposed(String),
    #[error("Mailbox full: {0}")]
    Rejected(String),
    /// The actor was asked to stop; its mailbox takes nothing new.
    #[error("Actor stopping: {0}")]
    Stopping(String),
}

/// Failure raised by an actor behavior while processing one message.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("Behavior error: {0}")]
    Behavior(BoxError),
    #[error("Behavior panicked: {0}")]
    Panicked(String),
}

impl ActorError {
    /// Converts a caught panic payload into an `ActorError`.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ActorError::Panicked(message)
    }
}

/// Failure to schedule a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("Scheduler shut down")]
    Shutdown,
    #[error("Period must be non-zero")]
    ZeroPeriod,
    #[error("Failed to start scheduler threads: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let err = ActorError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "Behavior panicked: boom");

        let err = ActorError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "Behavior panicked: owned");

        let err = ActorError::from_panic(Box::new(42u8));
        assert!(matches!(err, ActorError::Panicked(_)));
    }
}
