//! # Observability & Tracing
//!
//! The runtime logs through the `tracing` crate with structured fields, so the
//! host application decides where the events go. This module offers the
//! subscriber setup most binaries and tests want.
//!
//! ## What Gets Traced
//!
//! - **Actor lifecycle** (`info`): spawn, graceful stop, dispose.
//! - **Supervision** (`debug`/`warn`/`error`): directives, restarts, pauses,
//!   restart-limit breaches, default-supervisor failures.
//! - **Delivery** (`debug`/`warn`): dead letters, rejected messages.
//! - **Drain loop** (`trace`): one event per drained message.
//!
//! Every actor-scoped event carries an `actor` field with the actor's name.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=actor_runtime=debug cargo test
//! ```
//!
//! ```text
//! INFO Actor spawned actor="counter" parent="root"
//! DEBUG Supervisor directive actor="counter" directive=Restart { .. }
//! INFO Actor stopped actor="counter"
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed; use
/// [`try_setup_tracing`] where that can happen (e.g. in tests).
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but reports an already-installed subscriber as an
/// error instead of panicking.
pub fn try_setup_tracing() -> Result<(), TryInitError> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_test_writer()
                .compact(),
        )
        .try_init()
}
