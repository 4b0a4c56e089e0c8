#![allow(dead_code)]

use actor_runtime::prelude::*;
use std::time::{Duration, Instant};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Actor that records every message it receives.
pub struct Recorder<M> {
    probe: Probe<M>,
}

impl<M: Clone + Send + Sync + 'static> Actor for Recorder<M> {
    type Message = M;

    fn on_message(&mut self, _ctx: &mut Context<'_, M>, message: &M) -> Result<(), BoxError> {
        self.probe.record(message.clone());
        Ok(())
    }
}

pub fn recorder<M: Clone + Send + Sync + 'static>(probe: &Probe<M>) -> Props<M> {
    let probe = probe.clone();
    Props::new(move || Recorder {
        probe: probe.clone(),
    })
}

/// Polls `condition` until it holds or `TIMEOUT` elapses.
pub fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn init_tracing() {
    let _ = actor_runtime::telemetry::try_setup_tracing();
}
