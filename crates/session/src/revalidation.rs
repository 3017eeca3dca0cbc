//! Background revalidation timer.
//!
//! At most one timer runs per controller. Each one carries a generation
//! number; a tick whose generation no longer owns the slot does nothing.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::AuthFailure;
use crate::controller::Inner;
use crate::notify::{REVALIDATION_FAILED_MESSAGE, Severity};
use crate::state::lock;
use crate::store::read_credentials;

pub(crate) struct TimerSlot {
    generation: u64,
    handle: JoinHandle<()>,
}

impl TimerSlot {
    pub(crate) fn abort(self) {
        self.handle.abort();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Tick {
    Continue,
    Stop,
}

/// Spawn a new timer on the current runtime, replacing (and aborting) the
/// previous one. `None` outside a runtime.
pub(crate) fn install(inner: &Arc<Inner>) -> Option<u64> {
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(runtime) => runtime,
        Err(_) => {
            warn!("no async runtime; periodic revalidation disabled");
            return None;
        }
    };

    let generation = inner.timer_generation.fetch_add(1, Ordering::AcqRel) + 1;
    let period = inner.config.revalidate_every;
    let handle = runtime.spawn(run(Arc::downgrade(inner), generation, period));

    let previous = lock(&inner.timer).replace(TimerSlot { generation, handle });
    if let Some(previous) = previous {
        debug!(replaced = previous.generation, generation, "replacing revalidation timer");
        previous.abort();
    }
    info!(generation, every_secs = period.as_secs(), "periodic revalidation started");
    Some(generation)
}

async fn run(inner: Weak<Inner>, generation: u64, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.revalidate_once(generation).await == Tick::Stop {
            break;
        }
    }
    debug!(generation, "revalidation timer stopped");
}

impl Inner {
    pub(crate) fn active_timer(&self) -> Option<u64> {
        lock(&self.timer).as_ref().map(|slot| slot.generation)
    }

    /// Abort the running timer, if any.
    pub(crate) fn cancel_timer(&self) -> bool {
        let slot = lock(&self.timer).take();
        match slot {
            Some(slot) => {
                debug!(generation = slot.generation, "revalidation timer cancelled");
                slot.abort();
                true
            }
            None => false,
        }
    }

    fn owns_timer(&self, generation: u64) -> bool {
        lock(&self.timer)
            .as_ref()
            .is_some_and(|slot| slot.generation == generation)
    }

    /// Empty the slot from inside the timer task without aborting it.
    fn release_timer(&self, generation: u64) {
        let mut slot = lock(&self.timer);
        if slot.as_ref().is_some_and(|slot| slot.generation == generation) {
            *slot = None;
        }
    }

    async fn revalidate_once(&self, generation: u64) -> Tick {
        if !self.owns_timer(generation) {
            return Tick::Stop;
        }
        if !self.cell.is_authenticated() {
            debug!(generation, "session gone; stopping revalidation");
            self.release_timer(generation);
            return Tick::Stop;
        }
        let path = self.router.current_path();
        if self.config.routes.is_public(&path) {
            debug!(generation, %path, "public page; stopping revalidation");
            self.release_timer(generation);
            return Tick::Stop;
        }

        let epoch = self.cell.epoch();
        let credentials = read_credentials(self.store.as_ref());
        let result = self.api.get_current_user(&credentials).await;

        if !self.owns_timer(generation) {
            return Tick::Stop;
        }
        if self.cell.epoch() != epoch {
            debug!(generation, "session changed during revalidation; ignoring result");
            return Tick::Continue;
        }

        match result {
            Ok(_) => {
                debug!(generation, "session still valid");
                Tick::Continue
            }
            Err(err) if err.failure() == AuthFailure::Unauthenticated => {
                warn!(generation, "backend rejected the session during revalidation");
                self.release_timer(generation);
                self.invalidate(REVALIDATION_FAILED_MESSAGE, Severity::Error);
                Tick::Stop
            }
            Err(err) => {
                warn!(generation, status = err.status_code, "revalidation failed; retrying next tick: {err}");
                Tick::Continue
            }
        }
    }
}
