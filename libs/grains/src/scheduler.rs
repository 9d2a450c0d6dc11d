//! Recurring tick scheduling.
//!
//! [`RecurringScheduler`] is the host runtime's low-level timer primitive:
//! fire once after `due`, then every `period`, awaiting each tick future to
//! completion before the next tick is scheduled. That await is what gives
//! timers their strict non-interleaving guarantee even across suspension
//! points. [`TokioScheduler`] is the in-process implementation used by
//! default and in tests.

use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

/// One tick of a recurring timer.
///
/// Fault handling happens upstream in the timer subsystem; by the time a
/// tick reaches the scheduler it always resolves.
pub type TickFn = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

/// Opaque cancellable token for one scheduled recurring timer.
///
/// Owned exclusively by the ledger entry that created it and released
/// exactly once. Dropping the handle cancels the timer, so handles left in a
/// ledger when the owning grain deactivates become inert.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel the timer. An in-flight tick is not preempted: it settles
    /// normally and simply is not rescheduled.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

/// Host runtime recurring-timer primitive.
pub trait RecurringScheduler: Send + Sync {
    /// Schedule `tick` to run once after `due`, then every `period`
    /// thereafter, awaiting each tick future before scheduling the next.
    /// The returned handle tolerates cancellation at any time.
    fn schedule(&self, due: Duration, period: Duration, tick: TickFn) -> TimerHandle;
}

/// Default scheduler backed by a spawned tokio task.
///
/// Cancellation is cooperative: the handle signals a watch channel that the
/// task only observes while sleeping, or between a tick settling and the
/// next sleep. A started tick is therefore always awaited to completion;
/// cancelling mid-tick never discards in-flight work.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl RecurringScheduler for TokioScheduler {
    fn schedule(&self, due: Duration, period: Duration, mut tick: TickFn) -> TimerHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(due) => {}
                _ = cancel_rx.changed() => return,
            }
            loop {
                tick().await;
                if *cancel_rx.borrow() {
                    return;
                }
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = cancel_rx.changed() => return,
                }
            }
        });
        TimerHandle::new(move || {
            let _ = cancel_tx.send(true);
        })
    }
}
