//! Per-grain timer subsystem.
//!
//! Local callback timers run inside the grain without leaving it; command
//! timers instead dispatch a command back to the owning grain each tick, so
//! the recurring action re-enters ordinary command handling with its logging
//! and retry semantics. Either way, the next tick is never scheduled until
//! the current invocation's asynchronous completion settles: two ticks of
//! the same timer never overlap, even across suspension points.
//!
//! A faulting tick is logged and the timer keeps its cadence. Only
//! unregistration (or grain deactivation dropping the subsystem) stops a
//! timer.

use crate::dispatch::{CommandEnvelope, GrainCommand, SelfDispatch};
use crate::error::TimerError;
use crate::id::{GrainId, TimerId};
use crate::ledger::CallbackLedger;
use crate::scheduler::{RecurringScheduler, TickFn};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Timer activity counters
#[derive(Debug, Default)]
pub struct TimerMetrics {
    pub timers_registered: AtomicU64,
    pub timers_cancelled: AtomicU64,
    pub ticks_fired: AtomicU64,
    pub tick_faults: AtomicU64,
}

impl TimerMetrics {
    /// Get metrics snapshot
    pub fn snapshot(&self) -> TimerStats {
        TimerStats {
            timers_registered: self.timers_registered.load(Ordering::Relaxed),
            timers_cancelled: self.timers_cancelled.load(Ordering::Relaxed),
            ticks_fired: self.ticks_fired.load(Ordering::Relaxed),
            tick_faults: self.tick_faults.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time timer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStats {
    pub timers_registered: u64,
    pub timers_cancelled: u64,
    pub ticks_fired: u64,
    pub tick_faults: u64,
}

/// Timer subsystem for one grain.
///
/// Created when a grain activates and dropped when it deactivates; dropping
/// cancels every remaining timer through the ledger.
pub struct GrainTimers {
    grain: GrainId,
    scheduler: Arc<dyn RecurringScheduler>,
    dispatch: Arc<dyn SelfDispatch>,
    ledger: CallbackLedger,
    metrics: Arc<TimerMetrics>,
}

impl GrainTimers {
    pub fn new(
        grain: GrainId,
        scheduler: Arc<dyn RecurringScheduler>,
        dispatch: Arc<dyn SelfDispatch>,
    ) -> Self {
        Self {
            grain,
            scheduler,
            dispatch,
            ledger: CallbackLedger::new(grain),
            metrics: Arc::new(TimerMetrics::default()),
        }
    }

    /// Owning grain
    pub fn grain(&self) -> GrainId {
        self.grain
    }

    pub fn metrics(&self) -> Arc<TimerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Schedule `callback` to run once after `due`, then every `period`.
    ///
    /// Registering an id that is already active is rejected; unregister
    /// first if replacement is intended. A faulting tick is logged and does
    /// not cancel the timer.
    pub fn register<F, Fut>(
        &self,
        id: impl Into<TimerId>,
        due: Duration,
        period: Duration,
        callback: F,
    ) -> Result<(), TimerError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = id.into();
        // The ledger runs the duplicate check and the scheduling in one
        // critical section: a rejected registration never spawns a task.
        self.ledger.insert(id.clone(), || {
            let tick = self.tick_fn(id.clone(), callback);
            self.scheduler.schedule(due, period, tick)
        })?;
        self.metrics.timers_registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            grain_id = %self.grain,
            timer_id = %id,
            due_ms = due.as_millis() as u64,
            period_ms = period.as_millis() as u64,
            "registered timer"
        );
        Ok(())
    }

    /// Like [`register`](Self::register), but `state` is captured once here
    /// and handed to `callback` on every tick instead of the callback
    /// closing over caller state.
    pub fn register_with_state<S, F, Fut>(
        &self,
        id: impl Into<TimerId>,
        due: Duration,
        period: Duration,
        state: S,
        callback: F,
    ) -> Result<(), TimerError>
    where
        S: Send + Sync + 'static,
        F: Fn(Arc<S>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let state = Arc::new(state);
        self.register(id, due, period, move || callback(Arc::clone(&state)))
    }

    /// Register a command timer: every tick dispatches a clone of `command`
    /// back to the owning grain instead of running a local function.
    ///
    /// The id is derived from the command type, so at most one command timer
    /// per command type exists; registering again for the same type replaces
    /// the active timer. Returns the derived id. A failed dispatch is a
    /// tick fault: logged, cadence continues.
    pub fn register_command_timer<C>(&self, due: Duration, period: Duration, command: C) -> TimerId
    where
        C: GrainCommand + Clone,
    {
        let id = TimerId::for_command::<C>();
        let grain = self.grain;
        let dispatch = Arc::clone(&self.dispatch);
        // Replacement cancels the old cadence and schedules the new one in
        // one ledger critical section, so the two are never live together.
        let replaced = self.ledger.replace(id.clone(), || {
            let tick = self.tick_fn(id.clone(), move || {
                let envelope = CommandEnvelope::new(grain, command.clone());
                let dispatch = Arc::clone(&dispatch);
                async move {
                    dispatch.dispatch(envelope).await?;
                    Ok(())
                }
            });
            self.scheduler.schedule(due, period, tick)
        });
        self.metrics.timers_registered.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.metrics.timers_cancelled.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            grain_id = %self.grain,
            timer_id = %id,
            replaced,
            "registered command timer"
        );
        id
    }

    /// Cancel and release the named timer. Fails loudly for unknown ids;
    /// that is a programmer-error signal, not a recoverable condition.
    pub fn unregister(&self, id: &TimerId) -> Result<(), TimerError> {
        let handle = self.ledger.remove(id)?;
        handle.cancel();
        self.metrics.timers_cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(grain_id = %self.grain, timer_id = %id, "unregistered timer");
        Ok(())
    }

    /// Cancel the command timer for command type `C`
    pub fn unregister_command<C: GrainCommand>(&self) -> Result<(), TimerError> {
        self.unregister(&TimerId::for_command::<C>())
    }

    /// Pure query, no side effect
    pub fn is_registered(&self, id: &TimerId) -> bool {
        self.ledger.contains(id)
    }

    /// Point-in-time snapshot of active timer ids, not a live view
    pub fn registered(&self) -> Vec<TimerId> {
        self.ledger.ids()
    }

    fn tick_fn<F, Fut>(&self, id: TimerId, mut callback: F) -> TickFn
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let grain = self.grain;
        let metrics = Arc::clone(&self.metrics);
        Box::new(move || {
            let fut = callback();
            let metrics = Arc::clone(&metrics);
            let id = id.clone();
            async move {
                metrics.ticks_fired.fetch_add(1, Ordering::Relaxed);
                if let Err(fault) = fut.await {
                    metrics.tick_faults.fetch_add(1, Ordering::Relaxed);
                    // A recurring timer must not silently stop ticking
                    // because one invocation misbehaved.
                    warn!(
                        grain_id = %grain,
                        timer_id = %id,
                        fault = %format!("{fault:#}"),
                        "timer tick faulted"
                    );
                }
            }
            .boxed()
        })
    }
}

impl fmt::Debug for GrainTimers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrainTimers")
            .field("grain", &self.grain)
            .field("active_timers", &self.ledger.len())
            .finish_non_exhaustive()
    }
}
