//! # Scaling Task Worker
//!
//! The generic engine every pipeline stage specializes.
//!
//! ## Protocol
//!
//! ```text
//!  wake-up hint ──> check_for_work ──(gate)──> saturated / backlogged / shutting down? ──> no-op
//!                                      │
//!                                      └──> concurrency += 1, spawn unit chain
//!
//!  unit chain:  do_work ──> more && !shutdown && !backlogged ──> do_work again
//!                       └─> otherwise: concurrency -= 1, re-check input once
//! ```
//!
//! A worker never owns a thread. Units run on the task pool through
//! [`Handle::spawn_blocking`], and the wake-up pump is a small async task
//! parked on a [`Notify`].
//!
//! ## Invariant
//!
//! `0 <= concurrency <= target_concurrency`, enforced under one mutex per
//! worker.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::{WorkError, WorkResult};
use crate::shutdown::{ShutdownBroadcast, ShutdownListener, ShutdownSubscription};

/// What the worker does after a unit failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkPolicy {
    /// Treat the failure as "more work remains" and run another unit.
    Retry,
    /// End the chain; the next wake-up hint may start a new one.
    Stop,
}

/// One stage of work driven by a [`ScalingWorker`].
pub trait Stage: Send + Sync + 'static {
    /// Stage name for logs.
    fn name(&self) -> &str;

    /// Runs one unit of work. `Ok(true)` means more work remains.
    ///
    /// Implementations that take an item and then fail must have removed the
    /// item from its queue before the failure point, so a retry advances.
    fn do_work(&self) -> WorkResult;

    /// Returns true while downstream queues are too full to accept output.
    ///
    /// Evaluated without any lock shared with the queues, so it is advisory.
    fn output_backlogged(&self) -> bool {
        false
    }

    /// Returns true if the stage's input queues currently hold anything.
    fn has_pending_input(&self) -> bool;

    /// Decides how to continue after `do_work` failed.
    fn on_error(&self, _error: &WorkError) -> WorkPolicy {
        WorkPolicy::Retry
    }

    /// Called once when the worker starts shutting down.
    fn on_shutdown(&self) {}
}

/// Resolves a configured concurrency cap.
///
/// `0` means "half the available hardware parallelism, minimum 1"; any other
/// value is used as-is.
#[must_use]
pub fn resolve_target_concurrency(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    let parallelism = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    (parallelism / 2).max(1)
}

#[derive(Debug, Default)]
struct WorkerGate {
    concurrency: usize,
    shutting_down: bool,
}

/// Worker counters.
#[derive(Debug, Default)]
struct WorkerCounters {
    chains_started: AtomicU64,
    units_run: AtomicU64,
    unit_errors: AtomicU64,
    peak_concurrency: AtomicUsize,
}

/// Snapshot of a worker's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Unit chains launched by `check_for_work`.
    pub chains_started: u64,
    /// Total `do_work` invocations.
    pub units_run: u64,
    /// `do_work` invocations that failed or panicked.
    pub unit_errors: u64,
    /// Highest concurrency observed.
    pub peak_concurrency: usize,
}

/// Self-throttling runner for one [`Stage`].
pub struct ScalingWorker<S: Stage> {
    stage: S,
    target_concurrency: usize,
    gate: Mutex<WorkerGate>,
    runtime: Handle,
    counters: WorkerCounters,
}

impl<S: Stage> ScalingWorker<S> {
    /// Creates a worker. `target_concurrency` goes through
    /// [`resolve_target_concurrency`].
    #[must_use]
    pub fn new(stage: S, target_concurrency: usize, runtime: Handle) -> Arc<Self> {
        Arc::new(Self {
            stage,
            target_concurrency: resolve_target_concurrency(target_concurrency),
            gate: Mutex::new(WorkerGate::default()),
            runtime,
            counters: WorkerCounters::default(),
        })
    }

    /// The stage this worker drives.
    #[must_use]
    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Maximum number of simultaneously running units.
    #[must_use]
    pub fn target_concurrency(&self) -> usize {
        self.target_concurrency
    }

    /// Units currently running.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.gate.lock().concurrency
    }

    /// Returns true once shutdown started.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.gate.lock().shutting_down
    }

    /// Returns a snapshot of the worker counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            chains_started: self.counters.chains_started.load(Ordering::Relaxed),
            units_run: self.counters.units_run.load(Ordering::Relaxed),
            unit_errors: self.counters.unit_errors.load(Ordering::Relaxed),
            peak_concurrency: self.counters.peak_concurrency.load(Ordering::Relaxed),
        }
    }

    /// Launches one unit chain if the worker has capacity and the output is
    /// not backlogged. Returns true if a chain was launched.
    pub fn check_for_work(self: &Arc<Self>) -> bool {
        {
            let mut gate = self.gate.lock();
            if gate.shutting_down
                || gate.concurrency >= self.target_concurrency
                || self.stage.output_backlogged()
            {
                return false;
            }
            gate.concurrency += 1;
            self.counters
                .peak_concurrency
                .fetch_max(gate.concurrency, Ordering::Relaxed);
        }
        self.counters.chains_started.fetch_add(1, Ordering::Relaxed);

        let worker = Arc::clone(self);
        drop(self.runtime.spawn_blocking(move || worker.run_chain()));
        true
    }

    /// Stops new chains; running units finish and do not relaunch.
    pub fn shutdown(&self) {
        {
            let mut gate = self.gate.lock();
            if gate.shutting_down {
                return;
            }
            gate.shutting_down = true;
        }
        tracing::debug!(stage = self.stage.name(), "worker shutting down");
        self.stage.on_shutdown();
    }

    fn run_chain(self: Arc<Self>) {
        loop {
            let more = self.run_unit();

            let mut gate = self.gate.lock();
            if more && !gate.shutting_down && !self.stage.output_backlogged() {
                continue;
            }
            gate.concurrency -= 1;
            let shutting_down = gate.shutting_down;
            drop(gate);

            // An item enqueued while this chain held the last slot only
            // produced a no-op hint; pick it up here.
            if !shutting_down && self.stage.has_pending_input() {
                self.check_for_work();
            }
            return;
        }
    }

    fn run_unit(&self) -> bool {
        self.counters.units_run.fetch_add(1, Ordering::Relaxed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.stage.do_work()))
            .unwrap_or_else(|payload| Err(WorkError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(more) => more,
            Err(error) => {
                self.counters.unit_errors.fetch_add(1, Ordering::Relaxed);
                let policy = self.stage.on_error(&error);
                tracing::warn!(
                    stage = self.stage.name(),
                    %error,
                    ?policy,
                    "work unit failed"
                );
                policy == WorkPolicy::Retry
            }
        }
    }
}

impl<S: Stage> ShutdownListener for ScalingWorker<S> {
    fn on_shutdown(&self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A running worker: the worker itself, its wake-up pump and its shutdown
/// subscription. Dropping the handle disposes of all three.
pub struct WorkerHandle<S: Stage> {
    worker: Arc<ScalingWorker<S>>,
    waker: Arc<Notify>,
    pump: JoinHandle<()>,
    _subscription: ShutdownSubscription,
}

impl<S: Stage> WorkerHandle<S> {
    /// Builds a worker, subscribes it to `shutdown` and starts its pump.
    ///
    /// Register [`waker`](Self::waker) on every queue whose events should
    /// wake this worker.
    #[must_use]
    pub fn spawn(
        stage: S,
        target_concurrency: usize,
        runtime: &Handle,
        shutdown: &ShutdownBroadcast,
    ) -> Self {
        let worker = ScalingWorker::new(stage, target_concurrency, runtime.clone());
        let subscription = shutdown.subscribe(worker.clone());
        let waker = Arc::new(Notify::new());

        let pump = {
            let worker = Arc::clone(&worker);
            let waker = Arc::clone(&waker);
            runtime.spawn(async move {
                loop {
                    waker.notified().await;
                    if worker.is_shutting_down() {
                        break;
                    }
                    worker.check_for_work();
                }
            })
        };

        tracing::debug!(
            stage = worker.stage().name(),
            target_concurrency = worker.target_concurrency(),
            "worker started"
        );

        Self {
            worker,
            waker,
            pump,
            _subscription: subscription,
        }
    }

    /// The wake-up target to register on queues.
    #[must_use]
    pub fn waker(&self) -> &Arc<Notify> {
        &self.waker
    }

    /// Sends a wake-up hint directly.
    pub fn wake(&self) {
        self.waker.notify_one();
    }

    /// The underlying worker.
    #[must_use]
    pub fn worker(&self) -> &Arc<ScalingWorker<S>> {
        &self.worker
    }

    /// The stage this worker drives.
    #[must_use]
    pub fn stage(&self) -> &S {
        self.worker.stage()
    }
}

impl<S: Stage> Drop for WorkerHandle<S> {
    fn drop(&mut self) {
        self.worker.shutdown();
        self.pump.abort();
    }
}
