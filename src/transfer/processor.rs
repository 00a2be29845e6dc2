//! Backpressure Processor
//!
//! Long-running pull loop that drains the pending collection into the applier.
//!
//! # Architecture
//!
//! ```text
//!                 capacity (Semaphore, max_in_flight permits)
//!                   │ acquire n                    ▲ release 1 per applied id
//!                   ▼                              │
//! ┌──────────────┐  n + in_flight ids   ┌─────────┴────┐
//! │  fetch task  │ ───── mpsc ────────▶ │ worker tasks │ ──▶ TransferExecutor::apply
//! │ oldest-N     │   (at most n new)    │  (workers)   │
//! └──────────────┘                      └──────────────┘
//! ```
//!
//! Demand is explicit: a cycle takes every free permit (at least one, waiting
//! if necessary), so it never emits more ids than the workers can hold. Ids
//! already in flight are skipped, so a slow transfer is not dispatched twice
//! while it is still being applied.
//!
//! # Fault tolerance
//!
//! Each fetch+emit cycle runs under `fetch_timeout`. A timeout or a store
//! error aborts the cycle, returns its unused permits, and the loop restarts
//! after the delay given by [`RetryPolicy`]. Retries never stop.
//!
//! # Shutdown
//!
//! [`ProcessorHandle::stop`] signals every task and joins them. An apply call
//! already running completes; ids still queued are abandoned and stay pending
//! in the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::applier::{ApplyOutcome, TransferApplier};
use crate::core_types::TransferId;
use crate::store::StoreError;

// ============================================================
// EXECUTOR SEAM
// ============================================================

/// What the processor drives: a pending-id source and an applier
#[async_trait]
pub trait TransferExecutor: Send + Sync + 'static {
    /// Ids of up to `limit` oldest pending transfers
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<TransferId>, StoreError>;

    /// Resolve one transfer; never fails
    async fn apply(&self, id: TransferId) -> ApplyOutcome;
}

#[async_trait]
impl TransferExecutor for TransferApplier {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<TransferId>, StoreError> {
        self.store().oldest_pending(limit).await
    }

    async fn apply(&self, id: TransferId) -> ApplyOutcome {
        TransferApplier::apply(self, id).await
    }
}

// ============================================================
// CONFIGURATION
// ============================================================

/// Delay before restarting after a failed or timed-out cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Restart right away
    Immediate,
    /// Double the delay on each consecutive failure, from `initial` up to `max`
    Exponential { initial: Duration, max: Duration },
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            RetryPolicy::Immediate => Duration::ZERO,
            RetryPolicy::Exponential { initial, max } => {
                let factor = 1u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Exponential {
            initial: Duration::from_millis(10),
            max: Duration::from_secs(1),
        }
    }
}

/// Configuration for the transfer processor
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Number of worker tasks invoking the applier
    pub workers: usize,
    /// Maximum ids dispatched but not yet applied
    pub max_in_flight: usize,
    /// Upper bound on one fetch+emit cycle
    pub fetch_timeout: Duration,
    /// Sleep after a cycle that dispatched nothing
    pub idle_poll: Duration,
    pub retry: RetryPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_in_flight: 64,
            fetch_timeout: Duration::from_secs(2),
            idle_poll: Duration::from_millis(50),
            retry: RetryPolicy::default(),
        }
    }
}

// ============================================================
// STATS
// ============================================================

/// Processor counters
#[derive(Debug, Default)]
pub struct ProcessorStats {
    pub cycles: AtomicU64,
    pub fetched: AtomicU64,
    pub dispatched: AtomicU64,
    pub done: AtomicU64,
    pub failed: AtomicU64,
    pub duplicates: AtomicU64,
    pub requeued: AtomicU64,
    pub cycle_errors: AtomicU64,
    pub cycle_timeouts: AtomicU64,
}

impl ProcessorStats {
    fn record(&self, outcome: &ApplyOutcome) {
        let counter = match outcome {
            ApplyOutcome::Done => &self.done,
            ApplyOutcome::Failed(_) => &self.failed,
            ApplyOutcome::AlreadyConsumed => &self.duplicates,
            ApplyOutcome::Requeued => &self.requeued,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessorStatsSnapshot {
        ProcessorStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            done: self.done.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            cycle_errors: self.cycle_errors.load(Ordering::Relaxed),
            cycle_timeouts: self.cycle_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of processor stats (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessorStatsSnapshot {
    pub cycles: u64,
    pub fetched: u64,
    pub dispatched: u64,
    pub done: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub requeued: u64,
    pub cycle_errors: u64,
    pub cycle_timeouts: u64,
}

impl ProcessorStatsSnapshot {
    /// Transfers that reached a terminal status
    pub fn resolved(&self) -> u64 {
        self.done + self.failed
    }
}

impl std::fmt::Display for ProcessorStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Processor Stats: cycles={} (errors={}, timeouts={}), fetched={}, dispatched={}, done={}, failed={}, duplicates={}, requeued={}",
            self.cycles,
            self.cycle_errors,
            self.cycle_timeouts,
            self.fetched,
            self.dispatched,
            self.done,
            self.failed,
            self.duplicates,
            self.requeued
        )
    }
}

// ============================================================
// PROCESSOR
// ============================================================

struct Shared {
    executor: Arc<dyn TransferExecutor>,
    config: ProcessorConfig,
    capacity: Semaphore,
    in_flight: DashSet<TransferId>,
    stats: Arc<ProcessorStats>,
}

/// Entry point for the backpressure processor
pub struct TransferProcessor;

impl TransferProcessor {
    /// Spawn the fetch task and worker tasks on the current tokio runtime
    pub fn start(executor: Arc<dyn TransferExecutor>, config: ProcessorConfig) -> ProcessorHandle {
        let mut config = config;
        config.workers = config.workers.max(1);
        config.max_in_flight = config.max_in_flight.clamp(1, Semaphore::MAX_PERMITS);

        info!(
            workers = config.workers,
            max_in_flight = config.max_in_flight,
            fetch_timeout_ms = config.fetch_timeout.as_millis() as u64,
            idle_poll_ms = config.idle_poll.as_millis() as u64,
            retry = ?config.retry,
            "Starting transfer processor"
        );

        let stats = Arc::new(ProcessorStats::default());
        let shared = Arc::new(Shared {
            executor,
            capacity: Semaphore::new(config.max_in_flight),
            in_flight: DashSet::new(),
            stats: Arc::clone(&stats),
            config,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue_tx, queue_rx) = mpsc::channel(shared.config.max_in_flight);
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let mut tasks = Vec::with_capacity(shared.config.workers + 1);
        tasks.push(tokio::spawn(fetch_loop(
            Arc::clone(&shared),
            queue_tx,
            shutdown_rx.clone(),
        )));
        for worker_id in 0..shared.config.workers {
            tasks.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&shared),
                Arc::clone(&queue_rx),
                shutdown_rx.clone(),
            )));
        }

        ProcessorHandle {
            shutdown: shutdown_tx,
            tasks,
            stats,
        }
    }
}

/// Owned handle to a running processor
///
/// Dropping the handle signals shutdown without waiting for the tasks.
pub struct ProcessorHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    stats: Arc<ProcessorStats>,
}

impl ProcessorHandle {
    pub fn stats(&self) -> ProcessorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Live counters, for reporting after the handle is moved
    pub fn shared_stats(&self) -> Arc<ProcessorStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow() && self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Signal shutdown and wait for every task to exit
    pub async fn stop(mut self) {
        self.shutdown.send_replace(true);

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "Processor task ended abnormally");
            }
        }

        info!(stats = %self.stats.snapshot(), "Transfer processor stopped");
    }
}

impl Drop for ProcessorHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Wait for either `duration` or shutdown; true means shutdown
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if duration.is_zero() {
        tokio::task::yield_now().await;
        return *shutdown.borrow();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.changed() => true,
    }
}

/// Take every free permit, waiting for at least one
async fn acquire_demand(capacity: &Semaphore) -> Option<usize> {
    capacity.acquire().await.ok()?.forget();

    let extra = u32::try_from(capacity.available_permits()).unwrap_or(u32::MAX);
    let rest = match capacity.try_acquire_many(extra) {
        Ok(permits) => {
            permits.forget();
            extra as usize
        }
        Err(_) => 0,
    };
    Some(1 + rest)
}

/// One fetch+emit cycle; `emitted` survives a timeout
async fn run_cycle(
    shared: &Shared,
    queue: &mpsc::Sender<TransferId>,
    demand: usize,
    emitted: &mut usize,
) -> Result<(), StoreError> {
    let limit = demand.saturating_add(shared.in_flight.len());
    let ids = shared.executor.fetch_pending(limit).await?;
    shared
        .stats
        .fetched
        .fetch_add(ids.len() as u64, Ordering::Relaxed);

    for id in ids {
        if *emitted >= demand {
            break;
        }
        if !shared.in_flight.insert(id) {
            continue;
        }
        // Every queued id holds a permit, so the queue has room
        if queue.try_send(id).is_err() {
            shared.in_flight.remove(&id);
            break;
        }
        *emitted += 1;
    }

    shared
        .stats
        .dispatched
        .fetch_add(*emitted as u64, Ordering::Relaxed);
    Ok(())
}

async fn fetch_loop(
    shared: Arc<Shared>,
    queue: mpsc::Sender<TransferId>,
    mut shutdown: watch::Receiver<bool>,
) {
    let config = &shared.config;
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let demand = tokio::select! {
            _ = shutdown.changed() => break,
            demand = acquire_demand(&shared.capacity) => match demand {
                Some(n) => n,
                None => break,
            },
        };

        shared.stats.cycles.fetch_add(1, Ordering::Relaxed);
        let mut emitted = 0usize;
        let result = tokio::time::timeout(
            config.fetch_timeout,
            run_cycle(&shared, &queue, demand, &mut emitted),
        )
        .await;
        shared.capacity.add_permits(demand - emitted);

        let delay = match result {
            Ok(Ok(())) => {
                failures = 0;
                debug!(demand, emitted, "Fetch cycle complete");
                if emitted == 0 { config.idle_poll } else { Duration::ZERO }
            }
            Ok(Err(e)) => {
                failures = failures.saturating_add(1);
                shared.stats.cycle_errors.fetch_add(1, Ordering::Relaxed);
                let delay = config.retry.delay(failures);
                warn!(
                    error = %e,
                    attempt = failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "Fetch cycle failed, restarting"
                );
                delay
            }
            Err(_) => {
                failures = failures.saturating_add(1);
                shared.stats.cycle_timeouts.fetch_add(1, Ordering::Relaxed);
                let delay = config.retry.delay(failures);
                warn!(
                    timeout_ms = config.fetch_timeout.as_millis() as u64,
                    emitted,
                    attempt = failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "Fetch cycle timed out, restarting"
                );
                delay
            }
        };

        if pause(delay, &mut shutdown).await {
            break;
        }
    }

    debug!("Fetch loop exited");
}

async fn worker_loop(
    worker_id: usize,
    shared: Arc<Shared>,
    queue: Arc<Mutex<mpsc::Receiver<TransferId>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.changed() => None,
                id = queue.recv() => id,
            }
        };
        let Some(id) = next else {
            break;
        };

        let outcome = shared.executor.apply(id).await;
        debug!(worker_id, transfer_id = %id, %outcome, "Transfer dispatched");
        shared.stats.record(&outcome);
        shared.in_flight.remove(&id);
        shared.capacity.add_permits(1);
    }

    debug!(worker_id, "Processor worker exited");
}
