//! Periodic scan and probe worker pool.
//!
//! A single scan task owns due-node selection: every tick it claims the due
//! nodes that have no check in flight and queues the claims. A fixed pool of
//! workers consumes the queue and runs each check in its own task; the claim
//! is released when that task ends, so a node never has two probes in flight
//! whatever the pool size, and a panicking check costs only its own task.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use flume::{Receiver, Sender, TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cycle::{CheckCycle, Claim};
use crate::error::MonitorError;

enum State {
    Idle,
    Running { cancel: CancellationToken, handles: Vec<JoinHandle<()>> },
    Stopped,
}

pub(crate) struct Scheduler {
    cycle: Arc<CheckCycle>,
    workers: usize,
    tick: Duration,
    queue_capacity: usize,
    state: Mutex<State>,
}

impl Scheduler {
    pub(crate) fn new(
        cycle: Arc<CheckCycle>,
        workers: usize,
        tick: Duration,
        queue_capacity: usize,
    ) -> Self {
        Self { cycle, workers, tick, queue_capacity, state: Mutex::new(State::Idle) }
    }

    /// Spawn the scan task and the workers. Cancelling `shutdown` stops them
    /// as well, but only [`Scheduler::stop`] waits for them.
    pub(crate) fn start(&self, shutdown: &CancellationToken) -> Result<(), MonitorError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, State::Idle) {
            return Err(MonitorError::AlreadyStarted);
        }

        let cancel = shutdown.child_token();
        let (queue_tx, queue_rx) = flume::bounded(self.queue_capacity);

        let mut handles = Vec::with_capacity(self.workers + 1);
        handles.push(tokio::spawn(scan_loop(
            Arc::clone(&self.cycle),
            queue_tx,
            self.tick,
            cancel.clone(),
        )));
        for worker_id in 0..self.workers {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&self.cycle),
                queue_rx.clone(),
                cancel.clone(),
            )));
        }

        info!(workers = self.workers, tick = ?self.tick, "Scheduler started");
        *state = State::Running { cancel, handles };
        Ok(())
    }

    /// Cancel the scan and workers and wait for all of them to exit, including
    /// alert sends already under way.
    pub(crate) async fn stop(&self) -> Result<(), MonitorError> {
        let (cancel, handles) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, State::Stopped) {
                State::Running { cancel, handles } => (cancel, handles),
                other => {
                    *state = other;
                    return Err(MonitorError::NotRunning);
                }
            }
        };

        cancel.cancel();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }
        self.cycle.dispatcher.drain().await;

        info!("Scheduler stopped");
        Ok(())
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(*self.state.lock().unwrap_or_else(PoisonError::into_inner), State::Running { .. })
    }
}

async fn scan_loop(
    cycle: Arc<CheckCycle>,
    queue: Sender<Claim>,
    tick: Duration,
    cancel: CancellationToken,
) {
    let mut timer = interval(tick);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }

        let claimed = cycle.in_flight.snapshot();
        let due = cycle.registry.due_nodes(Utc::now(), &claimed).await;

        for id in due {
            // Claimed since the snapshot, by a manual check.
            let Some(claim) = cycle.in_flight.claim(&id) else {
                continue;
            };

            match queue.try_send(claim) {
                Ok(()) => {}
                Err(TrySendError::Full(claim)) => {
                    debug!(node_id = %claim.id(), "Work queue full, deferring to next tick");
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    debug!("Scan loop exiting");
}

async fn worker_loop(
    worker_id: usize,
    cycle: Arc<CheckCycle>,
    queue: Receiver<Claim>,
    cancel: CancellationToken,
) {
    loop {
        let claim = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = queue.recv_async() => match job {
                Ok(claim) => claim,
                Err(_) => break,
            },
        };

        let node_id = claim.id().clone();
        let cycle = Arc::clone(&cycle);
        let check = tokio::spawn(async move {
            cycle.run(&claim).await;
        });
        if let Err(e) = check.await {
            error!(worker_id, %node_id, "Check task failed: {}", e);
        }
    }

    debug!(worker_id, "Worker exiting");
}
