//! Background sweeper that rejects stale pending approvals.
//!
//! The expirer runs [`Handler::expire_approvals`] on a fixed cadence. Each
//! sweep is bounded by a timeout, and a failed sweep only increments the
//! error counter — the loop keeps running. A spawned expirer is owned by an
//! [`ExpirerHandle`] that stops it on graceful shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::handler::Handler;

/// Timing configuration for the sweeper.
#[derive(Debug, Clone)]
pub struct ExpirerConfig {
    /// How often a sweep runs.
    pub interval: Duration,

    /// Upper bound on one sweep's list/reject loop.
    pub sweep_timeout: Duration,
}

impl Default for ExpirerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            sweep_timeout: Duration::from_secs(10),
        }
    }
}

/// Counters accumulated across sweeps.
///
/// Exposed so deployments can export them and tests can assert on them;
/// each sweep also logs the same values as structured tracing fields.
#[derive(Debug, Default)]
pub struct SweepStats {
    sweeps: AtomicU64,
    errors: AtomicU64,
    expired: AtomicU64,
    last_latency_ms: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl SweepStats {
    /// Sweeps attempted.
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Sweeps that failed or timed out.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Approvals expired across all sweeps.
    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    /// Latency of the most recent sweep.
    pub fn last_latency_ms(&self) -> u64 {
        self.last_latency_ms.load(Ordering::Relaxed)
    }

    /// Cumulative sweep latency.
    pub fn total_latency_ms(&self) -> u64 {
        self.total_latency_ms.load(Ordering::Relaxed)
    }
}

/// Periodic approval expiry loop.
pub struct ApprovalExpirer {
    handler: Handler,
    config: ExpirerConfig,
}

/// Owns a running expirer; dropping it does not stop the loop, call
/// [`ExpirerHandle::shutdown`] for a clean stop.
pub struct ExpirerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
    stats: Arc<SweepStats>,
}

impl ExpirerHandle {
    /// Counter snapshot handle.
    pub fn stats(&self) -> Arc<SweepStats> {
        Arc::clone(&self.stats)
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.join.await;
    }
}

impl ApprovalExpirer {
    /// Create an expirer over a handler.
    pub fn new(handler: Handler, config: ExpirerConfig) -> Self {
        Self { handler, config }
    }

    /// Spawn the loop. The expirer is restartable: constructing and
    /// spawning a new one after shutdown picks up where the old one left
    /// off, since all state lives in the approval store.
    pub fn spawn(self) -> ExpirerHandle {
        let stats = Arc::new(SweepStats::default());
        let token = CancellationToken::new();

        let loop_stats = Arc::clone(&stats);
        let loop_token = token.clone();
        let join = tokio::spawn(async move {
            self.run(loop_token, loop_stats).await;
        });

        ExpirerHandle { token, join, stats }
    }

    async fn run(self, token: CancellationToken, stats: Arc<SweepStats>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            self.sweep(&token, &stats).await;
        }
    }

    async fn sweep(&self, token: &CancellationToken, stats: &SweepStats) {
        let started = Instant::now();
        stats.sweeps.fetch_add(1, Ordering::Relaxed);

        let result = tokio::time::timeout(
            self.config.sweep_timeout,
            self.handler.expire_approvals(token.child_token()),
        )
        .await;

        let latency_ms = started.elapsed().as_millis() as u64;
        stats.last_latency_ms.store(latency_ms, Ordering::Relaxed);
        stats.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        match result {
            Ok(Ok(expired)) => {
                stats.expired.fetch_add(expired as u64, Ordering::Relaxed);
                info!(
                    sweep.count = stats.sweeps(),
                    sweep.error.count = stats.errors(),
                    expired.count = expired,
                    sweep.latency_ms = latency_ms,
                    sweep.total_latency_ms = stats.total_latency_ms(),
                    "approval expiry sweep finished"
                );
            }
            Ok(Err(err)) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    sweep.count = stats.sweeps(),
                    sweep.error.count = stats.errors(),
                    sweep.latency_ms = latency_ms,
                    error = %err,
                    "approval expiry sweep failed"
                );
            }
            Err(_) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    sweep.count = stats.sweeps(),
                    sweep.error.count = stats.errors(),
                    sweep.latency_ms = latency_ms,
                    "approval expiry sweep timed out"
                );
            }
        }
    }
}
