//! Periodic cache sweep.
//!
//! Lazy expiry only catches records somebody asks for again; the sweep
//! removes the rest. It runs as a cancellable background task tied to the
//! server's lifecycle, so it stops on shutdown and cannot keep the process
//! alive on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use spillway_store::ResponseStore;

/// How often expired records are proactively removed.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Handle to the running sweep; cancelling (or dropping) it stops the task.
pub struct SweepGuard {
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl SweepGuard {
    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

pub fn start_sweep(store: Arc<ResponseStore>) -> SweepGuard {
    start_sweep_every(store, SWEEP_INTERVAL)
}

pub fn start_sweep_every(store: Arc<ResponseStore>, period: Duration) -> SweepGuard {
    let token = CancellationToken::new();
    let task_token = token.clone();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval yields immediately; the first sweep should wait a
        // full period rather than race startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = task_token.cancelled() => break,
                _ = ticker.tick() => match store.cleanup().await {
                    Ok(0) => {}
                    Ok(removed) => log::info!("sweep removed {removed} expired response(s)"),
                    Err(err) => log::warn!("cache sweep failed: {err}"),
                },
            }
        }
    });
    SweepGuard { token, handle }
}
