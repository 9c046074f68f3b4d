//! Background revalidation loop.
//!
//! One task wakes on a fixed interval and runs
//! [`LicenseManager::revalidate_tick`]. Each tick runs in its own spawned
//! task so that a panic inside it is caught as a `JoinError`, logged, and
//! the loop carries on with the next tick. Shutdown aborts a tick that is
//! still waiting on the network; cache writes only happen after a response
//! was fully parsed, so an aborted tick leaves the cache untouched.

use crate::client::Validator;
use crate::manager::LicenseManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Handle to a running revalidation loop.
pub struct RevalidationHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RevalidationHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Revalidation loop ended abnormally");
        }
    }

    /// Whether the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start the periodic revalidation loop for `manager`.
///
/// The first tick fires one full interval after the call; startup
/// validation is [`LicenseManager::initialize`]'s job. Must be called
/// from within a Tokio runtime.
pub fn spawn_revalidation<V>(manager: Arc<LicenseManager<V>>) -> RevalidationHandle
where
    V: Validator + 'static,
{
    let period = manager.config().revalidation_interval();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run_loop(manager, period, shutdown_rx));
    RevalidationHandle { shutdown, task }
}

async fn run_loop<V>(
    manager: Arc<LicenseManager<V>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    V: Validator + 'static,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = period.as_secs(), "License revalidation loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let tick_manager = Arc::clone(&manager);
        let mut tick = tokio::spawn(async move { tick_manager.revalidate_tick().await });

        tokio::select! {
            result = &mut tick => match result {
                Ok(outcome) => debug!(?outcome, "Revalidation tick finished"),
                Err(e) => error!(error = %e, "Revalidation tick failed"),
            },
            _ = shutdown.changed() => {
                tick.abort();
                break;
            }
        }
    }

    info!("License revalidation loop stopped");
}
