//! Tokio driver for realtime views
//!
//! Sleeps until the view's next deadline (a debounce flush or a scheduled
//! reconnect), capped at `tick_interval` so newly delivered events are
//! picked up promptly, and tears the view down when `shutdown` resolves.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use croupier_core::CroupierResult;
use croupier_state::ReconciliationResult;
use croupier_store::DataStore;

use crate::CollectionView;

/// What a driver run did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriveSummary {
    pub ticks: u64,
    pub reconciled: ReconciliationResult,
}

/// Run `view` until `shutdown` completes.
///
/// Enables realtime if the view is configured for it, performs the initial
/// fetch (a failure is left in the view's `error`), then ticks.
pub async fn drive<S, F>(
    view: &mut CollectionView<S>,
    tick_interval: Duration,
    shutdown: F,
) -> CroupierResult<DriveSummary>
where
    S: DataStore + 'static,
    F: Future<Output = ()>,
{
    let mut summary = DriveSummary::default();
    if view.config().realtime {
        view.enable_realtime(Instant::now().into_std())?;
    }
    if let Err(e) = view.fetch().await {
        tracing::warn!(collection = %view.collection(), "initial fetch failed: {}", e);
    }

    tokio::pin!(shutdown);
    loop {
        let now = Instant::now();
        summary.reconciled.absorb(view.tick(now.into_std()));
        summary.ticks += 1;

        let cap = now + tick_interval;
        let wake = view
            .next_deadline()
            .map(Instant::from_std)
            .map_or(cap, |deadline| deadline.min(cap));

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep_until(wake) => {}
        }
    }

    summary.reconciled.absorb(view.teardown());
    tracing::debug!(
        collection = %view.collection(),
        ticks = summary.ticks,
        flushes = summary.reconciled.flushes,
        "driver stopped"
    );
    Ok(summary)
}
