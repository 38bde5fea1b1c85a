//! Periodic sweep that cancels pending bookings past their expiry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::error::BookingError;
use super::transition::{Transition, TransitionService};
use crate::store::BookingStore;

const SWEEP_DEADLINE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ExpiryReaper {
    store: Arc<dyn BookingStore>,
    transitions: TransitionService,
    interval: Duration,
}

impl ExpiryReaper {
    pub fn new(store: Arc<dyn BookingStore>, transitions: TransitionService, interval: Duration) -> Self {
        Self {
            store,
            transitions,
            interval,
        }
    }

    /// Expires every pending booking whose deadline is before `now`. A booking
    /// that fails to expire is logged and left for the next sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, BookingError> {
        let expired = self.store.expired_pending_bookings(now).await?;
        let mut report = SweepReport {
            scanned: expired.len(),
            ..SweepReport::default()
        };

        for booking_id in expired {
            match self.transitions.apply(booking_id, Transition::Expire).await {
                Ok(_) => report.expired += 1,
                Err(BookingError::InvalidTransition { status, .. }) => {
                    debug!(%booking_id, %status, "Booking settled before it could expire");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(%booking_id, error = %e, "Failed to expire booking");
                }
            }
        }
        Ok(report)
    }

    async fn run_once(&self) {
        match tokio::time::timeout(SWEEP_DEADLINE, self.sweep(Utc::now())).await {
            Ok(Ok(report)) if report.scanned > 0 => info!(
                scanned = report.scanned,
                expired = report.expired,
                failed = report.failed,
                "Expiry sweep finished"
            ),
            Ok(Ok(_)) => debug!("Expiry sweep found nothing to do"),
            Ok(Err(e)) => error!(error = %e, "Expiry sweep failed"),
            Err(_) => warn!(deadline = ?SWEEP_DEADLINE, "Expiry sweep hit its deadline"),
        }
    }

    /// Runs sweeps on a fixed interval until `shutdown` flips to `true`.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval = ?self.interval, "Expiry reaper started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while !*shutdown.borrow() {
                tokio::select! {
                    _ = ticker.tick() => self.run_once().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            info!("Expiry reaper stopped");
        })
    }
}
