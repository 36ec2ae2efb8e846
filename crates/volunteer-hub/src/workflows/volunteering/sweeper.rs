use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::domain::{ActivityId, ActivityQuery, ActivityStatus};
use super::repository::{RepositoryError, VolunteerStore};
use super::schedule::Clock;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Longest period the loop will wait between ticks.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of one sweep tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: Vec<ActivityId>,
    pub failed: Vec<ActivityId>,
}

/// Background task closing activities whose scheduled time has passed.
///
/// Applications are never touched; an expired activity only stops accepting new ones.
pub struct ExpirationSweeper<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl<S> ExpirationSweeper<S>
where
    S: VolunteerStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Expire every active activity scheduled strictly before now.
    ///
    /// A failed status write is logged and recorded in the report; the rest of the batch
    /// still runs.
    pub fn sweep_once(&self) -> Result<SweepReport, RepositoryError> {
        let now = self.clock.now();
        let active = self.store.activities(&ActivityQuery::active())?;
        let mut report = SweepReport {
            examined: active.len(),
            ..SweepReport::default()
        };

        for activity in active
            .iter()
            .filter(|activity| activity.activity_time < now)
        {
            match self
                .store
                .set_activity_status(activity.activity_id, ActivityStatus::Expired)
            {
                Ok(()) => {
                    info!(
                        activity_id = activity.activity_id.0,
                        title = %activity.title,
                        "activity expired, closing"
                    );
                    report.expired.push(activity.activity_id);
                }
                Err(err) => {
                    warn!(
                        activity_id = activity.activity_id.0,
                        error = %err,
                        "failed to expire activity"
                    );
                    report.failed.push(activity.activity_id);
                }
            }
        }

        Ok(report)
    }

    /// Tick every `interval` until `shutdown` is cancelled. The first tick fires one full
    /// interval after start.
    ///
    /// Periods above [`MAX_SWEEP_INTERVAL`] are clamped to it.
    pub async fn run(self, shutdown: CancellationToken) {
        let period = self.interval.min(MAX_SWEEP_INTERVAL);
        if period < self.interval {
            warn!(
                requested_secs = self.interval.as_secs(),
                interval_secs = period.as_secs(),
                "sweep interval clamped"
            );
        }
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "expiration sweeper started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match self.sweep_once() {
                    Ok(report) => debug!(
                        examined = report.examined,
                        expired = report.expired.len(),
                        failed = report.failed.len(),
                        "sweep tick finished"
                    ),
                    Err(err) => error!(error = %err, "sweep tick skipped, could not list activities"),
                },
            }
        }

        info!("expiration sweeper stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
