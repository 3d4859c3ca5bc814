//! RolloverLoop - 日付が変わったら OverdueProcessor を回す
//!
//! # フロー
//! 1. tokio の interval で Clock を定期的に確認
//! 2. 前回処理した日付と違えば `Tracker::roll_over(today)`
//! 3. 失敗したら日付を進めず、次の tick で再試行
//!
//! `shutdown_tx` に true を送る（または drop する）とループが止まります。

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::tracker::Tracker;

/// Handle of the background rollover task.
pub struct RolloverLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RolloverLoop {
    /// Spawn with the tracker's configured poll interval.
    ///
    /// `last_processed` is the date already rolled over (if known); the first
    /// tick processes today unless it equals that date.
    pub fn spawn(tracker: Arc<Tracker>, last_processed: Option<NaiveDate>) -> Self {
        let interval = tracker.config().rollover_poll_interval();
        Self::spawn_with_interval(tracker, last_processed, interval)
    }

    pub fn spawn_with_interval(
        tracker: Arc<Tracker>,
        last_processed: Option<NaiveDate>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(rollover_loop(tracker, last_processed, interval, shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            error!(error = %e, "rollover loop panicked");
        }
    }
}

async fn rollover_loop(
    tracker: Arc<Tracker>,
    mut last_processed: Option<NaiveDate>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(?interval, ?last_processed, "rollover loop started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tick.tick() => {}
        }

        let today = tracker.today();
        if last_processed == Some(today) {
            continue;
        }

        match tracker.roll_over(today).await {
            Ok(report) => {
                debug!(
                    date = %today,
                    streak_resets = report.streak_resets.len(),
                    rescheduled = report.rescheduled.len(),
                    purged = report.purged.len(),
                    "date advanced"
                );
                last_processed = Some(today);
            }
            Err(e) => error!(date = %today, error = %e, "rollover failed; retrying next tick"),
        }
    }

    info!("rollover loop stopped");
}
