use crate::connection::{ConnectionRegistry, RegisteredConnection};
use crate::error::Error;
use crate::source::{Update, UpdateSource};
use crate::HubConfig;
use chrono::{DateTime, Utc};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one dispatch tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Watermark the update source was queried with.
    pub since: DateTime<Utc>,
    /// Time captured at the start of the tick; becomes the next watermark.
    pub started_at: DateTime<Utc>,
    pub visited: usize,
    pub delivered: usize,
    pub failed: usize,
    pub source_errors: usize,
}

impl TickReport {
    fn new(since: DateTime<Utc>, started_at: DateTime<Utc>) -> Self {
        Self {
            since,
            started_at,
            visited: 0,
            delivered: 0,
            failed: 0,
            source_errors: 0,
        }
    }
}

/// The periodic scan-and-deliver loop. Owns the watermark exclusively.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    source: Arc<dyn UpdateSource>,
    watermark: DateTime<Utc>,
    tick_interval: Duration,
    write_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        source: Arc<dyn UpdateSource>,
        config: &HubConfig,
    ) -> Self {
        let now = Utc::now();
        let watermark = match config.initial_watermark {
            Some(watermark) if watermark > now => {
                warn!("Initial watermark {watermark} is in the future, starting from {now}");
                now
            }
            Some(watermark) => watermark,
            None => now,
        };

        Self {
            registry,
            source,
            watermark,
            tick_interval: config.tick_interval,
            write_timeout: config.write_timeout,
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Run one scan over the registry.
    ///
    /// The watermark advances to the time captured when the tick *started*, not
    /// when the scan finished. An update stored mid-scan for an already visited
    /// user is therefore newer than the next watermark and goes out next tick.
    pub async fn tick(&mut self) -> TickReport {
        let since = self.watermark;
        let started_at = Utc::now().max(since);
        let mut report = TickReport::new(since, started_at);

        for entry in self.registry.entries() {
            // Removed after the snapshot was taken
            if !self.registry.contains(&entry.connection_id) {
                continue;
            }
            report.visited += 1;

            let update = match self.source.get_update(&entry.user_id, since).await {
                // Removed while its own query was in flight
                Ok(Some(_)) if !self.registry.contains(&entry.connection_id) => {
                    trace!(
                        "Connection {} unregistered during fetch, dropping update",
                        entry.connection_id
                    );
                    continue;
                }
                Ok(Some(update)) => update,
                Ok(None) => {
                    trace!("No update for user {} since {since}", entry.user_id);
                    continue;
                }
                Err(e) => {
                    warn!(
                        "Failed to fetch updates for user {}: {e}. Retrying next tick.",
                        entry.user_id
                    );
                    report.source_errors += 1;
                    continue;
                }
            };

            match self.deliver(&entry, &update).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to send update to connection {}: {e}. Connection will be closed.",
                        entry.connection_id
                    );
                    entry.connection.close().await;
                    self.registry.remove(&entry.connection_id);
                    report.failed += 1;
                }
            }
        }

        self.watermark = started_at;
        report
    }

    async fn deliver(&self, entry: &RegisteredConnection, update: &Update) -> Result<(), Error> {
        time::timeout(self.write_timeout, entry.connection.send(update)).await?
    }

    /// Tick every `tick_interval` until `cancel` fires.
    ///
    /// The first tick happens one interval after the loop starts. A tick in
    /// flight when cancellation arrives is abandoned without moving the watermark.
    pub async fn run(mut self, cancel: CancellationToken) {
        // interval_at panics on a zero period
        let period = self.tick_interval.max(MIN_TICK_INTERVAL);
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Dispatch loop running every {period:?} from watermark {}",
            self.watermark
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Dispatch tick abandoned on cancellation");
                    break;
                }
                report = self.tick() => {
                    debug!(
                        "Dispatch tick: visited={} delivered={} failed={} source_errors={} watermark={}",
                        report.visited,
                        report.delivered,
                        report.failed,
                        report.source_errors,
                        report.started_at
                    );
                }
            }
        }

        info!("Dispatch loop stopped at watermark {}", self.watermark);
    }
}
