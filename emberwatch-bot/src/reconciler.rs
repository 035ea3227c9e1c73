//! The periodic reconciler.
//!
//! Every tick, pick up the tracked statuses that are due, and for each one:
//! re-resolve its Discord message, take a fresh sample, append it to
//! history, render the 24h chart, publish, and stamp the row. Rows are
//! isolated from each other, so one server's broken panel or deleted
//! channel never blocks the rest, and `last_refreshed_at` only advances
//! after a fully successful cycle, so failed rows come back next tick.

use std::time::Duration;

use emberwatch_db::{Database, DbError, Sample, TrackedStatus};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::chart::{self, AxisMode, ChartError};
use crate::config::Config;
use crate::discord::{MessageStore, PublishError, StatusPost};
use crate::helpers;
use crate::panel::{SampleError, StatusSource};

/// Persistence operations the reconciler needs. Implemented by
/// [`emberwatch_db::Database`]; tests substitute a fake.
#[serenity::async_trait]
pub trait StatusStore: Send + Sync {
    async fn due_statuses(
        &self,
        now: i64,
        interval_secs: i64,
    ) -> emberwatch_db::Result<Vec<TrackedStatus>>;

    async fn bind_message(&self, id: i64, message_id: u64) -> emberwatch_db::Result<()>;

    async fn append_sample(&self, server_id: &str, sample: Sample) -> emberwatch_db::Result<()>;

    async fn sample_window(
        &self,
        server_id: &str,
        from: i64,
        to: i64,
    ) -> emberwatch_db::Result<Vec<Sample>>;

    async fn mark_refreshed(
        &self,
        id: i64,
        server_name: &str,
        server_version: &str,
        now: i64,
    ) -> emberwatch_db::Result<()>;

    async fn prune_samples_before(&self, cutoff: i64) -> emberwatch_db::Result<u64>;
}

#[serenity::async_trait]
impl StatusStore for Database {
    async fn due_statuses(
        &self,
        now: i64,
        interval_secs: i64,
    ) -> emberwatch_db::Result<Vec<TrackedStatus>> {
        Database::due_statuses(self, now, interval_secs).await
    }

    async fn bind_message(&self, id: i64, message_id: u64) -> emberwatch_db::Result<()> {
        Database::bind_message(self, id, message_id).await
    }

    async fn append_sample(&self, server_id: &str, sample: Sample) -> emberwatch_db::Result<()> {
        Database::append_sample(self, server_id.to_string(), sample).await
    }

    async fn sample_window(
        &self,
        server_id: &str,
        from: i64,
        to: i64,
    ) -> emberwatch_db::Result<Vec<Sample>> {
        Database::sample_window(self, server_id.to_string(), from, to).await
    }

    async fn mark_refreshed(
        &self,
        id: i64,
        server_name: &str,
        server_version: &str,
        now: i64,
    ) -> emberwatch_db::Result<()> {
        Database::mark_refreshed(
            self,
            id,
            server_name.to_string(),
            server_version.to_string(),
            now,
        )
        .await
    }

    async fn prune_samples_before(&self, cutoff: i64) -> emberwatch_db::Result<u64> {
        Database::prune_samples_before(self, cutoff).await
    }
}

/// Why a single row's refresh was abandoned this cycle.
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Store(#[from] DbError),
    #[error(transparent)]
    Render(#[from] ChartError),
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Minimum age before a status is refreshed again.
    pub refresh_interval: Duration,
    /// How often the loop wakes up.
    pub tick_interval: Duration,
    /// Chart lookback window.
    pub window: Duration,
    /// How many messages a channel scan inspects when rebinding.
    pub scan_limit: u8,
    /// Drop samples older than this; `None` keeps history forever.
    pub retention: Option<Duration>,
}

impl ReconcilerConfig {
    pub fn new(config: &Config) -> Self {
        Self {
            refresh_interval: config.refresh_interval,
            tick_interval: config.tick_interval,
            window: Duration::from_secs(24 * 60 * 60),
            scan_limit: 30,
            retention: (config.sample_retention_days > 0).then(|| {
                Duration::from_secs(u64::from(config.sample_retention_days) * 24 * 60 * 60)
            }),
        }
    }
}

/// What one tick accomplished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub published: u64,
    pub aborted: u64,
}

pub struct Reconciler<S, M, P> {
    store: S,
    messages: M,
    source: P,
    config: ReconcilerConfig,
}

impl<S, M, P> Reconciler<S, M, P>
where
    S: StatusStore,
    M: MessageStore,
    P: StatusSource,
{
    pub fn new(store: S, messages: M, source: P, config: ReconcilerConfig) -> Self {
        Self {
            store,
            messages,
            source,
            config,
        }
    }

    /// Run ticks forever. Ticks are serialized: a slow cycle delays the
    /// next one rather than overlapping with it.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let now = helpers::now();
            match self.tick(now).await {
                Ok(summary) if summary.published > 0 || summary.aborted > 0 => {
                    info!(
                        published = summary.published,
                        aborted = summary.aborted,
                        "reconciler tick complete"
                    );
                }
                Ok(_) => {}
                Err(err) => error!(%err, "reconciler tick failed"),
            }
        }
    }

    /// One reconciliation pass over everything that is due.
    pub async fn tick(&self, now: i64) -> emberwatch_db::Result<TickSummary> {
        if let Some(retention) = self.config.retention {
            let cutoff = now - retention.as_secs() as i64;
            // Pruning is housekeeping; a failure here must not skip the tick
            match self.store.prune_samples_before(cutoff).await {
                Ok(0) => {}
                Ok(pruned) => debug!(pruned, "dropped expired samples"),
                Err(err) => warn!(%err, "sample pruning failed"),
            }
        }

        let due = self
            .store
            .due_statuses(now, self.config.refresh_interval.as_secs() as i64)
            .await?;

        let mut summary = TickSummary::default();
        for status in due {
            match self.refresh_row(&status, now).await {
                Ok(()) => summary.published += 1,
                Err(err) => {
                    summary.aborted += 1;
                    warn!(
                        status_id = status.id,
                        server_id = %status.server_id,
                        %err,
                        "status refresh aborted, will retry next tick"
                    );
                }
            }
        }

        Ok(summary)
    }

    async fn refresh_row(&self, status: &TrackedStatus, now: i64) -> Result<(), RowError> {
        let resolved = self.resolve_message(status).await?;

        let sampled = self.source.sample(&status.server_id).await?;
        self.store
            .append_sample(&status.server_id, sampled.sample.clone())
            .await?;

        // Include the sample we just took even if its capture time landed
        // a moment after this tick's timestamp.
        let to = sampled.sample.captured_at.max(now);
        let from = to - self.config.window.as_secs() as i64;
        let window = self.store.sample_window(&status.server_id, from, to).await?;

        let axis = if status.show_max_players {
            AxisMode::FixedMax(sampled.sample.max_players)
        } else {
            AxisMode::Auto
        };
        let chart = match chart::render(&window, axis) {
            Ok(png) => Some(png),
            Err(ChartError::NoSamples) => None,
            Err(err) => return Err(err.into()),
        };

        let post = StatusPost {
            server_name: sampled.server_name.clone(),
            online: sampled.sample.online,
            player_count: sampled.sample.player_count,
            players: sampled.sample.players.clone(),
            java_address: status.java_address.clone(),
            bedrock_address: status.bedrock_address.clone(),
            server_version: sampled.server_version.clone(),
            chart,
        };

        match resolved {
            Some(message_id) => {
                self.messages
                    .edit(status.channel_id, message_id, &post)
                    .await?;
            }
            None => {
                let message_id = self.messages.send(status.channel_id, &post).await?;
                self.store.bind_message(status.id, message_id).await?;
            }
        }

        self.store
            .mark_refreshed(status.id, &sampled.server_name, &sampled.server_version, now)
            .await?;

        Ok(())
    }

    /// Figure out which message this status should publish to.
    ///
    /// The bound id is trusted only after a successful fetch. When it's
    /// gone (or was never set), scan the channel for a bot-authored message
    /// to adopt; `None` means a fresh message must be sent.
    async fn resolve_message(&self, status: &TrackedStatus) -> Result<Option<u64>, RowError> {
        if let Some(message_id) = status.message_id {
            match self.messages.fetch(status.channel_id, message_id).await {
                Ok(()) => return Ok(Some(message_id)),
                Err(PublishError::NotFound) => {
                    info!(
                        status_id = status.id,
                        message_id, "bound message is gone, scanning channel"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        let candidates = self
            .messages
            .list_recent(status.channel_id, self.config.scan_limit)
            .await?;

        let Some(newest) = candidates.iter().max_by_key(|m| (m.created_at, m.id)) else {
            return Ok(None);
        };

        if candidates.len() > 1 {
            warn!(
                status_id = status.id,
                candidates = candidates.len(),
                adopted = newest.id,
                "multiple bot messages in channel, adopting the newest"
            );
        }

        self.store.bind_message(status.id, newest.id).await?;
        Ok(Some(newest.id))
    }
}
