// ── Background fleet poller ──
//
// One scheduler task per aggregator. Each tick decides between doing
// nothing (paused or cooling down) and running one cycle: an optional
// discovery listing followed by bounded-concurrency detail fetches that
// are all joined before the cooldown starts.

pub mod schedule;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use strum::Display;
use systemon_api::GatewayClient;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::AggregatorConfig;
use crate::diagnostics::ErrorTracker;
use crate::error::CoreError;
use crate::mapping::DeviceMapper;
use crate::store::FleetCache;

pub use schedule::{PollSchedule, worker_pool_size};

/// Observable scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum PollerState {
    Idle,
    CheckPaused,
    Discovering,
    FetchingDetails,
    AwaitingCompletion,
    Cooldown,
}

/// The cycle was abandoned because shutdown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Ids kept from the listing, or `None` when discovery did not run
    /// (cooldown, hardware-id-only mode, or failure).
    pub discovered: Option<usize>,
    /// Ids evicted by the listing.
    pub evicted: Vec<String>,
    /// Detail fetches per outcome.
    pub merged: usize,
    pub skipped: usize,
    pub removed: usize,
    pub failed: usize,
    /// Width of the fetch pool used.
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Merged,
    Skipped,
    Removed,
    Failed,
}

/// Shared poller state. The aggregator owns it and the scheduler task
/// holds a clone of the `Arc`.
pub(crate) struct Poller {
    client: GatewayClient,
    mapper: DeviceMapper,
    config: Arc<AggregatorConfig>,
    cache: Arc<FleetCache>,
    errors: Arc<ErrorTracker>,
    schedule: Mutex<PollSchedule>,
    state: watch::Sender<PollerState>,
    /// Held for a whole cycle so scheduler ticks and `refresh_now` never overlap.
    cycle_guard: tokio::sync::Mutex<()>,
}

impl Poller {
    pub(crate) fn new(
        client: GatewayClient,
        mapper: DeviceMapper,
        config: Arc<AggregatorConfig>,
        cache: Arc<FleetCache>,
        errors: Arc<ErrorTracker>,
    ) -> Self {
        let (state, _) = watch::channel(PollerState::Idle);
        Self {
            client,
            mapper,
            config,
            cache,
            errors,
            schedule: Mutex::new(PollSchedule::new(Instant::now())),
            state,
            cycle_guard: tokio::sync::Mutex::new(()),
        }
    }

    // ── Consumer hooks ───────────────────────────────────────────────

    /// Consumer read: resume polling and make the next iteration due now.
    pub(crate) fn on_retrieve(&self) {
        let now = Instant::now();
        let mut schedule = self.lock_schedule();
        schedule.touch(now);
        schedule.force_iteration(now);
    }

    pub(crate) fn expire_discovery(&self) {
        self.lock_schedule().expire_discovery();
    }

    pub(crate) fn touch(&self) {
        self.lock_schedule().touch(Instant::now());
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.lock_schedule().is_paused()
    }

    pub(crate) fn state(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    // ── Scheduler loop ───────────────────────────────────────────────

    /// Run until `cancel` fires.
    pub(crate) async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            models = ?self.config.model_filter,
            hardware_ids = self.config.hardware_id_filter.len(),
            "poller started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if self.iteration(&cancel).await.is_err() {
                        break;
                    }
                }
            }
        }

        self.set_state(PollerState::Idle);
        info!("poller stopped");
    }

    /// One tick: pause check, then a full cycle when the iteration is due.
    async fn iteration(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        self.set_state(PollerState::CheckPaused);
        let now = Instant::now();
        let (paused, due) = {
            let mut schedule = self.lock_schedule();
            let paused = schedule.check_paused(now, self.config.inactivity_timeout);
            (paused, schedule.iteration_due(now))
        };

        if paused {
            trace!("consumer inactive, polling paused");
        } else if due {
            let report = self.cycle(cancel).await?;
            debug!(?report, "poll cycle complete");

            self.set_state(PollerState::Cooldown);
            self.lock_schedule()
                .iteration_finished(Instant::now(), self.config.cycle_delay);
        }

        self.set_state(PollerState::Idle);
        Ok(())
    }

    /// Discovery (when due) followed by the detail fetch barrier. Cycles
    /// are serialized: a caller arriving mid-cycle waits for it to finish.
    pub(crate) async fn cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, Cancelled> {
        let _cycle = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Cancelled),
            guard = self.cycle_guard.lock() => guard,
        };
        let mut report = CycleReport::default();

        self.set_state(PollerState::Discovering);
        let discovered = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Cancelled),
            listed = self.discover() => listed,
        };
        if let Some((ids, evicted)) = &discovered {
            report.discovered = Some(ids.len());
            report.evicted.clone_from(evicted);
        }

        let tracked = self.tracked_ids(discovered.map(|(ids, _)| ids));
        report.workers = if self.config.hardware_id_filter.is_empty() {
            1
        } else {
            worker_pool_size(tracked.len())
        };

        self.set_state(PollerState::FetchingDetails);
        let fetches = stream::iter(tracked)
            .map(|id| self.fetch_detail(id))
            .buffer_unordered(report.workers)
            .collect::<Vec<_>>();

        self.set_state(PollerState::AwaitingCompletion);
        let outcomes = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Cancelled),
            outcomes = fetches => outcomes,
        };

        for outcome in outcomes {
            match outcome {
                FetchOutcome::Merged => report.merged += 1,
                FetchOutcome::Skipped => report.skipped += 1,
                FetchOutcome::Removed => report.removed += 1,
                FetchOutcome::Failed => report.failed += 1,
            }
        }
        Ok(report)
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// List devices and reconcile the cache. Returns the kept ids and the
    /// evicted ids, or `None` when the listing did not run or failed.
    async fn discover(&self) -> Option<(Vec<String>, Vec<String>)> {
        if self.config.id_only_mode() {
            return None;
        }
        let populated = !self.cache.is_empty();
        if !self.lock_schedule().discovery_due(Instant::now(), populated) {
            trace!("discovery cooling down");
            return None;
        }

        let payloads = match self
            .client
            .list_devices(&self.config.model_filter, self.config.devices_per_page)
            .await
        {
            Ok(payloads) => payloads,
            Err(e) => {
                let err = CoreError::from(e);
                warn!(error = %err, "device listing failed");
                self.errors.record(err.category(), None, &err.to_string());
                return None;
            }
        };

        let allow = &self.config.hardware_id_filter;
        let mut records = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            match self.mapper.map(payload, None) {
                Ok(record) if allow.is_empty() || allow.contains(&record.id) => {
                    records.push(record);
                }
                Ok(record) => trace!(hardware_id = %record.id, "listed device outside id filter"),
                Err(e) => warn!(error = %e, "skipping unmappable listing entry"),
            }
        }

        let mut ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        ids.sort_unstable();
        ids.dedup();

        // Filtered ids survive a listing that omits them; an empty
        // unfiltered listing therefore empties the cache.
        let keep: HashSet<String> = ids.iter().chain(allow.iter()).cloned().collect();
        let (stats, evicted) = self.cache.sync_listing(records, &keep);

        self.lock_schedule()
            .discovery_succeeded(Instant::now(), self.config.metadata_refresh());
        self.errors.clear_global();
        info!(
            listed = payloads.len(),
            inserted = stats.inserted,
            updated = stats.updated,
            evicted = evicted.len(),
            "discovery complete"
        );
        Some((ids, evicted))
    }

    /// Ids to fetch this cycle: the hardware-id filter, else the ids just
    /// discovered, else whatever is cached.
    fn tracked_ids(&self, discovered: Option<Vec<String>>) -> Vec<String> {
        if !self.config.hardware_id_filter.is_empty() {
            return self.config.hardware_id_filter.clone();
        }
        discovered.unwrap_or_else(|| self.cache.ids())
    }

    // ── Detail fetch ─────────────────────────────────────────────────

    async fn fetch_detail(&self, id: String) -> FetchOutcome {
        let payload = match self.client.get_device(&id).await {
            Ok(payload) => payload,
            Err(e) => {
                let err = CoreError::from(e);
                warn!(hardware_id = %id, error = %err, "device detail fetch failed");
                self.errors.record(err.category(), Some(&id), &err.to_string());
                return FetchOutcome::Failed;
            }
        };

        let record = match self.mapper.map(&payload, Some(&id)) {
            Ok(record) => record,
            Err(err) => {
                warn!(hardware_id = %id, error = %err, "evicting device with unusable payload");
                self.cache.remove(&id);
                self.errors.record(err.category(), Some(&id), &err.to_string());
                return FetchOutcome::Removed;
            }
        };

        let models = &self.config.model_filter;
        if !models.is_empty() && !models.iter().any(|m| m.eq_ignore_ascii_case(&record.model)) {
            debug!(hardware_id = %id, model = %record.model, "model outside filter, skipping");
            return FetchOutcome::Skipped;
        }

        self.cache
            .upsert_bulk(vec![record], self.config.full_detail_refresh);
        self.errors.clear_matching(&id);
        FetchOutcome::Merged
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn set_state(&self, state: PollerState) {
        self.state.send_replace(state);
    }

    fn lock_schedule(&self) -> MutexGuard<'_, PollSchedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
