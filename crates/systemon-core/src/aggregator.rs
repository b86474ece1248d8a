// ── Aggregator facade ──
//
// Owns the gateway client, fleet cache, error tracker, poller and control
// dispatcher for one gateway. Reads are answered from the cache only;
// the background poller keeps the cache fresh while a consumer is active.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use systemon_api::GatewayClient;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AggregatorConfig;
use crate::control::{ControlDispatcher, ControlOutcome, ControlRequest};
use crate::diagnostics::{Diagnostics, ErrorTracker};
use crate::error::CoreError;
use crate::mapping::{DeviceMapper, MappingTable};
use crate::model::DeviceRecord;
use crate::poller::{CycleReport, Poller, PollerState};
use crate::store::{FleetCache, FleetSnapshot};

/// Entry point for consumers: one instance per gateway.
///
/// Cheaply cloneable via `Arc<AggregatorInner>`.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<AggregatorInner>,
}

struct AggregatorInner {
    config: Arc<AggregatorConfig>,
    cache: Arc<FleetCache>,
    errors: Arc<ErrorTracker>,
    poller: Arc<Poller>,
    dispatcher: ControlDispatcher,
    started: Instant,
    cancel: CancellationToken,
    /// Token shared by the running scheduler and inline refreshes; replaced
    /// by a fresh one after each `stop`.
    cancel_child: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Aggregator {
    /// Build an aggregator. Fails on configuration errors (bad mapping
    /// table, unusable URL or TLS setup); no network I/O happens here.
    pub fn new(config: AggregatorConfig) -> Result<Self, CoreError> {
        let table = match &config.mapping_path {
            Some(path) => MappingTable::load(path)?,
            None => MappingTable::builtin()?,
        };
        let client =
            GatewayClient::new(config.url.as_str(), config.api_key.as_ref(), &config.transport())?;
        Ok(Self::with_parts(config, client, table))
    }

    /// Build from an existing client and mapping table.
    pub fn with_parts(config: AggregatorConfig, client: GatewayClient, table: MappingTable) -> Self {
        let config = Arc::new(config);
        let cache = Arc::new(FleetCache::new());
        let errors = Arc::new(ErrorTracker::new());
        let poller = Arc::new(Poller::new(
            client.clone(),
            DeviceMapper::new(table),
            Arc::clone(&config),
            Arc::clone(&cache),
            Arc::clone(&errors),
        ));
        let dispatcher = ControlDispatcher::new(client, Arc::clone(&cache));
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(AggregatorInner {
                config,
                cache,
                errors,
                poller,
                dispatcher,
                started: Instant::now(),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the background poller on the current runtime. Counts as
    /// consumer activity. Calling `start` while already running is a no-op.
    pub fn start(&self) {
        let mut task = self.inner.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("poller already running");
            return;
        }

        let child = self
            .inner
            .cancel_child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        self.inner.poller.touch();
        let poller = Arc::clone(&self.inner.poller);
        *task = Some(tokio::spawn(poller.run(child)));
        info!(url = %self.inner.config.url, "aggregator started");
    }

    /// Cancel the poller and any in-flight `refresh_now`, then wait for the
    /// scheduler to exit. Cancelled fetches never reach the cache.
    pub async fn stop(&self) {
        {
            let mut child = self
                .inner
                .cancel_child
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            child.cancel();
            *child = self.inner.cancel.child_token();
        }

        let handle = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "poller task ended abnormally");
            }
        }
        info!("aggregator stopped");
    }

    /// Run one discovery + detail pass inline, ignoring the pause state.
    /// The discovery cooldown still applies, and a cycle already running
    /// in the scheduler is waited for rather than overlapped. `stop`
    /// cancels the pass.
    pub async fn refresh_now(&self) -> Result<CycleReport, CoreError> {
        let cancel = self
            .inner
            .cancel_child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.inner
            .poller
            .cycle(&cancel)
            .await
            .map_err(|_| CoreError::Internal("refresh cancelled by shutdown".into()))
    }

    /// Make the next cycle run a discovery listing even inside the
    /// metadata cooldown.
    pub fn request_discovery(&self) {
        self.inner.poller.expire_discovery();
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Every cached device. Never blocks on the network; resets the
    /// inactivity timer and makes the next per-device pass due.
    pub fn retrieve_all(&self) -> FleetSnapshot {
        self.inner.poller.on_retrieve();
        self.inner.cache.get_all()
    }

    /// Cached devices whose id is in `ids`, in cache order.
    pub fn retrieve_by_ids(&self, ids: &[String]) -> Vec<Arc<DeviceRecord>> {
        self.retrieve_all()
            .iter()
            .filter(|record| ids.contains(&record.id))
            .cloned()
            .collect()
    }

    pub fn get_diagnostics(&self) -> Diagnostics {
        Diagnostics::collect(self.inner.started, &self.inner.errors)
    }

    /// Subscribe to cache snapshots.
    pub fn subscribe(&self) -> watch::Receiver<FleetSnapshot> {
        self.inner.cache.subscribe()
    }

    pub fn poller_state(&self) -> watch::Receiver<PollerState> {
        self.inner.poller.state()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.poller.is_paused()
    }

    // ── Controls ─────────────────────────────────────────────────────

    pub async fn apply_control(
        &self,
        device_id: &str,
        property: &str,
        value: Option<&str>,
    ) -> Result<ControlOutcome, CoreError> {
        self.inner.dispatcher.apply(device_id, property, value).await
    }

    /// Apply a batch in order, stopping at the first failure. An empty
    /// batch is rejected before any request is sent.
    pub async fn apply_controls(
        &self,
        requests: &[ControlRequest],
    ) -> Result<Vec<ControlOutcome>, CoreError> {
        self.inner.dispatcher.apply_batch(requests).await
    }
}

impl Drop for AggregatorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
