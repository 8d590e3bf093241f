//! Polling loop: fetches device telemetry on a fixed period and feeds the aggregator.
//!
//! The registry is queried without holding the aggregator lock, so user
//! actions (acknowledge, delete, threshold edits) can run while a fetch is in
//! flight. Results are applied under the lock in one step; a device deleted in
//! the meantime is unknown by then and its late sample is dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::aggregator::{Aggregator, DeviceView, TickOutcome};
use crate::api::{ApiClient, ApiError};
use crate::session::Session;
use crate::thresholds::{ThresholdError, ThresholdKind, Thresholds};
use crate::types::DeviceSnapshot;

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Where device telemetry comes from and where deletions go.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn fetch_devices(&self, session: &Session) -> Result<Vec<DeviceSnapshot>, ApiError>;
    async fn delete_device(&self, session: &Session, device_id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl DeviceRegistry for ApiClient {
    async fn fetch_devices(&self, session: &Session) -> Result<Vec<DeviceSnapshot>, ApiError> {
        ApiClient::fetch_devices(self, session).await
    }

    async fn delete_device(&self, session: &Session, device_id: &str) -> Result<(), ApiError> {
        ApiClient::delete_device(self, session, device_id).await
    }
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Devices the registry returned.
    pub fetched: usize,
    /// Samples accepted (known devices only).
    pub ingested: usize,
    /// Set when the fetch failed; the tick still counts.
    pub error: Option<String>,
}

pub struct Monitor<R> {
    registry: R,
    session: Session,
    state: Arc<Mutex<Aggregator>>,
}

impl<R: DeviceRegistry> Monitor<R> {
    pub fn new(registry: R, session: Session, thresholds: Thresholds) -> Self {
        Self {
            registry,
            session,
            state: Arc::new(Mutex::new(Aggregator::new(thresholds))),
        }
    }

    /// Shared handle for code that acts between ticks.
    pub fn state(&self) -> Arc<Mutex<Aggregator>> {
        Arc::clone(&self.state)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Initial listing. Returns how many devices became known.
    pub async fn load(&self) -> Result<usize, ApiError> {
        let devices = self.registry.fetch_devices(&self.session).await?;
        let added = self.state.lock().await.load(devices);
        debug!(added, "device list loaded");
        Ok(added)
    }

    pub async fn tick(&self) -> TickReport {
        let (samples, error) = match self.registry.fetch_devices(&self.session).await {
            Ok(devices) => (devices, None),
            Err(e) => {
                warn!(error = %e, "device fetch failed; no samples this tick");
                (Vec::new(), Some(e.to_string()))
            }
        };
        let fetched = samples.len();

        let mut agg = self.state.lock().await;
        let known: Vec<DeviceSnapshot> = samples
            .into_iter()
            .filter(|s| agg.contains(&s.device_id))
            .collect();
        let ingested = known.len();
        let outcome = agg.tick(known);
        TickReport {
            outcome,
            fetched,
            ingested,
            error,
        }
    }

    /// Manual refresh of one device. Feeds the current cycle like a poll does.
    pub async fn refresh(&self, device_id: &str) -> Result<bool, ApiError> {
        let devices = self.registry.fetch_devices(&self.session).await?;
        let Some(snapshot) = devices.into_iter().find(|d| d.device_id == device_id) else {
            return Ok(false);
        };
        Ok(self.state.lock().await.ingest(snapshot))
    }

    /// Delete server-side, then drop every bit of local state for the device.
    pub async fn delete(&self, device_id: &str) -> Result<bool, ApiError> {
        self.registry.delete_device(&self.session, device_id).await?;
        Ok(self.state.lock().await.remove(device_id))
    }

    pub async fn acknowledge(&self, device_id: &str) -> bool {
        self.state.lock().await.acknowledge(device_id)
    }

    pub async fn set_threshold(&self, kind: ThresholdKind, value: f64) -> Result<(), ThresholdError> {
        self.state.lock().await.set_threshold(kind, value)
    }

    pub async fn view(&self) -> Vec<DeviceView> {
        self.state.lock().await.sorted_view()
    }

    /// Tick every `period` until the future is dropped. The first tick
    /// fires one period after start; a tick never overlaps the previous one.
    pub async fn run<F>(&self, period: Duration, mut on_tick: F)
    where
        F: FnMut(&TickReport, &[DeviceView]),
    {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            let report = self.tick().await;
            let view = self.view().await;
            on_tick(&report, &view);
        }
    }
}
