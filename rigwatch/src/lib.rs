//! rigwatch: device-telemetry aggregation over a REST device registry.
//!
//! The [`aggregator`] is the core: it buffers per-device samples, folds them
//! into sticky peaks every few ticks and derives threshold warnings. The rest
//! of the crate feeds it ([`api`], [`poller`]) and keeps the operator's
//! context around it ([`session`], [`profiles`], [`inbox`]).

pub mod aggregator;
pub mod api;
pub mod history;
pub mod inbox;
pub mod poller;
pub mod profiles;
pub mod session;
pub mod store;
pub mod thresholds;
pub mod types;
pub mod warnings;

pub use aggregator::{
    min_max_temperature, Aggregator, DevicePeaks, DeviceView, TempRange, TickOutcome, CYCLE_TICKS,
};
pub use api::{ApiClient, ApiError, DEFAULT_API_URL};
pub use inbox::Inbox;
pub use poller::{DeviceRegistry, Monitor, TickReport, DEFAULT_POLL_INTERVAL};
pub use session::{Session, SessionStore};
pub use thresholds::{TempBand, ThresholdError, ThresholdKind, Thresholds};
pub use types::{DeviceSnapshot, Message, Reading};
pub use warnings::Warning;
