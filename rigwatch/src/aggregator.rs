//! Telemetry aggregation: per-device sample buffers, sticky peaks, warning state.
//!
//! The aggregator is driven by ticks. Every tick ingests the fresh snapshots
//! of known devices; every fourth tick closes a cycle: the buffered samples
//! are folded into each device's peaks (which only ever grow), the buffers
//! are emptied and acknowledged warnings are re-armed.

use std::cmp::Reverse;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::history::DeviceHistory;
use crate::thresholds::{ThresholdError, ThresholdKind, Thresholds};
use crate::types::{valid_temperature, DeviceSnapshot, Reading};
use crate::warnings::{self, Warning};

/// Ticks per aggregation cycle.
pub const CYCLE_TICKS: u32 = 4;

/// Peak usage seen for one disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskPeak {
    pub key: String,
    pub value: f64,
}

impl DiskPeak {
    pub fn label(&self) -> &str {
        self.key.split_whitespace().next().unwrap_or(&self.key)
    }
}

/// Highest values observed for a device. `None` means never observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DevicePeaks {
    pub cpu_temp: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub gpu_usage: Option<f64>,
    pub ram_usage: Option<f64>,
    pub disks: Vec<DiskPeak>,
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

impl DevicePeaks {
    /// Peaks over a window of samples. Categories missing from every sample stay `None`.
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a DeviceSnapshot>) -> Self {
        let mut out = DevicePeaks::default();
        for s in samples {
            out.cpu_temp = max_opt(out.cpu_temp, s.cpu_temperatures().reduce(f64::max));
            out.cpu_usage = max_opt(out.cpu_usage, s.cpu_usage());
            out.gpu_temp = max_opt(out.gpu_temp, s.gpu_temperatures().reduce(f64::max));
            out.gpu_usage = max_opt(out.gpu_usage, s.gpu_usage());
            out.ram_usage = max_opt(out.ram_usage, s.ram_usage());
            for (entry, usage) in s.disk_usages() {
                out.raise_disk(&entry.key, usage);
            }
        }
        out
    }

    fn raise_disk(&mut self, key: &str, value: f64) {
        match self.disks.iter_mut().find(|d| d.key == key) {
            Some(d) => d.value = d.value.max(value),
            None => self.disks.push(DiskPeak {
                key: key.to_string(),
                value,
            }),
        }
    }

    /// Field-wise max. Never lowers an existing peak.
    pub fn merged(&self, other: &DevicePeaks) -> DevicePeaks {
        let mut out = DevicePeaks {
            cpu_temp: max_opt(self.cpu_temp, other.cpu_temp),
            cpu_usage: max_opt(self.cpu_usage, other.cpu_usage),
            gpu_temp: max_opt(self.gpu_temp, other.gpu_temp),
            gpu_usage: max_opt(self.gpu_usage, other.gpu_usage),
            ram_usage: max_opt(self.ram_usage, other.ram_usage),
            disks: self.disks.clone(),
        };
        for d in &other.disks {
            out.raise_disk(&d.key, d.value);
        }
        out
    }
}

/// Hottest and coolest temperature of one reading set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempRange {
    pub max: f64,
    pub min: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Max and min over the temperature readings, rounded to two decimals.
/// `None` when the set has no valid temperature.
pub fn min_max_temperature(readings: &[Reading]) -> Option<TempRange> {
    let mut temps = readings
        .iter()
        .filter(|r| r.is_temperature)
        .filter_map(|r| r.value)
        .filter(|v| valid_temperature(*v));
    let first = temps.next()?;
    let (max, min) = temps.fold((first, first), |(hi, lo), v| (hi.max(v), lo.min(v)));
    Some(TempRange {
        max: round2(max),
        min: round2(min),
    })
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Samples were buffered; `tick` is the position within the cycle (1..CYCLE_TICKS).
    Sampled { tick: u32 },
    /// The cycle closed; `updated` devices had samples folded into their peaks.
    CycleClosed { updated: usize },
}

/// Display-ready row for one device.
#[derive(Debug, Clone)]
pub struct DeviceView {
    pub snapshot: Arc<DeviceSnapshot>,
    pub peaks: Arc<DevicePeaks>,
    pub warnings: Vec<Warning>,
    pub acknowledged: bool,
}

impl DeviceView {
    pub fn device_id(&self) -> &str {
        &self.snapshot.device_id
    }

    pub fn cpu_temps(&self) -> Option<TempRange> {
        min_max_temperature(&self.snapshot.cpu)
    }

    pub fn gpu_temps(&self) -> Option<TempRange> {
        min_max_temperature(&self.snapshot.gpu)
    }
}

// Per-device state. Snapshot and peaks are replaced whole, never edited in place.
#[derive(Debug)]
struct DeviceState {
    latest: Arc<DeviceSnapshot>,
    history: DeviceHistory,
    peaks: Arc<DevicePeaks>,
    acknowledged: bool,
}

impl DeviceState {
    fn new(snapshot: DeviceSnapshot) -> Self {
        Self {
            latest: Arc::new(snapshot),
            history: DeviceHistory::default(),
            peaks: Arc::new(DevicePeaks::default()),
            acknowledged: false,
        }
    }

    fn id(&self) -> &str {
        &self.latest.device_id
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    // registration order; sorted_view keeps it for ties
    devices: Vec<DeviceState>,
    thresholds: Thresholds,
    ticks: u32,
}

impl Aggregator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            devices: Vec::new(),
            thresholds,
            ticks: 0,
        }
    }

    fn find(&self, device_id: &str) -> Option<&DeviceState> {
        self.devices.iter().find(|d| d.id() == device_id)
    }

    fn find_mut(&mut self, device_id: &str) -> Option<&mut DeviceState> {
        self.devices.iter_mut().find(|d| d.id() == device_id)
    }

    /// Make a device known. Returns true if it was new; a known device only
    /// has its displayed snapshot replaced.
    pub fn register(&mut self, snapshot: DeviceSnapshot) -> bool {
        match self.find_mut(&snapshot.device_id) {
            Some(state) => {
                state.latest = Arc::new(snapshot);
                false
            }
            None => {
                debug!(device = %snapshot.device_id, "registered device");
                self.devices.push(DeviceState::new(snapshot));
                true
            }
        }
    }

    /// Register every device of a registry listing, in order.
    pub fn load(&mut self, snapshots: impl IntoIterator<Item = DeviceSnapshot>) -> usize {
        snapshots
            .into_iter()
            .map(|s| self.register(s))
            .filter(|added| *added)
            .count()
    }

    /// Buffer a fresh sample. Samples for unknown devices are dropped.
    pub fn ingest(&mut self, snapshot: DeviceSnapshot) -> bool {
        let Some(state) = self.find_mut(&snapshot.device_id) else {
            debug!(device = %snapshot.device_id, "dropping sample for unknown device");
            return false;
        };
        let snapshot = Arc::new(snapshot);
        state.history.push(Arc::clone(&snapshot));
        state.latest = snapshot;
        true
    }

    /// Ingest this tick's samples and advance the cycle counter.
    pub fn tick(&mut self, samples: impl IntoIterator<Item = DeviceSnapshot>) -> TickOutcome {
        for s in samples {
            self.ingest(s);
        }
        self.ticks += 1;
        if self.ticks >= CYCLE_TICKS {
            self.ticks = 0;
            TickOutcome::CycleClosed {
                updated: self.close_cycle(),
            }
        } else {
            TickOutcome::Sampled { tick: self.ticks }
        }
    }

    fn close_cycle(&mut self) -> usize {
        let mut updated = 0;
        for state in &mut self.devices {
            if !state.history.is_empty() {
                let window = DevicePeaks::from_samples(state.history.iter());
                state.peaks = Arc::new(state.peaks.merged(&window));
                updated += 1;
            }
            state.history.clear();
            state.acknowledged = false;
        }
        info!(devices = self.devices.len(), updated, "aggregation cycle closed");
        updated
    }

    /// Suppress a device's warnings until the next cycle closes.
    pub fn acknowledge(&mut self, device_id: &str) -> bool {
        match self.find_mut(device_id) {
            Some(state) => {
                state.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Forget a device entirely: history, peaks and acknowledgement.
    pub fn remove(&mut self, device_id: &str) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d.id() != device_id);
        before != self.devices.len()
    }

    /// Active warnings; empty while acknowledged or for unknown devices.
    pub fn warnings(&self, device_id: &str) -> Vec<Warning> {
        self.find(device_id)
            .map(|state| self.state_warnings(state))
            .unwrap_or_default()
    }

    fn state_warnings(&self, state: &DeviceState) -> Vec<Warning> {
        if state.acknowledged {
            Vec::new()
        } else {
            warnings::compute(&state.peaks, &self.thresholds)
        }
    }

    /// Devices ordered by active warning count, most first; ties keep registration order.
    pub fn sorted_view(&self) -> Vec<DeviceView> {
        let mut rows: Vec<DeviceView> = self
            .devices
            .iter()
            .map(|state| DeviceView {
                snapshot: Arc::clone(&state.latest),
                peaks: Arc::clone(&state.peaks),
                warnings: self.state_warnings(state),
                acknowledged: state.acknowledged,
            })
            .collect();
        rows.sort_by_key(|r| Reverse(r.warnings.len()));
        rows
    }

    pub fn peaks(&self, device_id: &str) -> Option<Arc<DevicePeaks>> {
        self.find(device_id).map(|s| Arc::clone(&s.peaks))
    }

    pub fn latest(&self, device_id: &str) -> Option<Arc<DeviceSnapshot>> {
        self.find(device_id).map(|s| Arc::clone(&s.latest))
    }

    pub fn history_len(&self, device_id: &str) -> Option<usize> {
        self.find(device_id).map(|s| s.history.len())
    }

    pub fn is_acknowledged(&self, device_id: &str) -> bool {
        self.find(device_id).is_some_and(|s| s.acknowledged)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.find(device_id).is_some()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Position within the current cycle (0 right after a cycle closed).
    pub fn tick_count(&self) -> u32 {
        self.ticks
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn set_threshold(&mut self, kind: ThresholdKind, value: f64) -> Result<(), ThresholdError> {
        self.thresholds.set(kind, value)
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn reset_thresholds(&mut self) {
        self.thresholds.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiskEntry;

    fn snap(id: &str, cpu_temp: f64) -> DeviceSnapshot {
        let mut s = DeviceSnapshot::new(id, id.to_uppercase());
        s.cpu.push(Reading::new("CPU Package", cpu_temp, true));
        s
    }

    fn full_cycle(agg: &mut Aggregator, samples: &[Vec<DeviceSnapshot>]) -> Vec<TickOutcome> {
        samples.iter().map(|s| agg.tick(s.clone())).collect()
    }

    #[test]
    fn unknown_device_samples_are_dropped() {
        let mut agg = Aggregator::default();
        assert!(!agg.ingest(snap("ghost", 50.0)));
        assert!(agg.is_empty());
    }

    #[test]
    fn history_bounded_between_cycles() {
        let mut agg = Aggregator::default();
        agg.register(DeviceSnapshot::new("dev1", "Dev"));
        for t in 0..10 {
            agg.ingest(snap("dev1", 40.0 + t as f64));
            assert!(agg.history_len("dev1").unwrap() <= 4);
        }
        assert_eq!(agg.history_len("dev1"), Some(4));
        assert_eq!(agg.latest("dev1").unwrap().cpu[0].value, Some(49.0));
    }

    #[test]
    fn fourth_tick_closes_cycle() {
        let mut agg = Aggregator::default();
        agg.register(snap("dev1", 30.0));
        let out = full_cycle(
            &mut agg,
            &[
                vec![snap("dev1", 55.0)],
                vec![snap("dev1", 60.0)],
                vec![snap("dev1", 90.0)],
                vec![snap("dev1", 58.0)],
            ],
        );
        assert_eq!(out[0], TickOutcome::Sampled { tick: 1 });
        assert_eq!(out[2], TickOutcome::Sampled { tick: 3 });
        assert_eq!(out[3], TickOutcome::CycleClosed { updated: 1 });
        assert_eq!(agg.peaks("dev1").unwrap().cpu_temp, Some(90.0));
        assert_eq!(agg.history_len("dev1"), Some(0));
        assert_eq!(agg.tick_count(), 0);
    }

    #[test]
    fn peaks_never_decrease() {
        let mut agg = Aggregator::default();
        agg.register(snap("dev1", 0.0));
        let mut last = None;
        for level in [70.0, 50.0, 85.0, 20.0] {
            for _ in 0..CYCLE_TICKS {
                agg.tick(vec![snap("dev1", level)]);
            }
            let now = agg.peaks("dev1").unwrap().cpu_temp;
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, Some(85.0));
    }

    #[test]
    fn empty_history_leaves_peaks_untouched() {
        let mut agg = Aggregator::default();
        agg.register(snap("busy", 0.0));
        agg.register(snap("idle", 0.0));
        for _ in 0..CYCLE_TICKS {
            agg.tick(vec![snap("busy", 70.0)]);
        }
        assert_eq!(agg.peaks("idle").unwrap().as_ref(), &DevicePeaks::default());
        assert_eq!(agg.peaks("busy").unwrap().cpu_temp, Some(70.0));
    }

    #[test]
    fn missing_category_does_not_clobber_other_fields() {
        let mut agg = Aggregator::default();
        agg.register(snap("dev1", 0.0));
        for _ in 0..CYCLE_TICKS {
            agg.tick(vec![snap("dev1", 65.0)]);
        }
        // next cycle reports only RAM
        for _ in 0..CYCLE_TICKS {
            let mut s = DeviceSnapshot::new("dev1", "DEV1");
            s.ram.used_percent = Some(40.0);
            agg.tick(vec![s]);
        }
        let peaks = agg.peaks("dev1").unwrap();
        assert_eq!(peaks.cpu_temp, Some(65.0));
        assert_eq!(peaks.gpu_temp, None);
        assert_eq!(peaks.ram_usage, Some(40.0));
    }

    #[test]
    fn disk_peaks_keep_first_seen_order() {
        let mut a = DeviceSnapshot::new("d", "d");
        a.disks = vec![
            DiskEntry::new("D: Used Disk Percentage", 50.0),
            DiskEntry::new("D: Total Size", 900.0),
        ];
        let mut b = DeviceSnapshot::new("d", "d");
        b.disks = vec![
            DiskEntry::new("C: Used Disk Percentage", 88.0),
            DiskEntry::new("D: Used Disk Percentage", 61.0),
        ];
        let peaks = DevicePeaks::from_samples([&a, &b]);
        let got: Vec<(&str, f64)> = peaks.disks.iter().map(|d| (d.label(), d.value)).collect();
        assert_eq!(got, vec![("D:", 61.0), ("C:", 88.0)]);
    }

    #[test]
    fn acknowledge_suppresses_until_cycle_end() {
        let mut agg = Aggregator::default();
        agg.register(snap("dev1", 0.0));
        for _ in 0..CYCLE_TICKS {
            agg.tick(vec![snap("dev1", 95.0)]);
        }
        assert_eq!(agg.warnings("dev1").len(), 1);
        assert!(agg.acknowledge("dev1"));
        assert!(agg.acknowledge("dev1"));
        assert!(agg.warnings("dev1").is_empty());
        assert_eq!(agg.peaks("dev1").unwrap().cpu_temp, Some(95.0));

        for _ in 0..CYCLE_TICKS {
            agg.tick(vec![snap("dev1", 40.0)]);
        }
        assert!(!agg.is_acknowledged("dev1"));
        assert_eq!(agg.warnings("dev1").len(), 1);
    }

    #[test]
    fn cycle_reset_clears_flags_even_without_samples() {
        let mut agg = Aggregator::default();
        agg.register(snap("a", 0.0));
        agg.register(snap("b", 0.0));
        agg.acknowledge("a");
        agg.acknowledge("b");
        agg.tick(vec![snap("a", 1.0)]);
        agg.tick(vec![snap("b", 1.0)]);
        agg.tick(Vec::new());
        assert!(agg.is_acknowledged("a"));
        agg.tick(Vec::new());
        assert!(!agg.is_acknowledged("a") && !agg.is_acknowledged("b"));
        assert_eq!(agg.history_len("a"), Some(0));
        assert_eq!(agg.history_len("b"), Some(0));
    }

    #[test]
    fn sorted_by_warning_count_then_registration() {
        let mut agg = Aggregator::default();
        let mut a = DeviceSnapshot::new("A", "A");
        a.cpu = vec![
            Reading::new("CPU Package", 95.0, true),
            Reading::new("CPU Total", 99.0, false),
        ];
        a.ram.used_percent = Some(97.0);
        let b = DeviceSnapshot::new("B", "B");
        let c = snap("C", 85.0);
        let d = DeviceSnapshot::new("D", "D");
        agg.load([b.clone(), c.clone(), d.clone(), a.clone()]);
        for _ in 0..CYCLE_TICKS {
            agg.tick(vec![a.clone(), b.clone(), c.clone(), d.clone()]);
        }
        let order: Vec<String> = agg
            .sorted_view()
            .iter()
            .map(|v| v.device_id().to_string())
            .collect();
        assert_eq!(order, vec!["A", "C", "B", "D"]);

        agg.acknowledge("A");
        let order: Vec<String> = agg
            .sorted_view()
            .iter()
            .map(|v| v.device_id().to_string())
            .collect();
        assert_eq!(order, vec!["C", "B", "D", "A"]);
    }

    #[test]
    fn remove_purges_state() {
        let mut agg = Aggregator::default();
        agg.register(snap("dev1", 0.0));
        for _ in 0..CYCLE_TICKS {
            agg.tick(vec![snap("dev1", 99.0)]);
        }
        agg.acknowledge("dev1");
        assert!(agg.remove("dev1"));
        assert!(!agg.remove("dev1"));
        assert!(!agg.ingest(snap("dev1", 10.0)));
        assert!(agg.peaks("dev1").is_none());

        agg.register(snap("dev1", 10.0));
        assert_eq!(agg.peaks("dev1").unwrap().cpu_temp, None);
        assert!(!agg.is_acknowledged("dev1"));
    }

    #[test]
    fn threshold_edits_change_live_warnings() {
        let mut agg = Aggregator::default();
        agg.register(snap("dev1", 0.0));
        for _ in 0..CYCLE_TICKS {
            agg.tick(vec![snap("dev1", 75.0)]);
        }
        assert!(agg.warnings("dev1").is_empty());
        agg.set_threshold(ThresholdKind::CpuTemp, 70.0).unwrap();
        assert_eq!(agg.warnings("dev1").len(), 1);
        assert!(agg.set_threshold(ThresholdKind::CpuTemp, 170.0).is_err());
        assert_eq!(agg.thresholds().get(ThresholdKind::CpuTemp), 70.0);
        agg.reset_thresholds();
        assert!(agg.warnings("dev1").is_empty());
    }

    #[test]
    fn min_max_temperature_rounds_and_filters() {
        let readings = vec![
            Reading::new("Core 1", 41.456, true),
            Reading::new("Load", 99.0, false),
            Reading::new("Core 2", 63.001, true),
            Reading::new("Bogus", -3.0, true),
        ];
        let r = min_max_temperature(&readings).unwrap();
        assert_eq!(r.max, 63.0);
        assert_eq!(r.min, 41.46);
    }

    #[test]
    fn min_max_temperature_empty_is_none() {
        assert_eq!(min_max_temperature(&[]), None);
        assert_eq!(
            min_max_temperature(&[Reading::new("Load", 10.0, false)]),
            None
        );
    }
}
