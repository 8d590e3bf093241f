//! Shared backend state: users, devices with their synthetic telemetry, messages and notes.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;

use crate::types::{DeviceInfo, MessageRecord, RamInfo, Reading};

pub const DEMO_USER: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo";

/// A value oscillating around `base`; `period` is in sampler ticks.
#[derive(Debug, Clone, Copy)]
pub struct Wave {
    pub base: f64,
    pub amplitude: f64,
    pub period: u32,
}

impl Wave {
    pub const fn new(base: f64, amplitude: f64, period: u32) -> Self {
        Self {
            base,
            amplitude,
            period,
        }
    }

    /// Value at `tick`, clamped to 0..=100 and rounded to one decimal.
    pub fn at(&self, tick: u64, phase: u64) -> f64 {
        let period = self.period.max(1) as f64;
        let angle = TAU * ((tick + phase) as f64 % period) / period;
        let v = (self.base + self.amplitude * angle.sin()).clamp(0.0, 100.0);
        (v * 10.0).round() / 10.0
    }
}

/// How a synthetic device behaves.
#[derive(Debug, Clone)]
pub struct Profile {
    pub cores: usize,
    pub cpu_temp: Wave,
    pub cpu_load: Wave,
    pub gpu: Option<(Wave, Wave)>,
    pub ram_total_mb: f64,
    pub ram: Wave,
    pub disks: Vec<(&'static str, Wave)>,
}

impl Profile {
    /// A quiet office machine; used for devices added at runtime.
    pub fn idle() -> Self {
        Self {
            cores: 4,
            cpu_temp: Wave::new(42.0, 4.0, 9),
            cpu_load: Wave::new(18.0, 10.0, 7),
            gpu: None,
            ram_total_mb: 8192.0,
            ram: Wave::new(40.0, 6.0, 11),
            disks: vec![("C:", Wave::new(48.0, 0.0, 1))],
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub profile: Profile,
    phase: u64,
    pub current: DeviceInfo,
}

impl DeviceRecord {
    pub fn new(id: &str, name: &str, profile: Profile, phase: u64) -> Self {
        let current = render(id, name, &profile, 0, phase);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            profile,
            phase,
            current,
        }
    }

    fn resample(&mut self, tick: u64) {
        self.current = render(&self.id, &self.name, &self.profile, tick, self.phase);
    }
}

fn render(id: &str, name: &str, p: &Profile, tick: u64, phase: u64) -> DeviceInfo {
    let package = p.cpu_temp.at(tick, phase);
    let mut cpu_infos: Vec<Reading> = (0..p.cores)
        .map(|core| Reading {
            name: format!("CPU Core #{}", core + 1),
            // cores run a little cooler than the package, each offset differently
            value: (package - 1.5 * (core % 3) as f64).max(0.0),
            is_temp: true,
        })
        .collect();
    cpu_infos.push(Reading {
        name: "CPU Package".into(),
        value: package,
        is_temp: true,
    });
    cpu_infos.push(Reading {
        name: "CPU Total".into(),
        value: p.cpu_load.at(tick, phase),
        is_temp: false,
    });

    let gpu_infos = match p.gpu {
        Some((temp, load)) => vec![
            Reading {
                name: "GPU Core".into(),
                value: temp.at(tick, phase + 2),
                is_temp: true,
            },
            Reading {
                name: "GPU Core Load".into(),
                value: load.at(tick, phase + 1),
                is_temp: false,
            },
        ],
        None => Vec::new(),
    };

    let used = p.ram.at(tick, phase);
    let ram_info = RamInfo {
        total_mb: p.ram_total_mb,
        available_mb: (p.ram_total_mb * (100.0 - used) / 100.0).round(),
        used_percent: used,
    };

    let disk_info = p
        .disks
        .iter()
        .flat_map(|(label, wave)| {
            [
                (format!("{label} Used Disk Percentage"), wave.at(tick, phase)),
                (format!("{label} Total Size (GB)"), 476.0),
            ]
        })
        .collect();

    DeviceInfo {
        device_id: id.to_string(),
        device_name: name.to_string(),
        cpu_infos,
        gpu_infos,
        ram_info,
        disk_info,
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default)]
pub struct Store {
    pub users: HashMap<String, User>,
    pub devices: BTreeMap<String, DeviceRecord>,
    /// username -> device ids, in the order they were added
    pub owned: HashMap<String, Vec<String>>,
    pub messages: HashMap<String, Vec<MessageRecord>>,
    pub notes: HashMap<String, Vec<String>>,
    pub tick: u64,
}

impl Store {
    /// The demo account with three devices, a short support thread and a note.
    pub fn seeded() -> Self {
        let mut store = Store::default();
        store.users.insert(
            DEMO_USER.into(),
            User {
                email: "demo@example.com".into(),
                password: DEMO_PASSWORD.into(),
            },
        );

        let workstation = Profile {
            cores: 8,
            cpu_temp: Wave::new(52.0, 6.0, 8),
            cpu_load: Wave::new(35.0, 15.0, 6),
            gpu: Some((Wave::new(55.0, 5.0, 10), Wave::new(25.0, 10.0, 5))),
            ram_total_mb: 32768.0,
            ram: Wave::new(58.0, 5.0, 12),
            disks: vec![("C:", Wave::new(62.0, 0.5, 20)), ("D:", Wave::new(40.0, 0.0, 1))],
        };
        // runs hot: crosses the default limits on most cycles
        let render_node = Profile {
            cores: 16,
            cpu_temp: Wave::new(79.0, 8.0, 6),
            cpu_load: Wave::new(86.0, 10.0, 5),
            gpu: Some((Wave::new(76.0, 8.0, 7), Wave::new(88.0, 8.0, 4))),
            ram_total_mb: 65536.0,
            ram: Wave::new(72.0, 10.0, 9),
            disks: vec![("C:", Wave::new(91.0, 1.0, 15)), ("E:", Wave::new(55.0, 0.0, 1))],
        };

        for (i, (id, name, profile)) in [
            ("DEMO-WS-01", "Office Workstation", workstation),
            ("DEMO-RN-02", "Render Node", render_node),
            ("DEMO-LT-03", "Reception Laptop", Profile::idle()),
        ]
        .into_iter()
        .enumerate()
        {
            store.add_device(DEMO_USER, DeviceRecord::new(id, name, profile, i as u64 * 3));
        }

        let now = Utc::now();
        store.messages.insert(
            "DEMO-WS-01".into(),
            vec![
                MessageRecord {
                    device_id: "DEMO-WS-01".into(),
                    device_name: "Office Workstation".into(),
                    content: "The fans are loud since this morning.".into(),
                    message_date: now - ChronoDuration::minutes(40),
                    is_message_it: false,
                },
                MessageRecord {
                    device_id: "DEMO-WS-01".into(),
                    device_name: "Office Workstation".into(),
                    content: "We are looking into it.".into(),
                    message_date: now - ChronoDuration::minutes(25),
                    is_message_it: true,
                },
                MessageRecord {
                    device_id: "DEMO-WS-01".into(),
                    device_name: "Office Workstation".into(),
                    content: "Thanks! It also froze once.".into(),
                    message_date: now - ChronoDuration::minutes(5),
                    is_message_it: false,
                },
            ],
        );
        store.notes.insert(
            "DEMO-RN-02".into(),
            vec!["Thermal paste replaced last quarter.".into()],
        );
        store
    }

    pub fn add_device(&mut self, username: &str, record: DeviceRecord) {
        let ids = self.owned.entry(username.to_string()).or_default();
        if !ids.contains(&record.id) {
            ids.push(record.id.clone());
        }
        self.devices.entry(record.id.clone()).or_insert(record);
    }

    pub fn owns(&self, username: &str, device_id: &str) -> bool {
        self.owned
            .get(username)
            .is_some_and(|ids| ids.iter().any(|id| id == device_id))
    }

    pub fn devices_of(&self, username: &str) -> Vec<DeviceInfo> {
        self.owned
            .get(username)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.devices.get(id))
                    .map(|d| d.current.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove a device from a user. Returns false if the user did not own it.
    pub fn remove_device(&mut self, username: &str, device_id: &str) -> bool {
        let Some(ids) = self.owned.get_mut(username) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|id| id != device_id);
        if ids.len() == before {
            return false;
        }
        let still_owned = self.owned.values().any(|ids| ids.iter().any(|id| id == device_id));
        if !still_owned {
            self.devices.remove(device_id);
            self.messages.remove(device_id);
            self.notes.remove(device_id);
        }
        true
    }

    /// Move every device's telemetry one sampler tick forward.
    pub fn advance(&mut self) {
        self.tick += 1;
        let tick = self.tick;
        for d in self.devices.values_mut() {
            d.resample(tick);
        }
    }
}

/// Handle shared by the router and the sampler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<Store>>,
    /// HS256 signing secret for issued tokens
    pub secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Store, secret: &str) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            secret: Arc::from(secret),
        }
    }

    pub fn seeded(secret: &str) -> Self {
        Self::new(Store::seeded(), secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_stays_in_range_and_moves() {
        let w = Wave::new(95.0, 10.0, 4);
        let values: Vec<f64> = (0..8).map(|t| w.at(t, 0)).collect();
        assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
        assert_eq!(values[0], 95.0);
        assert_eq!(values[1], 100.0);
        assert_eq!(values[3], 85.0);
        assert_eq!(values[4], values[0]);
    }

    #[test]
    fn seeded_store_has_demo_devices() {
        let s = Store::seeded();
        let devices = s.devices_of(DEMO_USER);
        let ids: Vec<&str> = devices.iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["DEMO-WS-01", "DEMO-RN-02", "DEMO-LT-03"]);
        assert!(devices[2].gpu_infos.is_empty());
        assert!(devices[0]
            .cpu_infos
            .iter()
            .any(|r| r.name == "CPU Total" && !r.is_temp));
    }

    #[test]
    fn advance_changes_readings() {
        let mut s = Store::seeded();
        let before = s.devices_of(DEMO_USER);
        s.advance();
        let after = s.devices_of(DEMO_USER);
        assert_ne!(before[0].cpu_infos, after[0].cpu_infos);
        assert_eq!(s.tick, 1);
    }

    #[test]
    fn remove_device_drops_threads_and_notes() {
        let mut s = Store::seeded();
        assert!(s.remove_device(DEMO_USER, "DEMO-WS-01"));
        assert!(!s.remove_device(DEMO_USER, "DEMO-WS-01"));
        assert!(!s.messages.contains_key("DEMO-WS-01"));
        assert!(!s.owns(DEMO_USER, "DEMO-WS-01"));
        assert_eq!(s.devices_of(DEMO_USER).len(), 2);
    }
}
