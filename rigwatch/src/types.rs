//! Types that mirror the device registry's JSON schema.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One reading inside `cpuInfos` / `gpuInfos`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Reading {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(rename = "isTemp", default, deserialize_with = "null_default")]
    pub is_temperature: bool,
}

impl Reading {
    pub fn new(name: impl Into<String>, value: f64, is_temperature: bool) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            is_temperature,
        }
    }

    /// Temperature in °C when this is a temperature reading with a sane value.
    pub fn temperature(&self) -> Option<f64> {
        if self.is_temperature {
            self.value.filter(|v| valid_temperature(*v))
        } else {
            None
        }
    }

    /// Usage in percent when this is a non-temperature reading within 0..=100.
    pub fn usage(&self) -> Option<f64> {
        if self.is_temperature {
            None
        } else {
            self.value.filter(|v| valid_percent(*v))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RamMetrics {
    #[serde(rename = "Total RAM (MB)", default, deserialize_with = "lenient_f64")]
    pub total_mb: Option<f64>,
    #[serde(rename = "Available RAM (MB)", default, deserialize_with = "lenient_f64")]
    pub available_mb: Option<f64>,
    #[serde(
        rename = "Used RAM Percentage (%)",
        default,
        deserialize_with = "lenient_f64"
    )]
    pub used_percent: Option<f64>,
}

/// One `diskInfo` entry, kept in the order the registry sent it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskEntry {
    pub key: String,
    pub value: Option<f64>,
}

impl DiskEntry {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }

    /// Short disk label, e.g. `"C:"` for `"C: Used Disk Percentage"`.
    pub fn label(&self) -> &str {
        self.key.split_whitespace().next().unwrap_or(&self.key)
    }

    pub fn is_usage(&self) -> bool {
        self.key.contains("Used Disk Percentage")
    }

    pub fn usage(&self) -> Option<f64> {
        if self.is_usage() {
            self.value.filter(|v| valid_percent(*v))
        } else {
            None
        }
    }
}

/// One poll result for one device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "deviceName", default)]
    pub device_name: String,
    #[serde(rename = "cpuInfos", default, deserialize_with = "null_default")]
    pub cpu: Vec<Reading>,
    #[serde(rename = "gpuInfos", default, deserialize_with = "null_default")]
    pub gpu: Vec<Reading>,
    #[serde(rename = "ramInfo", default, deserialize_with = "null_default")]
    pub ram: RamMetrics,
    #[serde(rename = "diskInfo", default, deserialize_with = "ordered_disks")]
    pub disks: Vec<DiskEntry>,
}

impl DeviceSnapshot {
    /// Empty snapshot for a device, handy for building test fixtures.
    pub fn new(device_id: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: device_name.into(),
            cpu: Vec::new(),
            gpu: Vec::new(),
            ram: RamMetrics::default(),
            disks: Vec::new(),
        }
    }

    pub fn cpu_temperatures(&self) -> impl Iterator<Item = f64> + '_ {
        self.cpu.iter().filter_map(Reading::temperature)
    }

    pub fn gpu_temperatures(&self) -> impl Iterator<Item = f64> + '_ {
        self.gpu.iter().filter_map(Reading::temperature)
    }

    /// Total CPU load, reported by the agent as the `"CPU Total"` reading.
    pub fn cpu_usage(&self) -> Option<f64> {
        self.cpu
            .iter()
            .find(|r| !r.is_temperature && r.name == "CPU Total")
            .and_then(Reading::usage)
    }

    /// GPU load is the first non-temperature GPU reading.
    pub fn gpu_usage(&self) -> Option<f64> {
        self.gpu
            .iter()
            .find(|r| !r.is_temperature)
            .and_then(Reading::usage)
    }

    pub fn ram_usage(&self) -> Option<f64> {
        self.ram.used_percent.filter(|v| valid_percent(*v))
    }

    pub fn disk_usages(&self) -> impl Iterator<Item = (&DiskEntry, f64)> + '_ {
        self.disks.iter().filter_map(|d| d.usage().map(|u| (d, u)))
    }
}

/// The registry answers with an array, or a bare object when the user has one device.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(v: OneOrMany<T>) -> Self {
        match v {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Decode a registry listing record by record. A `null` body is an empty
/// listing; records that fail to decode are logged and skipped.
pub fn device_list(listing: Option<OneOrMany<serde_json::Value>>) -> Vec<DeviceSnapshot> {
    let Some(listing) = listing else {
        return Vec::new();
    };
    Vec::from(listing)
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<DeviceSnapshot>(raw) {
            Ok(device) => Some(device),
            Err(e) => {
                warn!(error = %e, "skipping malformed device record");
                None
            }
        })
        .collect()
}

/// A support-channel message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "deviceName", default)]
    pub device_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "messageDate", default, deserialize_with = "lenient_datetime")]
    pub message_date: Option<chrono::DateTime<chrono::Utc>>,
    // true when sent by the IT side, false when sent from the device's user
    #[serde(rename = "isMessageIT", default)]
    pub is_message_it: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DeviceRequest<'a> {
    pub username: &'a str,
    #[serde(rename = "deviceID")]
    pub device_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NoteRequest<'a> {
    #[serde(rename = "deviceID")]
    pub device_id: &'a str,
    pub note: &'a str,
    #[serde(rename = "dateCreated")]
    pub date_created: chrono::DateTime<chrono::Utc>,
}

pub(crate) fn valid_temperature(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

pub(crate) fn valid_percent(v: f64) -> bool {
    v.is_finite() && (0.0..=100.0).contains(&v)
}

// Explicit nulls decode like a missing key.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn value_to_f64(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// Numbers arrive as JSON numbers or numeric strings; anything else is treated as absent.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_f64(&v))
}

// RFC 3339, or a zone-less timestamp taken as UTC.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<chrono::DateTime<chrono::Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|n| n.and_utc())
            })
    }))
}

fn ordered_disks<'de, D>(deserializer: D) -> Result<Vec<DiskEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DiskMapVisitor;

    impl<'de> Visitor<'de> for DiskMapVisitor {
        type Value = Vec<DiskEntry>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of disk labels to values")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                out.push(DiskEntry {
                    key,
                    value: value_to_f64(&value),
                });
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(DiskMapVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "deviceID": "dev1",
        "deviceName": "Office PC",
        "cpuInfos": [
            {"name": "CPU Core #1", "value": 55.5, "isTemp": true},
            {"name": "CPU Total", "value": "42.0", "isTemp": false},
            {"name": "CPU Core #2", "value": null, "isTemp": true}
        ],
        "gpuInfos": [
            {"name": "GPU Core", "value": 61, "isTemp": true},
            {"name": "GPU Load", "value": 12, "isTemp": false}
        ],
        "ramInfo": {
            "Total RAM (MB)": 16384,
            "Available RAM (MB)": 8192,
            "Used RAM Percentage (%)": "50"
        },
        "diskInfo": {
            "Z: Used Disk Percentage": "70.5",
            "Z: Total Size": "931",
            "C: Used Disk Percentage": 33
        }
    }"#;

    #[test]
    fn decodes_registry_shape() {
        let d: DeviceSnapshot = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(d.device_id, "dev1");
        assert_eq!(d.cpu_temperatures().collect::<Vec<_>>(), vec![55.5]);
        assert_eq!(d.cpu_usage(), Some(42.0));
        assert_eq!(d.gpu_temperatures().collect::<Vec<_>>(), vec![61.0]);
        assert_eq!(d.gpu_usage(), Some(12.0));
        assert_eq!(d.ram_usage(), Some(50.0));
        assert_eq!(d.ram.total_mb, Some(16384.0));
    }

    #[test]
    fn disk_entries_keep_document_order() {
        let d: DeviceSnapshot = serde_json::from_str(SAMPLE).unwrap();
        let keys: Vec<&str> = d.disks.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Z: Used Disk Percentage", "Z: Total Size", "C: Used Disk Percentage"]
        );
        let usages: Vec<(&str, f64)> = d.disk_usages().map(|(e, u)| (e.label(), u)).collect();
        assert_eq!(usages, vec![("Z:", 70.5), ("C:", 33.0)]);
    }

    #[test]
    fn out_of_range_values_are_absent() {
        let mut d = DeviceSnapshot::new("x", "x");
        d.cpu.push(Reading::new("CPU Total", 140.0, false));
        d.cpu.push(Reading::new("CPU Core", -5.0, true));
        d.ram.used_percent = Some(f64::NAN);
        assert_eq!(d.cpu_usage(), None);
        assert_eq!(d.cpu_temperatures().count(), 0);
        assert_eq!(d.ram_usage(), None);
    }

    #[test]
    fn missing_sections_default_empty() {
        let d: DeviceSnapshot =
            serde_json::from_str(r#"{"deviceID": "a", "diskInfo": null}"#).unwrap();
        assert!(d.cpu.is_empty() && d.gpu.is_empty() && d.disks.is_empty());
        assert_eq!(d.ram, RamMetrics::default());
    }

    #[test]
    fn explicit_nulls_decode_as_absent() {
        let d: DeviceSnapshot = serde_json::from_str(
            r#"{"deviceID": "a", "cpuInfos": null, "gpuInfos": null, "ramInfo": null}"#,
        )
        .unwrap();
        assert!(d.cpu.is_empty() && d.gpu.is_empty());
        assert_eq!(d.ram, RamMetrics::default());

        let r: Reading =
            serde_json::from_str(r#"{"name": "CPU Total", "value": 12, "isTemp": null}"#).unwrap();
        assert!(!r.is_temperature);
        assert_eq!(r.usage(), Some(12.0));
    }

    #[test]
    fn listing_skips_bad_records_and_accepts_null() {
        let listing = serde_json::from_str(&format!(r#"[{SAMPLE}, {{"deviceName": "no id"}}]"#))
            .unwrap();
        let devices = device_list(listing);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, "dev1");

        assert!(device_list(serde_json::from_str("null").unwrap()).is_empty());
        let single = device_list(serde_json::from_str(SAMPLE).unwrap());
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn message_dates_with_and_without_zone() {
        let a: Message = serde_json::from_str(
            r#"{"deviceID":"d","content":"hi","messageDate":"2024-05-01T10:00:00.000Z","isMessageIT":false}"#,
        )
        .unwrap();
        let b: Message = serde_json::from_str(
            r#"{"deviceID":"d","content":"hi","messageDate":"2024-05-01T10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(a.message_date, b.message_date);
        assert!(a.message_date.is_some());
        assert!(!b.is_message_it);
    }

    #[test]
    fn registry_accepts_single_object() {
        let one: OneOrMany<DeviceSnapshot> = serde_json::from_str(SAMPLE).unwrap();
        let v: Vec<DeviceSnapshot> = one.into();
        assert_eq!(v.len(), 1);
        let many: OneOrMany<DeviceSnapshot> =
            serde_json::from_str(&format!("[{SAMPLE},{SAMPLE}]")).unwrap();
        assert_eq!(Vec::from(many).len(), 2);
    }
}
