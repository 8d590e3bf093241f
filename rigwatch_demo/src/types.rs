//! Wire types served by the demo backend. Field names follow the registry's JSON.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Reading {
    pub name: String,
    pub value: f64,
    #[serde(rename = "isTemp")]
    pub is_temp: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RamInfo {
    #[serde(rename = "Total RAM (MB)")]
    pub total_mb: f64,
    #[serde(rename = "Available RAM (MB)")]
    pub available_mb: f64,
    #[serde(rename = "Used RAM Percentage (%)")]
    pub used_percent: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DeviceInfo {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "deviceName")]
    pub device_name: String,
    #[serde(rename = "cpuInfos")]
    pub cpu_infos: Vec<Reading>,
    #[serde(rename = "gpuInfos")]
    pub gpu_infos: Vec<Reading>,
    #[serde(rename = "ramInfo")]
    pub ram_info: RamInfo,
    /// Emitted as a JSON object, keys in this order.
    #[serde(rename = "diskInfo", serialize_with = "ordered_map")]
    pub disk_info: Vec<(String, f64)>,
}

fn ordered_map<S: Serializer>(entries: &[(String, f64)], s: S) -> Result<S::Ok, S::Error> {
    let mut map = s.serialize_map(Some(entries.len()))?;
    for (k, v) in entries {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MessageRecord {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "deviceName", default)]
    pub device_name: String,
    pub content: String,
    #[serde(rename = "messageDate", default = "Utc::now")]
    pub message_date: DateTime<Utc>,
    #[serde(rename = "isMessageIT", default)]
    pub is_message_it: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginReply {
    pub token: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeviceBody {
    pub username: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteBody {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub note: String,
    #[serde(rename = "dateCreated", default)]
    pub date_created: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_info_keeps_insertion_order() {
        let d = DeviceInfo {
            device_id: "x".into(),
            device_name: "X".into(),
            cpu_infos: vec![],
            gpu_infos: vec![],
            ram_info: RamInfo {
                total_mb: 8192.0,
                available_mb: 4096.0,
                used_percent: 50.0,
            },
            disk_info: vec![
                ("Z: Used Disk Percentage".into(), 10.0),
                ("C: Used Disk Percentage".into(), 20.0),
            ],
        };
        let js = serde_json::to_string(&d).unwrap();
        let z = js.find("Z: Used").unwrap();
        let c = js.find("C: Used").unwrap();
        assert!(z < c, "{js}");
        assert!(js.contains(r#""Used RAM Percentage (%)":50.0"#), "{js}");
    }
}
