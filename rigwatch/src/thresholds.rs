//! Warning limits for device peaks.
//!
//! Every limit is a number in `0..=100` (°C for temperatures, percent for
//! usage). A peak strictly above its limit raises a warning. Edits are
//! validated here so an invalid value never replaces a good one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The metric a limit applies to, in warning display order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThresholdKind {
    CpuTemp,
    CpuUsage,
    GpuTemp,
    GpuUsage,
    RamUsage,
    DiskUsage,
}

impl ThresholdKind {
    pub const ALL: [ThresholdKind; 6] = [
        ThresholdKind::CpuTemp,
        ThresholdKind::CpuUsage,
        ThresholdKind::GpuTemp,
        ThresholdKind::GpuUsage,
        ThresholdKind::RamUsage,
        ThresholdKind::DiskUsage,
    ];

    pub fn is_temperature(self) -> bool {
        matches!(self, ThresholdKind::CpuTemp | ThresholdKind::GpuTemp)
    }

    pub fn unit(self) -> &'static str {
        if self.is_temperature() {
            "°C"
        } else {
            "%"
        }
    }

    /// Human label, e.g. "CPU temperature".
    pub fn label(self) -> &'static str {
        match self {
            ThresholdKind::CpuTemp => "CPU temperature",
            ThresholdKind::CpuUsage => "CPU usage",
            ThresholdKind::GpuTemp => "GPU temperature",
            ThresholdKind::GpuUsage => "GPU usage",
            ThresholdKind::RamUsage => "RAM usage",
            ThresholdKind::DiskUsage => "disk usage",
        }
    }

    /// Key used on the command line and in JSON, e.g. "cpuTemp".
    pub fn key(self) -> &'static str {
        match self {
            ThresholdKind::CpuTemp => "cpuTemp",
            ThresholdKind::CpuUsage => "cpuUsage",
            ThresholdKind::GpuTemp => "gpuTemp",
            ThresholdKind::GpuUsage => "gpuUsage",
            ThresholdKind::RamUsage => "ramUsage",
            ThresholdKind::DiskUsage => "diskUsage",
        }
    }
}

impl fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ThresholdKind {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThresholdKind::ALL
            .into_iter()
            .find(|k| k.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ThresholdError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold for {kind} must be a number, got {input:?}")]
    NotANumber { kind: ThresholdKind, input: String },

    #[error("threshold for {kind} must be within 0..=100, got {value}")]
    OutOfRange { kind: ThresholdKind, value: f64 },

    #[error("unknown threshold {0:?}")]
    UnknownKind(String),
}

/// Threshold configuration for all monitored metrics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    /// CPU temperature limit (°C)
    cpu_temp: f64,
    /// CPU usage limit (%)
    cpu_usage: f64,
    /// GPU temperature limit (°C)
    gpu_temp: f64,
    /// GPU usage limit (%)
    gpu_usage: f64,
    /// RAM usage limit (%)
    ram_usage: f64,
    /// Per-disk usage limit (%)
    disk_usage: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_temp: 80.0,
            cpu_usage: 90.0,
            gpu_temp: 80.0,
            gpu_usage: 90.0,
            ram_usage: 90.0,
            disk_usage: 85.0,
        }
    }
}

impl Thresholds {
    pub fn get(&self, kind: ThresholdKind) -> f64 {
        match kind {
            ThresholdKind::CpuTemp => self.cpu_temp,
            ThresholdKind::CpuUsage => self.cpu_usage,
            ThresholdKind::GpuTemp => self.gpu_temp,
            ThresholdKind::GpuUsage => self.gpu_usage,
            ThresholdKind::RamUsage => self.ram_usage,
            ThresholdKind::DiskUsage => self.disk_usage,
        }
    }

    fn slot(&mut self, kind: ThresholdKind) -> &mut f64 {
        match kind {
            ThresholdKind::CpuTemp => &mut self.cpu_temp,
            ThresholdKind::CpuUsage => &mut self.cpu_usage,
            ThresholdKind::GpuTemp => &mut self.gpu_temp,
            ThresholdKind::GpuUsage => &mut self.gpu_usage,
            ThresholdKind::RamUsage => &mut self.ram_usage,
            ThresholdKind::DiskUsage => &mut self.disk_usage,
        }
    }

    /// Set one limit. On error the previous value is kept.
    pub fn set(&mut self, kind: ThresholdKind, value: f64) -> Result<(), ThresholdError> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(ThresholdError::OutOfRange { kind, value });
        }
        *self.slot(kind) = value;
        Ok(())
    }

    /// Parse and set one limit from user input.
    pub fn set_str(&mut self, kind: ThresholdKind, input: &str) -> Result<(), ThresholdError> {
        let value = input
            .trim()
            .parse::<f64>()
            .map_err(|_| ThresholdError::NotANumber {
                kind,
                input: input.to_string(),
            })?;
        self.set(kind, value)
    }

    /// True when `value` is strictly above the limit for `kind`.
    pub fn exceeded(&self, kind: ThresholdKind, value: f64) -> bool {
        value > self.get(kind)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn iter(&self) -> impl Iterator<Item = (ThresholdKind, f64)> + '_ {
        ThresholdKind::ALL.into_iter().map(|k| (k, self.get(k)))
    }
}

/// Colour band for a temperature reading.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TempBand {
    Cold,
    Normal,
    Warm,
    Hot,
    Critical,
}

impl TempBand {
    pub fn classify(celsius: f64) -> Self {
        if celsius < 50.0 {
            TempBand::Cold
        } else if celsius < 60.0 {
            TempBand::Normal
        } else if celsius < 70.0 {
            TempBand::Warm
        } else if celsius < 80.0 {
            TempBand::Hot
        } else {
            TempBand::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TempBand::Cold => "cold",
            TempBand::Normal => "normal",
            TempBand::Warm => "warm",
            TempBand::Hot => "hot",
            TempBand::Critical => "critical",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard() {
        let t = Thresholds::default();
        assert_eq!(t.get(ThresholdKind::CpuTemp), 80.0);
        assert_eq!(t.get(ThresholdKind::CpuUsage), 90.0);
        assert_eq!(t.get(ThresholdKind::GpuTemp), 80.0);
        assert_eq!(t.get(ThresholdKind::GpuUsage), 90.0);
        assert_eq!(t.get(ThresholdKind::DiskUsage), 85.0);
    }

    #[test]
    fn invalid_edits_keep_prior_value() {
        let mut t = Thresholds::default();
        assert!(t.set(ThresholdKind::CpuTemp, 101.0).is_err());
        assert!(t.set(ThresholdKind::CpuTemp, -1.0).is_err());
        assert!(t.set(ThresholdKind::CpuTemp, f64::NAN).is_err());
        assert!(matches!(
            t.set_str(ThresholdKind::CpuTemp, "hot"),
            Err(ThresholdError::NotANumber { .. })
        ));
        assert_eq!(t.get(ThresholdKind::CpuTemp), 80.0);

        t.set_str(ThresholdKind::CpuTemp, " 72.5 ").unwrap();
        assert_eq!(t.get(ThresholdKind::CpuTemp), 72.5);
        t.reset();
        assert_eq!(t, Thresholds::default());
    }

    #[test]
    fn exceeded_is_strict() {
        let t = Thresholds::default();
        assert!(!t.exceeded(ThresholdKind::CpuTemp, 80.0));
        assert!(t.exceeded(ThresholdKind::CpuTemp, 80.01));
    }

    #[test]
    fn kind_parses_from_key() {
        assert_eq!("cpuTemp".parse::<ThresholdKind>(), Ok(ThresholdKind::CpuTemp));
        assert_eq!("DISKUSAGE".parse::<ThresholdKind>(), Ok(ThresholdKind::DiskUsage));
        assert!("fan".parse::<ThresholdKind>().is_err());
    }

    #[test]
    fn temp_bands() {
        assert_eq!(TempBand::classify(49.9), TempBand::Cold);
        assert_eq!(TempBand::classify(50.0), TempBand::Normal);
        assert_eq!(TempBand::classify(65.0), TempBand::Warm);
        assert_eq!(TempBand::classify(79.9), TempBand::Hot);
        assert_eq!(TempBand::classify(80.0), TempBand::Critical);
    }
}
