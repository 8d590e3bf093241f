//! Threshold warnings derived from a device's sticky peaks.

use std::fmt;

use serde::Serialize;

use crate::aggregator::DevicePeaks;
use crate::thresholds::{ThresholdKind, Thresholds};

/// One violated limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: ThresholdKind,
    /// "CPU", "GPU", "RAM", or the disk label for disk warnings
    pub subject: String,
    pub value: f64,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ThresholdKind::DiskUsage => write!(
                f,
                "{} disk usage too high: {}{}",
                self.subject,
                self.value,
                self.kind.unit()
            ),
            kind => write!(f, "{} too high: {}{}", kind.label(), self.value, kind.unit()),
        }
    }
}

/// Compare peaks against limits. Order: CPU temp, CPU usage, GPU temp,
/// GPU usage, RAM usage, then disks in peak order.
pub fn compute(peaks: &DevicePeaks, thresholds: &Thresholds) -> Vec<Warning> {
    let scalar = [
        (ThresholdKind::CpuTemp, "CPU", peaks.cpu_temp),
        (ThresholdKind::CpuUsage, "CPU", peaks.cpu_usage),
        (ThresholdKind::GpuTemp, "GPU", peaks.gpu_temp),
        (ThresholdKind::GpuUsage, "GPU", peaks.gpu_usage),
        (ThresholdKind::RamUsage, "RAM", peaks.ram_usage),
    ];

    let mut out: Vec<Warning> = scalar
        .into_iter()
        .filter_map(|(kind, subject, peak)| {
            let value = peak?;
            thresholds.exceeded(kind, value).then(|| Warning {
                kind,
                subject: subject.to_string(),
                value,
            })
        })
        .collect();

    out.extend(
        peaks
            .disks
            .iter()
            .filter(|d| thresholds.exceeded(ThresholdKind::DiskUsage, d.value))
            .map(|d| Warning {
                kind: ThresholdKind::DiskUsage,
                subject: d.label().to_string(),
                value: d.value,
            }),
    );
    out
}
