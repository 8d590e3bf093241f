//! Small utilities to manage bounded per-device sample buffers.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::types::DeviceSnapshot;

/// Samples kept per device, one aggregation cycle's worth.
pub const HISTORY_CAP: usize = 4;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if cap == 0 {
        return;
    }
    while dq.len() >= cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

// Keeps the most recent snapshots of one device, oldest first
#[derive(Debug, Clone)]
pub struct DeviceHistory {
    samples: VecDeque<Arc<DeviceSnapshot>>,
    cap: usize,
}

impl DeviceHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, snapshot: Arc<DeviceSnapshot>) {
        push_capped(&mut self.samples, snapshot, self.cap);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceSnapshot> + '_ {
        self.samples.iter().map(|s| s.as_ref())
    }
}

impl Default for DeviceHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAP)
    }
}
