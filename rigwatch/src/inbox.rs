//! Unread tracking for the per-device support channel.
//!
//! Only messages written from the device side count (`isMessageIT == false`).
//! A device has unread messages while its latest count is above the count the
//! operator last saw; the seen counts survive restarts via [`crate::store`].

use std::collections::BTreeMap;

use crate::types::Message;

#[derive(Debug, Clone, Default)]
pub struct Inbox {
    counts: BTreeMap<String, usize>,
    seen: BTreeMap<String, usize>,
}

impl Inbox {
    pub fn with_seen(seen: BTreeMap<String, usize>) -> Self {
        Self {
            counts: BTreeMap::new(),
            seen,
        }
    }

    /// Record a fresh message listing. Returns the unread count.
    pub fn observe(&mut self, device_id: &str, messages: &[Message]) -> usize {
        let from_device = messages.iter().filter(|m| !m.is_message_it).count();
        self.counts.insert(device_id.to_string(), from_device);
        self.unread(device_id)
    }

    pub fn unread(&self, device_id: &str) -> usize {
        let count = self.counts.get(device_id).copied().unwrap_or(0);
        let seen = self.seen.get(device_id).copied().unwrap_or(0);
        count.saturating_sub(seen)
    }

    pub fn has_unread(&self, device_id: &str) -> bool {
        self.unread(device_id) > 0
    }

    /// The operator opened the thread: everything observed so far is read.
    pub fn mark_seen(&mut self, device_id: &str) {
        let count = self.counts.get(device_id).copied().unwrap_or(0);
        self.seen.insert(device_id.to_string(), count);
    }

    /// The thread was deleted server-side.
    pub fn clear(&mut self, device_id: &str) {
        self.counts.insert(device_id.to_string(), 0);
        self.seen.insert(device_id.to_string(), 0);
    }

    pub fn forget(&mut self, device_id: &str) {
        self.counts.remove(device_id);
        self.seen.remove(device_id);
    }

    pub fn seen_counts(&self) -> &BTreeMap<String, usize> {
        &self.seen
    }

    /// Devices with unread messages first; otherwise input order is kept.
    pub fn sort_by_unread<'a>(&self, device_ids: &[&'a str]) -> Vec<&'a str> {
        let mut out = device_ids.to_vec();
        out.sort_by_key(|id| !self.has_unread(id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(device: &str, from_it: bool) -> Message {
        Message {
            device_id: device.into(),
            device_name: String::new(),
            content: "hello".into(),
            message_date: None,
            is_message_it: from_it,
        }
    }

    #[test]
    fn only_device_side_messages_count() {
        let mut inbox = Inbox::default();
        let n = inbox.observe("d1", &[msg("d1", false), msg("d1", true), msg("d1", false)]);
        assert_eq!(n, 2);
        inbox.mark_seen("d1");
        assert_eq!(inbox.unread("d1"), 0);
        inbox.observe(
            "d1",
            &[msg("d1", false), msg("d1", true), msg("d1", false), msg("d1", false)],
        );
        assert_eq!(inbox.unread("d1"), 1);
    }

    #[test]
    fn persisted_seen_counts_are_honoured() {
        let mut inbox = Inbox::with_seen(BTreeMap::from([("d1".to_string(), 2)]));
        inbox.observe("d1", &[msg("d1", false), msg("d1", false)]);
        assert!(!inbox.has_unread("d1"));
    }

    #[test]
    fn clear_resets_both_counters() {
        let mut inbox = Inbox::default();
        inbox.observe("d1", &[msg("d1", false)]);
        inbox.clear("d1");
        assert_eq!(inbox.unread("d1"), 0);
        assert_eq!(inbox.seen_counts().get("d1"), Some(&0));
    }

    #[test]
    fn unread_devices_sort_first() {
        let mut inbox = Inbox::default();
        inbox.observe("b", &[msg("b", false)]);
        inbox.observe("d", &[msg("d", false)]);
        assert_eq!(inbox.sort_by_unread(&["a", "b", "c", "d"]), vec!["b", "d", "a", "c"]);
    }
}
