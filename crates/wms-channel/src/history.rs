//! Inbound message records and the bounded per-channel log.

use std::collections::VecDeque;

use serde::Serialize;

/// A message received on a channel.
///
/// Frames are decoded as JSON when possible. Anything else is kept verbatim
/// as a raw record so a malformed frame never tears down the connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageRecord {
    Decoded(serde_json::Value),
    Raw(RawText),
}

/// Undecodable frame, serialized as `{"type":"raw","data":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "raw")]
pub struct RawText {
    pub data: String,
}

impl MessageRecord {
    pub fn decode(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => MessageRecord::Decoded(value),
            Err(e) => {
                tracing::debug!("Keeping undecodable frame as raw text: {e}");
                MessageRecord::Raw(RawText { data: text })
            }
        }
    }

    pub fn raw(data: impl Into<String>) -> Self {
        MessageRecord::Raw(RawText { data: data.into() })
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            MessageRecord::Decoded(value) => Some(value),
            MessageRecord::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, MessageRecord::Raw(_))
    }
}

/// Most recent records of a channel in arrival order.
///
/// Holds at most `capacity` records; the oldest are evicted first.
/// [`received`](MessageLog::received) counts every record ever pushed, which
/// lets an observer pick out what arrived since it last looked even when
/// older entries have already been evicted.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageLog {
    records: VecDeque<MessageRecord>,
    capacity: usize,
    received: u64,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
            received: 0,
        }
    }

    pub fn push(&mut self, record: MessageRecord) {
        self.records.push_back(record);
        self.received += 1;
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of records pushed since the log was created.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&MessageRecord> {
        self.records.back()
    }

    /// Records pushed after the log had seen `received` records, limited to
    /// the ones still held.
    pub fn since(&self, received: u64) -> impl Iterator<Item = &MessageRecord> {
        let fresh = self.received.saturating_sub(received);
        let fresh = usize::try_from(fresh).unwrap_or(usize::MAX).min(self.len());
        self.records.iter().skip(self.len() - fresh)
    }

    pub fn to_vec(&self) -> Vec<MessageRecord> {
        self.records.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(i: usize) -> MessageRecord {
        MessageRecord::Decoded(serde_json::json!({ "seq": i }))
    }

    #[test]
    fn decodes_json() {
        let record = MessageRecord::decode(r#"{"a":1}"#.to_string());
        assert_eq!(record, MessageRecord::Decoded(serde_json::json!({"a": 1})));
        assert_eq!(record.as_json(), Some(&serde_json::json!({"a": 1})));
    }

    #[test]
    fn decodes_json_scalars() {
        assert_eq!(
            MessageRecord::decode("42".to_string()),
            MessageRecord::Decoded(serde_json::json!(42))
        );
    }

    #[test]
    fn falls_back_to_raw() {
        let record = MessageRecord::decode("not json".to_string());
        assert!(record.is_raw());
        assert_eq!(record, MessageRecord::raw("not json"));
        assert_eq!(record.as_json(), None);
    }

    #[test]
    fn raw_record_serializes_with_type_tag() {
        let json = serde_json::to_value(MessageRecord::raw("oops")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "raw", "data": "oops"}));
    }

    #[test]
    fn decoded_record_serializes_transparently() {
        let record = MessageRecord::Decoded(serde_json::json!({"type": "stock_change"}));
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json, serde_json::json!({"type": "stock_change"}));
    }

    #[test]
    fn log_never_exceeds_capacity() {
        let mut log = MessageLog::new(100);
        for i in 0..250 {
            log.push(numbered(i));
            assert!(log.len() <= 100);
        }
        assert_eq!(log.len(), 100);
        assert_eq!(log.received(), 250);
    }

    #[test]
    fn unbounded_capacity_allocates_lazily() {
        let mut log = MessageLog::new(usize::MAX);
        assert_eq!(log.capacity(), usize::MAX);
        log.push(numbered(1));
        log.push(numbered(2));
        assert_eq!(log.to_vec(), vec![numbered(1), numbered(2)]);
    }

    #[test]
    fn log_evicts_oldest_first() {
        let mut log = MessageLog::new(100);
        for i in 0..=100 {
            log.push(numbered(i));
        }
        let expected: Vec<_> = (1..=100).map(numbered).collect();
        assert_eq!(log.to_vec(), expected);
        assert_eq!(log.latest(), Some(&numbered(100)));
    }

    #[test]
    fn since_returns_new_records_only() {
        let mut log = MessageLog::new(3);
        log.push(numbered(0));
        let seen = log.received();
        log.push(numbered(1));
        log.push(numbered(2));
        let fresh: Vec<_> = log.since(seen).cloned().collect();
        assert_eq!(fresh, vec![numbered(1), numbered(2)]);
        assert_eq!(log.since(log.received()).count(), 0);
    }

    #[test]
    fn since_is_limited_to_retained_records() {
        let mut log = MessageLog::new(2);
        for i in 0..5 {
            log.push(numbered(i));
        }
        let fresh: Vec<_> = log.since(0).cloned().collect();
        assert_eq!(fresh, vec![numbered(3), numbered(4)]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut log = MessageLog::new(0);
        log.push(numbered(0));
        assert!(log.is_empty());
        assert_eq!(log.received(), 1);
        assert_eq!(log.capacity(), 0);
    }
}
