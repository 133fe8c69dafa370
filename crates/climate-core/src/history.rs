use std::collections::VecDeque;

use crate::error::ConfigError;
use crate::reading::Reading;

/// Fixed-capacity, insertion-ordered buffer of readings. The oldest entry is evicted
/// once the capacity is exceeded.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<Reading>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Appends at the tail and returns the evicted head, if any.
    pub fn push(&mut self, reading: Reading) -> Option<Reading> {
        self.entries.push_back(reading);
        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// The last `limit` readings, oldest first.
    pub fn latest(&self, limit: usize) -> Vec<Reading> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Measurement;

    fn reading(seq: u64) -> Reading {
        Measurement::new(seq as f64, 50.0, None)
            .unwrap()
            .stamp(seq as i64, seq)
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(HistoryBuffer::new(0).unwrap_err(), ConfigError::ZeroCapacity);
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut buffer = HistoryBuffer::new(3).unwrap();
        for seq in 1..=3 {
            assert!(buffer.push(reading(seq)).is_none());
        }
        let evicted = buffer.push(reading(4)).unwrap();
        assert_eq!(evicted.sequence_id, 1);
        assert_eq!(buffer.len(), 3);

        let ids: Vec<u64> = buffer.iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn latest_is_capped_and_chronological() {
        let mut buffer = HistoryBuffer::new(10).unwrap();
        for seq in 1..=5 {
            buffer.push(reading(seq));
        }
        let ids: Vec<u64> = buffer.latest(2).iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, vec![4, 5]);
        assert_eq!(buffer.latest(50).len(), 5);
        assert!(buffer.latest(0).is_empty());
    }
}
