use crate::history::{HistoryError, HistoryStore, InteractionRecord};
use crate::util::RingBuffer;
use parking_lot::Mutex;

/// Keeps the newest `capacity` records in memory.
pub struct InMemoryHistoryStore {
    records: Mutex<RingBuffer<InteractionRecord>>,
}

impl InMemoryHistoryStore {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(RingBuffer::new(capacity.max(1))),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, record: InteractionRecord) -> Result<(), HistoryError> {
        self.records.lock().push(record);
        Ok(())
    }

    fn recent(&self, n: usize) -> Result<Vec<InteractionRecord>, HistoryError> {
        Ok(self.records.lock().newest(n).cloned().collect())
    }

    fn set_final_decision(&self, decision: &str) -> Result<(), HistoryError> {
        if let Some(newest) = self.records.lock().newest_mut() {
            newest.decision = Some(decision.to_owned());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), HistoryError> {
        self.records.lock().clear();
        Ok(())
    }
}
