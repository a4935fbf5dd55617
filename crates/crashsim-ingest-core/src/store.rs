use std::collections::VecDeque;

use model::Sample;

pub const HISTORY_CAPACITY: usize = 100;

/// Rolling chart window plus the full export log.
///
/// Both views are fed by one `push`, so a sample is either in both or in
/// neither. Callers guard the whole store with a single lock.
#[derive(Debug, Clone)]
pub struct TelemetryStore {
    history: VecDeque<Sample>,
    capacity: usize,
    log: Vec<Sample>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl TelemetryStore {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { history: VecDeque::with_capacity(capacity), capacity, log: Vec::new() }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample.clone());
        self.log.push(sample);
    }

    /// Copy of the chart window, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.history.iter().cloned().collect()
    }

    pub fn history(&self) -> &VecDeque<Sample> {
        &self.history
    }

    pub fn export_log(&self) -> &[Sample] {
        &self.log
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.log.clear();
    }
}
