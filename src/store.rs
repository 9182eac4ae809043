//! Latest-state store.
//!
//! A single slot holding the most recent inference result and the count of
//! successful updates. Written by ingestion, read by status polling. Every
//! read and write takes the same lock, so a reader sees either the whole
//! previous result or the whole new one, never a mix. The lock is held only
//! long enough to copy a few words.

use parking_lot::Mutex;

use crate::types::{InferenceResult, Prediction, StatusSnapshot};

#[derive(Debug, Default)]
struct Slot {
    latest: Option<Prediction>,
    sequence: u64,
}

/// Single-slot, mutex-guarded store of the most recent result.
#[derive(Debug, Default)]
pub struct LatestStateStore {
    slot: Mutex<Slot>,
}

impl LatestStateStore {
    /// A store in the "no data yet" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored result and bump the sequence number.
    ///
    /// Returns the result as stored, including its sequence number.
    pub fn update(&self, prediction: Prediction) -> InferenceResult {
        let mut slot = self.slot.lock();
        slot.sequence += 1;
        slot.latest = Some(prediction);
        InferenceResult {
            prediction,
            sequence: slot.sequence,
        }
    }

    /// Snapshot of the current state.
    pub fn read(&self) -> StatusSnapshot {
        let slot = self.slot.lock();
        match slot.latest {
            Some(prediction) => StatusSnapshot::from(InferenceResult {
                prediction,
                sequence: slot.sequence,
            }),
            None => StatusSnapshot::empty(),
        }
    }

    /// Number of successful updates so far.
    pub fn sequence(&self) -> u64 {
        self.slot.lock().sequence
    }
}
