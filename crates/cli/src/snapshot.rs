//! Latest completed pass, shared between the refresh cycle and readers.
//!
//! One [`SnapshotWriter`] (not `Clone`) swaps whole snapshots in; any number
//! of [`SnapshotReader`]s take an `Arc` of whatever is current. A reader
//! never observes a half-built snapshot.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use nepse_recon::model::ReconSummary;
use nepse_recon::{MergedRecord, ReconSchema};

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub records: Vec<MergedRecord>,
    pub schema: ReconSchema,
    pub summary: ReconSummary,
    pub html: String,
    pub generated_at: DateTime<Utc>,
    /// Whether the page reached the publish target.
    pub published: bool,
}

/// What `/status` reports about a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStatus<'a> {
    pub status: &'static str,
    pub generated_at: String,
    pub published: bool,
    pub rows: usize,
    pub unavailable_ratio: f64,
    pub summary: &'a ReconSummary,
}

impl Snapshot {
    pub fn status(&self) -> SnapshotStatus<'_> {
        SnapshotStatus {
            status: "ok",
            generated_at: self.generated_at.to_rfc3339(),
            published: self.published,
            rows: self.records.len(),
            unavailable_ratio: self.summary.unavailable_ratio(),
            summary: &self.summary,
        }
    }
}

type Slot = Arc<RwLock<Option<Arc<Snapshot>>>>;

/// Empty holder for the latest snapshot. Splitting it is the only way to
/// obtain a writer.
pub struct SnapshotCell {
    slot: Slot,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    pub fn split(self) -> (SnapshotWriter, SnapshotReader) {
        (
            SnapshotWriter { slot: Arc::clone(&self.slot) },
            SnapshotReader { slot: self.slot },
        )
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SnapshotWriter {
    slot: Slot,
}

impl SnapshotWriter {
    /// Replace the current snapshot, returning the previous one.
    pub fn swap(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        // A poisoned lock still holds a complete Arc
        let mut guard = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        guard.replace(Arc::new(snapshot))
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.reader().latest()
    }
}

#[derive(Clone)]
pub struct SnapshotReader {
    slot: Slot,
}

impl SnapshotReader {
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
