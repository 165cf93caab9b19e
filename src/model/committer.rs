//! The change committer: a queue of pending mutations plus the typed report
//! handed back once the server applies them.
//!
//! Every mutating call on the model layer (measure upsert, table creation,
//! property edits, object removal, refresh requests) appends a [`PendingOp`]
//! here rather than touching the server immediately; nothing reaches the wire
//! until [`crate::model::graph::Model::commit`] calls `save_changes` once for
//! the whole batch.

use crate::driver::{PendingOp, RawChangeSet};

/// Queue of mutations accumulated since the last commit.
#[derive(Debug, Default)]
pub struct PendingChanges {
    ops: Vec<PendingOp>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn push(&mut self, op: PendingOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Drains the queue, handing ownership of the accumulated ops to the caller.
    pub fn take(&mut self) -> Vec<PendingOp> {
        std::mem::take(&mut self.ops)
    }
}

/// The typed result of a successful [`crate::model::graph::Model::commit`].
///
/// A thin wrapper over the driver's [`RawChangeSet`]; kept as its own type so
/// the model layer can grow summary helpers without leaking driver internals
/// into call sites.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    raw: RawChangeSet,
}

impl ChangeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: RawChangeSet) -> Self {
        Self { raw }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn added_objects(&self) -> &[String] {
        &self.raw.added_objects
    }

    pub fn removed_objects(&self) -> &[String] {
        &self.raw.removed_objects
    }

    pub fn property_changes(&self) -> &[crate::driver::PropertyChangeRecord] {
        &self.raw.property_changes
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.raw.diagnostics
    }
}
