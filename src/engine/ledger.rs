// src/engine/ledger.rs — Per-turn ordered set of operations keyed by (name, kind)

use super::types::{Operation, OperationStatus};

/// Ordered operations for the current turn.
///
/// Never holds two entries with the same identity. An update for a known
/// identity overwrites the entry where it stands; new identities append.
/// Statuses are mirrored as received, last write wins.
#[derive(Debug, Clone, Default)]
pub struct OperationLedger {
    entries: Vec<Operation>,
}

impl OperationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by identity. Returns the entry's index.
    pub fn upsert(&mut self, op: Operation) -> usize {
        match self.entries.iter().position(|e| e.same_identity(&op)) {
            Some(idx) => {
                self.entries[idx] = op;
                idx
            }
            None => {
                self.entries.push(op);
                self.entries.len() - 1
            }
        }
    }

    pub fn snapshot(&self) -> Vec<Operation> {
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, name: &str, kind: &str) -> Option<&Operation> {
        self.entries
            .iter()
            .find(|e| e.name == name && e.kind == kind)
    }

    pub fn running(&self) -> impl Iterator<Item = &Operation> {
        self.entries
            .iter()
            .filter(|e| e.status == OperationStatus::Running)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
