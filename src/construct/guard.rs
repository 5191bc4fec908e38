//! Cycle guard
//!
//! Tracks the slots whose construction is in progress on the current thread.
//! A slot that is entered again before its first construction has finished is
//! trying to embed itself; the guard refuses it and resets.

use super::errors::EmbedError;
use crate::model::SlotModel;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tracing::{trace, warn};

/// What the guard forgets when it detects a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleResetPolicy {
    /// Clear every in-progress entry
    #[default]
    Full,
    /// Drop the re-entered slot and everything entered after it
    Subtree,
}

/// Ordered set of slots under construction
///
/// Not `Sync`: every thread constructing objects uses its own guard.
#[derive(Debug, Default)]
pub struct CycleGuard {
    in_progress: RefCell<IndexSet<SlotModel>>,
    policy: CycleResetPolicy,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: CycleResetPolicy) -> Self {
        Self {
            in_progress: RefCell::new(IndexSet::new()),
            policy,
        }
    }

    pub fn policy(&self) -> CycleResetPolicy {
        self.policy
    }

    /// Mark `model` as in progress until the returned token is dropped
    pub fn enter(
        &self,
        model: &SlotModel,
    ) -> Result<InProgress<'_>, EmbedError> {
        let mut set = self.in_progress.borrow_mut();
        if let Some(index) = set.get_index_of(model) {
            let mut path: Vec<String> = set
                .iter()
                .skip(index)
                .map(|entry| entry.qualified_name().to_string())
                .collect();
            path.push(model.qualified_name().to_string());

            match self.policy {
                CycleResetPolicy::Full => set.clear(),
                CycleResetPolicy::Subtree => set.truncate(index),
            }
            warn!(
                slot = model.qualified_name(),
                cycle = %path.join(" -> "),
                "recursively embedding a slot, construction refused"
            );
            return Err(EmbedError::CycleDetected {
                slot: model.qualified_name().to_string(),
                path,
            });
        }

        set.insert(model.clone());
        trace!(slot = model.qualified_name(), depth = set.len(), "guard enter");
        Ok(InProgress {
            guard: self,
            model: model.clone(),
        })
    }

    pub fn contains(
        &self,
        model: &SlotModel,
    ) -> bool {
        self.in_progress.borrow().contains(model)
    }

    pub fn is_empty(&self) -> bool {
        self.in_progress.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.in_progress.borrow().len()
    }

    /// Qualified names of the slots in progress, outermost first
    pub fn in_progress(&self) -> Vec<String> {
        self.in_progress
            .borrow()
            .iter()
            .map(|model| model.qualified_name().to_string())
            .collect()
    }
}

/// Token for one in-progress slot; leaving scope exits the guard
#[must_use = "the slot leaves the guard as soon as the token is dropped"]
pub struct InProgress<'g> {
    guard: &'g CycleGuard,
    model: SlotModel,
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        // A reset may already have removed the entry
        let removed = self
            .guard
            .in_progress
            .borrow_mut()
            .shift_remove(&self.model);
        trace!(slot = self.model.qualified_name(), removed, "guard exit");
    }
}
