//! Tab-strip snapshot
//!
//! Only the restorable subset of open workflows is saved, while the active
//! index is measured against the full open list.

use serde::de::DeserializeOwned;

use flowdeck_storage::{keys, KeyValueStore};

use crate::store::WorkflowsView;
use crate::workflow::Workflow;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenWorkflowsState {
    /// Persisted, unmodified workflows in tab order
    pub paths: Vec<String>,
    /// Position of the active workflow among all open workflows, or -1
    pub active_index: i64,
}

impl Default for OpenWorkflowsState {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            active_index: -1,
        }
    }
}

impl OpenWorkflowsState {
    pub fn derive(open: &[Workflow], active: Option<&Workflow>) -> Self {
        let Some(active) = active else {
            return Self::default();
        };
        if open.is_empty() {
            return Self::default();
        }

        let paths = open
            .iter()
            .filter(|w| w.is_restorable())
            .map(|w| w.path.clone())
            .collect();
        let active_index = open
            .iter()
            .position(|w| w.path == active.path)
            .map_or(-1, |index| index as i64);

        Self {
            paths,
            active_index,
        }
    }

    pub fn from_view(view: &WorkflowsView) -> Self {
        Self::derive(&view.open, view.active.as_ref())
    }

    pub fn is_restorable(&self) -> bool {
        !self.paths.is_empty() && self.active_index >= 0
    }

    /// Paths before the active index and paths from it onwards, or `None`
    /// when there is nothing to restore.
    pub fn split(&self) -> Option<(Vec<String>, Vec<String>)> {
        if !self.is_restorable() {
            return None;
        }

        let at = usize::try_from(self.active_index)
            .unwrap_or(usize::MAX)
            .min(self.paths.len());
        let (left, right) = self.paths.split_at(at);
        Some((left.to_vec(), right.to_vec()))
    }

    /// Read the saved tab strip. Missing or unreadable values fall back to an
    /// empty path list and index -1.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            paths: read_or(store, keys::OPEN_WORKFLOWS_PATHS, defaults.paths),
            active_index: read_or(store, keys::ACTIVE_WORKFLOW_INDEX, defaults.active_index),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(keys::OPEN_WORKFLOWS_PATHS, &serde_json::to_string(&self.paths)?)?;
        store.set(
            keys::ACTIVE_WORKFLOW_INDEX,
            &serde_json::to_string(&self.active_index)?,
        )?;
        Ok(())
    }
}

fn read_or<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    let raw = match store.get(key) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return default,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Failed to read tab state");
            return default;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Ignoring malformed tab state");
            default
        }
    }
}
