//! Workflow Store
//!
//! Holds the open workflow tabs and the active one. Every committed change is
//! pushed to registered observers after the state lock is released, and, when
//! an event bus is attached, announced as a tab event.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use flowdeck_events::{TabEvent, TabEventBus, TabReorder};

use crate::error::WorkflowError;
use crate::workflow::Workflow;
use crate::Result;

/// Open workflows and the active one, as seen by observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowsView {
    pub open: Vec<Workflow>,
    pub active: Option<Workflow>,
}

type ViewObserver = Box<dyn Fn(&WorkflowsView) + Send + Sync>;
type ActiveObserver = Box<dyn Fn(&Workflow) + Send + Sync>;

enum Callback {
    View(ViewObserver),
    Active(ActiveObserver),
}

struct Observer {
    id: u64,
    active: AtomicBool,
    callback: Callback,
}

impl Observer {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct StoreState {
    open: Vec<Workflow>,
    /// Path of the active workflow
    active: Option<String>,
}

impl StoreState {
    fn position(&self, path: &str) -> Option<usize> {
        self.open.iter().position(|w| w.path == path)
    }

    fn find_mut(&mut self, path: &str) -> Result<&mut Workflow> {
        self.open
            .iter_mut()
            .find(|w| w.path == path)
            .ok_or_else(|| WorkflowError::NotOpen(path.to_string()))
    }

    fn active_workflow(&self) -> Option<&Workflow> {
        let active = self.active.as_deref()?;
        self.open.iter().find(|w| w.path == active)
    }

    fn view(&self) -> WorkflowsView {
        WorkflowsView {
            open: self.open.clone(),
            active: self.active_workflow().cloned(),
        }
    }
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<Arc<Observer>>,
}

impl Observers {
    fn insert(&mut self, callback: Callback) -> Arc<Observer> {
        self.next_id += 1;
        let observer = Arc::new(Observer {
            id: self.next_id,
            active: AtomicBool::new(true),
            callback,
        });
        self.entries.push(Arc::clone(&observer));
        observer
    }
}

/// What a mutation changed, if anything.
enum Change {
    None,
    Quiet,
    Announce(Vec<TabEvent>),
}

pub struct WorkflowStore {
    state: Arc<RwLock<StoreState>>,
    observers: Arc<RwLock<Observers>>,
    events: Option<TabEventBus>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            observers: Arc::new(RwLock::new(Observers::default())),
            events: None,
        }
    }

    /// Publish a tab event for every add, remove, select and reorder.
    pub fn with_event_bus(mut self, bus: TabEventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn view(&self) -> WorkflowsView {
        self.state.read().view()
    }

    pub fn open_workflows(&self) -> Vec<Workflow> {
        self.state.read().open.clone()
    }

    pub fn active_workflow(&self) -> Option<Workflow> {
        self.state.read().active_workflow().cloned()
    }

    pub fn get(&self, path: &str) -> Option<Workflow> {
        self.state.read().open.iter().find(|w| w.path == path).cloned()
    }

    /// Open a tab for `workflow`. Returns `false` if its path is already open.
    pub fn open_workflow(&self, workflow: Workflow) -> bool {
        let mut opened = false;
        self.commit(|state| {
            if state.position(&workflow.path).is_some() {
                return Ok(Change::None);
            }

            let event = TabEvent::Add(workflow.descriptor());
            state.open.push(workflow);
            opened = true;
            Ok(Change::Announce(vec![event]))
        })
        .map(|_| opened)
        .unwrap_or(false)
    }

    pub fn close_workflow(&self, path: &str) -> Result<Workflow> {
        let mut closed = None;
        self.commit(|state| {
            let index = state
                .position(path)
                .ok_or_else(|| WorkflowError::NotOpen(path.to_string()))?;

            let workflow = state.open.remove(index);
            if state.active.as_deref() == Some(path) {
                state.active = None;
            }

            let event = TabEvent::Remove(workflow.descriptor());
            closed = Some(workflow);
            Ok(Change::Announce(vec![event]))
        })?;

        closed.ok_or_else(|| WorkflowError::NotOpen(path.to_string()))
    }

    /// Make an open workflow the active one.
    pub fn set_active(&self, path: &str) -> Result<()> {
        self.commit(|state| {
            let workflow = state
                .open
                .iter()
                .find(|w| w.path == path)
                .ok_or_else(|| WorkflowError::NotOpen(path.to_string()))?;

            if state.active.as_deref() == Some(path) {
                return Ok(Change::None);
            }

            let event = TabEvent::Select(workflow.descriptor());
            state.active = Some(path.to_string());
            Ok(Change::Announce(vec![event]))
        })
    }

    pub fn set_modified(&self, path: &str, is_modified: bool) -> Result<()> {
        self.commit(|state| {
            let workflow = state.find_mut(path)?;
            if workflow.is_modified == is_modified {
                return Ok(Change::None);
            }

            workflow.is_modified = is_modified;
            Ok(Change::Quiet)
        })
    }

    /// Record that the workflow was saved to its file.
    pub fn mark_persisted(&self, path: &str) -> Result<()> {
        self.commit(|state| {
            let workflow = state.find_mut(path)?;
            workflow.is_persisted = true;
            workflow.is_modified = false;
            Ok(Change::Quiet)
        })
    }

    /// Point an open workflow at a new path. The new path must not belong to
    /// another open workflow.
    pub fn rename_workflow(&self, path: &str, new_path: &str) -> Result<()> {
        self.commit(|state| {
            if new_path != path && state.position(new_path).is_some() {
                return Err(WorkflowError::AlreadyOpen(new_path.to_string()));
            }

            state.find_mut(path)?.path = new_path.to_string();
            if state.active.as_deref() == Some(path) {
                state.active = Some(new_path.to_string());
            }
            Ok(Change::Quiet)
        })
    }

    /// Move the tab at `from_index` to `to_index`.
    pub fn reorder(&self, from_index: usize, to_index: usize) -> Result<()> {
        self.commit(|state| {
            let len = state.open.len();
            for index in [from_index, to_index] {
                if index >= len {
                    return Err(WorkflowError::InvalidIndex { index, len });
                }
            }

            if from_index == to_index {
                return Ok(Change::None);
            }

            let workflow = state.open.remove(from_index);
            state.open.insert(to_index, workflow);

            Ok(Change::Announce(vec![TabEvent::Reorder(TabReorder {
                from_index,
                to_index,
                tabs: state.open.iter().map(Workflow::descriptor).collect(),
            })]))
        })
    }

    /// Open saved workflows without activating them: `left` goes before the
    /// current tabs and `right` after them. A path that appears more than once
    /// keeps its first position.
    pub fn open_workflows_in_background(&self, left: Vec<String>, right: Vec<String>) {
        let result = self.commit(|state| {
            let current = std::mem::take(&mut state.open);
            let mut events = Vec::new();
            let mut ordered: Vec<Workflow> =
                Vec::with_capacity(left.len() + current.len() + right.len());

            for path in left {
                if ordered.iter().all(|w| w.path != path) {
                    if let Some(existing) = current.iter().find(|w| w.path == path) {
                        ordered.push(existing.clone());
                    } else {
                        let workflow = Workflow::persisted(path);
                        events.push(TabEvent::Add(workflow.descriptor()));
                        ordered.push(workflow);
                    }
                }
            }

            for workflow in current {
                if ordered.iter().all(|w| w.path != workflow.path) {
                    ordered.push(workflow);
                }
            }

            for path in right {
                if ordered.iter().all(|w| w.path != path) {
                    let workflow = Workflow::persisted(path);
                    events.push(TabEvent::Add(workflow.descriptor()));
                    ordered.push(workflow);
                }
            }

            state.open = ordered;

            if events.is_empty() {
                Ok(Change::Quiet)
            } else {
                Ok(Change::Announce(events))
            }
        });

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to open workflows in background");
        }
    }

    /// Call `observer` after every committed change until the returned
    /// handle is unwatched.
    pub fn watch<F>(&self, observer: F) -> StoreWatch
    where
        F: Fn(&WorkflowsView) + Send + Sync + 'static,
    {
        self.register(Callback::View(Box::new(observer)))
    }

    /// Call `observer` with the active workflow whenever a different workflow
    /// (or the same one under a new path) becomes active. Runs immediately if
    /// a workflow is already active.
    pub fn watch_active<F>(&self, observer: F) -> StoreWatch
    where
        F: Fn(&Workflow) + Send + Sync + 'static,
    {
        let watch = self.register(Callback::Active(Box::new(observer)));

        if let (Some(active), Callback::Active(callback)) =
            (self.active_workflow(), &watch.observer.callback)
        {
            callback(&active);
        }

        watch
    }

    /// Number of observers still watching.
    pub fn observer_count(&self) -> usize {
        self.observers.read().entries.len()
    }

    fn register(&self, callback: Callback) -> StoreWatch {
        let observer = self.observers.write().insert(callback);

        StoreWatch {
            observers: Arc::downgrade(&self.observers),
            observer,
        }
    }

    fn commit<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut StoreState) -> Result<Change>,
    {
        let (change, view, active_changed) = {
            let mut state = self.state.write();
            let before = state.active_workflow().map(|w| w.path.clone());

            let change = mutate(&mut state)?;
            if matches!(change, Change::None) {
                return Ok(());
            }

            let view = state.view();
            let active_changed = view.active.as_ref().map(|w| &w.path) != before.as_ref();
            (change, view, active_changed)
        };

        let observers: Vec<Arc<Observer>> = self.observers.read().entries.clone();

        if active_changed {
            if let Some(active) = &view.active {
                tracing::debug!(path = %active.path, "Active workflow changed");
                for observer in &observers {
                    if let Callback::Active(callback) = &observer.callback {
                        if observer.is_active() {
                            callback(active);
                        }
                    }
                }
            }
        }

        for observer in &observers {
            if let Callback::View(callback) = &observer.callback {
                if observer.is_active() {
                    callback(&view);
                }
            }
        }

        if let (Change::Announce(events), Some(bus)) = (change, &self.events) {
            for event in events {
                bus.publish(event);
            }
        }

        Ok(())
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for WorkflowStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            observers: Arc::clone(&self.observers),
            events: self.events.clone(),
        }
    }
}

impl std::fmt::Debug for WorkflowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("WorkflowStore")
            .field("open", &state.open.len())
            .field("active", &state.active)
            .finish()
    }
}

/// Handle returned by [`WorkflowStore::watch`] and
/// [`WorkflowStore::watch_active`].
#[must_use = "the observer stays registered until `unwatch` is called"]
pub struct StoreWatch {
    observers: Weak<RwLock<Observers>>,
    observer: Arc<Observer>,
}

impl StoreWatch {
    /// Remove the observer. Calling this more than once is a no-op.
    pub fn unwatch(&self) {
        if !self.observer.active.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(observers) = self.observers.upgrade() {
            let id = self.observer.id;
            observers.write().entries.retain(|o| o.id != id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.observer.is_active()
    }
}

impl std::fmt::Debug for StoreWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreWatch")
            .field("id", &self.observer.id)
            .field("active", &self.is_active())
            .finish()
    }
}
