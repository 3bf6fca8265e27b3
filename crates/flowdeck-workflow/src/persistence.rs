//! Workflow Persistence
//!
//! Keeps storage in step with the editor and rebuilds the editor from it at
//! startup. Construction reads the saved tab strip first and only then
//! installs the watchers that overwrite it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flowdeck_storage::{keys, KeyValueStore, Storage};

use crate::host::{HostEditor, LoadGraphOptions};
use crate::store::{StoreWatch, WorkflowStore};
use crate::tab_state::OpenWorkflowsState;
use crate::workflow::Workflow;
use crate::Result;

pub struct WorkflowPersistence<H: HostEditor> {
    host: Arc<H>,
    storage: Storage,
    store: WorkflowStore,
    /// Tab strip read at install time, consumed by the first restore
    stored_tabs: Arc<Mutex<Option<OpenWorkflowsState>>>,
    restore_attempted: Arc<AtomicBool>,
    watchers: Arc<Watchers>,
}

/// Detaches every watcher once the last persistence handle is gone.
struct Watchers {
    live: Arc<AtomicBool>,
    store_watches: Vec<StoreWatch>,
}

impl Drop for Watchers {
    fn drop(&mut self) {
        // The host offers no way to remove the graph-changed listener
        self.live.store(false, Ordering::Release);
        for watch in &self.store_watches {
            watch.unwatch();
        }
        tracing::debug!("Workflow persistence watchers detached");
    }
}

impl<H: HostEditor> WorkflowPersistence<H> {
    /// Read the saved tab strip, then start mirroring `store` and the host
    /// graph into `storage`.
    pub fn install(host: Arc<H>, storage: Storage, store: WorkflowStore) -> Self {
        let stored_tabs = OpenWorkflowsState::load(storage.durable());

        tracing::debug!(
            paths = stored_tabs.paths.len(),
            active_index = stored_tabs.active_index,
            "Read stored workflow tabs"
        );

        let watchers = install_watchers(&host, &storage, &store);

        Self {
            host,
            storage,
            store,
            stored_tabs: Arc::new(Mutex::new(Some(stored_tabs))),
            restore_attempted: Arc::new(AtomicBool::new(false)),
            watchers: Arc::new(watchers),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    /// Write the host's current graph durably and, when connected, for the
    /// current client session.
    pub fn persist_current_workflow(&self) -> Result<()> {
        persist_graph(self.host.as_ref(), &self.storage)
    }

    /// Load a stored graph into the host. `None` or empty input loads nothing
    /// and returns `false`.
    pub async fn load_workflow_from_storage(
        &self,
        json: Option<&str>,
        workflow_name: Option<&str>,
    ) -> Result<bool> {
        let json = match json {
            Some(json) if !json.is_empty() => json,
            _ => return Ok(false),
        };

        let graph: serde_json::Value = serde_json::from_str(json)?;
        self.host
            .load_graph(
                graph,
                LoadGraphOptions {
                    replace_existing: true,
                    add_to_recents: true,
                    workflow_name: workflow_name.map(str::to_owned),
                },
            )
            .await?;

        Ok(true)
    }

    /// Load the session snapshot if there is one, otherwise the durable one.
    pub async fn load_previous_workflow_from_storage(&self) -> Result<bool> {
        let workflow_name = self.storage.durable().get(keys::PREVIOUS_WORKFLOW)?;
        let client_id = self
            .host
            .initial_client_id()
            .or_else(|| self.host.client_id());

        if let Some(client_id) = client_id {
            let session_workflow = self
                .storage
                .session()
                .get(&keys::session_workflow(&client_id))?;

            if self
                .load_workflow_from_storage(session_workflow.as_deref(), workflow_name.as_deref())
                .await?
            {
                tracing::info!(client_id = %client_id, "Restored workflow from session storage");
                return Ok(true);
            }
        }

        let durable_workflow = self.storage.durable().get(keys::CURRENT_WORKFLOW)?;
        let loaded = self
            .load_workflow_from_storage(durable_workflow.as_deref(), workflow_name.as_deref())
            .await?;

        if loaded {
            tracing::info!("Restored workflow from durable storage");
        }

        Ok(loaded)
    }

    /// Startup entry point. Failures are logged and the editor starts empty.
    /// Only the first call does anything.
    pub async fn restore_previous_workflow(&self) -> bool {
        if self.restore_attempted.swap(true, Ordering::AcqRel) {
            tracing::debug!("Previous workflow restore already attempted");
            return false;
        }

        match self.load_previous_workflow_from_storage().await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(error = %e, "Error loading previous workflow");
                false
            }
        }
    }

    /// Startup entry point. Reopens the saved tab strip in the background,
    /// split around the saved active index. Only the first call does
    /// anything.
    pub fn restore_workflow_tabs_state(&self) -> bool {
        let Some(stored) = self.stored_tabs.lock().take() else {
            return false;
        };

        let Some((left, right)) = stored.split() else {
            tracing::debug!("No restorable workflow tabs");
            return false;
        };

        tracing::info!(
            left = left.len(),
            right = right.len(),
            "Restoring workflow tabs"
        );

        self.store.open_workflows_in_background(left, right);
        true
    }
}

impl<H: HostEditor> Clone for WorkflowPersistence<H> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            storage: self.storage.clone(),
            store: self.store.clone(),
            stored_tabs: Arc::clone(&self.stored_tabs),
            restore_attempted: Arc::clone(&self.restore_attempted),
            watchers: Arc::clone(&self.watchers),
        }
    }
}

impl<H: HostEditor> std::fmt::Debug for WorkflowPersistence<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowPersistence")
            .field("storage", &self.storage)
            .field("store", &self.store)
            .field("stored_tabs", &*self.stored_tabs.lock())
            .finish_non_exhaustive()
    }
}

/// Mirror active-workflow changes, graph edits and the tab strip into
/// storage. Host references are weak so a host that owns `store` is not kept
/// alive by its own observers.
fn install_watchers<H: HostEditor>(
    host: &Arc<H>,
    storage: &Storage,
    store: &WorkflowStore,
) -> Watchers {
    let live = Arc::new(AtomicBool::new(true));

    let weak_host = Arc::downgrade(host);
    let active_storage = storage.clone();
    let active_watch = store.watch_active(move |workflow| {
        let Some(host) = weak_host.upgrade() else {
            return;
        };
        if let Err(e) = remember_active(host.as_ref(), &active_storage, workflow) {
            tracing::warn!(path = %workflow.path, error = %e, "Failed to persist active workflow");
        }
    });

    let weak_host = Arc::downgrade(host);
    let graph_storage = storage.clone();
    let graph_live = Arc::clone(&live);
    host.on_graph_changed(Box::new(move || {
        if !graph_live.load(Ordering::Acquire) {
            return;
        }
        let Some(host) = weak_host.upgrade() else {
            return;
        };
        if let Err(e) = persist_graph(host.as_ref(), &graph_storage) {
            tracing::warn!(error = %e, "Failed to persist changed graph");
        }
    }));

    let tabs_storage = storage.clone();
    let last_written = Mutex::new(OpenWorkflowsState::from_view(&store.view()));
    let tabs_watch = store.watch(move |view| {
        let state = OpenWorkflowsState::from_view(view);
        let mut last_written = last_written.lock();
        if *last_written == state {
            return;
        }

        match state.save(tabs_storage.durable()) {
            Ok(()) => *last_written = state,
            Err(e) => tracing::warn!(error = %e, "Failed to persist workflow tabs"),
        }
    });

    Watchers {
        live,
        store_watches: vec![active_watch, tabs_watch],
    }
}

fn persist_graph<H: HostEditor + ?Sized>(host: &H, storage: &Storage) -> Result<()> {
    let workflow = serde_json::to_string(&host.serialize_graph()?)?;

    storage.durable().set(keys::CURRENT_WORKFLOW, &workflow)?;
    if let Some(client_id) = host.client_id() {
        storage
            .session()
            .set(&keys::session_workflow(&client_id), &workflow)?;
    }

    tracing::debug!(bytes = workflow.len(), "Persisted current workflow");
    Ok(())
}

fn remember_active<H: HostEditor + ?Sized>(
    host: &H,
    storage: &Storage,
    workflow: &Workflow,
) -> Result<()> {
    storage.durable().set(keys::PREVIOUS_WORKFLOW, workflow.key())?;
    // The graph of the newly active workflow is already loaded by now
    persist_graph(host, storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use serde_json::{json, Value};

    #[derive(Default)]
    struct FakeHost {
        graph: Mutex<Value>,
        client_id: Option<String>,
        initial_client_id: Option<String>,
        loads: Mutex<Vec<(Value, LoadGraphOptions)>>,
        fail_loads: bool,
        graph_listeners: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
    }

    impl FakeHost {
        fn with_client(client_id: &str) -> Self {
            Self {
                client_id: Some(client_id.to_string()),
                ..Self::default()
            }
        }

        fn edit(&self, graph: Value) {
            *self.graph.lock() = graph;
            for listener in self.graph_listeners.lock().iter() {
                listener();
            }
        }

        fn loads(&self) -> Vec<(Value, LoadGraphOptions)> {
            self.loads.lock().clone()
        }
    }

    impl HostEditor for FakeHost {
        fn serialize_graph(&self) -> Result<Value> {
            Ok(self.graph.lock().clone())
        }

        async fn load_graph(&self, graph: Value, options: LoadGraphOptions) -> Result<()> {
            if self.fail_loads {
                return Err(WorkflowError::Host("graph rejected".to_string()));
            }
            *self.graph.lock() = graph.clone();
            self.loads.lock().push((graph, options));
            Ok(())
        }

        fn client_id(&self) -> Option<String> {
            self.client_id.clone()
        }

        fn initial_client_id(&self) -> Option<String> {
            self.initial_client_id.clone()
        }

        fn on_graph_changed(&self, listener: Box<dyn Fn() + Send + Sync>) {
            self.graph_listeners.lock().push(listener);
        }
    }

    fn setup(host: FakeHost) -> (WorkflowPersistence<FakeHost>, Storage) {
        let storage = Storage::in_memory().unwrap();
        let persistence =
            WorkflowPersistence::install(Arc::new(host), storage.clone(), WorkflowStore::new());
        (persistence, storage)
    }

    #[test]
    fn test_persist_writes_session_copy_only_when_connected() {
        let (persistence, storage) = setup(FakeHost::default());
        *persistence.host().graph.lock() = json!({"nodes": [1]});
        persistence.persist_current_workflow().unwrap();

        assert_eq!(
            storage.durable().get(keys::CURRENT_WORKFLOW).unwrap().as_deref(),
            Some(r#"{"nodes":[1]}"#)
        );
        assert!(storage.session().is_empty());

        let (persistence, storage) = setup(FakeHost::with_client("c1"));
        *persistence.host().graph.lock() = json!({"nodes": [2]});
        persistence.persist_current_workflow().unwrap();

        assert_eq!(
            storage.session().get("workflow:c1").unwrap().as_deref(),
            Some(r#"{"nodes":[2]}"#)
        );
    }

    #[tokio::test]
    async fn test_load_nothing() {
        let (persistence, _) = setup(FakeHost::default());

        assert!(!persistence.load_workflow_from_storage(None, Some("a.json")).await.unwrap());
        assert!(!persistence.load_workflow_from_storage(Some(""), None).await.unwrap());
        assert!(persistence.host().loads().is_empty());
    }

    #[tokio::test]
    async fn test_load_passes_name_hint() {
        let (persistence, _) = setup(FakeHost::default());

        let loaded = persistence
            .load_workflow_from_storage(Some(r#"{"nodes":[]}"#), Some("a.json"))
            .await
            .unwrap();

        assert!(loaded);
        let loads = persistence.host().loads();
        assert_eq!(loads[0].0, json!({"nodes": []}));
        assert_eq!(
            loads[0].1,
            LoadGraphOptions {
                replace_existing: true,
                add_to_recents: true,
                workflow_name: Some("a.json".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_load_malformed_json_propagates() {
        let (persistence, _) = setup(FakeHost::default());
        let result = persistence.load_workflow_from_storage(Some("{nodes"), None).await;
        assert!(matches!(result, Err(WorkflowError::Json(_))));
    }

    #[tokio::test]
    async fn test_session_snapshot_wins() {
        let (persistence, storage) = setup(FakeHost::with_client("s1"));
        storage.session().set("workflow:s1", r#"{"nodes":[]}"#).unwrap();
        storage.durable().set("workflow", r#"{"nodes":["x"]}"#).unwrap();
        storage.durable().set(keys::PREVIOUS_WORKFLOW, "a.json").unwrap();

        assert!(persistence.restore_previous_workflow().await);

        let loads = persistence.host().loads();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].0, json!({"nodes": []}));
        assert_eq!(loads[0].1.workflow_name.as_deref(), Some("a.json"));
    }

    #[tokio::test]
    async fn test_initial_client_id_preferred() {
        let host = FakeHost {
            client_id: Some("now".to_string()),
            initial_client_id: Some("start".to_string()),
            ..FakeHost::default()
        };
        let (persistence, storage) = setup(host);
        storage.session().set("workflow:start", r#"{"from":"start"}"#).unwrap();
        storage.session().set("workflow:now", r#"{"from":"now"}"#).unwrap();

        assert!(persistence.load_previous_workflow_from_storage().await.unwrap());
        assert_eq!(persistence.host().loads()[0].0, json!({"from": "start"}));
    }

    #[tokio::test]
    async fn test_falls_back_to_durable_snapshot() {
        // Connected, but nothing saved for this session
        let (persistence, storage) = setup(FakeHost::with_client("s1"));
        storage.durable().set("workflow", r#"{"nodes":["x"]}"#).unwrap();

        assert!(persistence.restore_previous_workflow().await);
        assert_eq!(persistence.host().loads()[0].0, json!({"nodes": ["x"]}));

        // Not connected at all
        let (persistence, storage) = setup(FakeHost::default());
        storage.session().set("workflow:s1", r#"{"nodes":[]}"#).unwrap();
        storage.durable().set("workflow", r#"{"nodes":["x"]}"#).unwrap();

        assert!(persistence.restore_previous_workflow().await);
        assert_eq!(persistence.host().loads()[0].0, json!({"nodes": ["x"]}));
    }

    #[tokio::test]
    async fn test_restore_swallows_errors_and_runs_once() {
        let host = FakeHost {
            fail_loads: true,
            ..FakeHost::default()
        };
        let (persistence, storage) = setup(host);
        storage.durable().set("workflow", r#"{"nodes":[]}"#).unwrap();

        assert!(!persistence.restore_previous_workflow().await);
        assert!(!persistence.restore_previous_workflow().await);

        let (persistence, storage) = setup(FakeHost::default());
        storage.durable().set("workflow", "corrupt").unwrap();
        assert!(!persistence.restore_previous_workflow().await);
        assert!(persistence.host().loads().is_empty());
    }

    #[test]
    fn test_active_change_remembers_key_and_persists() {
        let (persistence, storage) = setup(FakeHost::with_client("c1"));
        *persistence.host().graph.lock() = json!({"nodes": ["b"]});

        let store = persistence.store();
        store.open_workflow(Workflow::persisted("workflows/b.json"));
        store.set_active("workflows/b.json").unwrap();

        assert_eq!(
            storage.durable().get(keys::PREVIOUS_WORKFLOW).unwrap().as_deref(),
            Some("b.json")
        );
        assert_eq!(
            storage.session().get("workflow:c1").unwrap().as_deref(),
            Some(r#"{"nodes":["b"]}"#)
        );
    }

    #[test]
    fn test_graph_change_persists() {
        let (persistence, storage) = setup(FakeHost::default());

        persistence.host().edit(json!({"nodes": ["edited"]}));

        assert_eq!(
            storage.durable().get(keys::CURRENT_WORKFLOW).unwrap().as_deref(),
            Some(r#"{"nodes":["edited"]}"#)
        );
    }

    #[test]
    fn test_tab_strip_written_on_change() {
        let (persistence, storage) = setup(FakeHost::default());
        let store = persistence.store();

        store.open_workflow(Workflow::persisted("a"));
        store.open_workflow(Workflow::temporary("b"));
        store.open_workflow(Workflow::persisted("c").modified(true));
        // Nothing active yet, so nothing worth writing
        assert_eq!(storage.durable().get(keys::OPEN_WORKFLOWS_PATHS).unwrap(), None);

        store.set_active("a").unwrap();
        assert_eq!(
            OpenWorkflowsState::load(storage.durable()),
            OpenWorkflowsState {
                paths: vec!["a".to_string()],
                active_index: 0,
            }
        );
    }

    #[test]
    fn test_stored_tabs_read_before_watchers() {
        let storage = Storage::in_memory().unwrap();
        storage
            .durable()
            .set(keys::OPEN_WORKFLOWS_PATHS, r#"["a","b","c"]"#)
            .unwrap();
        storage.durable().set(keys::ACTIVE_WORKFLOW_INDEX, "1").unwrap();

        // The store already has an active tab, so watchers fire during install
        let store = WorkflowStore::new();
        store.open_workflow(Workflow::temporary("x"));
        store.set_active("x").unwrap();

        let persistence =
            WorkflowPersistence::install(Arc::new(FakeHost::default()), storage.clone(), store);

        assert!(persistence.restore_workflow_tabs_state());
        let paths: Vec<String> = persistence
            .store()
            .open_workflows()
            .into_iter()
            .map(|w| w.path)
            .collect();
        assert_eq!(paths, vec!["a", "x", "b", "c"]);

        // Consumed by the first call
        assert!(!persistence.restore_workflow_tabs_state());
    }

    #[test]
    fn test_unrestorable_tab_strip_opens_nothing() {
        for (paths, index) in [(r#"["a","b"]"#, "-1"), ("[]", "0"), ("garbage", "1")] {
            let storage = Storage::in_memory().unwrap();
            storage.durable().set(keys::OPEN_WORKFLOWS_PATHS, paths).unwrap();
            storage.durable().set(keys::ACTIVE_WORKFLOW_INDEX, index).unwrap();

            let persistence = WorkflowPersistence::install(
                Arc::new(FakeHost::default()),
                storage,
                WorkflowStore::new(),
            );

            assert!(!persistence.restore_workflow_tabs_state());
            assert!(persistence.store().open_workflows().is_empty());
        }
    }

    #[test]
    fn test_tab_strip_round_trip() {
        let storage = Storage::in_memory().unwrap();
        let first = WorkflowPersistence::install(
            Arc::new(FakeHost::default()),
            storage.clone(),
            WorkflowStore::new(),
        );
        for path in ["workflows/a.json", "workflows/b.json", "workflows/c.json"] {
            first.store().open_workflow(Workflow::persisted(path));
        }
        first.store().set_active("workflows/b.json").unwrap();
        let saved = OpenWorkflowsState::from_view(&first.store().view());

        // Next startup
        let second = WorkflowPersistence::install(
            Arc::new(FakeHost::default()),
            storage.clone(),
            WorkflowStore::new(),
        );
        assert_eq!(OpenWorkflowsState::load(storage.durable()), saved);
        assert!(second.restore_workflow_tabs_state());

        let reopened: Vec<String> = second
            .store()
            .open_workflows()
            .into_iter()
            .map(|w| w.path)
            .collect();
        assert_eq!(reopened, saved.paths);
        assert_eq!(
            saved.split(),
            Some((
                vec!["workflows/a.json".to_string()],
                vec!["workflows/b.json".to_string(), "workflows/c.json".to_string()],
            ))
        );
    }

    #[test]
    fn test_dropping_persistence_detaches_watchers() {
        let storage = Storage::in_memory().unwrap();
        let store = WorkflowStore::new();
        let host = Arc::new(FakeHost::default());

        let persistence =
            WorkflowPersistence::install(Arc::clone(&host), storage.clone(), store.clone());
        let clone = persistence.clone();
        assert_eq!(store.observer_count(), 2);

        // Watchers outlive a single handle
        drop(persistence);
        assert_eq!(store.observer_count(), 2);

        drop(clone);
        assert_eq!(store.observer_count(), 0);
        assert_eq!(Arc::strong_count(&host), 1);

        store.open_workflow(Workflow::persisted("workflows/a.json"));
        store.set_active("workflows/a.json").unwrap();
        host.edit(json!({"nodes": ["after"]}));

        assert_eq!(storage.durable().get(keys::PREVIOUS_WORKFLOW).unwrap(), None);
        assert_eq!(storage.durable().get(keys::CURRENT_WORKFLOW).unwrap(), None);
        assert_eq!(storage.durable().get(keys::OPEN_WORKFLOWS_PATHS).unwrap(), None);
    }

    #[test]
    fn test_host_owning_store_is_freed() {
        struct OwningHost {
            _store: WorkflowStore,
            inner: FakeHost,
        }

        impl HostEditor for OwningHost {
            fn serialize_graph(&self) -> Result<Value> {
                self.inner.serialize_graph()
            }

            async fn load_graph(&self, graph: Value, options: LoadGraphOptions) -> Result<()> {
                self.inner.load_graph(graph, options).await
            }

            fn client_id(&self) -> Option<String> {
                None
            }

            fn initial_client_id(&self) -> Option<String> {
                None
            }

            fn on_graph_changed(&self, listener: Box<dyn Fn() + Send + Sync>) {
                self.inner.on_graph_changed(listener)
            }
        }

        let store = WorkflowStore::new();
        let host = Arc::new(OwningHost {
            _store: store.clone(),
            inner: FakeHost::default(),
        });
        let weak = Arc::downgrade(&host);

        let persistence = WorkflowPersistence::install(host, Storage::in_memory().unwrap(), store);
        drop(persistence);

        assert!(weak.upgrade().is_none());
    }
}
