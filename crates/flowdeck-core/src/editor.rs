//! Editor startup wiring
//!
//! Owns the persistence controller for one host editor and runs the startup
//! restore: previous graph first, then the saved tab strip.

use std::sync::Arc;

use flowdeck_events::{tab_event_debugger, TabEventBus, TabEventHooks};
use flowdeck_storage::{Database, SessionStore, Storage};
use flowdeck_workflow::{HostEditor, WorkflowPersistence, WorkflowStore};

use crate::config::Config;
use crate::Result;

/// What the startup restore managed to bring back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub workflow_restored: bool,
    pub tabs_restored: bool,
}

pub struct Editor<H: HostEditor> {
    config: Config,
    events: TabEventBus,
    persistence: WorkflowPersistence<H>,
    /// Kept alive for as long as the editor runs
    _debugger: Option<TabEventHooks>,
}

impl<H: HostEditor> Editor<H> {
    /// Open the durable database named by `config` and start persisting
    /// `store`, which the host shares.
    pub fn new(
        config: Config,
        events: TabEventBus,
        host: Arc<H>,
        store: WorkflowStore,
    ) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let storage = Storage::new(Database::open(&config.database_path)?, SessionStore::new());
        Ok(Self::with_storage(config, events, host, store, storage))
    }

    pub fn with_storage(
        config: Config,
        events: TabEventBus,
        host: Arc<H>,
        store: WorkflowStore,
        storage: Storage,
    ) -> Self {
        let debugger = config
            .debug_tab_events
            .then(|| tab_event_debugger(&events));

        let persistence = WorkflowPersistence::install(host, storage, store);

        tracing::info!(
            database = %config.database_path.display(),
            debug_tab_events = config.debug_tab_events,
            "Editor initialized"
        );

        Self {
            config,
            events,
            persistence,
            _debugger: debugger,
        }
    }

    /// Restore the previous graph, then reopen the saved tabs around it.
    pub async fn restore(&self) -> RestoreSummary {
        let workflow_restored = self.persistence.restore_previous_workflow().await;
        let tabs_restored = self.persistence.restore_workflow_tabs_state();

        let summary = RestoreSummary {
            workflow_restored,
            tabs_restored,
        };
        tracing::info!(?summary, "Startup restore finished");
        summary
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &TabEventBus {
        &self.events
    }

    pub fn store(&self) -> &WorkflowStore {
        self.persistence.store()
    }

    pub fn storage(&self) -> &Storage {
        self.persistence.storage()
    }

    pub fn persistence(&self) -> &WorkflowPersistence<H> {
        &self.persistence
    }
}
