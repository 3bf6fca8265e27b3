//! FlowDeck Core
//!
//! Wires storage, the tab event bus and workflow persistence together and
//! runs the startup restore in the required order.

mod config;
mod editor;
mod error;

pub use config::Config;
pub use editor::{Editor, RestoreSummary};
pub use error::CoreError;

// Re-export core components
pub use flowdeck_events::{
    tab_event_debugger, tab_events, Subscription, TabDescriptor, TabEvent, TabEventBus,
    TabEventHandlers, TabEventHooks, TabEventKind, TabReorder,
};
pub use flowdeck_storage::{keys, Database, KeyValueStore, SessionStore, Storage, StorageError};
pub use flowdeck_workflow::{
    HostEditor, LoadGraphOptions, OpenWorkflowsState, StoreWatch, Workflow, WorkflowError,
    WorkflowPersistence, WorkflowStore, WorkflowsView,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging. `RUST_LOG` overrides `default_filter`.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Embedders may already have installed a subscriber
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
