//! FlowDeck Workflow Persistence
//!
//! Mirrors the editor's open workflows into storage and rebuilds them at
//! startup:
//! - the current graph is snapshotted on every active-workflow change and on
//!   every graph change, durably and per client session
//! - the tab strip (restorable paths plus active index) is rewritten whenever
//!   it changes
//! - at startup the session snapshot wins over the durable one, and the saved
//!   tab strip is reopened in the background

mod error;
mod host;
mod persistence;
mod store;
mod tab_state;
mod workflow;

pub use error::WorkflowError;
pub use host::{GraphChangedListener, HostEditor, LoadGraphOptions};
pub use persistence::WorkflowPersistence;
pub use store::{StoreWatch, WorkflowStore, WorkflowsView};
pub use tab_state::OpenWorkflowsState;
pub use workflow::{Workflow, WORKFLOWS_DIR};

pub type Result<T> = std::result::Result<T, WorkflowError>;
