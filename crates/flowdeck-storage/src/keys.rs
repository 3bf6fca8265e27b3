//! Fixed storage keys
//!
//! These names are read back by older builds of the editor, so they must not
//! change.

/// Durable key remembering the key of the last active workflow.
pub const PREVIOUS_WORKFLOW: &str = "Comfy.PreviousWorkflow";

/// Durable key holding the JSON array of restorable open workflow paths.
pub const OPEN_WORKFLOWS_PATHS: &str = "Comfy.OpenWorkflowsPaths";

/// Durable key holding the JSON index of the active workflow tab.
pub const ACTIVE_WORKFLOW_INDEX: &str = "Comfy.ActiveWorkflowIndex";

/// Durable key holding the serialized graph of the current workflow.
pub const CURRENT_WORKFLOW: &str = "workflow";

/// Session key holding the serialized graph for one client session.
pub fn session_workflow(client_id: &str) -> String {
    format!("{}:{}", CURRENT_WORKFLOW, client_id)
}
