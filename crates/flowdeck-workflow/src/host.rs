//! Host editor seam

use serde_json::Value;
use std::future::Future;

use crate::Result;

pub type GraphChangedListener = Box<dyn Fn() + Send + Sync>;

/// How the host should treat a graph handed to [`HostEditor::load_graph`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadGraphOptions {
    /// Clear the current graph before loading
    pub replace_existing: bool,
    /// Record the workflow in the host's recent list
    pub add_to_recents: bool,
    /// Display-name hint for the loaded workflow
    pub workflow_name: Option<String>,
}

/// The editor that owns the document graph.
///
/// The graph format is the host's business; persistence only moves it
/// around as JSON.
pub trait HostEditor: Send + Sync + 'static {
    fn serialize_graph(&self) -> Result<Value>;

    fn load_graph(
        &self,
        graph: Value,
        options: LoadGraphOptions,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Identifier of the current client session, if connected.
    fn client_id(&self) -> Option<String>;

    /// Identifier the session started with; differs from `client_id` after a
    /// reconnect.
    fn initial_client_id(&self) -> Option<String>;

    /// Register a callback for in-place edits of the current graph.
    fn on_graph_changed(&self, listener: GraphChangedListener);
}
