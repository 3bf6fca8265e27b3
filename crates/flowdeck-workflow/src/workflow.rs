//! Open workflow entry

use uuid::Uuid;

use flowdeck_events::TabDescriptor;

/// Directory prefix that workflow keys are relative to.
pub const WORKFLOWS_DIR: &str = "workflows/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    /// Tab identifier
    pub id: String,
    pub path: String,
    /// Backed by a saved file
    pub is_persisted: bool,
    /// Has unsaved edits
    pub is_modified: bool,
}

impl Workflow {
    /// A workflow that only exists in the editor so far.
    pub fn temporary(path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: path.into(),
            is_persisted: false,
            is_modified: false,
        }
    }

    /// A workflow loaded from a saved file, with no edits.
    pub fn persisted(path: impl Into<String>) -> Self {
        Self {
            is_persisted: true,
            ..Self::temporary(path)
        }
    }

    pub fn modified(mut self, is_modified: bool) -> Self {
        self.is_modified = is_modified;
        self
    }

    /// Path relative to the workflows directory.
    pub fn key(&self) -> &str {
        self.path.strip_prefix(WORKFLOWS_DIR).unwrap_or(&self.path)
    }

    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Persisted and unmodified, so reopening the file restores it exactly.
    pub fn is_restorable(&self) -> bool {
        self.is_persisted && !self.is_modified
    }

    pub fn descriptor(&self) -> TabDescriptor {
        TabDescriptor::new(self.id.clone(), self.path.clone()).temporary(!self.is_persisted)
    }
}
