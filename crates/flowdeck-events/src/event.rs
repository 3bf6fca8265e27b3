//! Tab event payloads

use serde::{Deserialize, Serialize};

use crate::kind::TabEventKind;
use crate::Result;

/// Identifies one tab in an event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDescriptor {
    pub id: String,
    pub path: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_temporary: Option<bool>,
}

impl TabDescriptor {
    /// Descriptor whose filename is the last segment of `path`.
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let filename = path.rsplit('/').next().unwrap_or_default().to_string();

        Self {
            id: id.into(),
            path,
            filename,
            is_temporary: None,
        }
    }

    pub fn temporary(mut self, is_temporary: bool) -> Self {
        self.is_temporary = Some(is_temporary);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabReorder {
    pub from_index: usize,
    pub to_index: usize,
    /// Tabs in their order after the move
    pub tabs: Vec<TabDescriptor>,
}

/// A tab lifecycle notification.
///
/// The wire form is `{"eventType": "<kind>", "tabData": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "tabData", rename_all = "lowercase")]
pub enum TabEvent {
    Add(TabDescriptor),
    Remove(TabDescriptor),
    Select(TabDescriptor),
    Reorder(TabReorder),
}

impl TabEvent {
    pub fn kind(&self) -> TabEventKind {
        match self {
            TabEvent::Add(_) => TabEventKind::Add,
            TabEvent::Remove(_) => TabEventKind::Remove,
            TabEvent::Select(_) => TabEventKind::Select,
            TabEvent::Reorder(_) => TabEventKind::Reorder,
        }
    }

    /// The single tab carried by `add`, `remove` and `select` events.
    pub fn tab(&self) -> Option<&TabDescriptor> {
        match self {
            TabEvent::Add(tab) | TabEvent::Remove(tab) | TabEvent::Select(tab) => Some(tab),
            TabEvent::Reorder(_) => None,
        }
    }

    pub fn reorder(&self) -> Option<&TabReorder> {
        match self {
            TabEvent::Reorder(reorder) => Some(reorder),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
