//! Tab event kinds

use serde::{Deserialize, Serialize};

use crate::error::EventError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabEventKind {
    /// A tab was opened
    Add,
    /// A tab was closed
    Remove,
    /// A tab became the selected one
    Select,
    /// Tabs changed position
    Reorder,
}

impl TabEventKind {
    pub const ALL: [TabEventKind; 4] = [
        TabEventKind::Add,
        TabEventKind::Remove,
        TabEventKind::Select,
        TabEventKind::Reorder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TabEventKind::Add => "add",
            TabEventKind::Remove => "remove",
            TabEventKind::Select => "select",
            TabEventKind::Reorder => "reorder",
        }
    }
}

impl std::fmt::Display for TabEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TabEventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "add" => Ok(TabEventKind::Add),
            "remove" => Ok(TabEventKind::Remove),
            "select" => Ok(TabEventKind::Select),
            "reorder" => Ok(TabEventKind::Reorder),
            _ => Err(EventError::UnknownKind(s.to_string())),
        }
    }
}
