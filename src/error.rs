use crate::tab::TabId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabError {
    /// An operation needed a current tab but nothing is tracked.
    EmptyRegistry,
    UnknownTabId(TabId),
    StorageUnavailable(String),
    MalformedPersistedOrder(String),
}

impl std::fmt::Display for TabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabError::EmptyRegistry => write!(f, "no tabs are tracked"),
            TabError::UnknownTabId(id) => write!(f, "tab {id} is not tracked"),
            TabError::StorageUnavailable(e) => write!(f, "storage unavailable: {e}"),
            TabError::MalformedPersistedOrder(e) => write!(f, "persisted tab order is malformed: {e}"),
        }
    }
}

impl std::error::Error for TabError {}
