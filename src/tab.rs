use serde::{Deserialize, Serialize};

/// Host-assigned tab handle. Unique while the tab is open, never reused
/// across a close/reopen.
pub type TabId = i64;
pub type WindowId = i64;

/// Window id the host reports when focus leaves every browser window.
pub const WINDOW_ID_NONE: WindowId = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedTab {
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub window_id: WindowId,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl TrackedTab {
    pub fn new(id: TabId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: title.into(),
            window_id: 1,
            pinned: false,
            active: false,
            favicon: None,
        }
    }

    pub fn in_window(mut self, window_id: WindowId) -> Self {
        self.window_id = window_id;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn active(mut self) -> Self {
        self.active = true;
        self
    }
}

/// Only `http` and `https` pages count as web pages. Internal pages
/// (`chrome://`, `about:`, extension pages) are never remembered as closed.
pub fn is_web_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

fn is_dev_tools_url(raw: &str) -> bool {
    raw.starts_with("chrome-devtools://") || raw.starts_with("devtools://")
}

/// Decides whether a tab is tracked at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionFilter {
    pub include_dev_tools: bool,
    pub show_pinned_tabs: bool,
}

impl Default for InclusionFilter {
    fn default() -> Self {
        Self {
            include_dev_tools: false,
            show_pinned_tabs: true,
        }
    }
}

impl InclusionFilter {
    pub fn includes(&self, tab: &TrackedTab) -> bool {
        if tab.title.trim().is_empty() {
            return false;
        }
        if !self.include_dev_tools && is_dev_tools_url(&tab.url) {
            return false;
        }
        if !self.show_pinned_tabs && tab.pinned {
            return false;
        }
        true
    }
}
