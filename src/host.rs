//! Seam between the tab tracker and the browser it observes.
//!
//! Hosts answer queries promptly and deliver lifecycle notifications
//! separately through the event channel, so nothing here blocks waiting for
//! the browser to react to a request.

use crate::tab::{TabId, TrackedTab, WindowId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Raw tab record as the host enumerates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTab {
    pub id: TabId,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub window_id: WindowId,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub fav_icon_url: Option<String>,
    #[serde(default)]
    pub audible: bool,
}

impl From<HostTab> for TrackedTab {
    fn from(tab: HostTab) -> Self {
        TrackedTab {
            id: tab.id,
            url: tab.url,
            title: tab.title.unwrap_or_default(),
            window_id: tab.window_id,
            pinned: tab.pinned,
            active: tab.active,
            favicon: tab.fav_icon_url.filter(|f| !f.is_empty()),
        }
    }
}

impl From<&TrackedTab> for HostTab {
    fn from(tab: &TrackedTab) -> Self {
        HostTab {
            id: tab.id,
            index: 0,
            url: tab.url.clone(),
            title: Some(tab.title.clone()),
            window_id: tab.window_id,
            pinned: tab.pinned,
            active: tab.active,
            fav_icon_url: tab.favicon.clone(),
            audible: false,
        }
    }
}

/// Where a tab is moved within its window's tab strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePosition {
    First,
    Last,
}

/// A mutation requested from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum HostRequest {
    MoveTab {
        tab_id: TabId,
        window_id: WindowId,
        position: MovePosition,
    },
    ActivateTab {
        tab_id: TabId,
    },
    RemoveTabs {
        tab_ids: Vec<TabId>,
    },
    DuplicateTab {
        tab_id: TabId,
    },
    CreateTab {
        url: String,
    },
    SetBadgeText {
        text: String,
    },
}

pub trait BrowserHost {
    /// List tabs, optionally restricted to a single window.
    fn query_tabs(&self, window: Option<WindowId>) -> anyhow::Result<Vec<HostTab>>;
    /// The selected tab of `window`, or of the focused window when `None`.
    fn active_tab(&self, window: Option<WindowId>) -> anyhow::Result<Option<HostTab>>;
    fn move_tab(&mut self, tab: TabId, window: WindowId, position: MovePosition) -> anyhow::Result<()>;
    /// Focus the tab's window and select the tab.
    fn activate_tab(&mut self, tab: TabId) -> anyhow::Result<()>;
    fn remove_tabs(&mut self, tabs: &[TabId]) -> anyhow::Result<()>;
    fn duplicate_tab(&mut self, tab: TabId) -> anyhow::Result<()>;
    fn create_tab(&mut self, url: &str) -> anyhow::Result<()>;
    fn set_badge_text(&mut self, text: &str) -> anyhow::Result<()>;
}

/// In-memory host serving a scripted tab list and recording every request.
///
/// Clones share state, so a test can keep a handle while the service owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    inner: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    tabs: Vec<HostTab>,
    focused_window: Option<WindowId>,
    requests: Vec<HostRequest>,
    fail_queries: bool,
}

impl RecordingHost {
    pub fn new(tabs: Vec<HostTab>) -> Self {
        let host = Self::default();
        host.set_tabs(tabs);
        host
    }

    pub fn set_tabs(&self, tabs: Vec<HostTab>) {
        if let Ok(mut state) = self.inner.lock() {
            state.tabs = tabs;
        }
    }

    pub fn set_focused_window(&self, window: Option<WindowId>) {
        if let Ok(mut state) = self.inner.lock() {
            state.focused_window = window;
        }
    }

    /// Make every query fail, simulating an unreachable browser.
    pub fn set_fail_queries(&self, fail: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.fail_queries = fail;
        }
    }

    pub fn requests(&self) -> Vec<HostRequest> {
        self.inner
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    pub fn take_requests(&self) -> Vec<HostRequest> {
        self.inner
            .lock()
            .map(|mut s| std::mem::take(&mut s.requests))
            .unwrap_or_default()
    }

    fn push(&self, request: HostRequest) -> anyhow::Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("recording host poisoned"))?;
        state.requests.push(request);
        Ok(())
    }
}

impl BrowserHost for RecordingHost {
    fn query_tabs(&self, window: Option<WindowId>) -> anyhow::Result<Vec<HostTab>> {
        let state = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("recording host poisoned"))?;
        if state.fail_queries {
            anyhow::bail!("tab query failed");
        }
        Ok(state
            .tabs
            .iter()
            .filter(|t| window.map_or(true, |w| t.window_id == w))
            .cloned()
            .collect())
    }

    fn active_tab(&self, window: Option<WindowId>) -> anyhow::Result<Option<HostTab>> {
        let focused = self.inner.lock().ok().and_then(|s| s.focused_window);
        let window = window.or(focused);
        Ok(self
            .query_tabs(window)?
            .into_iter()
            .find(|t| t.active))
    }

    fn move_tab(&mut self, tab: TabId, window: WindowId, position: MovePosition) -> anyhow::Result<()> {
        self.push(HostRequest::MoveTab {
            tab_id: tab,
            window_id: window,
            position,
        })
    }

    fn activate_tab(&mut self, tab: TabId) -> anyhow::Result<()> {
        self.push(HostRequest::ActivateTab { tab_id: tab })
    }

    fn remove_tabs(&mut self, tabs: &[TabId]) -> anyhow::Result<()> {
        self.push(HostRequest::RemoveTabs {
            tab_ids: tabs.to_vec(),
        })
    }

    fn duplicate_tab(&mut self, tab: TabId) -> anyhow::Result<()> {
        self.push(HostRequest::DuplicateTab { tab_id: tab })
    }

    fn create_tab(&mut self, url: &str) -> anyhow::Result<()> {
        self.push(HostRequest::CreateTab { url: url.to_string() })
    }

    fn set_badge_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.push(HostRequest::SetBadgeText {
            text: text.to_string(),
        })
    }
}
