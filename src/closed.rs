use crate::tab::{is_web_url, TrackedTab};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedTab {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default)]
    pub closed_at: i64,
}

/// Most-recent-first list of closed web pages, capped at `cap` entries.
#[derive(Debug, Clone, Default)]
pub struct ClosedTabHistory {
    entries: VecDeque<ClosedTab>,
    cap: usize,
}

impl ClosedTabHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Remember a closed tab. Returns `false` for non-web pages, which are
    /// never recorded.
    pub fn record(&mut self, tab: &TrackedTab) -> bool {
        if !is_web_url(&tab.url) {
            tracing::debug!(tab = tab.id, url = %tab.url, "not recording closed non-web tab");
            return false;
        }
        self.entries.push_front(ClosedTab {
            url: tab.url.clone(),
            title: tab.title.clone(),
            favicon: tab.favicon.clone(),
            closed_at: chrono::Utc::now().timestamp(),
        });
        self.truncate();
        true
    }

    pub fn remove_by_url(&mut self, url: &str) -> Option<ClosedTab> {
        let pos = self.entries.iter().position(|e| e.url == url)?;
        self.entries.remove(pos)
    }

    pub fn all(&self) -> Vec<ClosedTab> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClosedTab> {
        self.entries.iter()
    }

    pub fn resize(&mut self, cap: usize) {
        self.cap = cap;
        self.truncate();
    }

    /// Replace the list with previously persisted entries, most recent first.
    pub fn restore(&mut self, entries: Vec<ClosedTab>) {
        self.entries = entries.into_iter().filter(|e| is_web_url(&e.url)).collect();
        self.truncate();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn truncate(&mut self) {
        self.entries.truncate(self.cap);
    }
}
