use crate::registry::RegistryConfig;
use crate::search::SearchType;
use crate::tab::{InclusionFilter, TrackedTab};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Maximum number of recently closed tabs remembered.
    #[serde(default = "default_closed_tabs_size")]
    pub closed_tabs_size: usize,
    /// Persist the closed tab list so it survives a restart.
    #[serde(default = "default_true")]
    pub closed_tabs_list_save: bool,
    #[serde(default)]
    pub include_dev_tools: bool,
    #[serde(default = "default_true")]
    pub show_pinned_tabs: bool,
    /// Settle delay in milliseconds before an activation reorders the list.
    #[serde(default = "default_tab_order_update_delay")]
    pub tab_order_update_delay_ms: u64,
    /// Coalescing window for writes of the tab order.
    #[serde(default = "default_persist_delay")]
    pub persist_delay_ms: u64,
    /// Move the activated tab to the rightmost position of its window.
    #[serde(default)]
    pub move_on_switch: bool,
    /// Move the activated tab to the leftmost position. Wins over
    /// `move_on_switch` when both are set.
    #[serde(default)]
    pub move_left_on_switch: bool,
    /// Only move tabs when the switch came from the popup.
    #[serde(default = "default_true")]
    pub move_on_popup_switch_only: bool,
    /// After the current tab closes, jump to the most recent one instead of
    /// the neighbour the browser picks.
    #[serde(default)]
    pub jump_to_latest_tab_on_close: bool,
    #[serde(default = "default_true")]
    pub show_tab_count: bool,
    #[serde(default)]
    pub search_type: SearchType,
    /// Match queries against URLs as well as titles.
    #[serde(default = "default_true")]
    pub search_urls: bool,
    /// Show open tabs sorted by URL instead of by recency.
    #[serde(default)]
    pub order_tabs_by_url: bool,
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional file receiving log output instead of stderr.
    #[serde(default)]
    pub log_file: Option<String>,
    /// JSON file backing the persisted tab order and closed tab list.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
}

fn default_true() -> bool {
    true
}

fn default_closed_tabs_size() -> usize {
    10
}

fn default_tab_order_update_delay() -> u64 {
    1500
}

fn default_persist_delay() -> u64 {
    10_000
}

fn default_storage_path() -> String {
    "quick_tabs_state.json".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            closed_tabs_size: default_closed_tabs_size(),
            closed_tabs_list_save: true,
            include_dev_tools: false,
            show_pinned_tabs: true,
            tab_order_update_delay_ms: default_tab_order_update_delay(),
            persist_delay_ms: default_persist_delay(),
            move_on_switch: false,
            move_left_on_switch: false,
            move_on_popup_switch_only: true,
            jump_to_latest_tab_on_close: false,
            show_tab_count: true,
            search_type: SearchType::default(),
            search_urls: true,
            order_tabs_by_url: false,
            debug_logging: false,
            log_file: None,
            storage_path: default_storage_path(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn inclusion_filter(&self) -> InclusionFilter {
        InclusionFilter {
            include_dev_tools: self.include_dev_tools,
            show_pinned_tabs: self.show_pinned_tabs,
        }
    }

    pub fn include_tab(&self, tab: &TrackedTab) -> bool {
        self.inclusion_filter().includes(tab)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.tab_order_update_delay_ms)
    }

    pub fn persist_delay(&self) -> Duration {
        Duration::from_millis(self.persist_delay_ms)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            settle_delay: self.settle_delay(),
            filter: self.inclusion_filter(),
            move_left_on_switch: self.move_left_on_switch,
            move_right_on_switch: self.move_on_switch,
            move_on_popup_switch_only: self.move_on_popup_switch_only,
            closed_tabs_size: self.closed_tabs_size,
        }
    }
}
