//! Authoritative most-recently-used ordering of open tabs.
//!
//! The browser's event stream is lossy, duplicated and sometimes
//! out of order. Every operation here therefore treats an unknown id as a
//! logged no-op, and activations are debounced through a [`SettleTimer`] so
//! transient focus churn never reaches the committed order.
//!
//! All mutation is synchronous. Anything needing the host (moving a tab in
//! the tab strip) is returned to the caller as a [`Committed`] value.

use crate::closed::ClosedTabHistory;
use crate::error::TabError;
use crate::host::MovePosition;
use crate::tab::{InclusionFilter, TabId, TrackedTab};
use crate::timer::{ActivationOrigin, PendingReorder, SettleTimer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub settle_delay: Duration,
    pub filter: InclusionFilter,
    pub move_left_on_switch: bool,
    pub move_right_on_switch: bool,
    pub move_on_popup_switch_only: bool,
    pub closed_tabs_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            filter: InclusionFilter::default(),
            move_left_on_switch: false,
            move_right_on_switch: false,
            move_on_popup_switch_only: true,
            closed_tabs_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Prev,
    Next,
}

/// A reorder that reached the head of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub tab: TrackedTab,
    /// Tab-strip move the host should perform, if configured.
    pub move_to: Option<MovePosition>,
}

/// Result of checking the tracked order against a live enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub sequence: Vec<TrackedTab>,
    pub newly_discovered: Vec<TabId>,
    pub dropped: Vec<TabId>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.newly_discovered.is_empty() && self.dropped.is_empty()
    }
}

/// Unknown ids are routine with a lossy event stream; they are logged and
/// never surfaced.
fn ignore_unknown(op: &str, tab_id: TabId) {
    debug!(op, "ignored: {}", TabError::UnknownTabId(tab_id));
}

#[derive(Debug)]
pub struct OrderedTabRegistry {
    sequence: Vec<TrackedTab>,
    active_index: usize,
    settle: SettleTimer,
    closed: ClosedTabHistory,
    config: RegistryConfig,
    revision: u64,
}

impl Default for OrderedTabRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl OrderedTabRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sequence: Vec::new(),
            active_index: 0,
            settle: SettleTimer::new(),
            closed: ClosedTabHistory::new(config.closed_tabs_size),
            config,
            revision: 0,
        }
    }

    pub fn set_config(&mut self, config: RegistryConfig) {
        self.closed.resize(config.closed_tabs_size);
        self.config = config;
        self.touch();
    }

    /// Reset to the given live tabs, ordered by `prior_order_urls`.
    ///
    /// Tabs whose URL was not persisted sort after all persisted ones and
    /// keep their enumeration order among themselves.
    pub fn initialize(&mut self, live_tabs: Vec<TrackedTab>, prior_order_urls: &[String]) {
        self.settle.cancel();
        self.sequence.clear();
        let mut seen = HashSet::new();
        for tab in live_tabs {
            if self.config.filter.includes(&tab) && seen.insert(tab.id) {
                self.sequence.push(tab);
            }
        }

        let mut rank: HashMap<&str, usize> = HashMap::new();
        for (i, url) in prior_order_urls.iter().enumerate() {
            rank.entry(url.as_str()).or_insert(i);
        }
        let mut keyed: Vec<(usize, TrackedTab)> = self
            .sequence
            .drain(..)
            .map(|t| (rank.get(t.url.as_str()).copied().unwrap_or(usize::MAX), t))
            .collect();
        keyed.sort_by_key(|(k, _)| *k);
        self.sequence = keyed.into_iter().map(|(_, t)| t).collect();

        self.active_index = 0;
        self.touch();
        info!(tabs = self.sequence.len(), "tab registry initialized");
    }

    /// Track a newly opened tab. Foreground opens go to the head, background
    /// opens to the tail. Returns whether the tab is tracked afterwards.
    pub fn record_created(&mut self, tab: TrackedTab, now: Instant) -> bool {
        if !self.config.filter.includes(&tab) {
            debug!(tab = tab.id, "created tab excluded by filter");
            return false;
        }
        if self.closed.remove_by_url(&tab.url).is_some() {
            debug!(url = %tab.url, "reopened tab supersedes closed entry");
        }
        if let Some(pos) = self.position(tab.id) {
            debug!(tab = tab.id, "duplicate create notification, updating in place");
            self.sequence[pos] = tab;
            self.touch();
            return true;
        }

        if tab.active {
            let id = tab.id;
            self.sequence.insert(0, tab);
            self.active_index = 0;
            // The new tab is already the head, so this only drops a reorder
            // that was pending for some other tab.
            self.record_activated(id, now);
        } else {
            self.sequence.push(tab);
        }
        self.touch();
        true
    }

    /// Stop tracking a closed tab and remember it as recently closed.
    pub fn record_removed(&mut self, tab_id: TabId) -> Option<TrackedTab> {
        let Some(pos) = self.position(tab_id) else {
            ignore_unknown("remove", tab_id);
            return None;
        };
        let tab = self.sequence.remove(pos);
        self.closed.record(&tab);

        if pos < self.active_index {
            self.active_index -= 1;
        }
        self.clamp_active();
        if self.settle.pending().is_some_and(|p| p.target == tab_id) {
            debug!(tab = tab_id, "pending reorder target closed, abandoning");
            self.settle.cancel();
        }
        self.touch();
        Some(tab)
    }

    /// Refresh a tab's fields without moving it.
    pub fn record_updated(&mut self, tab_id: TabId, mut data: TrackedTab) -> bool {
        let Some(pos) = self.position(tab_id) else {
            ignore_unknown("update", tab_id);
            return false;
        };
        data.id = tab_id;
        // Loading pages briefly report no title; keep the last good one.
        if data.title.trim().is_empty() {
            data.title = self.sequence[pos].title.clone();
        }
        self.sequence[pos] = data;
        self.touch();
        true
    }

    /// Swap a tab's identity in place, as when the host replaces a
    /// prerendered page.
    pub fn record_replaced(&mut self, old_id: TabId, new_id: TabId, data: Option<TrackedTab>) -> bool {
        let Some(pos) = self.position(old_id) else {
            ignore_unknown("replace", old_id);
            return false;
        };
        if let Some(dup) = self.position(new_id).filter(|&d| d != pos) {
            // The new id already arrived through a create event; keep the
            // older entry's position.
            self.sequence.remove(dup);
            if dup < self.active_index {
                self.active_index -= 1;
            }
        }
        let pos = self.position(old_id).unwrap_or(pos);
        let entry = &mut self.sequence[pos];
        if let Some(mut data) = data {
            if data.title.trim().is_empty() {
                data.title = std::mem::take(&mut entry.title);
            }
            *entry = data;
        }
        entry.id = new_id;
        self.settle.retarget(old_id, new_id);
        self.clamp_active();
        self.touch();
        true
    }

    /// Host-driven activation with the configured settle delay.
    pub fn record_activated(&mut self, tab_id: TabId, now: Instant) -> Option<Committed> {
        let delay = self.config.settle_delay;
        self.record_activated_with(tab_id, delay, ActivationOrigin::Host, now)
    }

    /// Activate `tab_id` after `delay`. A zero delay commits right away.
    ///
    /// Activating the current head with nothing pending does nothing.
    /// Activating the head while another tab is pending abandons that
    /// pending reorder, since the later activation wins.
    pub fn record_activated_with(
        &mut self,
        tab_id: TabId,
        delay: Duration,
        origin: ActivationOrigin,
        now: Instant,
    ) -> Option<Committed> {
        let Some(pos) = self.position(tab_id) else {
            ignore_unknown("activate", tab_id);
            return None;
        };
        if pos == 0 {
            if let Some(abandoned) = self.settle.cancel() {
                debug!(abandoned = abandoned.target, "returned to head, pending reorder dropped");
                self.active_index = 0;
            }
            return None;
        }
        if delay.is_zero() {
            self.settle.cancel();
            return self.commit(tab_id, origin);
        }
        self.settle.arm(tab_id, delay, origin, now);
        None
    }

    /// Commit the pending reorder if its deadline has passed.
    pub fn poll_settle(&mut self, now: Instant) -> Option<Committed> {
        let due = self.settle.take_due(now)?;
        self.commit(due.target, due.origin)
    }

    pub fn pending(&self) -> Option<&PendingReorder> {
        self.settle.pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.settle.deadline()
    }

    fn commit(&mut self, tab_id: TabId, origin: ActivationOrigin) -> Option<Committed> {
        let Some(pos) = self.position(tab_id) else {
            ignore_unknown("commit", tab_id);
            return None;
        };
        let tab = self.sequence.remove(pos);
        self.sequence.insert(0, tab);
        self.active_index = 0;
        self.touch();
        info!(tab = tab_id, from = pos, "tab order committed");
        Some(Committed {
            tab: self.sequence[0].clone(),
            move_to: self.move_for(origin),
        })
    }

    fn move_for(&self, origin: ActivationOrigin) -> Option<MovePosition> {
        if self.config.move_on_popup_switch_only && origin != ActivationOrigin::Popup {
            return None;
        }
        if self.config.move_left_on_switch {
            Some(MovePosition::First)
        } else if self.config.move_right_on_switch {
            Some(MovePosition::Last)
        } else {
            None
        }
    }

    pub fn snapshot_ordered(&self) -> Vec<TrackedTab> {
        self.sequence.clone()
    }

    pub fn current_active(&self) -> Result<TrackedTab, TabError> {
        self.sequence
            .get(self.active_index)
            .cloned()
            .ok_or(TabError::EmptyRegistry)
    }

    /// Move the navigation pointer one step, holding at either end.
    pub fn step_active(&mut self, direction: Direction) -> Result<TrackedTab, TabError> {
        if self.sequence.is_empty() {
            return Err(TabError::EmptyRegistry);
        }
        let last = self.sequence.len() - 1;
        self.active_index = match direction {
            Direction::Next => (self.active_index + 1).min(last),
            Direction::Prev => self.active_index.saturating_sub(1),
        };
        self.current_active()
    }

    /// Compare the tracked order with a live enumeration without touching
    /// state. Untracked live tabs are appended in query order.
    pub fn reconcile(&self, live: &[TrackedTab]) -> Reconciliation {
        let live_ids: HashSet<TabId> = live.iter().map(|t| t.id).collect();
        let mut out = Reconciliation::default();
        let mut kept: HashSet<TabId> = HashSet::new();
        for tab in &self.sequence {
            if live_ids.contains(&tab.id) {
                kept.insert(tab.id);
                out.sequence.push(tab.clone());
            } else {
                debug!(tab = tab.id, url = %tab.url, "tab tracked but not reported as open");
                out.dropped.push(tab.id);
            }
        }
        for tab in live {
            if kept.contains(&tab.id) || !self.config.filter.includes(tab) {
                continue;
            }
            kept.insert(tab.id);
            out.newly_discovered.push(tab.id);
            out.sequence.push(tab.clone());
        }
        out
    }

    /// Replace the order with a reconciled one in a single step.
    pub fn apply_reconciliation(&mut self, reconciliation: &Reconciliation) {
        if reconciliation.is_noop() {
            return;
        }
        if let Some(head) = self.sequence.get(self.active_index).map(|t| t.id) {
            self.active_index = reconciliation
                .sequence
                .iter()
                .position(|t| t.id == head)
                .unwrap_or(0);
        }
        self.sequence = reconciliation.sequence.clone();
        if let Some(target) = self.settle.pending().map(|p| p.target) {
            if self.position(target).is_none() {
                self.settle.cancel();
            }
        }
        self.clamp_active();
        self.touch();
        info!(
            dropped = reconciliation.dropped.len(),
            discovered = reconciliation.newly_discovered.len(),
            "tab registry reconciled"
        );
    }

    pub fn reconcile_with(&mut self, live: &[TrackedTab]) -> Reconciliation {
        let reconciliation = self.reconcile(live);
        self.apply_reconciliation(&reconciliation);
        reconciliation
    }

    pub fn closed_tabs(&self) -> &ClosedTabHistory {
        &self.closed
    }

    /// Seed the closed list, e.g. from persisted state.
    pub fn restore_closed(&mut self, entries: Vec<crate::closed::ClosedTab>) {
        self.closed.restore(entries);
        self.touch();
    }

    pub fn dismiss_closed(&mut self, url: &str) -> bool {
        let removed = self.closed.remove_by_url(url).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    pub fn get(&self, tab_id: TabId) -> Option<&TrackedTab> {
        self.sequence.iter().find(|t| t.id == tab_id)
    }

    pub fn head(&self) -> Option<&TrackedTab> {
        self.sequence.first()
    }

    pub fn position(&self, tab_id: TabId) -> Option<usize> {
        self.sequence.iter().position(|t| t.id == tab_id)
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.sequence.iter().map(|t| t.id).collect()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Bumped on every change observers may care about.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn clamp_active(&mut self) {
        if self.active_index >= self.sequence.len() {
            self.active_index = self.sequence.len().saturating_sub(1);
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
