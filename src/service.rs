//! Process-wide context owning the registry and its observers.
//!
//! Every handler queries the host first and then applies its registry
//! mutations in one synchronous block, so no other message can observe a
//! half-applied change.

use crate::badge::BadgeProjector;
use crate::closed::ClosedTab;
use crate::error::TabError;
use crate::events::{Command, TabEvent};
use crate::host::BrowserHost;
use crate::persistence::{KeyValueStore, PersistenceGateway};
use crate::registry::{Committed, Direction, OrderedTabRegistry, Reconciliation};
use crate::search::{self, Candidate, SearchStrategy};
use crate::settings::Settings;
use crate::tab::{TabId, TrackedTab, WindowId};
use crate::timer::ActivationOrigin;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum HitSource {
    Open { tab_id: TabId },
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub source: HitSource,
    pub title: String,
    pub url: String,
    pub score: i64,
}

pub struct TabService<H, S> {
    host: H,
    registry: OrderedTabRegistry,
    gateway: PersistenceGateway<S>,
    badge: BadgeProjector,
    settings: Settings,
    search: Box<dyn SearchStrategy>,
    observed_revision: u64,
}

impl<H: BrowserHost, S: KeyValueStore> TabService<H, S> {
    pub fn new(host: H, store: S, settings: Settings) -> Self {
        Self {
            host,
            registry: OrderedTabRegistry::new(settings.registry_config()),
            gateway: PersistenceGateway::new(store, settings.persist_delay()),
            badge: BadgeProjector::new(settings.show_tab_count),
            search: search::strategy_for(settings.search_type),
            settings,
            observed_revision: 0,
        }
    }

    /// Seed the registry from storage and a live enumeration, then mark the
    /// host's current tab as the head.
    pub fn start(&mut self, now: Instant) {
        let prior = self.gateway.load_prior_order();
        if self.settings.closed_tabs_list_save {
            let closed = self.gateway.load_closed_tabs();
            self.registry.restore_closed(closed);
        }
        let live = match self.host.query_tabs(None) {
            Ok(tabs) => tabs.into_iter().map(TrackedTab::from).collect(),
            Err(e) => {
                warn!("failed to enumerate tabs at startup: {e}");
                Vec::new()
            }
        };
        let active = self.host.active_tab(None).ok().flatten();

        self.registry.initialize(live, &prior);
        if let Some(active) = active {
            // Startup never moves tabs in the strip.
            self.registry
                .record_activated_with(active.id, Duration::ZERO, ActivationOrigin::Host, now);
        }
        info!(tabs = self.registry.len(), restored = prior.len(), "tab service started");
        self.after_change(now);
    }

    pub fn handle_event(&mut self, event: TabEvent, now: Instant) {
        match event {
            TabEvent::Created(tab) => {
                self.registry.record_created(tab, now);
            }
            TabEvent::Removed(tab_id) => self.on_removed(tab_id, now),
            TabEvent::Activated(tab_id) => {
                if let Some(c) = self.registry.record_activated(tab_id, now) {
                    self.apply_commit(c);
                }
            }
            TabEvent::Replaced { old_id, new_id, tab } => {
                self.registry.record_replaced(old_id, new_id, tab);
            }
            TabEvent::FocusChanged(window) => self.on_focus_changed(window, now),
            TabEvent::Updated(tab_id, mut tab) => {
                if self.registry.get(tab_id).is_some() {
                    self.registry.record_updated(tab_id, tab);
                } else {
                    // Tabs created before they had a title were filtered out
                    // then; track them once an update makes them eligible.
                    tab.id = tab_id;
                    if self.registry.record_created(tab, now) {
                        debug!(tab = tab_id, "tracking tab that became eligible on update");
                    }
                }
            }
        }
        self.after_change(now);
    }

    fn on_removed(&mut self, tab_id: TabId, now: Instant) {
        let was_head = self.registry.head().is_some_and(|t| t.id == tab_id);
        if self.registry.record_removed(tab_id).is_none() {
            return;
        }
        if was_head && self.settings.jump_to_latest_tab_on_close {
            if let Some(next) = self.registry.head().map(|t| t.id) {
                debug!(tab = next, "jumping to most recent tab after close");
                if let Err(e) = self.host.activate_tab(next) {
                    warn!(tab = next, "failed to activate tab: {e}");
                }
            }
        }
        self.after_change(now);
    }

    fn on_focus_changed(&mut self, window: WindowId, now: Instant) {
        let active = match self.host.active_tab(Some(window)) {
            Ok(Some(tab)) => tab,
            Ok(None) => return,
            Err(e) => {
                warn!(window, "failed to query active tab: {e}");
                return;
            }
        };
        if let Some(c) = self.registry.record_activated(active.id, now) {
            self.apply_commit(c);
        }
    }

    pub fn handle_command(&mut self, command: Command, now: Instant) -> Result<(), TabError> {
        match command {
            Command::Next => {
                self.step_active(Direction::Next, now)?;
            }
            Command::Prev => {
                self.step_active(Direction::Prev, now)?;
            }
            Command::Duplicate => {
                let tab = self.registry.current_active()?;
                if let Err(e) = self.host.duplicate_tab(tab.id) {
                    warn!(tab = tab.id, "failed to duplicate tab: {e}");
                }
            }
        }
        Ok(())
    }

    /// Fire whatever is due: a settled reorder and a coalesced write.
    pub fn tick(&mut self, now: Instant) {
        if let Some(c) = self.registry.poll_settle(now) {
            self.apply_commit(c);
            self.after_change(now);
        }
        if let Err(e) = self.gateway.flush_due(now) {
            debug!("tab order not persisted: {e}");
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.registry.next_deadline(), self.gateway.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn get_open_tabs(&self) -> Vec<TrackedTab> {
        self.registry.snapshot_ordered()
    }

    /// Open tabs in the order the popup should list them.
    pub fn get_open_tabs_for_display(&self) -> Vec<TrackedTab> {
        let mut tabs = self.registry.snapshot_ordered();
        if self.settings.order_tabs_by_url {
            tabs.sort_by(|a, b| a.url.cmp(&b.url));
        }
        tabs
    }

    pub fn get_closed_tabs(&self) -> Vec<ClosedTab> {
        self.registry.closed_tabs().all()
    }

    /// Switch to a tab on behalf of the popup. `immediate` skips the settle
    /// delay so the next popup render already shows the new order.
    pub fn switch_to(&mut self, tab_id: TabId, immediate: bool, now: Instant) -> bool {
        if self.registry.get(tab_id).is_none() {
            debug!(tab = tab_id, "switch to untracked tab ignored");
            return false;
        }
        if let Err(e) = self.host.activate_tab(tab_id) {
            warn!(tab = tab_id, "failed to activate tab: {e}");
            return false;
        }
        let delay = if immediate {
            Duration::ZERO
        } else {
            self.settings.settle_delay()
        };
        if let Some(c) = self
            .registry
            .record_activated_with(tab_id, delay, ActivationOrigin::Popup, now)
        {
            self.apply_commit(c);
        }
        self.after_change(now);
        true
    }

    /// Close tabs from the popup. The registry forgets them before the host
    /// confirms, so the removal notifications that follow are no-ops.
    pub fn close_tabs(&mut self, tab_ids: &[TabId], now: Instant) {
        for &id in tab_ids {
            self.on_removed(id, now);
        }
        if let Err(e) = self.host.remove_tabs(tab_ids) {
            warn!(?tab_ids, "failed to close tabs: {e}");
        }
        self.after_change(now);
    }

    /// Move the navigation pointer and select the tab it lands on.
    pub fn step_active(&mut self, direction: Direction, now: Instant) -> Result<TrackedTab, TabError> {
        let tab = self.registry.step_active(direction)?;
        if let Err(e) = self.host.activate_tab(tab.id) {
            warn!(tab = tab.id, "failed to activate tab: {e}");
        }
        self.after_change(now);
        Ok(tab)
    }

    /// Open a closed tab again and drop it from the closed list.
    pub fn reopen_closed(&mut self, url: &str, now: Instant) -> bool {
        if !self.registry.dismiss_closed(url) {
            return false;
        }
        if let Err(e) = self.host.create_tab(url) {
            warn!(url, "failed to reopen tab: {e}");
        }
        self.after_change(now);
        true
    }

    pub fn dismiss_closed(&mut self, url: &str, now: Instant) -> bool {
        let removed = self.registry.dismiss_closed(url);
        self.after_change(now);
        removed
    }

    /// Heal drift from lost notifications against a fresh enumeration.
    pub fn reconcile(&mut self, now: Instant) -> Option<Reconciliation> {
        let live: Vec<TrackedTab> = match self.host.query_tabs(None) {
            Ok(tabs) => tabs.into_iter().map(TrackedTab::from).collect(),
            Err(e) => {
                warn!("failed to enumerate tabs for reconciliation: {e}");
                return None;
            }
        };
        let reconciliation = self.registry.reconcile_with(&live);
        self.after_change(now);
        Some(reconciliation)
    }

    /// Open tabs then closed tabs matching `query`, best first. An empty
    /// query lists everything in recency order.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let open = self.registry.snapshot_ordered();
        let closed = self.registry.closed_tabs().all();
        let query = query.trim();

        let mut candidates: Vec<Candidate<'_>> = open
            .iter()
            .map(|t| Candidate {
                title: &t.title,
                url: &t.url,
            })
            .collect();
        candidates.extend(closed.iter().map(|c| Candidate {
            title: &c.title,
            url: &c.url,
        }));

        let ranked = if query.is_empty() {
            (0..candidates.len()).map(|i| (i, 0)).collect()
        } else {
            search::sort_ranked(self.search.rank(query, &candidates, self.settings.search_urls))
        };

        ranked
            .into_iter()
            .map(|(i, score)| match open.get(i) {
                Some(t) => SearchHit {
                    source: HitSource::Open { tab_id: t.id },
                    title: t.title.clone(),
                    url: t.url.clone(),
                    score,
                },
                None => {
                    let c = &closed[i - open.len()];
                    SearchHit {
                        source: HitSource::Closed,
                        title: c.title.clone(),
                        url: c.url.clone(),
                        score,
                    }
                }
            })
            .collect()
    }

    /// Apply changed options without restarting. A smaller closed tab cap
    /// takes effect right away.
    pub fn apply_settings(&mut self, settings: Settings, now: Instant) {
        self.registry.set_config(settings.registry_config());
        self.gateway.set_delay(settings.persist_delay());
        self.badge.set_show_count(settings.show_tab_count);
        self.search = search::strategy_for(settings.search_type);
        debug!(search = self.search.name(), "settings applied");
        self.settings = settings;
        self.after_change(now);
    }

    /// Write anything still pending. Called on shutdown.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.gateway.flush() {
            warn!("final flush failed: {e}");
        }
    }

    fn apply_commit(&mut self, committed: Committed) {
        let Some(position) = committed.move_to else {
            return;
        };
        let tab = &committed.tab;
        if let Err(e) = self.host.move_tab(tab.id, tab.window_id, position) {
            warn!(tab = tab.id, "failed to move tab: {e}");
        }
    }

    fn after_change(&mut self, now: Instant) {
        let revision = self.registry.revision();
        if revision == self.observed_revision {
            return;
        }
        self.observed_revision = revision;
        self.gateway
            .schedule_persist(&self.registry.snapshot_ordered(), now);
        if self.settings.closed_tabs_list_save {
            self.gateway
                .schedule_closed(self.registry.closed_tabs().all(), now);
        }
        self.badge.refresh(&mut self.host, &self.registry);
    }

    pub fn registry(&self) -> &OrderedTabRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn gateway(&self) -> &PersistenceGateway<S> {
        &self.gateway
    }
}
