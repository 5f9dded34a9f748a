//! Newline-delimited JSON bridge between a browser extension and the tab
//! service.
//!
//! Inbound lines carry host notifications, live tab enumerations, keyboard
//! commands, settings changes and popup calls. Outbound lines carry host
//! requests and call responses. Logging never goes to stdout, which belongs
//! to the protocol.

use crate::events::{normalize, Command, EventSink, EventSource, HostNotification, Recv};
use crate::host::{BrowserHost, HostRequest, HostTab, MovePosition};
use crate::persistence::KeyValueStore;
use crate::registry::Direction;
use crate::service::TabService;
use crate::settings::Settings;
use crate::tab::{TabId, WindowId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Event(HostNotification),
    Tabs { tabs: Vec<HostTab> },
    Command(Command),
    Call(PopupCall),
    /// Options changed in the extension's settings page.
    Settings { settings: Settings },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PopupCall {
    GetOpenTabs,
    GetClosedTabs,
    SwitchTo {
        tab_id: TabId,
        #[serde(default)]
        immediate: bool,
    },
    CloseTabs {
        tab_ids: Vec<TabId>,
    },
    Step {
        direction: Direction,
    },
    Search {
        query: String,
    },
    Reopen {
        url: String,
    },
    Dismiss {
        url: String,
    },
    Reconcile,
}

impl PopupCall {
    fn name(&self) -> &'static str {
        match self {
            PopupCall::GetOpenTabs => "get_open_tabs",
            PopupCall::GetClosedTabs => "get_closed_tabs",
            PopupCall::SwitchTo { .. } => "switch_to",
            PopupCall::CloseTabs { .. } => "close_tabs",
            PopupCall::Step { .. } => "step",
            PopupCall::Search { .. } => "search",
            PopupCall::Reopen { .. } => "reopen",
            PopupCall::Dismiss { .. } => "dismiss",
            PopupCall::Reconcile => "reconcile",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outbound<'a> {
    Request(&'a HostRequest),
    Response { call: &'a str, body: Value },
}

type SharedWriter<W> = Arc<Mutex<W>>;

fn write_line<W: Write>(out: &SharedWriter<W>, message: &Outbound<'_>) -> anyhow::Result<()> {
    let line = serde_json::to_string(message)?;
    let mut guard = out
        .lock()
        .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
    writeln!(guard, "{line}")?;
    guard.flush()?;
    Ok(())
}

#[derive(Debug, Default)]
struct Mirror {
    tabs: Vec<HostTab>,
    focused_window: Option<WindowId>,
}

/// Host that writes requests to the protocol stream and answers queries
/// from a mirror of the last enumeration, kept current by notifications.
pub struct StdioHost<W> {
    out: SharedWriter<W>,
    mirror: Arc<Mutex<Mirror>>,
}

impl<W> Clone for StdioHost<W> {
    fn clone(&self) -> Self {
        Self {
            out: self.out.clone(),
            mirror: self.mirror.clone(),
        }
    }
}

impl<W: Write> StdioHost<W> {
    pub fn new(out: SharedWriter<W>) -> Self {
        Self {
            out,
            mirror: Arc::new(Mutex::new(Mirror::default())),
        }
    }

    pub fn replace_tabs(&self, tabs: Vec<HostTab>) {
        if let Ok(mut mirror) = self.mirror.lock() {
            if mirror.focused_window.is_none() {
                mirror.focused_window = tabs.iter().find(|t| t.active).map(|t| t.window_id);
            }
            mirror.tabs = tabs;
        }
    }

    /// Apply a notification to the mirror before the service sees it.
    pub fn observe(&self, notification: &HostNotification) {
        let Ok(mut mirror) = self.mirror.lock() else {
            return;
        };
        match notification {
            HostNotification::Created { tab } => {
                mirror.tabs.retain(|t| t.id != tab.id);
                mirror.tabs.push(tab.clone());
            }
            HostNotification::Removed { tab_id, .. } => mirror.tabs.retain(|t| t.id != *tab_id),
            HostNotification::Activated { tab_id, window_id } => {
                let window = window_id.or_else(|| {
                    mirror.tabs.iter().find(|t| t.id == *tab_id).map(|t| t.window_id)
                });
                for t in mirror.tabs.iter_mut() {
                    if Some(t.window_id) == window {
                        t.active = t.id == *tab_id;
                    }
                }
            }
            HostNotification::Replaced {
                added_tab_id,
                removed_tab_id,
                tab,
            } => {
                if let Some(t) = mirror.tabs.iter_mut().find(|t| t.id == *removed_tab_id) {
                    match tab {
                        Some(tab) => *t = tab.clone(),
                        None => t.id = *added_tab_id,
                    }
                }
            }
            HostNotification::Updated { tab_id, tab } => {
                if let Some(t) = mirror.tabs.iter_mut().find(|t| t.id == *tab_id) {
                    *t = tab.clone();
                }
            }
            HostNotification::FocusChanged { window_id } => {
                mirror.focused_window = Some(*window_id).filter(|w| *w >= 0).or(mirror.focused_window);
            }
        }
    }

    fn request(&self, request: HostRequest) -> anyhow::Result<()> {
        write_line(&self.out, &Outbound::Request(&request))
    }
}

impl<W: Write> BrowserHost for StdioHost<W> {
    fn query_tabs(&self, window: Option<WindowId>) -> anyhow::Result<Vec<HostTab>> {
        let mirror = self
            .mirror
            .lock()
            .map_err(|_| anyhow::anyhow!("tab mirror poisoned"))?;
        Ok(mirror
            .tabs
            .iter()
            .filter(|t| window.map_or(true, |w| t.window_id == w))
            .cloned()
            .collect())
    }

    fn active_tab(&self, window: Option<WindowId>) -> anyhow::Result<Option<HostTab>> {
        let mirror = self
            .mirror
            .lock()
            .map_err(|_| anyhow::anyhow!("tab mirror poisoned"))?;
        let window = window.or(mirror.focused_window);
        Ok(mirror
            .tabs
            .iter()
            .find(|t| t.active && window.map_or(true, |w| t.window_id == w))
            .cloned())
    }

    fn move_tab(&mut self, tab: TabId, window: WindowId, position: MovePosition) -> anyhow::Result<()> {
        self.request(HostRequest::MoveTab {
            tab_id: tab,
            window_id: window,
            position,
        })
    }

    fn activate_tab(&mut self, tab: TabId) -> anyhow::Result<()> {
        self.request(HostRequest::ActivateTab { tab_id: tab })
    }

    fn remove_tabs(&mut self, tabs: &[TabId]) -> anyhow::Result<()> {
        self.request(HostRequest::RemoveTabs {
            tab_ids: tabs.to_vec(),
        })
    }

    fn duplicate_tab(&mut self, tab: TabId) -> anyhow::Result<()> {
        self.request(HostRequest::DuplicateTab { tab_id: tab })
    }

    fn create_tab(&mut self, url: &str) -> anyhow::Result<()> {
        self.request(HostRequest::CreateTab { url: url.to_string() })
    }

    fn set_badge_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.request(HostRequest::SetBadgeText {
            text: text.to_string(),
        })
    }
}

/// Parse inbound lines and queue them until the reader is exhausted.
/// Malformed lines are logged and skipped.
pub fn read_inbound<R: BufRead>(reader: R, sink: EventSink<Inbound>) {
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("failed to read inbound message: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Inbound>(&line) {
            Ok(message) => {
                if !sink.send(message) {
                    break;
                }
            }
            Err(e) => warn!("ignoring malformed inbound message: {e}"),
        }
    }
}

pub struct Bridge<W, S> {
    service: TabService<StdioHost<W>, S>,
    host: StdioHost<W>,
    out: SharedWriter<W>,
    started: bool,
}

impl<W: Write, S: KeyValueStore> Bridge<W, S> {
    pub fn new(host: StdioHost<W>, service: TabService<StdioHost<W>, S>) -> Self {
        let out = host.out.clone();
        Self {
            service,
            host,
            out,
            started: false,
        }
    }

    pub fn service(&self) -> &TabService<StdioHost<W>, S> {
        &self.service
    }

    /// Drain `source` until every sender is gone, firing timers in between,
    /// then flush pending writes.
    pub fn run(&mut self, source: &EventSource<Inbound>, clock: impl Fn() -> Instant) {
        loop {
            let deadline = self.service.next_deadline();
            match source.next_until(deadline) {
                Recv::Message(message) => self.dispatch(message, clock()),
                Recv::Timeout => {}
                Recv::Closed => break,
            }
            self.service.tick(clock());
        }
        self.service.shutdown();
    }

    pub fn dispatch(&mut self, message: Inbound, now: Instant) {
        match message {
            Inbound::Tabs { tabs } => {
                self.host.replace_tabs(tabs);
                if self.started {
                    self.service.reconcile(now);
                } else {
                    self.service.start(now);
                    self.started = true;
                }
            }
            Inbound::Event(notification) => {
                self.host.observe(&notification);
                if !self.started {
                    debug!("notification before first enumeration ignored");
                    return;
                }
                if let Some(event) = normalize(notification) {
                    self.service.handle_event(event, now);
                }
            }
            Inbound::Command(command) => {
                if let Err(e) = self.service.handle_command(command, now) {
                    debug!(?command, "command not applied: {e}");
                }
            }
            Inbound::Settings { settings } => self.service.apply_settings(settings, now),
            Inbound::Call(call) => {
                let name = call.name();
                let body = self.answer(call, now);
                if let Err(e) = write_line(&self.out, &Outbound::Response { call: name, body }) {
                    error!("failed to write response: {e}");
                }
            }
        }
    }

    fn answer(&mut self, call: PopupCall, now: Instant) -> Value {
        let service = &mut self.service;
        match call {
            PopupCall::GetOpenTabs => json!(service.get_open_tabs_for_display()),
            PopupCall::GetClosedTabs => json!(service.get_closed_tabs()),
            PopupCall::SwitchTo { tab_id, immediate } => {
                json!({ "ok": service.switch_to(tab_id, immediate, now) })
            }
            PopupCall::CloseTabs { tab_ids } => {
                service.close_tabs(&tab_ids, now);
                json!({ "ok": true })
            }
            PopupCall::Step { direction } => match service.step_active(direction, now) {
                Ok(tab) => json!({ "tab": tab }),
                Err(e) => json!({ "error": e.to_string() }),
            },
            PopupCall::Search { query } => json!(service.search(&query)),
            PopupCall::Reopen { url } => json!({ "ok": service.reopen_closed(&url, now) }),
            PopupCall::Dismiss { url } => json!({ "ok": service.dismiss_closed(&url, now) }),
            PopupCall::Reconcile => match service.reconcile(now) {
                Some(r) => json!({ "dropped": r.dropped, "discovered": r.newly_discovered }),
                None => json!({ "error": "tab enumeration failed" }),
            },
        }
    }
}
