//! Normalization of host lifecycle notifications into [`TabEvent`]s and the
//! channel that carries them to the single-threaded service loop.

use crate::host::HostTab;
use crate::tab::{TabId, TrackedTab, WindowId, WINDOW_ID_NONE};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    Created(TrackedTab),
    Removed(TabId),
    Activated(TabId),
    Replaced {
        old_id: TabId,
        new_id: TabId,
        tab: Option<TrackedTab>,
    },
    FocusChanged(WindowId),
    Updated(TabId, TrackedTab),
}

/// Notification exactly as a browser host reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostNotification {
    Created {
        tab: HostTab,
    },
    Removed {
        tab_id: TabId,
        #[serde(default)]
        window_id: Option<WindowId>,
        #[serde(default)]
        is_window_closing: bool,
    },
    Activated {
        tab_id: TabId,
        #[serde(default)]
        window_id: Option<WindowId>,
    },
    Replaced {
        added_tab_id: TabId,
        removed_tab_id: TabId,
        #[serde(default)]
        tab: Option<HostTab>,
    },
    Updated {
        tab_id: TabId,
        tab: HostTab,
    },
    FocusChanged {
        window_id: WindowId,
    },
}

/// Map a raw notification to the normalized event stream. Focus moving
/// away from every browser window yields nothing.
pub fn normalize(notification: HostNotification) -> Option<TabEvent> {
    match notification {
        HostNotification::Created { tab } => Some(TabEvent::Created(tab.into())),
        HostNotification::Removed {
            tab_id,
            is_window_closing,
            ..
        } => {
            if is_window_closing {
                tracing::debug!(tab = tab_id, "tab removed with its window");
            }
            Some(TabEvent::Removed(tab_id))
        }
        HostNotification::Activated { tab_id, .. } => Some(TabEvent::Activated(tab_id)),
        HostNotification::Replaced {
            added_tab_id,
            removed_tab_id,
            tab,
        } => Some(TabEvent::Replaced {
            old_id: removed_tab_id,
            new_id: added_tab_id,
            tab: tab.map(Into::into),
        }),
        HostNotification::Updated { tab_id, tab } => Some(TabEvent::Updated(tab_id, tab.into())),
        HostNotification::FocusChanged { window_id } if window_id == WINDOW_ID_NONE => None,
        HostNotification::FocusChanged { window_id } => Some(TabEvent::FocusChanged(window_id)),
    }
}

/// Keyboard shortcut delivered as a tagged message, e.g. `{"cmd":"next"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    Next,
    Prev,
    Duplicate,
}

/// Cloneable sending half handed to whatever receives host callbacks.
#[derive(Debug)]
pub struct EventSink<T = TabEvent> {
    tx: Sender<T>,
}

impl<T> Clone for EventSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> EventSink<T> {
    /// Queue a message. Returns `false` once the source has gone away.
    pub fn send(&self, message: T) -> bool {
        self.tx.send(message).is_ok()
    }
}

impl EventSink<TabEvent> {
    pub fn notify(&self, notification: HostNotification) -> bool {
        match normalize(notification) {
            Some(event) => self.send(event),
            None => true,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    Message(T),
    Timeout,
    Closed,
}

/// Receiving half, drained by exactly one loop.
#[derive(Debug)]
pub struct EventSource<T = TabEvent> {
    rx: Receiver<T>,
}

pub fn channel<T>() -> (EventSink<T>, EventSource<T>) {
    let (tx, rx) = mpsc::channel();
    (EventSink { tx }, EventSource { rx })
}

impl<T> EventSource<T> {
    /// Wait for the next message, giving up at `deadline`. With no deadline
    /// this blocks until a message arrives or every sink is dropped.
    pub fn next_until(&self, deadline: Option<Instant>) -> Recv<T> {
        let Some(deadline) = deadline else {
            return match self.rx.recv() {
                Ok(m) => Recv::Message(m),
                Err(_) => Recv::Closed,
            };
        };
        let wait = deadline.saturating_duration_since(Instant::now());
        match self.rx.recv_timeout(wait) {
            Ok(m) => Recv::Message(m),
            Err(RecvTimeoutError::Timeout) => Recv::Timeout,
            Err(RecvTimeoutError::Disconnected) => Recv::Closed,
        }
    }

    pub fn try_next(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
