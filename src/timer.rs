use crate::tab::TabId;
use std::time::{Duration, Instant};

/// Where an activation came from. Popup switches are deliberate and may
/// trigger the tab-strip move even when host-driven ones do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOrigin {
    Host,
    Popup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReorder {
    pub target: TabId,
    pub deadline: Instant,
    pub origin: ActivationOrigin,
}

/// Single-slot cancellable deadline used to debounce recency reorders.
///
/// Arming while a reorder is pending replaces it, so only the latest
/// activation inside the window ever commits. Firing takes the reorder out
/// of the slot and leaves the timer idle, so a cancelled or replaced
/// reorder can never fire.
#[derive(Debug, Default)]
pub struct SettleTimer {
    pending: Option<PendingReorder>,
}

impl SettleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a reorder for `target`, replacing any pending one.
    ///
    /// Re-arming the same target keeps a `Popup` origin: the host echoes the
    /// activation a popup switch asked for, and that echo must not cancel
    /// the tab-strip move.
    pub fn arm(
        &mut self,
        target: TabId,
        delay: Duration,
        origin: ActivationOrigin,
        now: Instant,
    ) -> PendingReorder {
        let origin = match self.pending {
            Some(p) if p.target == target && p.origin == ActivationOrigin::Popup => p.origin,
            _ => origin,
        };
        let next = PendingReorder {
            target,
            deadline: now + delay,
            origin,
        };
        if let Some(prev) = self.pending.replace(next) {
            if prev.target != target {
                tracing::debug!(superseded = prev.target, target, "pending reorder superseded");
            }
        }
        next
    }

    /// Discard the pending reorder, if any.
    pub fn cancel(&mut self) -> Option<PendingReorder> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&PendingReorder> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    /// Point a pending reorder at a replacement tab id.
    pub fn retarget(&mut self, old: TabId, new: TabId) {
        if let Some(p) = self.pending.as_mut() {
            if p.target == old {
                p.target = new;
            }
        }
    }

    pub fn take_due(&mut self, now: Instant) -> Option<PendingReorder> {
        match self.pending {
            Some(p) if p.deadline <= now => self.pending.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_when_idle_is_noop() {
        let mut timer = SettleTimer::new();
        assert!(timer.cancel().is_none());
        assert!(!timer.is_pending());
    }

    #[test]
    fn arm_replaces_previous_target() {
        let now = Instant::now();
        let mut timer = SettleTimer::new();
        timer.arm(1, Duration::from_millis(100), ActivationOrigin::Host, now);
        let second = timer.arm(2, Duration::from_millis(100), ActivationOrigin::Host, now);
        assert_eq!(timer.pending(), Some(&second));
        assert_eq!(timer.pending().map(|p| p.target), Some(2));
    }

    #[test]
    fn rearming_same_target_keeps_popup_origin() {
        let now = Instant::now();
        let mut timer = SettleTimer::new();
        timer.arm(4, Duration::from_millis(100), ActivationOrigin::Popup, now);
        let echoed = timer.arm(
            4,
            Duration::from_millis(100),
            ActivationOrigin::Host,
            now + Duration::from_millis(20),
        );
        assert_eq!(echoed.origin, ActivationOrigin::Popup);

        // A different target starts over with its own origin.
        let other = timer.arm(5, Duration::from_millis(100), ActivationOrigin::Host, now);
        assert_eq!(other.origin, ActivationOrigin::Host);
    }

    #[test]
    fn take_due_respects_deadline_and_returns_to_idle() {
        let now = Instant::now();
        let mut timer = SettleTimer::new();
        timer.arm(7, Duration::from_millis(50), ActivationOrigin::Popup, now);
        assert!(timer.take_due(now + Duration::from_millis(49)).is_none());
        let fired = timer.take_due(now + Duration::from_millis(50)).expect("due");
        assert_eq!(fired.target, 7);
        assert_eq!(fired.origin, ActivationOrigin::Popup);
        assert!(!timer.is_pending());
        assert!(timer.take_due(now + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn retarget_follows_replaced_tab() {
        let now = Instant::now();
        let mut timer = SettleTimer::new();
        timer.arm(3, Duration::from_millis(10), ActivationOrigin::Host, now);
        timer.retarget(4, 9);
        assert_eq!(timer.pending().map(|p| p.target), Some(3));
        timer.retarget(3, 9);
        assert_eq!(timer.pending().map(|p| p.target), Some(9));
    }
}
