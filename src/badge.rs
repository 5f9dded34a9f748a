use crate::host::BrowserHost;
use crate::registry::OrderedTabRegistry;

/// Derives the toolbar badge text from the registry.
#[derive(Debug, Default)]
pub struct BadgeProjector {
    show_count: bool,
    last: Option<String>,
}

impl BadgeProjector {
    pub fn new(show_count: bool) -> Self {
        Self {
            show_count,
            last: None,
        }
    }

    pub fn project(&self, registry: &OrderedTabRegistry) -> String {
        if self.show_count {
            registry.len().to_string()
        } else {
            String::new()
        }
    }

    /// Push the badge to the host if it changed since the last push.
    pub fn refresh<H: BrowserHost>(&mut self, host: &mut H, registry: &OrderedTabRegistry) {
        let text = self.project(registry);
        if self.last.as_deref() == Some(text.as_str()) {
            return;
        }
        match host.set_badge_text(&text) {
            Ok(()) => self.last = Some(text),
            Err(e) => tracing::warn!("failed to update badge: {e}"),
        }
    }

    pub fn set_show_count(&mut self, show_count: bool) {
        if self.show_count != show_count {
            self.show_count = show_count;
            self.last = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostRequest, RecordingHost};
    use crate::tab::TrackedTab;
    use std::time::Instant;

    #[test]
    fn refresh_only_pushes_changes() {
        let mut registry = OrderedTabRegistry::default();
        registry.initialize(vec![TrackedTab::new(1, "https://a.test", "A")], &[]);
        let mut host = RecordingHost::default();
        let mut badge = BadgeProjector::new(true);

        badge.refresh(&mut host, &registry);
        badge.refresh(&mut host, &registry);
        registry.record_created(TrackedTab::new(2, "https://b.test", "B"), Instant::now());
        badge.refresh(&mut host, &registry);

        assert_eq!(
            host.requests(),
            vec![
                HostRequest::SetBadgeText { text: "1".into() },
                HostRequest::SetBadgeText { text: "2".into() },
            ]
        );
    }

    #[test]
    fn hidden_count_projects_empty_text() {
        let mut registry = OrderedTabRegistry::default();
        registry.initialize(vec![TrackedTab::new(1, "https://a.test", "A")], &[]);
        assert_eq!(BadgeProjector::new(false).project(&registry), "");
    }
}
