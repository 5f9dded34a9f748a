use quick_tabs::host::MovePosition;
use quick_tabs::registry::{Direction, OrderedTabRegistry, RegistryConfig};
use quick_tabs::tab::TrackedTab;
use quick_tabs::timer::ActivationOrigin;
use quick_tabs::TabError;
use std::time::{Duration, Instant};

const DELAY: Duration = Duration::from_millis(1500);

fn tab(id: i64) -> TrackedTab {
    TrackedTab::new(id, format!("https://site{id}.test/"), format!("Tab {id}"))
}

fn url(id: i64) -> String {
    format!("https://site{id}.test/")
}

fn registry_with(ids: &[i64]) -> OrderedTabRegistry {
    let mut registry = OrderedTabRegistry::default();
    registry.initialize(ids.iter().map(|&i| tab(i)).collect(), &[]);
    registry
}

#[test]
fn activating_head_without_pending_is_noop() {
    let mut registry = registry_with(&[1, 2, 3]);
    let revision = registry.revision();

    assert!(registry.record_activated(1, Instant::now()).is_none());

    assert_eq!(registry.tab_ids(), vec![1, 2, 3]);
    assert_eq!(registry.active_index(), 0);
    assert!(registry.pending().is_none());
    assert_eq!(registry.revision(), revision);
}

#[test]
fn later_activation_wins_inside_settle_window() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2, 3]);

    assert!(registry.record_activated(2, now).is_none());
    assert!(registry.record_activated(3, now + Duration::from_millis(500)).is_none());

    // The first deadline passes without a commit because it was superseded.
    assert!(registry.poll_settle(now + Duration::from_millis(1600)).is_none());
    assert_eq!(registry.tab_ids(), vec![1, 2, 3]);

    let committed = registry
        .poll_settle(now + Duration::from_millis(2000))
        .expect("commit for tab 3");
    assert_eq!(committed.tab.id, 3);
    assert_eq!(registry.tab_ids(), vec![3, 1, 2]);
    assert!(registry.pending().is_none());
}

#[test]
fn zero_delay_commits_immediately() {
    let mut registry = registry_with(&[1, 2, 3]);

    let committed = registry
        .record_activated_with(3, Duration::ZERO, ActivationOrigin::Popup, Instant::now())
        .expect("immediate commit");

    assert_eq!(committed.tab.id, 3);
    assert_eq!(registry.tab_ids(), vec![3, 1, 2]);
    assert_eq!(registry.active_index(), 0);
    assert!(registry.pending().is_none());
}

#[test]
fn zero_delay_discards_pending_reorder() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2, 3]);
    registry.record_activated(2, now);

    registry.record_activated_with(3, Duration::ZERO, ActivationOrigin::Popup, now);

    assert!(registry.poll_settle(now + DELAY * 2).is_none());
    assert_eq!(registry.tab_ids(), vec![3, 1, 2]);
}

#[test]
fn duplicate_removal_is_tolerated() {
    let mut registry = registry_with(&[1, 2, 3]);

    assert_eq!(registry.record_removed(2).map(|t| t.id), Some(2));
    assert!(registry.record_removed(2).is_none());

    assert_eq!(registry.tab_ids(), vec![1, 3]);
    assert_eq!(registry.closed_tabs().len(), 1);
}

#[test]
fn removal_during_pending_reorder_commits_remaining_order() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2, 3]);

    registry.record_activated(3, now);
    registry.record_removed(2);
    registry.poll_settle(now + DELAY).expect("commit for tab 3");

    assert_eq!(registry.tab_ids(), vec![3, 1]);
    assert_eq!(registry.active_index(), 0);
}

#[test]
fn removing_pending_target_abandons_reorder() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2, 3]);

    registry.record_activated(2, now);
    registry.record_removed(2);

    assert!(registry.pending().is_none());
    assert!(registry.poll_settle(now + DELAY).is_none());
    assert_eq!(registry.tab_ids(), vec![1, 3]);
}

#[test]
fn returning_to_head_drops_pending_reorder() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2, 3]);

    registry.record_activated(2, now);
    registry.record_activated(1, now + Duration::from_millis(200));

    assert!(registry.pending().is_none());
    assert!(registry.poll_settle(now + DELAY * 2).is_none());
    assert_eq!(registry.tab_ids(), vec![1, 2, 3]);
}

#[test]
fn initialize_restores_prior_order() {
    let mut registry = OrderedTabRegistry::default();
    let prior = vec![url(3), url(1), url(2)];

    registry.initialize(vec![tab(4), tab(1), tab(2), tab(3)], &prior);

    assert_eq!(registry.tab_ids(), vec![3, 1, 2, 4]);
    assert_eq!(registry.active_index(), 0);
}

#[test]
fn initialize_drops_excluded_and_duplicate_tabs() {
    let mut registry = OrderedTabRegistry::default();
    let untitled = TrackedTab::new(5, "https://blank.test/", "");

    registry.initialize(vec![tab(1), untitled, tab(2), tab(1)], &[]);

    assert_eq!(registry.tab_ids(), vec![1, 2]);
}

#[test]
fn initialize_cancels_pending_reorder() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2, 3]);
    registry.record_activated(3, now);

    registry.initialize(vec![tab(1), tab(2), tab(3)], &[]);

    assert!(registry.pending().is_none());
    assert!(registry.poll_settle(now + DELAY).is_none());
}

#[test]
fn foreground_open_goes_to_head_background_to_tail() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2]);

    assert!(registry.record_created(tab(3), now));
    assert!(registry.record_created(tab(4).active(), now));

    assert_eq!(registry.tab_ids(), vec![4, 1, 2, 3]);
    assert_eq!(registry.active_index(), 0);
    assert!(registry.pending().is_none());
}

#[test]
fn foreground_open_supersedes_pending_reorder() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2]);
    registry.record_activated(2, now);

    registry.record_created(tab(3).active(), now);

    assert!(registry.poll_settle(now + DELAY).is_none());
    assert_eq!(registry.tab_ids(), vec![3, 1, 2]);
}

#[test]
fn reopened_url_leaves_closed_history() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2]);
    registry.record_removed(2);
    assert!(registry.closed_tabs().iter().any(|c| c.url == url(2)));

    registry.record_created(TrackedTab::new(9, url(2), "Again"), now);

    assert!(registry.closed_tabs().iter().all(|c| c.url != url(2)));
}

#[test]
fn excluded_tabs_are_not_tracked() {
    let config = RegistryConfig {
        filter: quick_tabs::tab::InclusionFilter {
            include_dev_tools: false,
            show_pinned_tabs: false,
        },
        ..RegistryConfig::default()
    };
    let mut registry = OrderedTabRegistry::new(config);
    let now = Instant::now();

    assert!(!registry.record_created(tab(1).pinned(), now));
    assert!(!registry.record_created(TrackedTab::new(2, "devtools://devtools/inspector.html", "DevTools"), now));
    assert!(!registry.record_created(TrackedTab::new(3, "https://loading.test/", ""), now));
    assert!(registry.is_empty());
}

#[test]
fn duplicate_create_updates_in_place() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2]);

    registry.record_created(TrackedTab::new(1, url(1), "Renamed"), now);

    assert_eq!(registry.tab_ids(), vec![1, 2]);
    assert_eq!(registry.get(1).map(|t| t.title.as_str()), Some("Renamed"));
}

#[test]
fn update_keeps_position_and_last_good_title() {
    let mut registry = registry_with(&[1, 2, 3]);

    assert!(registry.record_updated(2, TrackedTab::new(2, "https://moved.test/", "")));

    assert_eq!(registry.tab_ids(), vec![1, 2, 3]);
    let updated = registry.get(2).expect("tab 2");
    assert_eq!(updated.url, "https://moved.test/");
    assert_eq!(updated.title, "Tab 2");
}

#[test]
fn replace_rekeys_in_place_and_follows_pending() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2, 3]);
    registry.record_activated(3, now);

    assert!(registry.record_replaced(3, 30, Some(TrackedTab::new(30, url(3), "Prerendered"))));
    assert_eq!(registry.tab_ids(), vec![1, 2, 30]);

    let committed = registry.poll_settle(now + DELAY).expect("commit follows replacement");
    assert_eq!(committed.tab.id, 30);
    assert_eq!(registry.tab_ids(), vec![30, 1, 2]);
}

#[test]
fn replace_without_data_only_changes_identity() {
    let mut registry = registry_with(&[1, 2]);

    registry.record_replaced(2, 20, None);

    let replaced = registry.get(20).expect("tab 20");
    assert_eq!(replaced.title, "Tab 2");
    assert!(registry.get(2).is_none());
}

#[test]
fn unknown_ids_are_ignored() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2]);

    assert!(registry.record_activated(99, now).is_none());
    assert!(registry.pending().is_none());
    assert!(!registry.record_updated(99, tab(99)));
    assert!(!registry.record_replaced(99, 100, None));
    assert!(registry.record_removed(99).is_none());
    assert_eq!(registry.tab_ids(), vec![1, 2]);
}

#[test]
fn step_active_holds_at_both_ends() {
    let mut registry = registry_with(&[1, 2, 3]);

    assert_eq!(registry.step_active(Direction::Next).map(|t| t.id), Ok(2));
    assert_eq!(registry.step_active(Direction::Next).map(|t| t.id), Ok(3));
    assert_eq!(registry.step_active(Direction::Next).map(|t| t.id), Ok(3));
    assert_eq!(registry.step_active(Direction::Prev).map(|t| t.id), Ok(2));
    assert_eq!(registry.step_active(Direction::Prev).map(|t| t.id), Ok(1));
    assert_eq!(registry.step_active(Direction::Prev).map(|t| t.id), Ok(1));
    // Stepping never reorders.
    assert_eq!(registry.tab_ids(), vec![1, 2, 3]);
}

#[test]
fn empty_registry_reports_no_current_tab() {
    let mut registry = OrderedTabRegistry::default();

    assert_eq!(registry.current_active(), Err(TabError::EmptyRegistry));
    assert_eq!(registry.step_active(Direction::Next), Err(TabError::EmptyRegistry));
}

#[test]
fn last_tab_closing_empties_registry() {
    let mut registry = registry_with(&[1]);

    registry.record_removed(1);

    assert!(registry.is_empty());
    assert_eq!(registry.current_active(), Err(TabError::EmptyRegistry));
}

#[test]
fn removal_before_pointer_keeps_pointer_on_same_tab() {
    let mut registry = registry_with(&[1, 2, 3]);
    registry.step_active(Direction::Next).unwrap();
    registry.step_active(Direction::Next).unwrap();

    registry.record_removed(1);

    assert_eq!(registry.current_active().map(|t| t.id), Ok(3));
    assert_eq!(registry.active_index(), 1);
}

#[test]
fn commit_resets_pointer_to_head() {
    let now = Instant::now();
    let mut registry = registry_with(&[1, 2, 3]);
    let stepped = registry.step_active(Direction::Next).unwrap();

    registry.record_activated(stepped.id, now);
    registry.poll_settle(now + DELAY).expect("commit");

    assert_eq!(registry.active_index(), 0);
    assert_eq!(registry.current_active().map(|t| t.id), Ok(2));
}

#[test]
fn host_activations_do_not_move_tabs_when_popup_only() {
    let config = RegistryConfig {
        move_left_on_switch: true,
        move_right_on_switch: true,
        move_on_popup_switch_only: true,
        ..RegistryConfig::default()
    };
    let mut registry = OrderedTabRegistry::new(config);
    registry.initialize(vec![tab(1), tab(2), tab(3)], &[]);
    let now = Instant::now();

    let host = registry
        .record_activated_with(2, Duration::ZERO, ActivationOrigin::Host, now)
        .expect("commit");
    assert_eq!(host.move_to, None);

    let popup = registry
        .record_activated_with(3, Duration::ZERO, ActivationOrigin::Popup, now)
        .expect("commit");
    // Left wins when both directions are configured.
    assert_eq!(popup.move_to, Some(MovePosition::First));
}

#[test]
fn any_activation_moves_when_not_popup_only() {
    let config = RegistryConfig {
        move_right_on_switch: true,
        move_on_popup_switch_only: false,
        ..RegistryConfig::default()
    };
    let mut registry = OrderedTabRegistry::new(config);
    registry.initialize(vec![tab(1), tab(2)], &[]);
    let now = Instant::now();

    registry.record_activated(2, now);
    let committed = registry.poll_settle(now + DELAY).expect("commit");

    assert_eq!(committed.move_to, Some(MovePosition::Last));
}
