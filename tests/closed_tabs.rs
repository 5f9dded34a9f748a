use quick_tabs::closed::{ClosedTab, ClosedTabHistory};
use quick_tabs::tab::TrackedTab;

fn page(n: i64) -> TrackedTab {
    TrackedTab::new(n, format!("https://page{n}.test/"), format!("Page {n}"))
}

fn urls(history: &ClosedTabHistory) -> Vec<String> {
    history.iter().map(|c| c.url.clone()).collect()
}

#[test]
fn keeps_most_recent_entries_up_to_cap() {
    let mut history = ClosedTabHistory::new(3);
    for n in 1..=4 {
        assert!(history.record(&page(n)));
    }

    assert_eq!(history.len(), 3);
    assert_eq!(
        urls(&history),
        vec!["https://page4.test/", "https://page3.test/", "https://page2.test/"]
    );
}

#[test]
fn ignores_non_web_pages() {
    let mut history = ClosedTabHistory::new(5);

    assert!(!history.record(&TrackedTab::new(1, "chrome://settings", "Settings")));
    assert!(!history.record(&TrackedTab::new(2, "about:blank", "Blank")));
    assert!(history.record(&TrackedTab::new(3, "http://plain.test/", "Plain")));

    assert_eq!(urls(&history), vec!["http://plain.test/"]);
}

#[test]
fn remove_by_url_takes_most_recent_match() {
    let mut history = ClosedTabHistory::new(5);
    history.record(&TrackedTab::new(1, "https://same.test/", "First"));
    history.record(&page(2));
    history.record(&TrackedTab::new(3, "https://same.test/", "Second"));

    let removed = history.remove_by_url("https://same.test/").expect("entry");

    assert_eq!(removed.title, "Second");
    assert_eq!(history.len(), 2);
    assert!(history.remove_by_url("https://missing.test/").is_none());
}

#[test]
fn shrinking_cap_drops_oldest() {
    let mut history = ClosedTabHistory::new(5);
    for n in 1..=5 {
        history.record(&page(n));
    }

    history.resize(2);

    assert_eq!(history.cap(), 2);
    assert_eq!(urls(&history), vec!["https://page5.test/", "https://page4.test/"]);
}

#[test]
fn restore_filters_and_truncates() {
    let mut history = ClosedTabHistory::new(2);
    let entry = |url: &str| ClosedTab {
        url: url.to_string(),
        title: String::new(),
        favicon: None,
        closed_at: 0,
    };

    history.restore(vec![
        entry("https://a.test/"),
        entry("chrome://newtab"),
        entry("https://b.test/"),
        entry("https://c.test/"),
    ]);

    assert_eq!(urls(&history), vec!["https://a.test/", "https://b.test/"]);
}

#[test]
fn entries_carry_close_time() {
    let mut history = ClosedTabHistory::new(1);
    let before = chrono::Utc::now().timestamp();

    history.record(&page(1));

    let entry = history.iter().next().expect("entry");
    assert!(entry.closed_at >= before);
}
