use std::sync::{Arc, Mutex};

use remitfind_core::history::{HistoryLimits, HistoryTracker, ANALYTICS_KEY, RECENT_SEARCHES_KEY};
use remitfind_core::kv_store::{KeyValueStore, MemoryKvStore, SqliteKvStore, StoreError};
use remitfind_core::model::{ResultKind, SearchResult};

fn page(url: &str, title: &str) -> SearchResult {
    SearchResult::new(url, ResultKind::Command, title).with_url(url)
}

/// Store whose writes start failing once `fail_writes` is flipped.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: Arc<Mutex<MemoryKvStore>>,
    fail_reads: bool,
    fail_writes: Arc<Mutex<bool>>,
    writes: Arc<Mutex<usize>>,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable("read blocked".into()));
        }
        self.inner.lock().unwrap().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        *self.writes.lock().unwrap() += 1;
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Unavailable("quota exceeded".into()));
        }
        self.inner.lock().unwrap().set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().unwrap().remove(key)
    }

    fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        self.inner.lock().unwrap().list()
    }
}

#[test]
fn history_survives_reopen_of_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("history.sqlite3");

    {
        let store = SqliteKvStore::open(&db_path).unwrap();
        let mut history = HistoryTracker::open(Box::new(store), HistoryLimits::default());
        history.record_query("Send Money");
        history.record_result_click("Send Money", &page("/send-money", "Send Money"));
        history.record_query("Clients");
        history.record_result_click("Clients", &page("/clients", "Clients"));
        history.record_result_click("Clients", &page("/clients", "Clients"));
    }

    let store = SqliteKvStore::open(&db_path).unwrap();
    let history = HistoryTracker::open(Box::new(store), HistoryLimits::default());
    assert!(!history.is_degraded());
    assert_eq!(history.recent_searches(), vec!["Clients", "Send Money"]);
    assert_eq!(history.popular_searches(5), vec!["Clients", "Send Money"]);
}

#[test]
fn unreadable_store_degrades_to_memory() {
    let store = FlakyStore {
        fail_reads: true,
        ..FlakyStore::default()
    };
    let writes = store.writes.clone();
    let mut history = HistoryTracker::open(Box::new(store), HistoryLimits::default());

    assert!(history.is_degraded());
    history.record_query("Clients");
    assert_eq!(history.recent_searches(), vec!["Clients"]);
    assert_eq!(*writes.lock().unwrap(), 0);
}

#[test]
fn failing_writes_keep_session_history_in_memory() {
    let store = FlakyStore::default();
    let fail_writes = store.fail_writes.clone();
    let writes = store.writes.clone();
    let inner = store.inner.clone();
    let mut history = HistoryTracker::open(Box::new(store), HistoryLimits::default());

    history.record_query("Clients");
    assert!(!history.is_degraded());

    *fail_writes.lock().unwrap() = true;
    history.record_query("Exchange Rates");
    assert!(history.is_degraded());

    history.record_query("Settings");
    history.record_result_click("Settings", &page("/settings", "Settings"));
    assert_eq!(
        history.recent_searches(),
        vec!["Settings", "Exchange Rates", "Clients"]
    );
    assert_eq!(history.popular_searches(5), vec!["Settings"]);
    assert_eq!(*writes.lock().unwrap(), 2);
    assert_eq!(
        inner.lock().unwrap().get(RECENT_SEARCHES_KEY).unwrap().as_deref(),
        Some(r#"["Clients"]"#)
    );
}

#[test]
fn corrupt_entries_are_discarded_on_load() {
    let mut store = MemoryKvStore::default();
    store.set(RECENT_SEARCHES_KEY, "not json").unwrap();
    store
        .set(ANALYTICS_KEY, r#"{"popular":[{"label":"Clients","count":3,"last_activity":1,"last_used_epoch_secs":0}]}"#)
        .unwrap();

    let history = HistoryTracker::open(Box::new(store), HistoryLimits::default());
    assert!(!history.is_degraded());
    assert!(history.recent_searches().is_empty());
    assert_eq!(history.popular_searches(5), vec!["Clients"]);
}

#[test]
fn popular_list_is_capped_to_tracked_limit() {
    let mut history = HistoryTracker::in_memory(HistoryLimits {
        max_recent: 10,
        max_tracked_popular: 2,
        max_search_history: 10,
    });
    history.record_result_click("Clients", &page("/clients", "Clients"));
    history.record_result_click("Clients", &page("/clients", "Clients"));
    history.record_result_click("Settings", &page("/settings", "Settings"));
    history.record_result_click("Help Center", &page("/help", "Help Center"));

    assert_eq!(history.analytics().popular.len(), 2);
    assert_eq!(history.popular_searches(5), vec!["Clients", "Help Center"]);
}

#[test]
fn clearing_analytics_keeps_recent_list() {
    let mut history = HistoryTracker::in_memory(HistoryLimits::default());
    history.record_query("Clients");
    history.track_search("clients", 3);
    history.record_result_click("Clients", &page("/clients", "Clients"));

    history.clear_analytics();
    assert!(history.popular_searches(5).is_empty());
    assert!(history.click_through_rates().is_empty());
    assert_eq!(history.recent_searches(), vec!["Clients"]);
}

#[test]
fn click_is_stamped_only_on_matching_latest_search() {
    let mut history = HistoryTracker::in_memory(HistoryLimits::default());
    history.track_search("Clients", 3);
    history.record_result_click("Clients", &page("/clients", "Clients"));

    history.track_search("fx", 2);
    history.record_result_click("Send Money", &page("/send-money", "Send Money"));

    let searches = &history.analytics().search_history;
    assert_eq!(searches[0].query, "fx");
    assert_eq!(searches[0].selected_result, None);
    assert_eq!(searches[1].query, "clients");
    assert_eq!(
        searches[1].selected_result.as_ref().map(|selected| selected.title.as_str()),
        Some("Clients")
    );
}
