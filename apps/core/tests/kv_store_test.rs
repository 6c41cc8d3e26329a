use remitfind_core::config::Config;
use remitfind_core::kv_store::{KeyValueStore, MemoryKvStore, SqliteKvStore};

fn exercise(store: &mut dyn KeyValueStore) {
    assert_eq!(store.get("recent_searches").unwrap(), None);

    store.set("recent_searches", r#"["Clients"]"#).unwrap();
    store.set("recent_searches", r#"["Send Money","Clients"]"#).unwrap();
    store.set("search_analytics", "{}").unwrap();

    assert_eq!(
        store.get("recent_searches").unwrap().as_deref(),
        Some(r#"["Send Money","Clients"]"#)
    );
    assert_eq!(
        store
            .list()
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect::<Vec<_>>(),
        vec!["recent_searches", "search_analytics"]
    );

    store.remove("recent_searches").unwrap();
    assert_eq!(store.get("recent_searches").unwrap(), None);
    store.remove("never-set").unwrap();
}

#[test]
fn memory_store_behaves_like_a_map() {
    exercise(&mut MemoryKvStore::default());
}

#[test]
fn sqlite_store_upserts_and_lists() {
    exercise(&mut SqliteKvStore::open_memory().unwrap());
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        history_db_path: dir.path().join("nested").join("history.sqlite3"),
        ..Default::default()
    };

    {
        let mut store = SqliteKvStore::open_from_config(&cfg).unwrap();
        store.set("recent_searches", r#"["Exchange Rates"]"#).unwrap();
    }

    let reopened = SqliteKvStore::open_from_config(&cfg).unwrap();
    assert_eq!(
        reopened.get("recent_searches").unwrap().as_deref(),
        Some(r#"["Exchange Rates"]"#)
    );
}
