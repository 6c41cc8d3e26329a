use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::kv_store::{KeyValueStore, StoreError};
use crate::model::{normalize_query, SearchResult};

pub const RECENT_SEARCHES_KEY: &str = "recent_searches";
pub const ANALYTICS_KEY: &str = "search_analytics";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub max_recent: usize,
    pub max_tracked_popular: usize,
    pub max_search_history: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_recent: 10,
            max_tracked_popular: 20,
            max_search_history: 100,
        }
    }
}

impl From<&Config> for HistoryLimits {
    fn from(cfg: &Config) -> Self {
        Self {
            max_recent: cfg.max_recent_searches,
            max_tracked_popular: cfg.max_tracked_popular,
            max_search_history: cfg.max_search_history,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularEntry {
    pub label: String,
    pub count: u64,
    pub last_activity: u64,
    pub last_used_epoch_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedResult {
    pub id: String,
    pub kind: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub query: String,
    pub epoch_secs: i64,
    pub result_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_result: Option<SelectedResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickThrough {
    pub searches: u64,
    pub clicks: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchAnalytics {
    pub popular: Vec<PopularEntry>,
    pub search_history: Vec<SearchHistoryEntry>,
    pub click_through: BTreeMap<String, ClickThrough>,
    /// Monotonic counter stamped on popularity entries; breaks count ties by recency.
    pub activity_counter: u64,
}

/// Recency list and popularity counters, written through to a durable store.
///
/// When the store fails the tracker keeps working from its in-memory copy for the
/// rest of the session and never reports the failure to callers.
pub struct HistoryTracker {
    store: Option<Box<dyn KeyValueStore>>,
    limits: HistoryLimits,
    recent: Vec<String>,
    analytics: SearchAnalytics,
}

impl HistoryTracker {
    pub fn open(store: Box<dyn KeyValueStore>, limits: HistoryLimits) -> Self {
        let mut tracker = Self {
            store: Some(store),
            limits,
            recent: Vec::new(),
            analytics: SearchAnalytics::default(),
        };
        tracker.load();
        tracker
    }

    pub fn in_memory(limits: HistoryLimits) -> Self {
        Self {
            store: None,
            limits,
            recent: Vec::new(),
            analytics: SearchAnalytics::default(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.store.is_none()
    }

    pub fn recent_searches(&self) -> Vec<String> {
        self.recent.clone()
    }

    /// Top `limit` labels by click count; ties go to the most recently active label.
    pub fn popular_searches(&self, limit: usize) -> Vec<String> {
        let mut ranked: Vec<&PopularEntry> = self.analytics.popular.iter().collect();
        ranked.sort_by(|a, b| popularity_order(a, b));
        ranked
            .into_iter()
            .take(limit)
            .map(|entry| entry.label.clone())
            .collect()
    }

    pub fn analytics(&self) -> &SearchAnalytics {
        &self.analytics
    }

    /// Moves `query` to the front of the recent list, dropping any older occurrence.
    pub fn record_query(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        self.recent.retain(|existing| existing != query);
        self.recent.insert(0, query.to_string());
        self.recent.truncate(self.limits.max_recent);
        self.persist_recent();
    }

    pub fn record_result_click(&mut self, page_label: &str, result: &SearchResult) {
        let label = page_label.trim();
        if label.is_empty() {
            return;
        }

        self.analytics.activity_counter += 1;
        let activity = self.analytics.activity_counter;
        let now = now_epoch_secs();
        match self
            .analytics
            .popular
            .iter()
            .position(|entry| entry.label == label)
        {
            Some(index) => {
                let entry = &mut self.analytics.popular[index];
                entry.count += 1;
                entry.last_activity = activity;
                entry.last_used_epoch_secs = now;
            }
            None => self.analytics.popular.push(PopularEntry {
                label: label.to_string(),
                count: 1,
                last_activity: activity,
                last_used_epoch_secs: now,
            }),
        }
        self.analytics.popular.sort_by(popularity_order);
        self.analytics
            .popular
            .truncate(self.limits.max_tracked_popular);

        let normalized = normalize_query(label);
        if let Some(latest) = self.analytics.search_history.first_mut() {
            // Only a click on what the latest search was for counts as its selection.
            if latest.query == normalized && latest.selected_result.is_none() {
                latest.selected_result = Some(SelectedResult {
                    id: result.id.clone(),
                    kind: result.kind.as_str().to_string(),
                    title: result.title.clone(),
                });
            }
        }

        self.analytics
            .click_through
            .entry(normalized)
            .or_default()
            .clicks += 1;

        self.persist_analytics();
    }

    pub fn track_search(&mut self, query: &str, result_count: usize) {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return;
        }

        self.analytics.search_history.insert(
            0,
            SearchHistoryEntry {
                query: normalized.clone(),
                epoch_secs: now_epoch_secs(),
                result_count,
                selected_result: None,
            },
        );
        self.analytics
            .search_history
            .truncate(self.limits.max_search_history);
        self.analytics
            .click_through
            .entry(normalized)
            .or_default()
            .searches += 1;

        self.persist_analytics();
    }

    /// Empties the recent list only; popularity counters are kept.
    pub fn clear_recent_searches(&mut self) {
        self.recent.clear();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if let Err(error) = store.remove(RECENT_SEARCHES_KEY) {
            self.degrade("clear recent searches", &error);
        }
    }

    pub fn clear_analytics(&mut self) {
        self.analytics = SearchAnalytics::default();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if let Err(error) = store.remove(ANALYTICS_KEY) {
            self.degrade("clear analytics", &error);
        }
    }

    pub fn click_through_rates(&self) -> BTreeMap<String, f64> {
        self.analytics
            .click_through
            .iter()
            .map(|(query, stats)| {
                let rate = if stats.searches == 0 {
                    0.0
                } else {
                    stats.clicks as f64 / stats.searches as f64
                };
                (query.clone(), rate)
            })
            .collect()
    }

    fn load(&mut self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        let recent = store.get(RECENT_SEARCHES_KEY);
        let analytics = store.get(ANALYTICS_KEY);
        match (recent, analytics) {
            (Ok(recent), Ok(analytics)) => {
                self.recent = recent
                    .and_then(|raw| decode_or_warn::<Vec<String>>(RECENT_SEARCHES_KEY, &raw))
                    .unwrap_or_default();
                self.recent.truncate(self.limits.max_recent);
                self.analytics = analytics
                    .and_then(|raw| decode_or_warn::<SearchAnalytics>(ANALYTICS_KEY, &raw))
                    .unwrap_or_default();
                debug!(
                    recent = self.recent.len(),
                    popular = self.analytics.popular.len(),
                    "search history loaded"
                );
            }
            (Err(error), _) | (_, Err(error)) => self.degrade("load history", &error),
        }
    }

    fn persist_recent(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let result = serde_json::to_string(&self.recent)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
            .and_then(|encoded| store.set(RECENT_SEARCHES_KEY, &encoded));
        if let Err(error) = result {
            self.degrade("save recent searches", &error);
        }
    }

    fn persist_analytics(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let result = serde_json::to_string(&self.analytics)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
            .and_then(|encoded| store.set(ANALYTICS_KEY, &encoded));
        if let Err(error) = result {
            self.degrade("save search analytics", &error);
        }
    }

    fn degrade(&mut self, operation: &str, error: &StoreError) {
        warn!(
            operation,
            %error,
            "history store unavailable; keeping search history in memory for this session"
        );
        self.store = None;
    }
}

fn popularity_order(a: &PopularEntry, b: &PopularEntry) -> std::cmp::Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| b.last_activity.cmp(&a.last_activity))
        .then_with(|| a.label.cmp(&b.label))
}

fn decode_or_warn<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, %error, "discarding unreadable history entry");
            None
        }
    }
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
