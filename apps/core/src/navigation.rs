use std::time::Duration;

use tracing::{debug, error, warn};

use crate::dispatcher::{Dispatch, QueryDispatcher};
use crate::fetcher::{FetchError, FETCH_FAILED_MESSAGE};
use crate::hotkey::{Key, KeyInput, Shortcut};
use crate::input_port::KeyDisposition;
use crate::model::{page_label_from_url, Filters, ResultKind, SearchResult};
use crate::resolver::{resolve_commit, resolve_phrase, PhraseResolution, Resolution};
use crate::state::{PanelPhase, SearchState};

/// Everything that can happen to the palette.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    QueryChanged(String),
    FiltersChanged(Filters),
    DebounceElapsed {
        seq: u64,
    },
    FetchCompleted {
        seq: u64,
        query: String,
        outcome: Result<Vec<SearchResult>, FetchError>,
    },
    Key(KeyInput),
    SelectResult(SearchResult),
    TogglePanel,
    OpenPanel,
    ClosePanel,
    /// Host navigation happened outside the palette (back/forward).
    RouteChanged,
    ClearSearch,
    UseRecentSearch(String),
    UsePopularSearch(String),
    UseSuggestion(String),
    ClearRecentSearches,
    HistoryRefreshed {
        recent: Vec<String>,
        popular: Vec<String>,
    },
}

/// Side effects requested by a transition, to be executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ScheduleFetch {
        seq: u64,
        delay: Duration,
    },
    CancelScheduledFetch,
    StartFetch {
        seq: u64,
        query: String,
        filters: Filters,
    },
    TrackSearch {
        query: String,
        result_count: usize,
    },
    RecordQuery(String),
    RecordResultClick {
        page_label: String,
        result: SearchResult,
    },
    ClearRecentHistory,
    RefreshHistory,
    RunCommand(String),
    Navigate(String),
}

/// Whether the palette claims `input` given whether its panel is open.
///
/// The open shortcut is always claimed. Other keys are claimed only while the panel is
/// open, and then only the reserved navigation keys.
pub fn key_disposition(is_open: bool, shortcut: &Shortcut, input: &KeyInput) -> KeyDisposition {
    if shortcut.matches(input) {
        return KeyDisposition::Consumed;
    }
    if is_open && input.key.is_reserved() {
        KeyDisposition::Consumed
    } else {
        KeyDisposition::Ignored
    }
}

/// Sole owner and writer of [`SearchState`].
///
/// [`SearchStore::dispatch`] is a synchronous transition: it updates the state and returns
/// the effects the caller must run. Timers, fetches, storage and routing live outside.
#[derive(Debug, Clone)]
pub struct SearchStore {
    state: SearchState,
    dispatcher: QueryDispatcher,
    shortcut: Shortcut,
}

impl SearchStore {
    pub fn new(initial: SearchState, dispatcher: QueryDispatcher, shortcut: Shortcut) -> Self {
        Self {
            state: initial,
            dispatcher,
            shortcut,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn phase(&self) -> PanelPhase {
        self.state.phase()
    }

    pub fn dispatch(&mut self, event: SearchEvent) -> Vec<Effect> {
        match event {
            SearchEvent::QueryChanged(query) => self.change_query(query),
            SearchEvent::FiltersChanged(filters) => {
                self.state.filters = filters;
                if self.state.query.trim().is_empty() {
                    Vec::new()
                } else {
                    let query = self.state.query.clone();
                    self.change_query(query)
                }
            }
            SearchEvent::DebounceElapsed { seq } => self.debounce_elapsed(seq),
            SearchEvent::FetchCompleted {
                seq,
                query,
                outcome,
            } => self.fetch_completed(seq, query, outcome),
            SearchEvent::Key(input) => self.handle_key(&input),
            SearchEvent::SelectResult(result) => self.commit(result),
            SearchEvent::TogglePanel => {
                self.state.is_open = !self.state.is_open;
                Vec::new()
            }
            SearchEvent::OpenPanel => {
                self.state.is_open = true;
                Vec::new()
            }
            SearchEvent::ClosePanel | SearchEvent::RouteChanged => {
                self.state.is_open = false;
                Vec::new()
            }
            SearchEvent::ClearSearch => {
                self.dispatcher.invalidate();
                self.state.query.clear();
                self.state.clear_results();
                self.state.is_loading = false;
                self.state.error = None;
                vec![Effect::CancelScheduledFetch]
            }
            SearchEvent::UseRecentSearch(query) | SearchEvent::UsePopularSearch(query) => {
                self.state.is_open = true;
                self.change_query(query)
            }
            SearchEvent::UseSuggestion(phrase) => self.use_suggestion(&phrase),
            SearchEvent::ClearRecentSearches => {
                self.state.recent_searches.clear();
                vec![Effect::ClearRecentHistory]
            }
            SearchEvent::HistoryRefreshed { recent, popular } => {
                self.state.recent_searches = recent;
                self.state.popular_searches = popular;
                Vec::new()
            }
        }
    }

    fn change_query(&mut self, query: String) -> Vec<Effect> {
        let dispatch = self.dispatcher.on_query(&query);
        self.state.query = query;
        match dispatch {
            Dispatch::Cleared { .. } => {
                self.state.clear_results();
                self.state.is_loading = false;
                self.state.error = None;
                vec![Effect::CancelScheduledFetch]
            }
            Dispatch::Scheduled { seq, delay } => {
                self.state.is_loading = true;
                vec![Effect::ScheduleFetch { seq, delay }]
            }
        }
    }

    fn debounce_elapsed(&mut self, seq: u64) -> Vec<Effect> {
        match self.dispatcher.on_timer(seq) {
            Some(ticket) => {
                debug!(seq = ticket.seq, query = %ticket.query, "dispatching search");
                vec![Effect::StartFetch {
                    seq: ticket.seq,
                    query: ticket.query,
                    filters: self.state.filters.clone(),
                }]
            }
            None => {
                debug!(seq, "ignoring superseded debounce timer");
                Vec::new()
            }
        }
    }

    fn fetch_completed(
        &mut self,
        seq: u64,
        query: String,
        outcome: Result<Vec<SearchResult>, FetchError>,
    ) -> Vec<Effect> {
        if self.state.query != query || !self.dispatcher.accept(seq, &query) {
            debug!(seq, query = %query, "dropping stale search response");
            return Vec::new();
        }

        self.state.is_loading = false;
        match outcome {
            Ok(results) => {
                let result_count = results.len();
                self.state.set_results(results);
                self.state.error = None;
                vec![Effect::TrackSearch {
                    query,
                    result_count,
                }]
            }
            Err(err) => {
                warn!(seq, query = %query, error = %err, "search failed");
                self.state.clear_results();
                self.state.error = Some(FETCH_FAILED_MESSAGE.to_string());
                Vec::new()
            }
        }
    }

    fn handle_key(&mut self, input: &KeyInput) -> Vec<Effect> {
        if self.shortcut.matches(input) {
            self.state.is_open = true;
            return Vec::new();
        }
        if !self.state.is_open {
            return Vec::new();
        }

        match input.key {
            Key::Escape => {
                self.state.is_open = false;
                Vec::new()
            }
            Key::ArrowDown | Key::ArrowUp if self.phase() == PanelPhase::OpenResults => {
                self.move_selection(input.key == Key::ArrowDown);
                Vec::new()
            }
            Key::Enter if self.phase() == PanelPhase::OpenResults => {
                let selected = self.state.selected_result().cloned();
                match selected {
                    Some(result) => self.commit(result),
                    None => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    fn move_selection(&mut self, forward: bool) {
        let Some(last) = self.state.results.len().checked_sub(1) else {
            self.state.selected_result_index = None;
            return;
        };
        let current = self.state.selected_result_index.unwrap_or(0);
        let next = if forward {
            (current + 1).min(last)
        } else {
            current.saturating_sub(1)
        };
        self.state.selected_result_index = Some(next);
    }

    /// Resolves and commits `result`. The panel is closed before anything else happens.
    fn commit(&mut self, result: SearchResult) -> Vec<Effect> {
        self.state.is_open = false;

        match resolve_commit(&result) {
            Resolution::Requery(corrected) => {
                self.state.is_open = true;
                self.change_query(corrected)
            }
            Resolution::RunCommand(action) => {
                let label = result.title.clone();
                let mut effects = record_effects(label, result);
                effects.push(Effect::RunCommand(action));
                effects
            }
            Resolution::Navigate(url) => {
                let label = page_label_from_url(&url);
                let mut effects = record_effects(label, result);
                effects.push(Effect::Navigate(url));
                effects
            }
            Resolution::MissingUrl => {
                error!(id = %result.id, kind = %result.kind, "result has no navigation url");
                Vec::new()
            }
        }
    }

    fn use_suggestion(&mut self, phrase: &str) -> Vec<Effect> {
        self.state.is_open = false;

        match resolve_phrase(phrase) {
            PhraseResolution::DirectRoute(route) => {
                let label = page_label_from_url(route);
                let result = SearchResult::new(route, ResultKind::Suggestion, phrase.trim())
                    .with_url(route);
                let mut effects = record_effects(label, result);
                effects.push(Effect::Navigate(route.to_string()));
                effects
            }
            PhraseResolution::Search(query) => {
                self.state.is_open = true;
                self.change_query(query)
            }
        }
    }
}

fn record_effects(label: String, result: SearchResult) -> Vec<Effect> {
    vec![
        Effect::RecordQuery(label.clone()),
        Effect::RecordResultClick {
            page_label: label,
            result,
        },
        Effect::RefreshHistory,
    ]
}
