use serde::{Serialize, Serializer};

use crate::model::{Filters, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelPhase {
    Closed,
    /// Blank query; the panel lists recent and popular searches.
    OpenEmpty,
    OpenLoading,
    OpenResults,
    OpenError,
}

/// Snapshot of the palette exposed to the rendering layer.
///
/// Only [`crate::navigation::SearchStore`] writes it. `selected_result_index` is `None`
/// exactly when `results` is empty, and otherwise indexes into `results`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub filters: Filters,
    pub is_loading: bool,
    pub error: Option<String>,
    pub recent_searches: Vec<String>,
    pub popular_searches: Vec<String>,
    #[serde(serialize_with = "serialize_selection")]
    pub selected_result_index: Option<usize>,
    pub is_open: bool,
}

impl SearchState {
    pub fn new(recent_searches: Vec<String>, popular_searches: Vec<String>) -> Self {
        Self {
            query: String::new(),
            results: Vec::new(),
            filters: Filters::new(),
            is_loading: false,
            error: None,
            recent_searches,
            popular_searches,
            selected_result_index: None,
            is_open: false,
        }
    }

    pub fn phase(&self) -> PanelPhase {
        if !self.is_open {
            PanelPhase::Closed
        } else if self.query.trim().is_empty() {
            PanelPhase::OpenEmpty
        } else if self.is_loading {
            PanelPhase::OpenLoading
        } else if self.error.is_some() {
            PanelPhase::OpenError
        } else {
            PanelPhase::OpenResults
        }
    }

    /// Selection as a signed index, `-1` when nothing is selected.
    pub fn selected_index(&self) -> isize {
        self.selected_result_index
            .map(|index| index as isize)
            .unwrap_or(-1)
    }

    pub fn selected_result(&self) -> Option<&SearchResult> {
        self.selected_result_index
            .and_then(|index| self.results.get(index))
    }

    /// Entries for the blank-query view: recent searches first, then popular ones not
    /// already listed.
    pub fn empty_state_entries(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = self.recent_searches.iter().map(String::as_str).collect();
        for label in &self.popular_searches {
            if !entries
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(label))
            {
                entries.push(label);
            }
        }
        entries
    }

    pub(crate) fn set_results(&mut self, results: Vec<SearchResult>) {
        self.selected_result_index = if results.is_empty() { None } else { Some(0) };
        self.results = results;
    }

    pub(crate) fn clear_results(&mut self) {
        self.results.clear();
        self.selected_result_index = None;
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

fn serialize_selection<S: Serializer>(
    selection: &Option<usize>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match selection {
        Some(index) => serializer.serialize_i64(*index as i64),
        None => serializer.serialize_i64(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::{PanelPhase, SearchState};
    use crate::model::{ResultKind, SearchResult};

    #[test]
    fn phase_follows_open_query_and_loading_flags() {
        let mut state = SearchState::default();
        assert_eq!(state.phase(), PanelPhase::Closed);

        state.is_open = true;
        assert_eq!(state.phase(), PanelPhase::OpenEmpty);

        state.query = "fees".into();
        state.is_loading = true;
        assert_eq!(state.phase(), PanelPhase::OpenLoading);

        state.is_loading = false;
        state.error = Some("Failed to fetch search results".into());
        assert_eq!(state.phase(), PanelPhase::OpenError);
    }

    #[test]
    fn selection_serializes_as_minus_one_when_empty() {
        let state = SearchState::default();
        let encoded = serde_json::to_value(&state).unwrap();
        assert_eq!(encoded["selectedResultIndex"], -1);
        assert_eq!(encoded["isOpen"], false);
    }

    #[test]
    fn set_results_selects_first_row() {
        let mut state = SearchState::default();
        state.set_results(vec![SearchResult::new("c1", ResultKind::Client, "Ana")]);
        assert_eq!(state.selected_index(), 0);
        state.set_results(Vec::new());
        assert_eq!(state.selected_index(), -1);
    }

    #[test]
    fn recent_entries_take_priority_over_popular() {
        let state = SearchState::new(
            vec!["Clients".into(), "Send Money".into()],
            vec!["send money".into(), "Exchange Rates".into()],
        );
        assert_eq!(
            state.empty_state_entries(),
            vec!["Clients", "Send Money", "Exchange Rates"]
        );
    }
}
