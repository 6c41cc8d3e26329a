use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::fetcher::{BackendError, SearchBackend};
use crate::model::{
    normalize_for_search, Filters, ResultKind, SearchResult, FILTER_TYPE, META_ACTION,
    META_CORRECTED_QUERY, META_KEYWORDS, META_ORIGINAL_QUERY,
};

pub const DEFAULT_RESULT_LIMIT: usize = 20;
pub const MAX_SPELLING_SUGGESTIONS: usize = 2;
const MAX_EDIT_DISTANCE: usize = 2;
const MIN_CORRECTABLE_WORD_LEN: usize = 3;

pub const COMMAND_OPEN_SHORTCUTS: &str = "open-shortcuts";
pub const COMMAND_TOGGLE_THEME: &str = "toggle-theme";
pub const COMMAND_NEW_TRANSACTION: &str = "new-transaction";
pub const COMMAND_LOGOUT: &str = "logout";

#[derive(Debug, Clone, Copy)]
pub struct PageEntry {
    pub id: &'static str,
    pub kind: ResultKind,
    pub title: &'static str,
    pub description: &'static str,
    pub url: &'static str,
    pub keywords: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct BuiltInCommand {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Route the command opens, if it is a navigation shortcut.
    pub route: Option<&'static str>,
    pub keywords: &'static [&'static str],
}

pub fn page_entries() -> &'static [PageEntry] {
    &[
        PageEntry {
            id: "dashboard",
            kind: ResultKind::Command,
            title: "Dashboard",
            description: "Transaction summary and quick actions",
            url: "/dashboard",
            keywords: &["home", "main", "overview", "summary", "start"],
        },
        PageEntry {
            id: "send-money",
            kind: ResultKind::Transaction,
            title: "Send Money",
            description: "Start a new money transfer",
            url: "/send-money",
            keywords: &["send", "transfer", "remit", "payment", "wire"],
        },
        PageEntry {
            id: "transactions",
            kind: ResultKind::Transaction,
            title: "Transactions",
            description: "View and manage all transactions",
            url: "/transactions",
            keywords: &["transfers", "payments", "history", "records"],
        },
        PageEntry {
            id: "pending-transactions",
            kind: ResultKind::Transaction,
            title: "Pending Transactions",
            description: "Transfers that are still in progress",
            url: "/transactions?filter=pending",
            keywords: &["processing", "waiting", "ongoing", "incomplete"],
        },
        PageEntry {
            id: "clients",
            kind: ResultKind::Client,
            title: "Clients",
            description: "View and manage all clients",
            url: "/clients",
            keywords: &["customers", "people", "contacts"],
        },
        PageEntry {
            id: "new-client",
            kind: ResultKind::Client,
            title: "New Client",
            description: "Register a new client",
            url: "/clients/new",
            keywords: &["add client", "create client", "register", "customer"],
        },
        PageEntry {
            id: "exchange-rates",
            kind: ResultKind::Exchange,
            title: "Exchange Rates",
            description: "Current exchange rates for all currencies",
            url: "/exchange",
            keywords: &["forex", "currency", "rates", "conversion", "exchange"],
        },
        PageEntry {
            id: "cash-register",
            kind: ResultKind::Command,
            title: "Cash Register",
            description: "Manage the cash drawer and balance",
            url: "/cash-register",
            keywords: &["cash", "drawer", "till", "balance"],
        },
        PageEntry {
            id: "deposit",
            kind: ResultKind::Transaction,
            title: "Make Deposit",
            description: "Process a new deposit",
            url: "/deposit",
            keywords: &["add funds", "cash in", "deposit"],
        },
        PageEntry {
            id: "withdrawal",
            kind: ResultKind::Transaction,
            title: "Process Withdrawal",
            description: "Process a new withdrawal",
            url: "/withdrawal",
            keywords: &["cash out", "withdraw"],
        },
        PageEntry {
            id: "documents",
            kind: ResultKind::Document,
            title: "Documents",
            description: "Uploaded files and attachments",
            url: "/documents",
            keywords: &["files", "paperwork", "uploads", "attachments"],
        },
        PageEntry {
            id: "daily-report",
            kind: ResultKind::Document,
            title: "Daily Summary",
            description: "Today's financial summary",
            url: "/reports/daily",
            keywords: &["today", "daily", "report"],
        },
        PageEntry {
            id: "transaction-report",
            kind: ResultKind::Document,
            title: "Transaction Report",
            description: "Transfer volumes by period",
            url: "/reports/transactions",
            keywords: &["report", "analytics", "statistics"],
        },
        PageEntry {
            id: "settings",
            kind: ResultKind::Setting,
            title: "Settings",
            description: "Application settings and preferences",
            url: "/settings",
            keywords: &["preferences", "options", "configuration"],
        },
        PageEntry {
            id: "currency-settings",
            kind: ResultKind::Setting,
            title: "Currency Settings",
            description: "Enabled currencies and rate margins",
            url: "/settings/currencies",
            keywords: &["currency", "margin", "rates"],
        },
        PageEntry {
            id: "help-center",
            kind: ResultKind::Help,
            title: "Help Center",
            description: "Guides and answers to common questions",
            url: "/help",
            keywords: &["support", "faq", "guide", "assistance"],
        },
    ]
}

pub fn built_in_commands() -> &'static [BuiltInCommand] {
    &[
        BuiltInCommand {
            id: COMMAND_OPEN_SHORTCUTS,
            title: "Keyboard Shortcuts",
            description: "Show all keyboard shortcuts",
            route: None,
            keywords: &["shortcuts", "keys", "hotkeys", "keyboard"],
        },
        BuiltInCommand {
            id: COMMAND_TOGGLE_THEME,
            title: "Toggle Theme",
            description: "Switch between light and dark mode",
            route: None,
            keywords: &["theme", "dark", "light", "mode"],
        },
        BuiltInCommand {
            id: COMMAND_NEW_TRANSACTION,
            title: "New Transaction",
            description: "Start a new money transfer",
            route: Some("/send-money"),
            keywords: &["new", "transfer", "send"],
        },
        BuiltInCommand {
            id: COMMAND_LOGOUT,
            title: "Log Out",
            description: "End the current session",
            route: None,
            keywords: &["logout", "sign out", "exit"],
        },
    ]
}

pub fn built_in_command(id: &str) -> Option<&'static BuiltInCommand> {
    built_in_commands().iter().find(|command| command.id == id)
}

impl PageEntry {
    pub fn to_result(&self) -> SearchResult {
        SearchResult::new(self.id, self.kind, self.title)
            .with_description(self.description)
            .with_url(self.url)
            .with_metadata(META_KEYWORDS, keyword_values(self.keywords))
    }
}

impl BuiltInCommand {
    pub fn to_result(&self) -> SearchResult {
        let result = SearchResult::new(self.id, ResultKind::Command, self.title)
            .with_description(self.description)
            .with_metadata(META_ACTION, self.id)
            .with_metadata(META_KEYWORDS, keyword_values(self.keywords));
        match self.route {
            Some(route) => result.with_url(route),
            None => result,
        }
    }
}

fn keyword_values(keywords: &[&str]) -> Value {
    Value::Array(
        keywords
            .iter()
            .map(|keyword| Value::String((*keyword).to_string()))
            .collect(),
    )
}

#[derive(Debug, Clone)]
struct CatalogItem {
    result: SearchResult,
    normalized_title: String,
    normalized_keywords: Vec<String>,
    normalized_description: String,
}

impl CatalogItem {
    fn new(result: SearchResult) -> Self {
        let normalized_keywords = result
            .metadata
            .get(META_KEYWORDS)
            .and_then(Value::as_array)
            .map(|keywords| {
                keywords
                    .iter()
                    .filter_map(Value::as_str)
                    .map(normalize_for_search)
                    .filter(|keyword| !keyword.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            normalized_title: normalize_for_search(&result.title),
            normalized_description: result
                .description
                .as_deref()
                .map(normalize_for_search)
                .unwrap_or_default(),
            normalized_keywords,
            result,
        }
    }
}

/// In-process search index over pages, commands and any records added to it.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    vocabulary: BTreeSet<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::built_in()
    }
}

impl Catalog {
    pub fn new(results: Vec<SearchResult>) -> Self {
        let mut catalog = Self {
            items: Vec::with_capacity(results.len()),
            vocabulary: BTreeSet::new(),
        };
        catalog.extend(results);
        catalog
    }

    pub fn built_in() -> Self {
        let results = page_entries()
            .iter()
            .map(PageEntry::to_result)
            .chain(built_in_commands().iter().map(BuiltInCommand::to_result))
            .collect();
        Self::new(results)
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = SearchResult>) {
        for result in results {
            self.index_words(&result);
            self.items.push(CatalogItem::new(result));
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn vocabulary(&self) -> &BTreeSet<String> {
        &self.vocabulary
    }

    /// Ranked matches for `query`, followed by spelling suggestions when a word looks
    /// misspelled. A `type` filter restricts matches to that kind; suggestions always pass.
    pub fn search(&self, query: &str, filters: &Filters, limit: usize) -> Vec<SearchResult> {
        if limit == 0 || self.items.is_empty() {
            return Vec::new();
        }

        let normalized_query = normalize_for_search(query);
        if normalized_query.is_empty() {
            return Vec::new();
        }

        let kind_filter = filters
            .get(FILTER_TYPE)
            .and_then(Value::as_str)
            .and_then(ResultKind::parse);

        let mut scored: Vec<(i64, usize, &CatalogItem)> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| kind_filter.map_or(true, |kind| item.result.kind == kind))
            .filter_map(|(index, item)| {
                score_item(item, &normalized_query).map(|score| (score, index, item))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut out: Vec<SearchResult> = scored
            .into_iter()
            .take(limit)
            .map(|(_, _, item)| item.result.clone())
            .collect();

        let room = limit.saturating_sub(out.len()).min(MAX_SPELLING_SUGGESTIONS);
        for (index, corrected) in self
            .spelling_suggestions(query, room)
            .into_iter()
            .enumerate()
        {
            out.push(suggestion_result(index, query, &corrected));
        }
        out
    }

    /// Corrected forms of `query`, one misspelled word replaced at a time.
    pub fn spelling_suggestions(&self, query: &str, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }
        let lowered = query.trim().to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        let mut suggestions: Vec<String> = Vec::new();

        for (position, word) in words.iter().enumerate() {
            if word.chars().count() < MIN_CORRECTABLE_WORD_LEN
                || !word.chars().any(char::is_alphabetic)
                || self.is_known_word(word)
            {
                continue;
            }

            for candidate in self.closest_words(word) {
                let corrected = words
                    .iter()
                    .enumerate()
                    .map(|(index, original)| {
                        if index == position {
                            candidate
                        } else {
                            *original
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                if !suggestions.contains(&corrected) {
                    suggestions.push(corrected);
                }
                if suggestions.len() >= limit {
                    return suggestions;
                }
            }
        }
        suggestions
    }

    fn is_known_word(&self, word: &str) -> bool {
        self.vocabulary
            .range(word.to_string()..)
            .next()
            .is_some_and(|known| known.starts_with(word))
    }

    fn closest_words(&self, word: &str) -> Vec<&str> {
        let len = word.chars().count();
        let mut candidates: Vec<(usize, &str)> = self
            .vocabulary
            .iter()
            .filter(|known| known.chars().count().abs_diff(len) <= MAX_EDIT_DISTANCE)
            .map(|known| (strsim::levenshtein(word, known), known.as_str()))
            .filter(|(distance, _)| *distance <= MAX_EDIT_DISTANCE)
            .collect();
        candidates.sort();
        candidates.into_iter().map(|(_, known)| known).collect()
    }

    fn index_words(&mut self, result: &SearchResult) {
        let keywords = result
            .metadata
            .get(META_KEYWORDS)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str);
        for text in std::iter::once(result.title.as_str()).chain(keywords) {
            for word in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|word| word.chars().count() >= MIN_CORRECTABLE_WORD_LEN)
                .filter(|word| word.chars().any(char::is_alphabetic))
            {
                self.vocabulary.insert(word.to_lowercase());
            }
        }
    }
}

fn suggestion_result(index: usize, original: &str, corrected: &str) -> SearchResult {
    SearchResult::new(
        &format!("suggestion-{index}"),
        ResultKind::Suggestion,
        &format!("Did you mean \"{corrected}\"?"),
    )
    .with_description(&format!("Search for \"{corrected}\" instead"))
    .with_metadata(META_CORRECTED_QUERY, corrected)
    .with_metadata(META_ORIGINAL_QUERY, original.trim())
}

fn score_item(item: &CatalogItem, normalized_query: &str) -> Option<i64> {
    if let Some(score) = score_normalized_title(&item.normalized_title, normalized_query) {
        return Some(score);
    }

    let keyword_score = item
        .normalized_keywords
        .iter()
        .filter_map(|keyword| score_normalized_title(keyword, normalized_query))
        .max();
    if let Some(score) = keyword_score {
        return Some(score - 1_000);
    }

    // Descriptions only count on a direct substring hit.
    item.normalized_description
        .find(normalized_query)
        .map(|position| 2_000 + (normalized_query.len() as i64) * 10 - position as i64)
}

fn score_normalized_title(normalized_title: &str, query: &str) -> Option<i64> {
    if normalized_title.is_empty() || query.is_empty() {
        return None;
    }

    if let Some(position) = normalized_title.find(query) {
        let prefix_bonus = if position == 0 { 400 } else { 0 };
        let compact_bonus = (query.len() as i64) * 40;
        let position_penalty = position as i64;
        let length_penalty = (normalized_title.len() as i64 - query.len() as i64).abs();
        return Some(10_000 + prefix_bonus + compact_bonus - position_penalty - length_penalty);
    }

    let positions = subsequence_positions(normalized_title, query)?;
    let start_penalty = positions[0] as i64;
    let gap_penalty: i64 = positions
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0] + 1) as i64)
        .sum();
    let length_penalty = (normalized_title.len() as i64 - query.len() as i64).max(0);

    Some(5_000 + (query.len() as i64) * 30 - gap_penalty * 6 - start_penalty - length_penalty)
}

fn subsequence_positions(haystack: &str, needle: &str) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(needle.len());
    let mut next_start = 0;

    for needle_char in needle.chars() {
        let mut found = None;
        for (offset, hay_char) in haystack[next_start..].char_indices() {
            if hay_char == needle_char {
                let absolute = next_start + offset;
                found = Some(absolute);
                next_start = absolute + hay_char.len_utf8();
                break;
            }
        }

        positions.push(found?);
    }

    Some(positions)
}

/// [`SearchBackend`] answering from an in-process [`Catalog`].
#[derive(Debug, Clone)]
pub struct CatalogBackend {
    catalog: Arc<Catalog>,
    limit: usize,
}

impl CatalogBackend {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            limit: DEFAULT_RESULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl Default for CatalogBackend {
    fn default() -> Self {
        Self::new(Catalog::built_in())
    }
}

#[async_trait]
impl SearchBackend for CatalogBackend {
    async fn search(
        &self,
        query: &str,
        filters: &Filters,
    ) -> Result<Vec<SearchResult>, BackendError> {
        Ok(self.catalog.search(query, filters, self.limit))
    }
}
