use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const META_CORRECTED_QUERY: &str = "corrected_query";
pub const META_ORIGINAL_QUERY: &str = "original_query";
pub const META_ACTION: &str = "action";
pub const META_KEYWORDS: &str = "keywords";

pub type Metadata = BTreeMap<String, Value>;

/// Free-form filter map forwarded to the search backend (e.g. `{"type": "client"}`).
pub type Filters = BTreeMap<String, Value>;

pub const FILTER_TYPE: &str = "type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Client,
    Document,
    Transaction,
    Note,
    Command,
    Help,
    Setting,
    Exchange,
    Suggestion,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Document => "document",
            Self::Transaction => "transaction",
            Self::Note => "note",
            Self::Command => "command",
            Self::Help => "help",
            Self::Setting => "setting",
            Self::Exchange => "exchange",
            Self::Suggestion => "suggestion",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "client" => Some(Self::Client),
            "document" => Some(Self::Document),
            "transaction" => Some(Self::Transaction),
            "note" => Some(Self::Note),
            "command" => Some(Self::Command),
            "help" => Some(Self::Help),
            "setting" => Some(Self::Setting),
            "exchange" => Some(Self::Exchange),
            "suggestion" => Some(Self::Suggestion),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row produced by a lookup. Never mutated after the fetch that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResultKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl SearchResult {
    pub fn new(id: &str, kind: ResultKind, title: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            description: None,
            url: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Navigation target, ignoring blank and placeholder (`#`) urls.
    pub fn navigation_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty() && *url != "#")
    }

    pub fn corrected_query(&self) -> Option<&str> {
        self.metadata_str(META_CORRECTED_QUERY)
    }

    pub fn action_id(&self) -> Option<&str> {
        self.metadata_str(META_ACTION)
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

pub fn normalize_for_search(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Lower-cased, trimmed form used as the identity of a query in analytics.
pub fn normalize_query(input: &str) -> String {
    input.trim().to_lowercase()
}

const KNOWN_PAGES: &[(&str, &str)] = &[
    ("/", "Dashboard"),
    ("/dashboard", "Dashboard"),
    ("/send-money", "Send Money"),
    ("/exchange", "Exchange Rates"),
    ("/transactions", "Transactions"),
    ("/clients", "Clients"),
    ("/clients/new", "New Client"),
    ("/deposit", "Deposit"),
    ("/withdrawal", "Withdrawal"),
    ("/cash-register", "Cash Register"),
    ("/reports/transactions", "Transaction Report"),
    ("/reports/daily", "Daily Summary"),
    ("/settings", "Settings"),
    ("/settings/currencies", "Currency Settings"),
    ("/help", "Help Center"),
];

/// Human page label for a navigation target, used as the history key for clicks.
pub fn page_label_from_url(url: &str) -> String {
    let path = url_path(url);
    if let Some((_, label)) = KNOWN_PAGES.iter().find(|(route, _)| *route == path) {
        return (*label).to_string();
    }

    let last = path.rsplit('/').find(|segment| !segment.is_empty());
    match last {
        Some(segment) => title_case_segment(segment),
        None => "Dashboard".to_string(),
    }
}

fn url_path(url: &str) -> String {
    let trimmed = url.trim();
    let without_origin = match trimmed.find("://") {
        Some(scheme_end) => {
            let rest = &trimmed[scheme_end + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("/")
        }
        None => trimmed,
    };

    let end = without_origin
        .find(|c: char| c == '?' || c == '#')
        .unwrap_or(without_origin.len());
    let path = without_origin[..end].trim_end_matches('/');
    if path.is_empty() {
        return "/".to_string();
    }
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn title_case_segment(segment: &str) -> String {
    segment
        .split(|c: char| c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{page_label_from_url, ResultKind, SearchResult};

    #[test]
    fn known_routes_map_to_page_names() {
        assert_eq!(page_label_from_url("/exchange"), "Exchange Rates");
        assert_eq!(page_label_from_url("/clients/new"), "New Client");
        assert_eq!(page_label_from_url("/"), "Dashboard");
    }

    #[test]
    fn query_string_and_origin_are_ignored() {
        assert_eq!(
            page_label_from_url("https://backoffice.local/transactions?filter=pending"),
            "Transactions"
        );
        assert_eq!(page_label_from_url("/send-money/#review"), "Send Money");
    }

    #[test]
    fn unknown_routes_title_case_last_segment() {
        assert_eq!(page_label_from_url("/compliance/aml-review"), "Aml Review");
    }

    #[test]
    fn placeholder_url_is_not_a_navigation_target() {
        let result = SearchResult::new("s-1", ResultKind::Suggestion, "exchange").with_url("#");
        assert_eq!(result.navigation_url(), None);
    }

    #[test]
    fn kind_serializes_as_type_field() {
        let result = SearchResult::new("c-1", ResultKind::Client, "Amina Yusuf");
        let encoded = serde_json::to_value(&result).unwrap();
        assert_eq!(encoded["type"], "client");
        assert!(encoded.get("metadata").is_none());
    }
}
