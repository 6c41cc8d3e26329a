use crate::model::{ResultKind, SearchResult};

/// Phrases that jump straight to a page instead of being searched for.
pub const DIRECT_ROUTES: &[(&str, &str)] = &[
    ("send money", "/send-money"),
    ("exchange rates", "/exchange"),
    ("transactions", "/transactions"),
    ("clients", "/clients"),
    ("settings", "/settings"),
    ("help center", "/help"),
    ("new client", "/clients/new"),
    ("cash register", "/cash-register"),
];

/// What committing a result should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Spelling correction: search again with the corrected text.
    Requery(String),
    /// Run an executable command; no navigation follows.
    RunCommand(String),
    Navigate(String),
    /// Non-special result without a target. Logged and aborted by the caller.
    MissingUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseResolution {
    DirectRoute(&'static str),
    Search(String),
}

pub fn resolve_commit(result: &SearchResult) -> Resolution {
    if result.kind == ResultKind::Suggestion {
        if let Some(corrected) = result.corrected_query() {
            return Resolution::Requery(corrected.to_string());
        }
    }

    if result.kind == ResultKind::Command {
        if let Some(action) = result.action_id() {
            return Resolution::RunCommand(action.to_string());
        }
    }

    match result.navigation_url() {
        Some(url) => Resolution::Navigate(url.to_string()),
        None => Resolution::MissingUrl,
    }
}

/// Case-insensitive exact match against [`DIRECT_ROUTES`]; anything else is a search term.
pub fn resolve_phrase(phrase: &str) -> PhraseResolution {
    let needle = phrase.trim();
    DIRECT_ROUTES
        .iter()
        .find(|(term, _)| term.eq_ignore_ascii_case(needle))
        .map(|(_, route)| PhraseResolution::DirectRoute(*route))
        .unwrap_or_else(|| PhraseResolution::Search(phrase.to_string()))
}
