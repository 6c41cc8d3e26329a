use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::model::{Filters, ResultKind, SearchResult};

/// Message shown in place of the result list when a lookup fails.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch search results";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("search service unavailable: {0}")]
    Unavailable(String),
    #[error("search request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("search timed out after {0:?}")]
    Timeout(Duration),
}

/// External lookup the palette queries. Implementations may fail; failures never crash the session.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filters: &Filters,
    ) -> Result<Vec<SearchResult>, BackendError>;
}

/// Runs one lookup bounded by `timeout` and returns the results in display order.
pub async fn fetch_results(
    backend: &dyn SearchBackend,
    query: &str,
    filters: &Filters,
    timeout: Duration,
) -> Result<Vec<SearchResult>, FetchError> {
    match tokio::time::timeout(timeout, backend.search(query, filters)).await {
        Ok(Ok(results)) => Ok(group_results(results)),
        Ok(Err(error)) => Err(FetchError::Backend(error)),
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

/// Reorders results so each kind forms one contiguous group.
///
/// Groups appear in the order their kind was first seen; items keep their original
/// relative order inside a group. The flat order of the output is the order rows are
/// displayed and the order keyboard selection walks. Repeated ids keep the first copy.
pub fn group_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen_ids = HashSet::new();
    let mut groups: Vec<(ResultKind, Vec<SearchResult>)> = Vec::new();

    for result in results {
        if !seen_ids.insert(result.id.clone()) {
            debug!(id = %result.id, "dropping duplicate search result");
            continue;
        }
        match groups.iter_mut().find(|(kind, _)| *kind == result.kind) {
            Some((_, items)) => items.push(result),
            None => groups.push((result.kind, vec![result])),
        }
    }

    groups.into_iter().flat_map(|(_, items)| items).collect()
}
