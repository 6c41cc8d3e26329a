use std::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// A lookup the dispatcher has committed to, tagged with the sequence it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Blank query: results are cleared right away and nothing is scheduled.
    Cleared { seq: u64 },
    /// A fetch for `seq` should start once `delay` passes without another query.
    Scheduled { seq: u64, delay: Duration },
}

/// Collapses bursts of query changes into one lookup per pause and decides which
/// responses are still current.
///
/// Every query change bumps the sequence. Only the latest scheduled sequence may fire,
/// and only the latest fired sequence may have its response applied; anything older is
/// stale and dropped when it resolves. In-flight requests are never aborted.
#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    debounce: Duration,
    seq: u64,
    scheduled: Option<FetchTicket>,
    in_flight: Option<FetchTicket>,
}

impl Default for QueryDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl QueryDispatcher {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            seq: 0,
            scheduled: None,
            in_flight: None,
        }
    }

    pub fn on_query(&mut self, query: &str) -> Dispatch {
        self.seq += 1;
        self.in_flight = None;

        if query.trim().is_empty() {
            self.scheduled = None;
            return Dispatch::Cleared { seq: self.seq };
        }

        self.scheduled = Some(FetchTicket {
            seq: self.seq,
            query: query.to_string(),
        });
        Dispatch::Scheduled {
            seq: self.seq,
            delay: self.debounce,
        }
    }

    /// Debounce expiry for `seq`. Returns the ticket to fetch, or `None` if superseded.
    pub fn on_timer(&mut self, seq: u64) -> Option<FetchTicket> {
        if self.scheduled.as_ref().map(|ticket| ticket.seq) != Some(seq) {
            return None;
        }
        let ticket = self.scheduled.take()?;
        self.in_flight = Some(ticket.clone());
        Some(ticket)
    }

    /// Whether a response for (`seq`, `query`) may be applied. Consumes the in-flight slot.
    pub fn accept(&mut self, seq: u64, query: &str) -> bool {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|ticket| ticket.seq == seq && ticket.query == query);
        if current {
            self.in_flight = None;
        }
        current
    }

    /// Drops any scheduled or in-flight lookup without issuing a new one.
    pub fn invalidate(&mut self) {
        self.seq += 1;
        self.scheduled = None;
        self.in_flight = None;
    }
}
