use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use crate::action_executor::{CommandRunner, Navigator};
use crate::config::Config;
use crate::dispatcher::QueryDispatcher;
use crate::fetcher::{fetch_results, SearchBackend};
use crate::history::HistoryTracker;
use crate::hotkey::{parse_shortcut, Key, KeyInput, Shortcut};
use crate::input_port::{InputPortError, KeyDisposition, KeyEventPort, KeySink, PortRegistration};
use crate::model::{Filters, SearchResult};
use crate::navigation::{key_disposition, Effect, SearchEvent, SearchStore};
use crate::state::SearchState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid open shortcut: {0}")]
    InvalidShortcut(String),
    #[error("search session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to detach key input: {0}")]
    Input(#[from] InputPortError),
}

/// Collaborators the session drives.
#[derive(Clone)]
pub struct SessionPorts {
    pub backend: Arc<dyn SearchBackend>,
    pub navigator: Arc<dyn Navigator>,
    pub commands: Arc<dyn CommandRunner>,
}

enum Command {
    Event(SearchEvent),
    Key { ticket: u64, input: KeyInput },
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Front door to a running search session. Cheap calls that enqueue events; the
/// session task applies them in arrival order.
///
/// The handle holds the only strong sender into the session, so dropping it stops the
/// task once queued events are applied.
pub struct SearchHandle {
    inbox: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SearchState>,
    keys: Arc<KeyGate>,
    open_shortcut: String,
    task: JoinHandle<HistoryTracker>,
}

/// Decides which key events the session claims from the host.
///
/// Every key gets a ticket; the session task records the highest ticket it has applied.
/// An open shortcut whose ticket is not applied yet counts as an open panel.
struct KeyGate {
    snapshots: watch::Receiver<SearchState>,
    shortcut: Shortcut,
    issued: AtomicU64,
    applied: Arc<AtomicU64>,
    pending_open: AtomicU64,
}

impl KeyGate {
    fn judge(&self, input: &KeyInput) -> (u64, KeyDisposition) {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let applied = self.applied.load(Ordering::SeqCst);
        let opening = self.pending_open.load(Ordering::SeqCst) > applied;
        let is_open = opening || self.snapshots.borrow().is_open;

        if !is_open && self.shortcut.matches(input) {
            self.pending_open.store(ticket, Ordering::SeqCst);
        } else if opening && input.key == Key::Escape {
            self.pending_open.store(0, Ordering::SeqCst);
        }
        (ticket, key_disposition(is_open, &self.shortcut, input))
    }

    /// Judges `input` and queues it for the session. Unclaimed once the session is gone.
    fn forward(&self, inbox: &mpsc::UnboundedSender<Command>, input: KeyInput) -> KeyDisposition {
        if inbox.is_closed() {
            return KeyDisposition::Ignored;
        }
        let (ticket, disposition) = self.judge(&input);
        if inbox.send(Command::Key { ticket, input }).is_err() {
            debug!("key event dropped; search session has stopped");
            return KeyDisposition::Ignored;
        }
        disposition
    }
}

pub struct SearchSession;

impl SearchSession {
    /// Starts the session task on the current tokio runtime.
    pub fn spawn(
        cfg: &Config,
        ports: SessionPorts,
        history: HistoryTracker,
    ) -> Result<SearchHandle, SessionError> {
        let shortcut = parse_shortcut(&cfg.open_shortcut).map_err(SessionError::InvalidShortcut)?;
        let initial = SearchState::new(
            history.recent_searches(),
            history.popular_searches(cfg.popular_limit),
        );
        let store = SearchStore::new(
            initial.clone(),
            QueryDispatcher::new(cfg.debounce()),
            shortcut.clone(),
        );

        let (inbox, commands) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(initial);
        let applied_keys = Arc::new(AtomicU64::new(0));
        let keys = Arc::new(KeyGate {
            snapshots: snapshots.clone(),
            shortcut,
            issued: AtomicU64::new(0),
            applied: Arc::clone(&applied_keys),
            pending_open: AtomicU64::new(0),
        });
        let session = SessionLoop {
            store,
            history,
            ports,
            popular_limit: cfg.popular_limit,
            fetch_timeout: cfg.fetch_timeout(),
            publisher,
            applied_keys,
            timer: DebounceTimer::default(),
            in_flight: FuturesUnordered::new(),
        };
        let task = tokio::spawn(session.run(commands));
        info!(shortcut = %cfg.open_shortcut, "search session started");

        Ok(SearchHandle {
            inbox,
            snapshots,
            keys,
            open_shortcut: cfg.open_shortcut.clone(),
            task,
        })
    }
}

impl SearchHandle {
    pub fn query_changed(&self, query: &str) {
        self.send(SearchEvent::QueryChanged(query.to_string()));
    }

    pub fn filters_changed(&self, filters: Filters) {
        self.send(SearchEvent::FiltersChanged(filters));
    }

    pub fn select_result(&self, result: SearchResult) {
        self.send(SearchEvent::SelectResult(result));
    }

    /// Feeds a key event and reports whether the host should stop it propagating.
    ///
    /// Keys sent right after the open shortcut are judged as if the panel were already
    /// open. Otherwise the latest published snapshot decides.
    pub fn key(&self, input: KeyInput) -> KeyDisposition {
        self.keys.forward(&self.inbox, input)
    }

    pub fn toggle_panel(&self) {
        self.send(SearchEvent::TogglePanel);
    }

    pub fn open(&self) {
        self.send(SearchEvent::OpenPanel);
    }

    pub fn close(&self) {
        self.send(SearchEvent::ClosePanel);
    }

    pub fn route_changed(&self) {
        self.send(SearchEvent::RouteChanged);
    }

    pub fn clear_search(&self) {
        self.send(SearchEvent::ClearSearch);
    }

    pub fn use_recent_search(&self, query: &str) {
        self.send(SearchEvent::UseRecentSearch(query.to_string()));
    }

    pub fn use_popular_search(&self, query: &str) {
        self.send(SearchEvent::UsePopularSearch(query.to_string()));
    }

    pub fn use_suggestion(&self, phrase: &str) {
        self.send(SearchEvent::UseSuggestion(phrase.to_string()));
    }

    pub fn clear_recent_searches(&self) {
        self.send(SearchEvent::ClearRecentSearches);
    }

    pub fn snapshot(&self) -> SearchState {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.snapshots.clone()
    }

    /// Resolves once every event sent before it has been applied.
    pub async fn flush(&self) {
        let (done, applied) = oneshot::channel();
        if self.inbox.send(Command::Flush(done)).is_ok() {
            let _ = applied.await;
        }
    }

    /// Registers this session's key handling with a host input port.
    pub fn attach_input(
        &self,
        port: &mut dyn KeyEventPort,
    ) -> Result<PortRegistration, InputPortError> {
        let inbox = self.inbox.downgrade();
        let keys = Arc::clone(&self.keys);
        let sink: KeySink = Arc::new(move |input: KeyInput| match inbox.upgrade() {
            Some(inbox) => keys.forward(&inbox, input),
            None => KeyDisposition::Ignored,
        });
        port.attach(&self.open_shortcut, sink)
    }

    /// Stops the session and hands back the history tracker.
    ///
    /// A sink left attached to a port claims nothing afterwards.
    pub async fn shutdown(self) -> Result<HistoryTracker, SessionError> {
        let _ = self.inbox.send(Command::Shutdown);
        Ok(self.task.await?)
    }

    /// Removes the session's listeners from `port`, then stops the session.
    pub async fn shutdown_input(
        self,
        port: &mut dyn KeyEventPort,
    ) -> Result<HistoryTracker, SessionError> {
        port.detach_all()?;
        self.shutdown().await
    }

    fn send(&self, event: SearchEvent) {
        if self.inbox.send(Command::Event(event)).is_err() {
            debug!("event dropped; search session has stopped");
        }
    }
}

#[derive(Default)]
struct DebounceTimer {
    pending: Option<(u64, Pin<Box<Sleep>>)>,
}

impl DebounceTimer {
    fn schedule(&mut self, seq: u64, delay: Duration) {
        self.pending = Some((seq, Box::pin(tokio::time::sleep(delay))));
    }

    fn cancel(&mut self) {
        self.pending = None;
    }

    /// Sequence of the scheduled fetch once its quiet period is over. Never resolves
    /// while nothing is scheduled.
    async fn elapsed(&mut self) -> u64 {
        match self.pending.as_mut() {
            Some((seq, sleep)) => {
                sleep.as_mut().await;
                let seq = *seq;
                self.pending = None;
                seq
            }
            None => pending().await,
        }
    }
}

enum Step {
    Apply(SearchEvent),
    Key(u64, KeyInput),
    Flush(oneshot::Sender<()>),
    Stop,
}

struct SessionLoop {
    store: SearchStore,
    history: HistoryTracker,
    ports: SessionPorts,
    popular_limit: usize,
    fetch_timeout: Duration,
    publisher: watch::Sender<SearchState>,
    applied_keys: Arc<AtomicU64>,
    timer: DebounceTimer,
    in_flight: FuturesUnordered<BoxFuture<'static, SearchEvent>>,
}

impl SessionLoop {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> HistoryTracker {
        loop {
            let step = tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Event(event)) => Step::Apply(event),
                    Some(Command::Key { ticket, input }) => Step::Key(ticket, input),
                    Some(Command::Flush(done)) => Step::Flush(done),
                    Some(Command::Shutdown) | None => Step::Stop,
                },
                seq = self.timer.elapsed() => Step::Apply(SearchEvent::DebounceElapsed { seq }),
                Some(completed) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    Step::Apply(completed)
                }
            };

            match step {
                Step::Apply(event) => self.apply(event),
                Step::Key(ticket, input) => {
                    self.apply(SearchEvent::Key(input));
                    self.applied_keys.fetch_max(ticket, Ordering::SeqCst);
                }
                Step::Flush(done) => {
                    let _ = done.send(());
                }
                Step::Stop => break,
            }
        }

        if !self.in_flight.is_empty() {
            debug!(pending = self.in_flight.len(), "abandoning in-flight searches");
        }
        info!("search session stopped");
        self.history
    }

    fn apply(&mut self, event: SearchEvent) {
        let effects = self.store.dispatch(event);
        for effect in effects {
            self.run_effect(effect);
        }
        self.publish();
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ScheduleFetch { seq, delay } => self.timer.schedule(seq, delay),
            Effect::CancelScheduledFetch => self.timer.cancel(),
            Effect::StartFetch {
                seq,
                query,
                filters,
            } => {
                let backend = Arc::clone(&self.ports.backend);
                let timeout = self.fetch_timeout;
                self.in_flight.push(
                    async move {
                        let outcome =
                            fetch_results(backend.as_ref(), &query, &filters, timeout).await;
                        SearchEvent::FetchCompleted {
                            seq,
                            query,
                            outcome,
                        }
                    }
                    .boxed(),
                );
            }
            Effect::TrackSearch {
                query,
                result_count,
            } => self.history.track_search(&query, result_count),
            Effect::RecordQuery(label) => self.history.record_query(&label),
            Effect::RecordResultClick { page_label, result } => {
                self.history.record_result_click(&page_label, &result)
            }
            Effect::ClearRecentHistory => self.history.clear_recent_searches(),
            Effect::RefreshHistory => {
                let refreshed = SearchEvent::HistoryRefreshed {
                    recent: self.history.recent_searches(),
                    popular: self.history.popular_searches(self.popular_limit),
                };
                for follow_up in self.store.dispatch(refreshed) {
                    self.run_effect(follow_up);
                }
            }
            Effect::RunCommand(action) => {
                self.publish();
                if let Err(err) = self.ports.commands.run(&action) {
                    warn!(command = %action, error = %err, "command failed");
                }
            }
            Effect::Navigate(url) => {
                self.publish();
                info!(url = %url, "navigating");
                self.ports.navigator.navigate(&url);
            }
        }
    }

    fn publish(&self) {
        let state = self.store.state();
        self.publisher.send_if_modified(|current| {
            if *current == *state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
    }
}
