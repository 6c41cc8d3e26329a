use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::action_executor::{BuiltInCommandRunner, CommandHandler, Navigator};
use crate::catalog::{
    CatalogBackend, COMMAND_LOGOUT, COMMAND_OPEN_SHORTCUTS, COMMAND_TOGGLE_THEME,
};
use crate::config::{self, Config, ConfigError};
use crate::history::{HistoryLimits, HistoryTracker};
use crate::hotkey::KeyInput;
use crate::kv_store::SqliteKvStore;
use crate::logging::{self, LoggingError};
use crate::session::{SearchHandle, SearchSession, SessionError, SessionPorts};

const LOG_PREFIX: &str = "[remitfind-core]";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub config_path: Option<PathBuf>,
    pub query: Option<String>,
    pub script: bool,
}

pub fn parse_cli_args(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().ok_or("--config requires a path")?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--query" => {
                let value = iter.next().ok_or("--query requires text")?;
                options.query = Some(value.clone());
            }
            "--script" => options.script = true,
            other => return Err(format!("unknown argument '{other}'")),
        }
    }

    if options.script && options.query.is_some() {
        return Err("--query and --script cannot be combined".into());
    }
    Ok(options)
}

/// One line of a `--script` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Type(String),
    Key(KeyInput),
    Wait(Duration),
    Suggest(String),
    Recent(String),
    Clear,
    Toggle,
    Show,
}

/// Parses a script line. Blank lines and `#` comments yield `None`.
pub fn parse_script_line(line: &str) -> Result<Option<ScriptCommand>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (trimmed, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "type" => ScriptCommand::Type(rest.to_string()),
        "key" => ScriptCommand::Key(KeyInput::parse(rest)?),
        "wait" => {
            let ms = rest
                .parse::<u64>()
                .map_err(|_| format!("invalid wait duration '{rest}'"))?;
            ScriptCommand::Wait(Duration::from_millis(ms))
        }
        "suggest" => ScriptCommand::Suggest(rest.to_string()),
        "recent" => ScriptCommand::Recent(rest.to_string()),
        "clear" => ScriptCommand::Clear,
        "toggle" => ScriptCommand::Toggle,
        "show" => ScriptCommand::Show,
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(command))
}

struct PrintingNavigator;

impl Navigator for PrintingNavigator {
    fn navigate(&self, url: &str) {
        println!("{LOG_PREFIX} navigate {url}");
    }
}

fn printing_handler(message: &'static str) -> CommandHandler {
    Arc::new(move || {
        println!("{LOG_PREFIX} {message}");
        Ok(())
    })
}

pub fn run_with_options(options: CliOptions) -> Result<(), RuntimeError> {
    let cfg = config::load(options.config_path.as_deref())?;
    if options.config_path.is_none() && !cfg.config_path.exists() {
        config::save(&cfg)?;
        println!(
            "{LOG_PREFIX} wrote default config to {}",
            cfg.config_path.display()
        );
    }

    if let Err(error) = logging::init() {
        eprintln!("{LOG_PREFIX} file logging disabled: {error}");
    }
    info!(
        config_path = %cfg.config_path.display(),
        history_db_path = %cfg.history_db_path.display(),
        "startup"
    );

    let history = open_history(&cfg);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(drive(cfg, options, history))
}

fn open_history(cfg: &Config) -> HistoryTracker {
    let limits = HistoryLimits::from(cfg);
    match SqliteKvStore::open_from_config(cfg) {
        Ok(store) => HistoryTracker::open(Box::new(store), limits),
        Err(error) => {
            warn!(%error, "history store unavailable; using in-memory history");
            HistoryTracker::in_memory(limits)
        }
    }
}

async fn drive(
    cfg: Config,
    options: CliOptions,
    history: HistoryTracker,
) -> Result<(), RuntimeError> {
    let navigator: Arc<dyn Navigator> = Arc::new(PrintingNavigator);
    let commands = BuiltInCommandRunner::new(Arc::clone(&navigator))
        .with_handler(COMMAND_OPEN_SHORTCUTS, printing_handler("show shortcuts"))
        .with_handler(COMMAND_TOGGLE_THEME, printing_handler("toggle theme"))
        .with_handler(COMMAND_LOGOUT, printing_handler("logout"));
    let ports = SessionPorts {
        backend: Arc::new(CatalogBackend::default()),
        navigator,
        commands: Arc::new(commands),
    };
    let handle = SearchSession::spawn(&cfg, ports, history)?;

    let outcome = if let Some(query) = options.query.as_deref() {
        handle.open();
        handle.query_changed(query);
        settle(&handle, &cfg).await;
        show(&handle)
    } else if options.script {
        run_script(&handle, &cfg).await
    } else {
        let snapshot = handle.snapshot();
        println!(
            "{LOG_PREFIX} shortcut={} recent={:?} popular={:?}",
            cfg.open_shortcut, snapshot.recent_searches, snapshot.popular_searches
        );
        Ok(())
    };

    handle.shutdown().await?;
    outcome
}

async fn run_script(handle: &SearchHandle, cfg: &Config) -> Result<(), RuntimeError> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    for (index, line) in input.lines().enumerate() {
        let command = parse_script_line(line).map_err(|message| RuntimeError::Script {
            line: index + 1,
            message,
        })?;
        let Some(command) = command else {
            continue;
        };

        match command {
            ScriptCommand::Type(text) => handle.query_changed(&text),
            ScriptCommand::Key(input) => {
                let disposition = handle.key(input);
                info!(consumed = disposition.is_consumed(), "key");
            }
            ScriptCommand::Wait(duration) => tokio::time::sleep(duration).await,
            ScriptCommand::Suggest(phrase) => handle.use_suggestion(&phrase),
            ScriptCommand::Recent(query) => handle.use_recent_search(&query),
            ScriptCommand::Clear => handle.clear_search(),
            ScriptCommand::Toggle => handle.toggle_panel(),
            ScriptCommand::Show => {
                settle(handle, cfg).await;
                show(handle)?;
            }
        }
        handle.flush().await;
    }
    Ok(())
}

/// Waits until pending input has been applied and no lookup is outstanding.
async fn settle(handle: &SearchHandle, cfg: &Config) {
    handle.flush().await;
    let mut snapshots = handle.subscribe();
    let budget = cfg.debounce() + cfg.fetch_timeout() + Duration::from_millis(100);
    if tokio::time::timeout(budget, snapshots.wait_for(|state| !state.is_loading))
        .await
        .is_err()
    {
        warn!("search did not settle in time");
    }
}

fn show(handle: &SearchHandle) -> Result<(), RuntimeError> {
    let encoded = serde_json::to_string_pretty(&handle.snapshot())?;
    println!("{encoded}");
    Ok(())
}
