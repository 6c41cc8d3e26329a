use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

use crate::catalog::built_in_command;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command id")]
    EmptyId,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("command {id} failed: {reason}")]
    Failed { id: String, reason: String },
}

/// Host router. Navigation is fire-and-forget from the palette's point of view.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Executes command results (`type = command` with an `action` id).
pub trait CommandRunner: Send + Sync {
    fn run(&self, action: &str) -> Result<(), CommandError>;
}

pub type CommandHandler = Arc<dyn Fn() -> Result<(), CommandError> + Send + Sync>;

/// Runs built-in commands: route shortcuts go through the navigator, the rest through
/// handlers the host registers by id.
pub struct BuiltInCommandRunner {
    navigator: Arc<dyn Navigator>,
    handlers: BTreeMap<String, CommandHandler>,
}

impl BuiltInCommandRunner {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            handlers: BTreeMap::new(),
        }
    }

    pub fn with_handler(mut self, id: &str, handler: CommandHandler) -> Self {
        self.handlers.insert(id.to_string(), handler);
        self
    }

    pub fn handles(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
            || built_in_command(id).is_some_and(|command| command.route.is_some())
    }
}

impl CommandRunner for BuiltInCommandRunner {
    fn run(&self, action: &str) -> Result<(), CommandError> {
        let id = action.trim();
        if id.is_empty() {
            return Err(CommandError::EmptyId);
        }

        if let Some(handler) = self.handlers.get(id) {
            info!(command = id, "running command");
            return handler();
        }

        match built_in_command(id).and_then(|command| command.route) {
            Some(route) => {
                info!(command = id, route, "running route command");
                self.navigator.navigate(route);
                Ok(())
            }
            None => Err(CommandError::Unknown(id.to_string())),
        }
    }
}

/// Navigator that remembers every target; used by headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .map(|visited| visited.clone())
            .unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(url.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BuiltInCommandRunner, CommandError, CommandRunner, RecordingNavigator};

    #[test]
    fn route_command_navigates() {
        let navigator = Arc::new(RecordingNavigator::default());
        let runner = BuiltInCommandRunner::new(navigator.clone());
        runner.run("new-transaction").unwrap();
        assert_eq!(navigator.visited(), vec!["/send-money".to_string()]);
    }

    #[test]
    fn unregistered_command_is_unknown() {
        let runner = BuiltInCommandRunner::new(Arc::new(RecordingNavigator::default()));
        assert_eq!(
            runner.run("toggle-theme"),
            Err(CommandError::Unknown("toggle-theme".to_string()))
        );
        assert_eq!(runner.run("  "), Err(CommandError::EmptyId));
    }
}
