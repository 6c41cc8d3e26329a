use std::sync::Arc;

use thiserror::Error;

use crate::hotkey::{parse_shortcut, KeyInput};

/// Whether the host should stop a key event from reaching page-level handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    Consumed,
    Ignored,
}

impl KeyDisposition {
    pub fn is_consumed(self) -> bool {
        self == Self::Consumed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRegistration {
    Attached(String),
    Noop(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputPortError {
    #[error("invalid shortcut: {0}")]
    InvalidShortcut(String),
    #[error("input port already attached")]
    AlreadyAttached,
}

/// Callback the host invokes for every key event it observes.
pub type KeySink = Arc<dyn Fn(KeyInput) -> KeyDisposition + Send + Sync>;

/// Event-dispatch substrate the host wires up (window listener, terminal reader, test harness).
pub trait KeyEventPort: Send {
    fn attach(
        &mut self,
        open_shortcut: &str,
        sink: KeySink,
    ) -> Result<PortRegistration, InputPortError>;
    fn detach_all(&mut self) -> Result<(), InputPortError>;
}

#[derive(Default)]
pub struct MockInputPort {
    registrations: Vec<String>,
    sink: Option<KeySink>,
}

impl MockInputPort {
    pub fn registrations(&self) -> &[String] {
        &self.registrations
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Delivers a key event the way a host listener would. `None` when nothing is attached.
    pub fn emit(&self, input: KeyInput) -> Option<KeyDisposition> {
        self.sink.as_ref().map(|sink| sink(input))
    }
}

impl KeyEventPort for MockInputPort {
    fn attach(
        &mut self,
        open_shortcut: &str,
        sink: KeySink,
    ) -> Result<PortRegistration, InputPortError> {
        parse_shortcut(open_shortcut).map_err(InputPortError::InvalidShortcut)?;
        if self.sink.is_some() {
            return Err(InputPortError::AlreadyAttached);
        }
        self.registrations.push(open_shortcut.to_string());
        self.sink = Some(sink);
        Ok(PortRegistration::Attached(open_shortcut.to_string()))
    }

    fn detach_all(&mut self) -> Result<(), InputPortError> {
        self.registrations.clear();
        self.sink = None;
        Ok(())
    }
}

/// Port for headless runs where keys are fed directly to the session handle.
#[derive(Default)]
pub struct NoopInputPort {
    registrations: Vec<String>,
}

impl NoopInputPort {
    pub fn registrations(&self) -> &[String] {
        &self.registrations
    }
}

impl KeyEventPort for NoopInputPort {
    fn attach(
        &mut self,
        open_shortcut: &str,
        _sink: KeySink,
    ) -> Result<PortRegistration, InputPortError> {
        parse_shortcut(open_shortcut).map_err(InputPortError::InvalidShortcut)?;
        self.registrations.push(open_shortcut.to_string());
        Ok(PortRegistration::Noop(open_shortcut.to_string()))
    }

    fn detach_all(&mut self) -> Result<(), InputPortError> {
        self.registrations.clear();
        Ok(())
    }
}
