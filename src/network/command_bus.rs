use std::collections::HashMap;

use tracing::{debug, warn};

use super::codec::ParsedMessage;
use crate::error::ClientError;

/// Handler for one command name.
///
/// Handlers get the state they act on and the message explicitly; they do not
/// capture the session.  Returning an error means the payload was rejected;
/// the bus logs it and moves on.
pub type CommandHandler<S> = Box<dyn Fn(&mut S, &ParsedMessage) -> Result<(), ClientError>>;

/// What happened to a dispatched message.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Handled,
    UnknownCommand(String),
    Rejected(ClientError),
}

/// Dispatch table from command name to exactly one handler.
pub struct CommandBus<S> {
    handlers: HashMap<String, CommandHandler<S>>,
}

impl<S> Default for CommandBus<S> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<S> CommandBus<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `command`.  A previous handler for the same
    /// command is replaced and handed back.
    pub fn register<F>(&mut self, command: impl Into<String>, handler: F) -> Option<CommandHandler<S>>
    where
        F: Fn(&mut S, &ParsedMessage) -> Result<(), ClientError> + 'static,
    {
        let command = command.into();
        let previous = self.handlers.insert(command.clone(), Box::new(handler));
        if previous.is_some() {
            debug!(%command, "replaced command handler");
        }
        previous
    }

    pub fn unregister(&mut self, command: &str) -> Option<CommandHandler<S>> {
        self.handlers.remove(command)
    }

    pub fn is_registered(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Run the handler for `message.command` right away.  Nothing is queued,
    /// so messages are handled in exactly the order they are dispatched.
    pub fn dispatch(&self, state: &mut S, message: &ParsedMessage) -> DispatchOutcome {
        let Some(handler) = self.handlers.get(&message.command) else {
            warn!(command = %message.command, "no handler registered, message dropped");
            return DispatchOutcome::UnknownCommand(message.command.clone());
        };

        match handler(state, message) {
            Ok(()) => {
                debug!(command = %message.command, "message handled");
                DispatchOutcome::Handled
            }
            Err(e) => {
                warn!(command = %message.command, error = %e, "handler rejected message");
                DispatchOutcome::Rejected(e)
            }
        }
    }
}
