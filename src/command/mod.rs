//! Remote command execution
//!
//! This module handles:
//! - Authenticating senders
//! - Mapping message text to handlers
//! - Running each handler as a supervised task
//! - Replying to the sender

mod auth;
mod dispatcher;
pub mod handlers;

pub use auth::AuthenticatedSenders;
pub use dispatcher::{CommandDispatcher, DispatchEvent};

/// A received message waiting to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    /// Intake order assigned by the listener
    pub sequence: u64,
    pub text: String,
    pub sender: String,
}

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command completed; `message` is sent back to the sender
    Completed { message: String },
    /// Command not executed; `message` is sent back to the sender
    Rejected { message: String },
    /// Command continues in a background task that replies on its own
    Pending,
}

impl CommandResult {
    /// Reply text, if any
    pub fn reply(&self) -> Option<&str> {
        match self {
            CommandResult::Completed { message } | CommandResult::Rejected { message } => {
                Some(message)
            }
            CommandResult::Pending => None,
        }
    }
}
