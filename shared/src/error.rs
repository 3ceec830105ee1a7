//! Transaction errors

use thiserror::Error;

/// A transaction that produced no usable reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("No valid reply to {command:?} after {attempts} attempts (last reply: {last_reply:?})")]
    RetriesExhausted {
        command: String,
        last_reply: String,
        attempts: u32,
    },

    #[error("Modem channel closed while executing {command:?}")]
    ChannelClosed { command: String },

    #[error("Unexpected reply to {command:?}: {reply:?}")]
    UnexpectedReply { command: String, reply: String },
}

impl ProtocolError {
    /// The command that failed
    pub fn command(&self) -> &str {
        match self {
            ProtocolError::RetriesExhausted { command, .. } => command,
            ProtocolError::ChannelClosed { command } => command,
            ProtocolError::UnexpectedReply { command, .. } => command,
        }
    }
}
