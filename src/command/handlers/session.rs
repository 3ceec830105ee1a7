//! Login handling

use crate::command::{AuthenticatedSenders, CommandResult};
use crate::replies;
use tracing::info;

/// Authenticate `sender` after a correct password
pub async fn handle_login(senders: &AuthenticatedSenders, sender: &str) -> CommandResult {
    if senders.add(sender).await {
        info!("[DISPATCH] {} logged in", sender);
    }
    CommandResult::Completed {
        message: replies::LOGGED_IN.into(),
    }
}

pub fn handle_already_logged_in() -> CommandResult {
    CommandResult::Rejected {
        message: replies::ALREADY_LOGGED_IN.into(),
    }
}

pub fn handle_unrecognized() -> CommandResult {
    CommandResult::Rejected {
        message: replies::UNKNOWN_COMMAND.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_adds_sender() {
        let senders = AuthenticatedSenders::new("+40773791847");

        let result = handle_login(&senders, "+40700000001").await;
        assert_eq!(result.reply(), Some(replies::LOGGED_IN));
        assert!(senders.contains("+40700000001").await);
    }

    #[test]
    fn test_fixed_replies() {
        assert_eq!(handle_already_logged_in().reply(), Some(replies::ALREADY_LOGGED_IN));
        assert_eq!(handle_unrecognized().reply(), Some(replies::UNKNOWN_COMMAND));
    }
}
