//! Authenticated senders

use std::collections::HashSet;
use tokio::sync::RwLock;

/// Phone numbers allowed to issue commands; only ever grows
pub struct AuthenticatedSenders {
    senders: RwLock<HashSet<String>>,
}

impl AuthenticatedSenders {
    /// Seeded with the operator number
    pub fn new(operator: impl Into<String>) -> Self {
        let mut senders = HashSet::new();
        senders.insert(operator.into());
        Self {
            senders: RwLock::new(senders),
        }
    }

    pub async fn contains(&self, sender: &str) -> bool {
        self.senders.read().await.contains(sender)
    }

    /// Add a sender; returns whether it was new
    pub async fn add(&self, sender: &str) -> bool {
        self.senders.write().await.insert(sender.to_string())
    }
}
