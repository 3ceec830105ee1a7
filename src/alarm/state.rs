//! Shared alarm state
//!
//! One accessor object for the alarm flag and the fix history. The flag is
//! published through a watch channel so a running alarm wakes as soon as it
//! is cleared.

use tokio::sync::{watch, RwLock};
use tracker_shared::Fix;

/// The two most recent fixes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixHistory {
    pub last_known: Option<Fix>,
    pub current: Option<Fix>,
}

impl FixHistory {
    /// Most recent fix, falling back to the one before it
    pub fn latest(&self) -> Option<Fix> {
        self.current.or(self.last_known)
    }
}

/// Alarm flag plus fix history
pub struct AlarmState {
    enabled: watch::Sender<bool>,
    fixes: RwLock<FixHistory>,
}

impl AlarmState {
    /// Disabled, no fixes
    pub fn new() -> Self {
        let (enabled, _) = watch::channel(false);
        Self {
            enabled,
            fixes: RwLock::new(FixHistory::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Set the flag, returning the previous value
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.send_replace(enabled)
    }

    /// Receiver woken on every flag change
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.enabled.subscribe()
    }

    /// Rotate the history: the current fix becomes the last known one
    pub async fn record_fix(&self, fix: Fix) {
        let mut fixes = self.fixes.write().await;
        fixes.last_known = fixes.current;
        fixes.current = Some(fix);
    }

    pub async fn fixes(&self) -> FixHistory {
        *self.fixes.read().await
    }

    pub async fn latest_fix(&self) -> Option<Fix> {
        self.fixes().await.latest()
    }
}

impl Default for AlarmState {
    fn default() -> Self {
        Self::new()
    }
}
