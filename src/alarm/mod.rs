//! Geofence Alarm Module
//!
//! Owns at most one running alarm instance and the shared alarm state.

mod geofence;
mod state;

pub use geofence::GeofenceAlarm;
pub use state::AlarmState;

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Starts and stops alarm instances
pub struct AlarmController {
    state: Arc<AlarmState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AlarmController {
    pub fn new(state: Arc<AlarmState>) -> Self {
        Self {
            state,
            task: Mutex::new(None),
        }
    }

    /// Enable the alarm and start `alarm`, aborting any previous instance
    pub async fn arm(&self, alarm: GeofenceAlarm) {
        self.state.set_enabled(true);

        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }
        *task = Some(tokio::spawn(alarm.run()));
    }

    /// Clear the enabled flag; returns whether it was set
    pub fn disarm(&self) -> bool {
        self.state.set_enabled(false)
    }

    /// Whether an instance is still running
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
