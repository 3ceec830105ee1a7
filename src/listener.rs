//! Notification Listener
//!
//! Turns "new message" notifications into queued commands. Runs for the
//! process lifetime and only wakes when the channel reader hands it a
//! notification.

use crate::command::InboundCommand;
use crate::modem::{AtCommandSender, UrcReceiver};
use tokio::sync::mpsc;
use tracker_shared::Urc;
use tracing::{debug, error, info, warn};

pub struct NotificationListener {
    at: AtCommandSender,
    queue: mpsc::UnboundedSender<InboundCommand>,
    next_sequence: u64,
}

impl NotificationListener {
    pub fn new(at: AtCommandSender, queue: mpsc::UnboundedSender<InboundCommand>) -> Self {
        Self {
            at,
            queue,
            next_sequence: 1,
        }
    }

    /// Consume notifications until the channel reader or the dispatcher goes away
    pub async fn run(mut self, mut urcs: UrcReceiver) {
        info!("[LISTENER] Waiting for notifications");

        while let Some(urc) = urcs.recv().await {
            match urc {
                Urc::NewMessage { storage, index } => {
                    debug!("[LISTENER] New message in {} at {}", storage, index);
                    if !self.fetch(index).await {
                        break;
                    }
                }
                Urc::Ring => info!("[LISTENER] Incoming call ignored"),
            }
        }

        warn!("[LISTENER] Stopped");
    }

    /// Read and enqueue one message; false once the queue is closed
    async fn fetch(&mut self, index: u32) -> bool {
        let message = match self.at.read_sms(index).await {
            Ok(message) => message,
            Err(e) => {
                error!("[LISTENER] Reading message {} failed: {}", index, e);
                return true;
            }
        };

        let command = InboundCommand {
            sequence: self.next_sequence,
            text: message.body,
            sender: message.sender,
        };
        self.next_sequence += 1;

        info!(
            "[LISTENER] #{} from {}: {:?}",
            command.sequence, command.sender, command.text
        );
        if self.queue.send(command).is_err() {
            error!("[LISTENER] Command queue closed");
            return false;
        }
        true
    }
}
