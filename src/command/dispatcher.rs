//! Command Dispatcher
//!
//! Pops received messages in intake order, authenticates the sender and runs
//! each recognized instruction as a supervised task. The dispatcher never
//! waits for a handler; finished handlers are reaped from the [`JoinSet`]
//! between queue items.

use super::handlers::{self, HandlerContext};
use super::{AuthenticatedSenders, CommandResult, InboundCommand};
use crate::replies;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracker_shared::command::{admit, normalize};
use tracker_shared::{Admission, DispatchError, Instruction, ProtocolError};
use tracing::{debug, error, info, warn};

/// Events emitted by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// Command admitted and started
    Accepted {
        sequence: u64,
        sender: String,
        instruction: &'static str,
    },
    /// Command not executed
    Ignored {
        sequence: u64,
        reason: DispatchError,
    },
    /// Handler and reply finished
    Completed {
        sequence: u64,
        instruction: &'static str,
    },
    /// Handler or reply failed
    Failed {
        sequence: u64,
        instruction: &'static str,
        error: String,
    },
}

/// What a finished handler task reports back
struct HandlerOutcome {
    sequence: u64,
    instruction: &'static str,
    result: Result<(), ProtocolError>,
}

/// Dispatches queued commands to handler tasks
pub struct CommandDispatcher {
    ctx: HandlerContext,
    senders: Arc<AuthenticatedSenders>,
    password: String,
    tasks: JoinSet<HandlerOutcome>,
    events: mpsc::UnboundedSender<DispatchEvent>,
}

impl CommandDispatcher {
    /// Create a new dispatcher and its event channel
    pub fn new(
        ctx: HandlerContext,
        senders: Arc<AuthenticatedSenders>,
        password: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            ctx,
            senders,
            password: password.into(),
            tasks: JoinSet::new(),
            events,
        };
        (dispatcher, event_rx)
    }

    /// Dispatch until the queue closes, then wait for running handlers
    pub async fn run(mut self, mut queue: mpsc::UnboundedReceiver<InboundCommand>) {
        info!("[DISPATCH] Ready");

        loop {
            tokio::select! {
                command = queue.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.reap(joined);
                }
            }
        }

        debug!("[DISPATCH] Queue closed, waiting for {} handlers", self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            self.reap(joined);
        }
        info!("[DISPATCH] Stopped");
    }

    async fn dispatch(&mut self, command: InboundCommand) {
        let InboundCommand {
            sequence,
            text,
            sender,
        } = command;
        let text = normalize(&text);
        let authenticated = self.senders.contains(&sender).await;

        match admit(&text, &sender, authenticated, &self.password) {
            Ok(admission) => {
                let instruction = match &admission {
                    Admission::Login | Admission::AlreadyLoggedIn => "login",
                    Admission::Execute(instruction) => instruction.name(),
                };
                info!("[DISPATCH] #{} {} from {}", sequence, instruction, sender);
                self.emit(DispatchEvent::Accepted {
                    sequence,
                    sender: sender.clone(),
                    instruction,
                });

                match admission {
                    Admission::Login => {
                        let result = handlers::handle_login(&self.senders, &sender).await;
                        self.reply(sequence, instruction, sender, result);
                    }
                    Admission::AlreadyLoggedIn => {
                        self.reply(sequence, instruction, sender, handlers::handle_already_logged_in());
                    }
                    // The alarm switches change state before the next command is popped
                    Admission::Execute(Instruction::AlarmOn) => {
                        let result = handlers::handle_alarm_on(&self.ctx, &sender).await;
                        self.reply(sequence, instruction, sender, result);
                    }
                    Admission::Execute(Instruction::AlarmOff) => {
                        let result = handlers::handle_alarm_off(&self.ctx);
                        self.reply(sequence, instruction, sender, result);
                    }
                    Admission::Execute(other) => self.spawn_handler(sequence, sender, other),
                }
            }
            Err(reason @ DispatchError::Unauthorized { .. }) => {
                info!("[DISPATCH] #{} ignored: {}", sequence, reason);
                self.emit(DispatchEvent::Ignored { sequence, reason });
            }
            Err(reason @ DispatchError::UnrecognizedCommand { .. }) => {
                info!("[DISPATCH] #{} from {}: {}", sequence, sender, reason);
                self.emit(DispatchEvent::Ignored { sequence, reason });
                self.reply(sequence, "unrecognized", sender, handlers::handle_unrecognized());
            }
        }

        if let Err(e) = self.ctx.at.delete_all_messages().await {
            warn!("[DISPATCH] Deleting stored messages failed: {}", e);
        }
    }

    /// Run `instruction` and its reply as one supervised task
    fn spawn_handler(&mut self, sequence: u64, sender: String, instruction: Instruction) {
        let ctx = self.ctx.clone();
        let name = instruction.name();

        self.tasks.spawn(async move {
            let result = match handlers::execute(&ctx, &instruction, &sender).await {
                Ok(outcome) => match outcome.reply() {
                    Some(text) => ctx.at.send_sms(&sender, text).await,
                    None => Ok(()),
                },
                Err(e) => {
                    if let Err(reply_error) = ctx.at.send_sms(&sender, replies::COMMAND_FAILED).await {
                        debug!("[DISPATCH] Failure reply to {} failed: {}", sender, reply_error);
                    }
                    Err(e)
                }
            };

            HandlerOutcome {
                sequence,
                instruction: name,
                result,
            }
        });
    }

    /// Send the reply of an inline handler as a supervised task
    fn reply(&mut self, sequence: u64, instruction: &'static str, sender: String, result: CommandResult) {
        let Some(text) = result.reply().map(str::to_string) else {
            self.emit(DispatchEvent::Completed {
                sequence,
                instruction,
            });
            return;
        };

        let at = self.ctx.at.clone();
        self.tasks.spawn(async move {
            HandlerOutcome {
                sequence,
                instruction,
                result: at.send_sms(&sender, &text).await,
            }
        });
    }

    fn reap(&mut self, joined: Result<HandlerOutcome, JoinError>) {
        match joined {
            Ok(HandlerOutcome {
                sequence,
                instruction,
                result: Ok(()),
            }) => {
                debug!("[DISPATCH] #{} {} completed", sequence, instruction);
                self.emit(DispatchEvent::Completed {
                    sequence,
                    instruction,
                });
            }
            Ok(HandlerOutcome {
                sequence,
                instruction,
                result: Err(e),
            }) => {
                error!("[DISPATCH] #{} {} failed: {}", sequence, instruction, e);
                self.emit(DispatchEvent::Failed {
                    sequence,
                    instruction,
                    error: e.to_string(),
                });
            }
            Err(e) => error!("[DISPATCH] Handler task panicked: {}", e),
        }
    }

    fn emit(&self, event: DispatchEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}
