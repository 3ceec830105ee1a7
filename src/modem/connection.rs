//! Modem Channel
//!
//! Owns the serial channel to the modem. A reader task holds the read half
//! and classifies every inbound frame: notifications are forwarded to the
//! notification listener, everything else is queued for the exchange in
//! progress. Only the holder of the exchange lock consumes response frames,
//! so a notification can never be mistaken for a reply and vice versa.
//!
//! A caller may be cancelled in the middle of an SMS submit. The exchange
//! remembers that the modem may still be in text entry and the next exchange
//! leaves it with ESC before writing its own command.

use crate::config::ModemConfig;
use crate::port::PortStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout_at, Instant};
use tracker_shared::codec::FrameDecoder;
use tracker_shared::protocol::ESC;
use tracker_shared::{AtRequest, Frame, ProtocolError, Urc, Verdict};
use tracing::{debug, error, trace, warn};

/// Receiving side of the notification channel
pub type UrcReceiver = mpsc::UnboundedReceiver<Urc>;

/// Write half plus the response frames, guarded together
struct Exchange {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    responses: mpsc::UnboundedReceiver<Frame>,
    /// `AT+CMGS` went out and neither the text nor ESC followed yet
    text_entry: bool,
}

/// Why a single exchange produced no reply text
#[derive(Debug)]
enum ExchangeError {
    /// Reader task is gone
    Closed,
    Io(std::io::Error),
}

impl From<std::io::Error> for ExchangeError {
    fn from(e: std::io::Error) -> Self {
        ExchangeError::Io(e)
    }
}

/// Reply frames collected during one exchange
struct Reply {
    lines: Vec<String>,
    bytes: usize,
    budget: usize,
    /// Payload and Ctrl-Z were written; the message is with the network
    submitted: bool,
}

impl Reply {
    fn new(budget: usize) -> Self {
        Self {
            lines: Vec::new(),
            bytes: 0,
            budget,
            submitted: false,
        }
    }

    fn push(&mut self, frame: &Frame) {
        let text = frame.text();
        self.bytes += text.len() + 2;
        self.lines.push(text.to_string());
    }

    fn is_full(&self) -> bool {
        self.bytes >= self.budget
    }

    fn text(&self) -> String {
        self.lines.join("\r\n")
    }
}

/// Handle to the modem channel; executes transactions
pub struct Modem {
    exchange: Mutex<Exchange>,
    /// Shared with the reader task
    prompt_expected: Arc<AtomicBool>,
    read_timeout: Duration,
    submit_timeout: Duration,
    read_budget: usize,
    max_attempts: u32,
}

impl Modem {
    /// Take ownership of an open port and start the reader task
    pub fn new<S: PortStream>(stream: S, config: &ModemConfig) -> (Self, UrcReceiver) {
        let (reader, writer) = tokio::io::split(stream);
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let (urc_tx, urc_rx) = mpsc::unbounded_channel();
        let prompt_expected = Arc::new(AtomicBool::new(false));

        let prompt = prompt_expected.clone();
        tokio::spawn(async move {
            reader_loop(reader, response_tx, urc_tx, prompt).await;
        });

        let modem = Self {
            exchange: Mutex::new(Exchange {
                writer: Box::new(writer),
                responses: response_rx,
                text_entry: false,
            }),
            prompt_expected,
            read_timeout: config.read_timeout(),
            submit_timeout: config.submit_timeout(),
            read_budget: config.read_budget,
            max_attempts: config.max_attempts,
        };

        (modem, urc_rx)
    }

    /// Run one transaction: send, await, validate, retry
    ///
    /// Each attempt holds the channel for exactly one exchange. Other tasks
    /// may run their own exchanges between two attempts. A submitted payload
    /// is never sent again: once the text went out, only an error reply
    /// leads to another attempt.
    pub async fn execute(&self, request: &AtRequest) -> Result<String, ProtocolError> {
        let mut last_reply = String::new();

        for attempt in 1..=self.max_attempts {
            let outcome = {
                let mut exchange = self.exchange.lock().await;
                self.exchange_once(&mut exchange, request).await
            };

            let reply = match outcome {
                Ok(reply) => reply,
                Err(ExchangeError::Closed) => {
                    error!("[MODEM] Channel closed during {:?}", request.command());
                    return Err(ProtocolError::ChannelClosed {
                        command: request.command().to_string(),
                    });
                }
                Err(ExchangeError::Io(e)) => {
                    warn!(
                        "[MODEM] Write failed for {:?} (attempt {}/{}): {}",
                        request.command(),
                        attempt,
                        self.max_attempts,
                        e
                    );
                    continue;
                }
            };

            let raw = reply.text();
            match request.evaluate(&raw) {
                Verdict::Accepted(text) => {
                    trace!("[MODEM] {:?} -> {:?}", request.command(), text);
                    return Ok(text);
                }
                Verdict::Mismatch(text) if reply.submitted => {
                    warn!(
                        "[MODEM] {:?} submitted without confirmation ({:?}), not resending",
                        request.command(),
                        text
                    );
                    return Ok(text);
                }
                Verdict::ErrorReply => {
                    debug!(
                        "[MODEM] {:?} answered with error (attempt {}/{})",
                        request.command(),
                        attempt,
                        self.max_attempts
                    );
                    last_reply = raw;
                }
                Verdict::Mismatch(text) => {
                    debug!(
                        "[MODEM] {:?} reply rejected: {:?} (attempt {}/{})",
                        request.command(),
                        text,
                        attempt,
                        self.max_attempts
                    );
                    last_reply = text;
                }
            }
        }

        warn!(
            "[MODEM] Giving up on {:?} after {} attempts, last reply {:?}",
            request.command(),
            self.max_attempts,
            last_reply
        );
        Err(ProtocolError::RetriesExhausted {
            command: request.command().to_string(),
            last_reply,
            attempts: self.max_attempts,
        })
    }

    /// One write/read pair; the caller holds the exchange lock
    async fn exchange_once(
        &self,
        exchange: &mut Exchange,
        request: &AtRequest,
    ) -> Result<Reply, ExchangeError> {
        // An earlier caller was cancelled between the command and its text
        if exchange.text_entry {
            warn!("[MODEM] Leaving abandoned text entry");
            exchange.writer.write_all(ESC.to_string().as_bytes()).await?;
            exchange.writer.flush().await?;
            exchange.text_entry = false;
        }
        self.prompt_expected.store(false, Ordering::Release);

        // Replies that arrived after an earlier exchange gave up
        loop {
            match exchange.responses.try_recv() {
                Ok(frame) => debug!("[MODEM] Discarding stale frame {:?}", frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(ExchangeError::Closed),
            }
        }

        let payload = request.payload_bytes();
        if payload.is_some() {
            exchange.text_entry = true;
            self.prompt_expected.store(true, Ordering::Release);
        }

        exchange.writer.write_all(&request.command_bytes()).await?;
        exchange.writer.flush().await?;

        let mut reply = Reply::new(self.read_budget);
        let deadline = Instant::now() + self.read_timeout;
        let last = collect(&mut exchange.responses, &mut reply, deadline).await?;
        self.prompt_expected.store(false, Ordering::Release);

        if let Some(payload) = payload {
            match last {
                Some(Frame::Prompt) => {
                    exchange.writer.write_all(&payload).await?;
                    exchange.writer.flush().await?;
                    exchange.text_entry = false;
                    reply.submitted = true;

                    let deadline = Instant::now() + self.submit_timeout;
                    collect(&mut exchange.responses, &mut reply, deadline).await?;
                }
                // Answered with a result code; the modem never entered text mode
                Some(_) => exchange.text_entry = false,
                None => {
                    // The prompt may still come; leave text entry mode
                    exchange.writer.write_all(ESC.to_string().as_bytes()).await?;
                    exchange.writer.flush().await?;
                    exchange.text_entry = false;
                }
            }
        }

        Ok(reply)
    }
}

/// Collect response frames until a final result code, the byte budget or the deadline
///
/// Returns the final frame, or `None` if the reply was cut short.
async fn collect(
    responses: &mut mpsc::UnboundedReceiver<Frame>,
    reply: &mut Reply,
    deadline: Instant,
) -> Result<Option<Frame>, ExchangeError> {
    while !reply.is_full() {
        match timeout_at(deadline, responses.recv()).await {
            Ok(Some(frame)) => {
                reply.push(&frame);
                if frame.is_final() {
                    return Ok(Some(frame));
                }
            }
            Ok(None) => return Err(ExchangeError::Closed),
            // Read window elapsed
            Err(_) => return Ok(None),
        }
    }
    Ok(None)
}

/// Read, frame and route everything the modem sends
async fn reader_loop<R>(
    mut reader: R,
    responses: mpsc::UnboundedSender<Frame>,
    notifications: mpsc::UnboundedSender<Urc>,
    prompt_expected: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 1024];

    loop {
        let n = match reader.read(&mut read_buf).await {
            Ok(0) => {
                error!("[MODEM] Channel closed by peer");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                error!("[MODEM] Read error: {}", e);
                break;
            }
        };

        decoder.extend(&read_buf[..n]);
        decoder.expect_prompt(prompt_expected.load(Ordering::Acquire));

        loop {
            match decoder.decode_next() {
                Ok(Some(Frame::Urc(urc))) => {
                    debug!("[MODEM] Notification: {:?}", urc);
                    if notifications.send(urc).is_err() {
                        warn!("[MODEM] No notification listener, dropping notification");
                    }
                }
                Ok(Some(frame)) => {
                    trace!("[MODEM] Frame: {:?}", frame);
                    // Nobody holds the receiver only once the modem is dropped
                    let _ = responses.send(frame);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("[MODEM] Framing error: {}", e);
                    break;
                }
            }
        }
    }
}
