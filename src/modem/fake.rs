//! In-process modem double for async tests
//!
//! Drives the far end of a `tokio::io::duplex` pair. Commands are answered
//! by a responder closure; the SMS submit dialogue (`AT+CMGS` prompt, text,
//! Ctrl-Z) is handled here so every responder gets it for free.

use super::connection::{Modem, UrcReceiver};
use crate::config::ModemConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracker_shared::protocol::{CTRL_Z, ESC};

/// Successful reply carrying `body` (empty body: bare `OK`)
pub fn ok(body: &str) -> Option<String> {
    if body.is_empty() {
        Some("\r\nOK\r\n".to_string())
    } else {
        Some(format!("\r\n{}\r\n\r\nOK\r\n", body))
    }
}

pub fn error() -> Option<String> {
    Some("\r\nERROR\r\n".to_string())
}

/// How the fake paces the SMS submit dialogue
#[derive(Debug, Clone, Copy)]
pub struct SubmitTiming {
    /// Delay before the prompt; `None` never prompts
    pub prompt: Option<Duration>,
    /// Delay before the `+CMGS` confirmation; `None` never confirms
    pub confirm: Option<Duration>,
}

impl Default for SubmitTiming {
    fn default() -> Self {
        Self {
            prompt: Some(Duration::ZERO),
            confirm: Some(Duration::ZERO),
        }
    }
}

#[derive(Default)]
struct Log {
    /// Everything received, unframed
    wire: String,
    commands: Vec<String>,
    messages: Vec<(String, String)>,
}

/// Test handle: inspects traffic and injects unsolicited output
#[derive(Clone)]
pub struct FakeModem {
    log: Arc<Mutex<Log>>,
    inject: mpsc::UnboundedSender<String>,
}

impl FakeModem {
    /// Start a modem wired to a fake answering with `responder`
    pub fn spawn<F>(config: &ModemConfig, responder: F) -> (Arc<Modem>, UrcReceiver, FakeModem)
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        Self::spawn_with(config, SubmitTiming::default(), responder)
    }

    /// Like [`FakeModem::spawn`] with a slow or silent SMS dialogue
    pub fn spawn_with<F>(
        config: &ModemConfig,
        timing: SubmitTiming,
        responder: F,
    ) -> (Arc<Modem>, UrcReceiver, FakeModem)
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(Log::default()));

        tokio::spawn(serve(theirs, timing, responder, inject_rx, log.clone()));

        let (modem, urcs) = Modem::new(ours, config);
        let fake = FakeModem {
            log,
            inject: inject_tx,
        };
        (Arc::new(modem), urcs, fake)
    }

    /// Start a modem wired to a scripted GNSS module
    pub fn scripted(config: &ModemConfig, mut script: GnssScript) -> (Arc<Modem>, UrcReceiver, FakeModem) {
        Self::spawn(config, move |command| script.respond(command))
    }

    /// Raw bytes received, control characters included
    pub fn wire(&self) -> String {
        self.log.lock().unwrap().wire.clone()
    }

    /// Every command line received, in order
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().commands.clone()
    }

    /// Number of commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Submitted SMS as (number, text)
    pub fn messages(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().messages.clone()
    }

    /// Write raw bytes to the modem as if emitted unsolicited
    pub fn inject(&self, raw: &str) {
        let _ = self.inject.send(raw.to_string());
    }
}

enum Mode {
    Command,
    /// Collecting SMS text for this number
    Text(String),
}

enum Event {
    Read(usize),
    Inject(String),
    Closed,
}

/// Result of consuming one command or one SMS text
struct Step {
    output: Option<String>,
    /// Wait before writing `output`
    delay: Option<Duration>,
    next: Option<Mode>,
}

async fn serve<F>(
    mut stream: DuplexStream,
    timing: SubmitTiming,
    mut responder: F,
    mut inject: mpsc::UnboundedReceiver<String>,
    log: Arc<Mutex<Log>>,
) where
    F: FnMut(&str) -> Option<String>,
{
    let mut pending = String::new();
    let mut mode = Mode::Command;
    let mut buf = [0u8; 1024];

    loop {
        let event = tokio::select! {
            read = stream.read(&mut buf) => match read {
                Ok(0) | Err(_) => Event::Closed,
                Ok(n) => Event::Read(n),
            },
            Some(raw) = inject.recv() => Event::Inject(raw),
        };

        let n = match event {
            Event::Read(n) => n,
            Event::Inject(raw) => {
                if stream.write_all(raw.as_bytes()).await.is_err() {
                    return;
                }
                continue;
            }
            Event::Closed => return,
        };
        let received = String::from_utf8_lossy(&buf[..n]);
        log.lock().unwrap().wire.push_str(&received);
        pending.push_str(&received);

        while let Some(done) = step(&mut pending, &mut mode, &timing, &mut responder, &log) {
            if let Some(next) = done.next {
                mode = next;
            }
            if let Some(delay) = done.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(output) = done.output {
                if stream.write_all(output.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Consume one command or one SMS text from `pending`; `None` if more input is needed
fn step<F>(
    pending: &mut String,
    mode: &mut Mode,
    timing: &SubmitTiming,
    responder: &mut F,
    log: &Mutex<Log>,
) -> Option<Step>
where
    F: FnMut(&str) -> Option<String>,
{
    match mode {
        Mode::Command => {
            let end = pending.find('\r')?;
            let line: String = pending[..end]
                .chars()
                .filter(|c| *c != ESC && *c != '\n')
                .collect();
            pending.drain(..=end);
            log.lock().unwrap().commands.push(line.clone());

            Some(match submit_number(&line) {
                Some(number) => Step {
                    output: timing.prompt.map(|_| "\r\n> ".to_string()),
                    delay: timing.prompt,
                    next: Some(Mode::Text(number)),
                },
                None => Step {
                    output: responder(&line),
                    delay: None,
                    next: None,
                },
            })
        }
        Mode::Text(number) => {
            let end = pending.find([CTRL_Z, ESC])?;
            let submitted = pending[end..].starts_with(CTRL_Z);
            let text = pending[..end].to_string();
            pending.drain(..end + 1);

            if submitted {
                log.lock().unwrap().messages.push((number.clone(), text));
                Some(Step {
                    output: timing
                        .confirm
                        .map(|_| "\r\n+CMGS: 1\r\n\r\nOK\r\n".to_string()),
                    delay: timing.confirm,
                    next: Some(Mode::Command),
                })
            } else {
                Some(Step {
                    output: None,
                    delay: None,
                    next: Some(Mode::Command),
                })
            }
        }
    }
}

fn submit_number(line: &str) -> Option<String> {
    line.strip_prefix("AT+CMGS=\"")?
        .strip_suffix('"')
        .map(str::to_string)
}

/// `+CGNSINF` record with a fix at the given coordinates
pub fn cgnsinf(latitude: f64, longitude: f64) -> String {
    format!(
        "+CGNSINF: 1,1,20240101120000.000,{},{},120.5,0.00,0.0,1,,1.2,1.5,0.9,,9,7,,,38,,",
        latitude, longitude
    )
}

/// What the receiver reports for one status query
#[derive(Debug, Clone, Copy)]
enum Reading {
    Fix(f64, f64),
    NoFix,
    /// Status query answered with `ERROR`
    Fault,
}

/// Scripted SIM800 with GNSS: power state, a queue of readings and an SMS inbox
pub struct GnssScript {
    powered: bool,
    /// Popped on each status query; the last reading repeats
    samples: VecDeque<Reading>,
    current: Option<(f64, f64)>,
    network: String,
    inbox: HashMap<u32, (String, String)>,
}

impl GnssScript {
    pub fn new() -> Self {
        Self {
            powered: true,
            samples: VecDeque::new(),
            current: None,
            network: "Orange RO".into(),
            inbox: HashMap::new(),
        }
    }

    pub fn powered(mut self, powered: bool) -> Self {
        self.powered = powered;
        self
    }

    pub fn fix(mut self, latitude: f64, longitude: f64) -> Self {
        self.samples.push_back(Reading::Fix(latitude, longitude));
        self
    }

    pub fn no_fix(mut self) -> Self {
        self.samples.push_back(Reading::NoFix);
        self
    }

    /// Status query keeps failing
    pub fn fault(mut self) -> Self {
        self.samples.push_back(Reading::Fault);
        self
    }

    /// Store a message at `index`
    pub fn message(mut self, index: u32, sender: &str, body: &str) -> Self {
        self.inbox.insert(index, (sender.into(), body.into()));
        self
    }

    pub fn respond(&mut self, command: &str) -> Option<String> {
        match command {
            "AT+CGPSPWR?" => ok(&format!("+CGPSPWR: {}", u8::from(self.powered))),
            "AT+CGNSPWR=1" => {
                self.powered = true;
                ok("")
            }
            "AT+CGNSPWR=0" | "AT+CGPSPWR=0" => {
                self.powered = false;
                ok("")
            }
            "AT+CGPSSTATUS?" => {
                let reading = if self.samples.len() > 1 {
                    self.samples.pop_front()
                } else {
                    self.samples.front().copied()
                };
                match reading {
                    Some(Reading::Fix(latitude, longitude)) => {
                        self.current = Some((latitude, longitude))
                    }
                    Some(Reading::NoFix) | None => self.current = None,
                    Some(Reading::Fault) => return error(),
                }
                match self.current {
                    Some(_) => ok("+CGPSSTATUS: Location 3D Fix"),
                    None => ok("+CGPSSTATUS: Location Not Fix"),
                }
            }
            "AT+CGNSINF" => match self.current {
                Some((latitude, longitude)) => ok(&cgnsinf(latitude, longitude)),
                None => ok("+CGNSINF: 1,0,,,,,,,,,,,,,,,,,,,"),
            },
            "AT+CSPN?" => ok(&format!("+CSPN: \"{}\",0", self.network)),
            _ => {
                if let Some(index) = command.strip_prefix("AT+CMGR=") {
                    let entry = index.parse().ok().and_then(|i: u32| self.inbox.get(&i));
                    return match entry {
                        Some((sender, body)) => ok(&format!(
                            "+CMGR: \"REC UNREAD\",\"{}\",\"\",\"24/01/01,12:00:00+08\"\r\n{}",
                            sender, body
                        )),
                        None => ok(""),
                    };
                }
                ok("")
            }
        }
    }
}

impl Default for GnssScript {
    fn default() -> Self {
        Self::new()
    }
}
