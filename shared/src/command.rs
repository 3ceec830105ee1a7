//! Remote command grammar and sender admission
//!
//! Commands arrive as SMS text. After normalization the text must match one
//! of the table entries exactly (case-sensitive):
//!
//! | Text             | Instruction  |
//! |------------------|--------------|
//! | `Logare=<pw>`    | `Login`      |
//! | `Pornire GPS`    | `GpsOn`      |
//! | `Oprire GPS`     | `GpsOff`     |
//! | `Pozitie`        | `Position`   |
//! | `Status GPS`     | `GpsStatus`  |
//! | `Pornire Alarma` | `AlarmOn`    |
//! | `Oprire Alarma`  | `AlarmOff`   |
//! | `Status`         | `Status`     |

use std::str::FromStr;
use thiserror::Error;

/// Prefix of the login command
pub const LOGIN_PREFIX: &str = "Logare=";

/// Reply marker that can leak into fetched message bodies
const REPLY_MARKER: &str = "OK";

/// Reasons a command is not executed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Sender {sender} is not authenticated")]
    Unauthorized { sender: String },

    #[error("Unrecognized command: {text:?}")]
    UnrecognizedCommand { text: String },
}

/// A recognized remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Login { password: String },
    GpsOn,
    GpsOff,
    Position,
    GpsStatus,
    AlarmOn,
    AlarmOff,
    Status,
}

impl Instruction {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Login { .. } => "login",
            Instruction::GpsOn => "gps-on",
            Instruction::GpsOff => "gps-off",
            Instruction::Position => "position",
            Instruction::GpsStatus => "gps-status",
            Instruction::AlarmOn => "alarm-on",
            Instruction::AlarmOff => "alarm-off",
            Instruction::Status => "status",
        }
    }
}

impl FromStr for Instruction {
    type Err = DispatchError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Some(password) = text.strip_prefix(LOGIN_PREFIX) {
            return Ok(Instruction::Login {
                password: password.to_string(),
            });
        }

        match text {
            "Pornire GPS" => Ok(Instruction::GpsOn),
            "Oprire GPS" => Ok(Instruction::GpsOff),
            "Pozitie" => Ok(Instruction::Position),
            "Status GPS" => Ok(Instruction::GpsStatus),
            "Pornire Alarma" => Ok(Instruction::AlarmOn),
            "Oprire Alarma" => Ok(Instruction::AlarmOff),
            "Status" => Ok(Instruction::Status),
            _ => Err(DispatchError::UnrecognizedCommand {
                text: text.to_string(),
            }),
        }
    }
}

/// What the dispatcher should do with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Correct password from a new sender: authenticate it
    Login,
    /// Login attempt from an authenticated sender
    AlreadyLoggedIn,
    /// Run an instruction for an authenticated sender
    Execute(Instruction),
}

/// Strip control characters and the reply marker from a message body
pub fn normalize(raw: &str) -> String {
    let text: String = raw.chars().filter(|c| !c.is_control()).collect();
    text.replace(REPLY_MARKER, "").trim().to_string()
}

/// Decide how to treat normalized `text` from `sender`
pub fn admit(
    text: &str,
    sender: &str,
    authenticated: bool,
    password: &str,
) -> Result<Admission, DispatchError> {
    let instruction = text.parse::<Instruction>();

    if !authenticated {
        return match instruction {
            Ok(Instruction::Login { password: supplied }) if supplied == password => {
                Ok(Admission::Login)
            }
            _ => Err(DispatchError::Unauthorized {
                sender: sender.to_string(),
            }),
        };
    }

    match instruction? {
        Instruction::Login { .. } => Ok(Admission::AlreadyLoggedIn),
        other => Ok(Admission::Execute(other)),
    }
}
