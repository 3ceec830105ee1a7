//! GSM Tracker Shared Protocol Types
//!
//! This crate provides the modem-facing protocol types used by the tracker:
//! line framing and notification classification, AT request post-processing,
//! position report parsing, the remote command grammar and the geofence
//! alarm state machine.

pub mod codec;
pub mod command;
pub mod error;
pub mod position;
pub mod request;
pub mod state_machine;

pub use codec::{Frame, FrameDecoder, Urc};
pub use command::{Admission, DispatchError, Instruction};
pub use error::ProtocolError;
pub use position::{distance, parse_report, Fix, PositionReport, ReportError};
pub use request::{AtRequest, Verdict};

/// Parameters of the modem request/response protocol
pub mod protocol {
    /// Attempts per transaction before giving up
    pub const MAX_ATTEMPTS: u32 = 50;

    /// Maximum number of reply bytes collected per exchange
    pub const READ_BUDGET_BYTES: usize = 1000;

    /// Default read window per exchange in milliseconds
    pub const READ_TIMEOUT_MS: u64 = 2000;

    /// Wait for the `+CMGS` confirmation once the message text went out
    pub const SUBMIT_TIMEOUT_MS: u64 = 60_000;

    /// Any reply containing this marker is discarded and retried
    pub const ERROR_MARKER: &str = "ERROR";

    /// Default command terminator
    pub const COMMAND_TERMINATOR: &str = "\r";

    /// Ends SMS text entry
    pub const CTRL_Z: char = '\u{1a}';

    /// Aborts SMS text entry
    pub const ESC: char = '\u{1b}';
}

/// Geofence alarm parameters
pub mod geofence {
    /// Deviation from the reference fix that triggers an escalation,
    /// in the units of [`crate::position::distance`]
    pub const BREACH_THRESHOLD: f64 = 0.002;

    /// Outer cadence of the alarm loop in milliseconds
    pub const CADENCE_MS: u64 = 30_000;

    /// Pause after starting a breach dial-out
    pub const BREACH_SETTLE_MS: u64 = 1_000;

    /// GNSS warm-up after a power-on
    pub const GPS_WARMUP_MS: u64 = 15_000;
}
