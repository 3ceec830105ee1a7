//! Command handlers for the remote instructions

mod alarm;
mod gps;
mod position;
mod session;
mod status;

pub use alarm::{handle_alarm_off, handle_alarm_on};
pub use gps::{handle_gps_off, handle_gps_on, handle_gps_status};
pub use position::handle_position;
pub use session::{handle_already_logged_in, handle_login, handle_unrecognized};
pub use status::handle_status;

use super::CommandResult;
use crate::alarm::{AlarmController, AlarmState};
use crate::config::AlarmConfig;
use crate::modem::AtCommandSender;
use crate::position::PositionEngine;
use std::sync::Arc;
use tracker_shared::{Instruction, ProtocolError};

/// Context passed to command handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub at: AtCommandSender,
    pub position: PositionEngine,
    pub state: Arc<AlarmState>,
    pub alarm: Arc<AlarmController>,
    pub alarm_config: AlarmConfig,
}

/// Run an instruction for an authenticated sender
pub async fn execute(
    ctx: &HandlerContext,
    instruction: &Instruction,
    sender: &str,
) -> Result<CommandResult, ProtocolError> {
    match instruction {
        Instruction::GpsOn => handle_gps_on(ctx).await,
        Instruction::GpsOff => handle_gps_off(ctx).await,
        Instruction::GpsStatus => handle_gps_status(ctx).await,
        Instruction::Position => handle_position(ctx, sender).await,
        Instruction::Status => handle_status(ctx).await,
        Instruction::Login { .. } => Ok(handle_already_logged_in()),
        Instruction::AlarmOn => Ok(handle_alarm_on(ctx, sender).await),
        Instruction::AlarmOff => Ok(handle_alarm_off(ctx)),
    }
}
