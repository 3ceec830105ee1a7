//! GNSS power and status handlers

use super::HandlerContext;
use crate::command::CommandResult;
use crate::replies;
use tracker_shared::ProtocolError;
use tracing::info;

pub async fn handle_gps_on(ctx: &HandlerContext) -> Result<CommandResult, ProtocolError> {
    info!("[DISPATCH] GPS on");
    ctx.at.start_gps().await?;
    Ok(CommandResult::Completed {
        message: replies::GPS_ON.into(),
    })
}

pub async fn handle_gps_off(ctx: &HandlerContext) -> Result<CommandResult, ProtocolError> {
    info!("[DISPATCH] GPS off");
    ctx.at.stop_gps().await?;
    Ok(CommandResult::Completed {
        message: replies::GPS_OFF.into(),
    })
}

/// Reply with the receiver's status text, e.g. "Location 3D Fix"
pub async fn handle_gps_status(ctx: &HandlerContext) -> Result<CommandResult, ProtocolError> {
    let status = ctx.at.gps_status().await?;
    Ok(CommandResult::Completed {
        message: status.text,
    })
}
